use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

const DEFAULT_DATABASE_URL: &str = "sqlite://dashboard.db?mode=rwc";
const DEFAULT_SESSION_LIFETIME_HOURS: i64 = 24 * 30;
const DEFAULT_SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

#[derive(Debug, Clone)]
pub struct BootstrapUser {
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_lifetime_hours: i64,
    pub session_cleanup_interval_secs: u64,
    pub bootstrap_user: Option<BootstrapUser>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            dotenvy::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let session_lifetime_hours = parse_var("SESSION_LIFETIME_HOURS")?
            .unwrap_or(DEFAULT_SESSION_LIFETIME_HOURS);
        if session_lifetime_hours <= 0 {
            anyhow::bail!("SESSION_LIFETIME_HOURS must be positive");
        }

        let session_cleanup_interval_secs = parse_var("SESSION_CLEANUP_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_SESSION_CLEANUP_INTERVAL_SECS);

        let bootstrap_user = match (
            dotenvy::var("BOOTSTRAP_NICKNAME"),
            dotenvy::var("BOOTSTRAP_PASSWORD"),
        ) {
            (Ok(nickname), Ok(password)) if !nickname.is_empty() && !password.is_empty() => {
                Some(BootstrapUser { nickname, password })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            session_lifetime_hours,
            session_cleanup_interval_secs,
            bootstrap_user,
        })
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            session_lifetime: chrono::Duration::hours(self.session_lifetime_hours),
        }
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenvy::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}

/// Settings the session gate reads at request time.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub session_lifetime: chrono::Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_lifetime: chrono::Duration::hours(DEFAULT_SESSION_LIFETIME_HOURS),
        }
    }
}

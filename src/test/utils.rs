#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::Once;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    use crate::auth::{IssuedSession, SESSION_COOKIE, Session, SessionStore};
    use crate::db::{
        create_municipality, create_project_category, create_user, set_municipality_status,
    };
    use crate::env::AuthSettings;
    use crate::error::{AppError, AuthError};
    use crate::models::MunicipalityStatus;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        municipalities: Vec<TestMunicipality>,
        categories: Vec<String>,
    }

    pub struct TestUser {
        pub nickname: String,
        pub password: String,
    }

    pub struct TestMunicipality {
        pub name: String,
        pub state: String,
        pub latitude: f64,
        pub longitude: f64,
        pub archived: bool,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(self, nickname: &str) -> Self {
            self.user_with_password(nickname, STANDARD_PASSWORD)
        }

        pub fn user_with_password(mut self, nickname: &str, password: &str) -> Self {
            self.users.push(TestUser {
                nickname: nickname.to_string(),
                password: password.to_string(),
            });
            self
        }

        pub fn municipality(mut self, name: &str, state: &str, latitude: f64, longitude: f64) -> Self {
            self.municipalities.push(TestMunicipality {
                name: name.to_string(),
                state: state.to_string(),
                latitude,
                longitude,
                archived: false,
            });
            self
        }

        pub fn archived_municipality(mut self, name: &str, state: &str) -> Self {
            self.municipalities.push(TestMunicipality {
                name: name.to_string(),
                state: state.to_string(),
                latitude: 0.0,
                longitude: 0.0,
                archived: true,
            });
            self
        }

        pub fn category(mut self, name: &str) -> Self {
            self.categories.push(name.to_string());
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .parse_filters("debug")
                    .is_test(true)
                    .try_init();
            });

            // One connection keeps every query on the same in-memory database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_ids = HashMap::new();
            for user in &self.users {
                let created = create_user(&pool, &user.nickname, &user.password).await?;
                user_ids.insert(user.nickname.clone(), created.id);
            }

            let mut municipality_ids = HashMap::new();
            for m in &self.municipalities {
                let created =
                    create_municipality(&pool, &m.name, &m.state, m.latitude, m.longitude).await?;
                if m.archived {
                    set_municipality_status(&pool, created.id, MunicipalityStatus::Archived)
                        .await?;
                }
                municipality_ids.insert(m.name.clone(), created.id);
            }

            let mut category_ids = HashMap::new();
            for name in &self.categories {
                let created = create_project_category(&pool, name).await?;
                category_ids.insert(name.clone(), created.id);
            }

            Ok(TestDb {
                pool,
                user_ids,
                municipality_ids,
                category_ids,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_ids: HashMap<String, String>,
        pub municipality_ids: HashMap<String, i64>,
        pub category_ids: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, nickname: &str) -> Option<String> {
            self.user_ids.get(nickname).cloned()
        }

        pub fn municipality_id(&self, name: &str) -> Option<i64> {
            self.municipality_ids.get(name).copied()
        }

        pub fn category_id(&self, name: &str) -> Option<i64> {
            self.category_ids.get(name).copied()
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user("admin_user")
            .user("field_user")
            .municipality("Springfield", "SP", -23.55, -46.63)
            .municipality("Riverside", "RJ", -22.90, -43.20)
            .archived_municipality("Oldtown", "SP")
            .category("Infrastructure")
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = crate::init_rocket(test_db.pool.clone(), AuthSettings::default()).await;
        let client = Client::untracked(rocket)
            .await
            .expect("valid rocket instance");

        (client, test_db)
    }

    /// Logs in through the API and returns the raw session token.
    pub async fn login_test_user(client: &Client, nickname: &str, password: &str) -> String {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "nickname": nickname, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        response
            .cookies()
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .expect("login did not set a session cookie")
    }

    pub fn session_cookie(token: &str) -> Cookie<'static> {
        Cookie::new(SESSION_COOKIE, token.to_string())
    }

    /// In-memory store that counts every call made to it.
    #[derive(Default)]
    pub struct MemorySessionStore {
        sessions: Mutex<HashMap<String, Session>>,
        calls: AtomicUsize,
    }

    impl MemorySessionStore {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn reset_calls(&self) {
            self.calls.store(0, Ordering::SeqCst);
        }

        pub fn backdate(&self, id: &str, by: chrono::Duration) {
            if let Some(session) = self.sessions.lock().unwrap().get_mut(id) {
                session.created_at -= by;
            }
        }
    }

    #[rocket::async_trait]
    impl SessionStore for MemorySessionStore {
        async fn create(&self, user_id: &str) -> Result<IssuedSession, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let issued = IssuedSession::generate(user_id);
            self.sessions
                .lock()
                .unwrap()
                .insert(issued.session.id.clone(), issued.session.clone());
            Ok(issued)
        }

        async fn find(&self, id: &str) -> Result<Session, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sessions
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or(AuthError::SessionNotFound)
        }

        async fn invalidate(&self, id: &str) -> Result<(), AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sessions.lock().unwrap().remove(id);
            Ok(())
        }
    }

    /// Store whose backend is always down.
    #[derive(Default)]
    pub struct FailingSessionStore {
        calls: AtomicUsize,
    }

    impl FailingSessionStore {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[rocket::async_trait]
    impl SessionStore for FailingSessionStore {
        async fn create(&self, _user_id: &str) -> Result<IssuedSession, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::StoreUnavailable(sqlx::Error::PoolClosed))
        }

        async fn find(&self, _id: &str) -> Result<Session, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::StoreUnavailable(sqlx::Error::PoolClosed))
        }

        async fn invalidate(&self, _id: &str) -> Result<(), AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::StoreUnavailable(sqlx::Error::PoolClosed))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::tokio;

    use crate::auth::{SessionStore, SessionToken, SessionValidator, SqliteSessionStore};
    use crate::error::AuthError;
    use crate::test::test_utils::{MemorySessionStore, TestDbBuilder};

    const LIFETIME_HOURS: i64 = 24;

    fn lifetime() -> Duration {
        Duration::hours(LIFETIME_HOURS)
    }

    /// Changes one hex digit of the secret.
    fn tamper(secret: &str) -> String {
        let mut chars: Vec<char> = secret.chars().collect();
        chars[0] = if chars[0] == '0' { '1' } else { '0' };
        chars.into_iter().collect()
    }

    #[tokio::test]
    async fn test_valid_token_returns_owner() {
        let store = MemorySessionStore::default();
        let validator = SessionValidator::new(&store, lifetime());

        for user in ["u1", "u2", "u3"] {
            let issued = store.create(user).await.unwrap();

            let validated = validator
                .validate(&issued.token().encode())
                .await
                .expect("Freshly issued token should validate");

            assert_eq!(validated.user_id, user);
            assert_eq!(validated.session_id, issued.session.id);
        }
    }

    #[tokio::test]
    async fn test_altered_secret_is_mismatch() {
        let store = MemorySessionStore::default();
        let validator = SessionValidator::new(&store, lifetime());

        let issued = store.create("u1").await.unwrap();
        let forged = SessionToken::new(issued.session.id.clone(), tamper(issued.secret()));

        let result = validator.validate(&forged.encode()).await;

        assert!(matches!(result, Err(AuthError::SecretMismatch)));
    }

    #[tokio::test]
    async fn test_deleted_session_is_not_found() {
        let store = MemorySessionStore::default();
        let validator = SessionValidator::new(&store, lifetime());

        let issued = store.create("u1").await.unwrap();
        store.invalidate(&issued.session.id).await.unwrap();

        let result = validator.validate(&issued.token().encode()).await;

        assert!(matches!(result, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_malformed_tokens_skip_the_store() {
        let store = MemorySessionStore::default();
        let validator = SessionValidator::new(&store, lifetime());

        let issued = store.create("u1").await.unwrap();
        let id = issued.session.id.clone();
        let secret = issued.secret().to_string();
        store.reset_calls();

        let malformed = [
            String::new(),
            ":".to_string(),
            id.clone(),
            format!("{}{}", id, secret),
            format!("{}:{}:{}", id, secret, secret),
            format!(":{}", secret),
            format!("{}:", id),
            format!("G{}:{}", &id[1..], secret),
            format!("{}:{}", id, &secret[..10]),
            format!("{}:{}", id, "z".repeat(secret.len())),
        ];

        for raw in &malformed {
            let result = validator.validate(raw).await;
            assert!(
                matches!(result, Err(AuthError::MalformedToken)),
                "Token {:?} should be malformed",
                raw
            );
        }

        assert_eq!(store.calls(), 0, "Malformed tokens must not reach the store");
    }

    #[tokio::test]
    async fn test_well_formed_token_hits_store_once() {
        let store = MemorySessionStore::default();
        let validator = SessionValidator::new(&store, lifetime());

        let issued = store.create("u1").await.unwrap();
        store.reset_calls();

        validator.validate(&issued.token().encode()).await.unwrap();

        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_without_writes() {
        let store = MemorySessionStore::default();
        let validator = SessionValidator::new(&store, lifetime());

        let issued = store.create("u1").await.unwrap();
        store.backdate(&issued.session.id, Duration::hours(LIFETIME_HOURS + 1));
        store.reset_calls();

        let result = validator.validate(&issued.token().encode()).await;

        assert!(matches!(result, Err(AuthError::SessionExpired)));
        assert!(result.unwrap_err().is_rejection());
        assert_eq!(store.calls(), 1, "Validation only reads");
        assert!(
            store.find(&issued.session.id).await.is_ok(),
            "Expired sessions are left for the cleanup task"
        );
    }

    #[tokio::test]
    async fn test_expired_session_with_wrong_secret_is_mismatch() {
        let store = MemorySessionStore::default();
        let validator = SessionValidator::new(&store, lifetime());

        let issued = store.create("u1").await.unwrap();
        store.backdate(&issued.session.id, Duration::hours(LIFETIME_HOURS + 1));

        let forged = SessionToken::new(issued.session.id.clone(), tamper(issued.secret()));
        let result = validator.validate(&forged.encode()).await;

        assert!(matches!(result, Err(AuthError::SecretMismatch)));
    }

    #[tokio::test]
    async fn test_login_validate_logout_scenario() {
        let test_db = TestDbBuilder::new()
            .user("u1")
            .build()
            .await
            .expect("Failed to build test database");
        let user_id = test_db.user_id("u1").unwrap();

        let store = SqliteSessionStore::new(test_db.pool.clone());
        let validator = SessionValidator::new(&store, lifetime());

        let issued = store.create(&user_id).await.unwrap();
        let raw = format!("{}:{}", issued.session.id, issued.secret());

        let validated = validator.validate(&raw).await.expect("Token should validate");
        assert_eq!(validated.user_id, user_id);

        store.invalidate(&issued.session.id).await.unwrap();

        let result = validator.validate(&raw).await;
        assert!(matches!(result, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_concurrent_creates_are_distinct_and_valid() {
        let test_db = TestDbBuilder::new()
            .user("u1")
            .build()
            .await
            .expect("Failed to build test database");
        let user_id = test_db.user_id("u1").unwrap();

        let store = SqliteSessionStore::new(test_db.pool.clone());
        let validator = SessionValidator::new(&store, lifetime());

        let (first, second) = tokio::join!(store.create(&user_id), store.create(&user_id));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_ne!(first.session.id, second.session.id);
        assert_ne!(first.secret(), second.secret());

        for issued in [&first, &second] {
            let validated = validator.validate(&issued.token().encode()).await.unwrap();
            assert_eq!(validated.user_id, user_id);
        }
    }

    #[tokio::test]
    async fn test_secret_of_one_session_does_not_open_another() {
        let store = MemorySessionStore::default();
        let validator = SessionValidator::new(&store, lifetime());

        let first = store.create("u1").await.unwrap();
        let second = store.create("u1").await.unwrap();

        let crossed = SessionToken::new(first.session.id.clone(), second.secret());
        let result = validator.validate(&crossed.encode()).await;

        assert!(matches!(result, Err(AuthError::SecretMismatch)));
    }
}

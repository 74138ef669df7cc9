//! Login orchestrator
//!
//! Composes the credential verifier, the session store and the token issuer:
//!
//! - `login`: validate input, verify credentials, rotate the session id,
//!   issue a token for it
//! - `profile`: resolve an authenticated session id back to its username
//!
//! A failed credential check returns before any session or token is written.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::db::repositories::{IdentityRepository, SessionRepository};
use crate::models::{Profile, Session};
use crate::services::credentials::CredentialVerifier;
use crate::services::token::{IssuedToken, TokenService};

/// Longest accepted username
pub const MAX_USERNAME_LEN: usize = 64;

/// Error types for authentication operations
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// Request input failed validation
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    /// Identity or session does not exist
    #[error("Not found")]
    NotFound,

    /// Credentials did not verify
    #[error("Unauthorized")]
    Unauthorized,

    /// Storage or other internal failure
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Input for login, also the `POST /login` JSON body
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Authentication service implementing the login and profile use cases
pub struct AuthService {
    verifier: CredentialVerifier,
    sessions: Arc<dyn SessionRepository>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        sessions: Arc<dyn SessionRepository>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            verifier: CredentialVerifier::new(identities),
            sessions,
            tokens,
        }
    }

    /// Log in and return a token bound to a freshly rotated session id.
    ///
    /// Every successful call replaces the identity's session id, so tokens
    /// from earlier logins stop resolving even before they expire.
    ///
    /// # Errors
    ///
    /// - `InputInvalid` if the username has the wrong shape
    /// - `NotFound` / `Unauthorized` if the credentials do not verify
    /// - `Storage` if the session cannot be written or the token minted
    pub async fn login(&self, input: LoginInput) -> Result<IssuedToken, AuthServiceError> {
        validate_username(&input.username)?;

        let identity = self.verifier.verify(&input.username, &input.password).await?;

        let session_id = Uuid::new_v4();
        self.sessions.upsert(identity.id, session_id).await?;

        let issued = self.tokens.issue(session_id)?;

        tracing::debug!(
            "Issued token for {} (session {}, expires {})",
            identity.username,
            session_id,
            issued.expires_at
        );
        Ok(issued)
    }

    /// Resolve the profile of the caller holding `session_id`.
    ///
    /// A session id replaced by a later login is `NotFound`.
    pub async fn profile(&self, session_id: Uuid) -> Result<Profile, AuthServiceError> {
        let username = self
            .sessions
            .username_by_session_id(session_id)
            .await?
            .ok_or(AuthServiceError::NotFound)?;

        Ok(Profile { username })
    }

    /// Current session of the identity with `username`.
    pub async fn session_for(&self, username: &str) -> Result<Session, AuthServiceError> {
        self.sessions
            .get_by_username(username)
            .await?
            .ok_or(AuthServiceError::NotFound)
    }
}

/// Check the basic shape of a username.
///
/// 1 to 64 characters drawn from ASCII letters, digits and `_ - . @`.
pub fn validate_username(username: &str) -> Result<(), AuthServiceError> {
    if username.is_empty() {
        return Err(AuthServiceError::InputInvalid(
            "Username is required".to_string(),
        ));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(AuthServiceError::InputInvalid(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
    {
        return Err(AuthServiceError::InputInvalid(
            "Username contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::db::repositories::{SqlxIdentityRepository, SqlxSessionRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::Identity;
    use crate::services::password::hash_password;
    use proptest::prelude::*;

    struct Fixture {
        service: AuthService,
        identities: Arc<dyn IdentityRepository>,
        sessions: Arc<dyn SessionRepository>,
        tokens: Arc<TokenService>,
    }

    async fn setup_test_service() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let identities = SqlxIdentityRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool);
        let tokens = Arc::new(TokenService::new(&AuthConfig::default()).unwrap());

        let service = AuthService::new(identities.clone(), sessions.clone(), tokens.clone());
        Fixture {
            service,
            identities,
            sessions,
            tokens,
        }
    }

    fn login_input(username: &str, password: &str) -> LoginInput {
        LoginInput {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    async fn create_identity(fixture: &Fixture, username: &str, password: &str) -> Identity {
        fixture
            .identities
            .create(&Identity::new(username, hash_password(password).unwrap()))
            .await
            .expect("Failed to create identity")
    }

    #[test]
    fn test_login_input_from_json_body() {
        let input: LoginInput =
            serde_json::from_str(r#"{"username":"alice","password":"wonderland"}"#).unwrap();
        assert_eq!(input.username, "alice");
        assert_eq!(input.password, "wonderland");

        assert!(serde_json::from_str::<LoginInput>(r#"{"username":"alice"}"#).is_err());
    }

    #[tokio::test]
    async fn test_login_issues_token_for_stored_session() {
        let fixture = setup_test_service().await;
        let alice = create_identity(&fixture, "alice", "wonderland").await;

        let issued = fixture
            .service
            .login(login_input("alice", "wonderland"))
            .await
            .expect("Login should succeed");

        let sid = fixture.tokens.validate(&issued.token).unwrap();
        let session = fixture.sessions.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(session.identity_id, alice.id);
        assert_eq!(session.session_id, sid);
    }

    #[tokio::test]
    async fn test_login_rotates_session_id() {
        let fixture = setup_test_service().await;
        create_identity(&fixture, "alice", "wonderland").await;

        let first = fixture
            .service
            .login(login_input("alice", "wonderland"))
            .await
            .unwrap();
        let second = fixture
            .service
            .login(login_input("alice", "wonderland"))
            .await
            .unwrap();

        assert_ne!(first.token, second.token);

        let s1 = fixture.tokens.validate(&first.token).unwrap();
        let s2 = fixture.tokens.validate(&second.token).unwrap();
        assert_ne!(s1, s2);

        assert!(matches!(
            fixture.service.profile(s1).await,
            Err(AuthServiceError::NotFound)
        ));
        assert_eq!(fixture.service.profile(s2).await.unwrap().username, "alice");
        assert_eq!(fixture.service.session_for("alice").await.unwrap().session_id, s2);
    }

    #[tokio::test]
    async fn test_login_wrong_password_writes_no_session() {
        let fixture = setup_test_service().await;
        create_identity(&fixture, "alice", "wonderland").await;

        let result = fixture
            .service
            .login(login_input("alice", "wrong"))
            .await;

        assert!(matches!(result, Err(AuthServiceError::Unauthorized)));
        assert!(fixture.sessions.get_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_existing_session() {
        let fixture = setup_test_service().await;
        create_identity(&fixture, "alice", "wonderland").await;

        let issued = fixture
            .service
            .login(login_input("alice", "wonderland"))
            .await
            .unwrap();
        let sid = fixture.tokens.validate(&issued.token).unwrap();

        let _ = fixture.service.login(login_input("alice", "wrong")).await;

        assert_eq!(fixture.service.profile(sid).await.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_login_unknown_user_is_not_found() {
        let fixture = setup_test_service().await;

        let result = fixture
            .service
            .login(login_input("nobody", "secret"))
            .await;
        assert!(matches!(result, Err(AuthServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_username_shape() {
        let fixture = setup_test_service().await;

        let result = fixture
            .service
            .login(login_input("alice; DROP TABLE sessions", "x"))
            .await;
        assert!(matches!(result, Err(AuthServiceError::InputInvalid(_))));
    }

    #[tokio::test]
    async fn test_session_for_without_login_is_not_found() {
        let fixture = setup_test_service().await;
        create_identity(&fixture, "bob", "builder").await;

        assert!(matches!(
            fixture.service.session_for("bob").await,
            Err(AuthServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_profile_unknown_session_is_not_found() {
        let fixture = setup_test_service().await;

        let result = fixture.service.profile(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AuthServiceError::NotFound)));
    }

    #[test]
    fn test_validate_username_edges() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a.b-c_d@example.com").is_ok());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LEN)).is_ok());

        assert!(validate_username("").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LEN + 1)).is_err());
        assert!(validate_username("with space").is_err());
        assert!(validate_username("ünïcode").is_err());
    }

    proptest! {
        #[test]
        fn username_shape_accepts_allowed_charset(name in "[A-Za-z0-9_.@-]{1,64}") {
            prop_assert!(validate_username(&name).is_ok());
        }

        #[test]
        fn username_shape_rejects_forbidden_chars(
            prefix in "[a-z]{0,10}",
            bad in "[ /;'\"<>#%]",
            suffix in "[a-z]{0,10}",
        ) {
            let name = format!("{}{}{}", prefix, bad, suffix);
            prop_assert!(validate_username(&name).is_err());
        }
    }
}

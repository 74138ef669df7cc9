//! Credential verifier
//!
//! Checks a username/password pair against the stored argon2 hash. Read-only:
//! verification never creates or touches a session.

use std::sync::Arc;

use crate::db::repositories::IdentityRepository;
use crate::models::Identity;
use crate::services::auth::AuthServiceError;
use crate::services::password::verify_password;

/// Verifies submitted credentials against stored identities
pub struct CredentialVerifier {
    identities: Arc<dyn IdentityRepository>,
}

impl CredentialVerifier {
    pub fn new(identities: Arc<dyn IdentityRepository>) -> Self {
        Self { identities }
    }

    /// Verify `password` for `username`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no identity has this username
    /// - `Unauthorized` if the password does not match
    /// - `Storage` if the lookup fails or the stored hash is unreadable
    pub async fn verify(&self, username: &str, password: &str) -> Result<Identity, AuthServiceError> {
        let identity = self
            .identities
            .get_by_username(username)
            .await?
            .ok_or(AuthServiceError::NotFound)?;

        if !verify_password(password, &identity.password_hash)? {
            return Err(AuthServiceError::Unauthorized);
        }

        Ok(identity)
    }
}

//! Identity model
//!
//! A registered account: a stable UUID bound to a username and a password
//! hash. Identities are created at registration time and never mutated here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity entity representing a registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Stable unique identifier
    pub id: Uuid,
    /// Username (unique)
    pub username: String,
    /// Password hash (argon2, PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new identity with a freshly generated id.
    ///
    /// The password must already be hashed, see
    /// `services::password::hash_password()`.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }
}

//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The currently active login session of one identity.
///
/// There is at most one row per `identity_id`; `session_id` is replaced on
/// every successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Owning identity
    pub identity_id: Uuid,
    /// Identifier embedded in issued tokens
    pub session_id: Uuid,
    /// When `session_id` was last written
    pub updated_at: DateTime<Utc>,
}

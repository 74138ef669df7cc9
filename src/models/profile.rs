//! Profile view

use serde::{Deserialize, Serialize};

/// Read-only projection returned to an authenticated caller.
///
/// Resolved per request as `session_id -> identity -> username`; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
}

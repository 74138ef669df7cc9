//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a specific entity.

pub mod identity;
pub mod session;

pub use identity::{IdentityRepository, SqlxIdentityRepository};
pub use session::{SessionRepository, SqlxSessionRepository};

use anyhow::{Context, Result};
use uuid::Uuid;

/// Parse an identifier column written as a canonical UUID string
pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Corrupt UUID in column '{}'", column))
}

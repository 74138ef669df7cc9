//! Data models
//!
//! Models represent:
//! - Database entities (Identity, Session)
//! - Views computed per request (Profile)

mod identity;
mod profile;
mod session;

pub use identity::Identity;
pub use profile::Profile;
pub use session::Session;

//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Verifying credentials
//! - Minting and validating tokens
//! - Orchestrating login and profile lookups over the repositories

pub mod auth;
pub mod credentials;
pub mod password;
pub mod token;

pub use auth::{validate_username, AuthService, AuthServiceError, LoginInput};
pub use credentials::CredentialVerifier;
pub use password::{hash_password, verify_password};
pub use token::{IssuedToken, TokenError, TokenService};

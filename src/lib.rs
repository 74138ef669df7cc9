//! sessiongate - Session and token authentication service
//!
//! Password login, signed session tokens, and a database-backed mapping from
//! each identity to its single active session.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;

//! Identity repository
//!
//! Read access to registered identities, used by the credential verifier.
//! `create` exists for seeding and tests; registration itself is handled
//! elsewhere.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::repositories::parse_uuid;
use crate::db::DynDatabasePool;
use crate::models::Identity;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Identity repository trait
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Insert a new identity
    async fn create(&self, identity: &Identity) -> Result<Identity>;

    /// Get identity by username
    async fn get_by_username(&self, username: &str) -> Result<Option<Identity>>;
}

/// SQLx-based identity repository implementation
pub struct SqlxIdentityRepository {
    pool: DynDatabasePool,
}

impl SqlxIdentityRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn IdentityRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl IdentityRepository for SqlxIdentityRepository {
    async fn create(&self, identity: &Identity) -> Result<Identity> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_identity_sqlite(sqlite(&self.pool)?, identity).await,
            DatabaseDriver::Mysql => create_identity_mysql(mysql(&self.pool)?, identity).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Identity>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_identity_by_username_sqlite(sqlite(&self.pool)?, username).await
            }
            DatabaseDriver::Mysql => {
                get_identity_by_username_mysql(mysql(&self.pool)?, username).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_identity_sqlite(pool: &SqlitePool, identity: &Identity) -> Result<Identity> {
    sqlx::query(
        r#"
        INSERT INTO identities (id, username, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(identity.id.to_string())
    .bind(&identity.username)
    .bind(&identity.password_hash)
    .bind(identity.created_at)
    .execute(pool)
    .await
    .context("Failed to create identity")?;

    Ok(identity.clone())
}

async fn get_identity_by_username_sqlite(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Identity>> {
    let row = sqlx::query(
        r#"
        SELECT id, username, password_hash, created_at
        FROM identities
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .context("Failed to get identity by username")?;

    row.as_ref().map(row_to_identity_sqlite).transpose()
}

fn row_to_identity_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Identity> {
    let id: String = row.try_get("id")?;
    Ok(Identity {
        id: parse_uuid(&id, "identities.id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_identity_mysql(pool: &MySqlPool, identity: &Identity) -> Result<Identity> {
    sqlx::query(
        r#"
        INSERT INTO identities (id, username, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(identity.id.to_string())
    .bind(&identity.username)
    .bind(&identity.password_hash)
    .bind(identity.created_at)
    .execute(pool)
    .await
    .context("Failed to create identity")?;

    Ok(identity.clone())
}

async fn get_identity_by_username_mysql(
    pool: &MySqlPool,
    username: &str,
) -> Result<Option<Identity>> {
    let row = sqlx::query(
        r#"
        SELECT id, username, password_hash, created_at
        FROM identities
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .context("Failed to get identity by username")?;

    row.as_ref().map(row_to_identity_mysql).transpose()
}

fn row_to_identity_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Identity> {
    let id: String = row.try_get("id")?;
    Ok(Identity {
        id: parse_uuid(&id, "identities.id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

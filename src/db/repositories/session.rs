//! Session repository
//!
//! Persists the single active session of each identity.
//!
//! This module provides:
//! - `SessionRepository` trait defining the interface for session data access
//! - `SqlxSessionRepository` implementing the trait for SQLite and MySQL
//!
//! `upsert` is one statement keyed on the `sessions.identity_id` primary key
//! (`ON CONFLICT` on SQLite, `ON DUPLICATE KEY` on MySQL). There is never a
//! separate existence read, so concurrent logins for one identity cannot
//! create a second row or observe a half-written one. The last writer wins.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::repositories::parse_uuid;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Session repository trait
///
/// Lookups return `Ok(None)` when no matching session exists.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create the identity's session, or replace its `session_id`
    async fn upsert(&self, identity_id: Uuid, session_id: Uuid) -> Result<Session>;

    /// Get the session of the identity with the given username
    async fn get_by_username(&self, username: &str) -> Result<Option<Session>>;

    /// Resolve the username owning the given (current) session id
    async fn username_by_session_id(&self, session_id: Uuid) -> Result<Option<String>>;
}

/// SQLx-based session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn upsert(&self, identity_id: Uuid, session_id: Uuid) -> Result<Session> {
        let session = Session {
            identity_id,
            session_id,
            updated_at: Utc::now(),
        };

        match self.pool.driver() {
            DatabaseDriver::Sqlite => upsert_session_sqlite(sqlite(&self.pool)?, &session).await?,
            DatabaseDriver::Mysql => upsert_session_mysql(mysql(&self.pool)?, &session).await?,
        }

        tracing::debug!("Session {} stored for identity {}", session_id, identity_id);
        Ok(session)
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_session_by_username_sqlite(sqlite(&self.pool)?, username).await
            }
            DatabaseDriver::Mysql => {
                get_session_by_username_mysql(mysql(&self.pool)?, username).await
            }
        }
    }

    async fn username_by_session_id(&self, session_id: Uuid) -> Result<Option<String>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                username_by_session_id_sqlite(sqlite(&self.pool)?, session_id).await
            }
            DatabaseDriver::Mysql => {
                username_by_session_id_mysql(mysql(&self.pool)?, session_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn upsert_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (identity_id, session_id, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT (identity_id) DO UPDATE SET
            session_id = excluded.session_id,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(session.identity_id.to_string())
    .bind(session.session_id.to_string())
    .bind(session.updated_at)
    .execute(pool)
    .await
    .context("Failed to upsert session")?;

    Ok(())
}

async fn get_session_by_username_sqlite(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT s.identity_id, s.session_id, s.updated_at
        FROM sessions s
        JOIN identities i ON s.identity_id = i.id
        WHERE i.username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by username")?;

    row.as_ref().map(row_to_session_sqlite).transpose()
}

async fn username_by_session_id_sqlite(
    pool: &SqlitePool,
    session_id: Uuid,
) -> Result<Option<String>> {
    let row = sqlx::query(
        r#"
        SELECT i.username
        FROM sessions s
        JOIN identities i ON s.identity_id = i.id
        WHERE s.session_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to get username by session ID")?;

    row.map(|row| row.try_get("username").map_err(Into::into))
        .transpose()
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    let identity_id: String = row.try_get("identity_id")?;
    let session_id: String = row.try_get("session_id")?;
    Ok(Session {
        identity_id: parse_uuid(&identity_id, "sessions.identity_id")?,
        session_id: parse_uuid(&session_id, "sessions.session_id")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn upsert_session_mysql(pool: &MySqlPool, session: &Session) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (identity_id, session_id, updated_at)
        VALUES (?, ?, ?)
        ON DUPLICATE KEY UPDATE
            session_id = VALUES(session_id),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(session.identity_id.to_string())
    .bind(session.session_id.to_string())
    .bind(session.updated_at)
    .execute(pool)
    .await
    .context("Failed to upsert session")?;

    Ok(())
}

async fn get_session_by_username_mysql(
    pool: &MySqlPool,
    username: &str,
) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT s.identity_id, s.session_id, s.updated_at
        FROM sessions s
        JOIN identities i ON s.identity_id = i.id
        WHERE i.username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by username")?;

    row.as_ref().map(row_to_session_mysql).transpose()
}

async fn username_by_session_id_mysql(
    pool: &MySqlPool,
    session_id: Uuid,
) -> Result<Option<String>> {
    let row = sqlx::query(
        r#"
        SELECT i.username
        FROM sessions s
        JOIN identities i ON s.identity_id = i.id
        WHERE s.session_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to get username by session ID")?;

    row.map(|row| row.try_get("username").map_err(Into::into))
        .transpose()
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Session> {
    let identity_id: String = row.try_get("identity_id")?;
    let session_id: String = row.try_get("session_id")?;
    Ok(Session {
        identity_id: parse_uuid(&identity_id, "sessions.identity_id")?,
        session_id: parse_uuid(&session_id, "sessions.session_id")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::repositories::{IdentityRepository, SqlxIdentityRepository};
    use crate::db::{create_pool, create_test_pool, migrations};
    use crate::models::Identity;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxSessionRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxSessionRepository::new(pool.clone());
        (pool, repo)
    }

    // Helper to create an identity for the foreign key constraint
    async fn create_test_identity(pool: &DynDatabasePool, username: &str) -> Identity {
        SqlxIdentityRepository::new(pool.clone())
            .create(&Identity::new(username, "hash"))
            .await
            .expect("Failed to create test identity")
    }

    async fn count_sessions(pool: &DynDatabasePool, identity_id: Uuid) -> i64 {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sessions WHERE identity_id = ?")
            .bind(identity_id.to_string())
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to count sessions");
        row.get("n")
    }

    #[tokio::test]
    async fn test_upsert_creates_session() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_identity(&pool, "alice").await;

        let sid = Uuid::new_v4();
        let session = repo.upsert(alice.id, sid).await.expect("Failed to upsert");

        assert_eq!(session.identity_id, alice.id);
        assert_eq!(session.session_id, sid);

        let stored = repo
            .get_by_username("alice")
            .await
            .unwrap()
            .expect("Session not stored");
        assert_eq!(stored.session_id, sid);
    }

    #[tokio::test]
    async fn test_upsert_replaces_session_id() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_identity(&pool, "alice").await;

        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        repo.upsert(alice.id, s1).await.unwrap();
        repo.upsert(alice.id, s2).await.unwrap();

        assert_eq!(count_sessions(&pool, alice.id).await, 1);

        let stored = repo.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(stored.session_id, s2);

        // The replaced id no longer resolves
        assert!(repo.username_by_session_id(s1).await.unwrap().is_none());
        assert_eq!(
            repo.username_by_session_id(s2).await.unwrap().as_deref(),
            Some("alice")
        );
    }

    #[tokio::test]
    async fn test_upsert_same_session_id_is_idempotent() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_identity(&pool, "alice").await;

        let sid = Uuid::new_v4();
        repo.upsert(alice.id, sid).await.unwrap();
        repo.upsert(alice.id, sid).await.unwrap();

        assert_eq!(count_sessions(&pool, alice.id).await, 1);
        assert_eq!(
            repo.username_by_session_id(sid).await.unwrap().as_deref(),
            Some("alice")
        );
    }

    #[tokio::test]
    async fn test_upsert_unknown_identity_fails() {
        let (_pool, repo) = setup_test_repo().await;

        let result = repo.upsert(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(result.is_err(), "orphan session must surface as a storage error");
    }

    #[tokio::test]
    async fn test_get_by_username() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_identity(&pool, "alice").await;

        assert!(repo.get_by_username("alice").await.unwrap().is_none());

        let sid = Uuid::new_v4();
        repo.upsert(alice.id, sid).await.unwrap();

        let session = repo
            .get_by_username("alice")
            .await
            .unwrap()
            .expect("Session not found");
        assert_eq!(session.identity_id, alice.id);
        assert_eq!(session.session_id, sid);

        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_username_by_session_id_not_found() {
        let (_pool, repo) = setup_test_repo().await;

        let found = repo
            .username_by_session_id(Uuid::new_v4())
            .await
            .expect("Lookup should not error");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_sessions_of_different_identities_are_independent() {
        let (pool, repo) = setup_test_repo().await;
        let alice = create_test_identity(&pool, "alice").await;
        let bob = create_test_identity(&pool, "bob").await;

        let sa = Uuid::new_v4();
        let sb = Uuid::new_v4();
        repo.upsert(alice.id, sa).await.unwrap();
        repo.upsert(bob.id, sb).await.unwrap();
        repo.upsert(alice.id, Uuid::new_v4()).await.unwrap();

        assert_eq!(
            repo.username_by_session_id(sb).await.unwrap().as_deref(),
            Some("bob")
        );
        assert!(repo.username_by_session_id(sa).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_leave_single_row() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = DatabaseConfig {
            url: temp_dir.path().join("sessions.db").to_string_lossy().to_string(),
            max_connections: 8,
            ..DatabaseConfig::default()
        };
        let pool = create_pool(&config).await.expect("Failed to create pool");
        migrations::run_migrations(&pool).await.unwrap();

        let alice = create_test_identity(&pool, "alice").await;
        let repo = SqlxSessionRepository::boxed(pool.clone());

        let submitted: Vec<Uuid> = (0..16).map(|_| Uuid::new_v4()).collect();
        let mut tasks = tokio::task::JoinSet::new();
        for sid in submitted.clone() {
            let repo = repo.clone();
            let identity_id = alice.id;
            tasks.spawn(async move { repo.upsert(identity_id, sid).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.expect("task panicked").expect("upsert failed");
        }

        assert_eq!(count_sessions(&pool, alice.id).await, 1);

        let stored = repo.get_by_username("alice").await.unwrap().unwrap();
        assert!(submitted.contains(&stored.session_id));

        // Exactly one submitted id still resolves
        let mut resolving = 0;
        for sid in &submitted {
            if repo.username_by_session_id(*sid).await.unwrap().is_some() {
                resolving += 1;
            }
        }
        assert_eq!(resolving, 1);
    }

    #[tokio::test]
    #[ignore = "Requires MySQL server"]
    async fn test_mysql_upsert_replaces_session_id() {
        let url = std::env::var("MYSQL_TEST_URL")
            .unwrap_or_else(|_| "mysql://root@localhost/test".to_string());
        let config = DatabaseConfig {
            driver: crate::config::DatabaseDriver::Mysql,
            url,
            ..DatabaseConfig::default()
        };
        let pool = create_pool(&config).await.expect("Failed to create pool");
        migrations::run_migrations(&pool).await.unwrap();

        let username = format!("mysql_{}", Uuid::new_v4().simple());
        let identity = SqlxIdentityRepository::new(pool.clone())
            .create(&Identity::new(username.clone(), "hash"))
            .await
            .unwrap();
        let repo = SqlxSessionRepository::new(pool.clone());

        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        repo.upsert(identity.id, s1).await.unwrap();
        repo.upsert(identity.id, s2).await.unwrap();

        assert!(repo.username_by_session_id(s1).await.unwrap().is_none());
        assert_eq!(repo.username_by_session_id(s2).await.unwrap(), Some(username));
    }
}

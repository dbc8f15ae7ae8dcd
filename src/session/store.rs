/// Session Store
///
/// Persistence contract for identity lookup and the single
/// currently-valid refresh token per identity. Token writes are narrow
/// single-field operations: they must not touch or re-validate any
/// other part of the identity record.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// A registered principal.
///
/// `current_refresh_token` is the only field this core ever mutates:
/// set at login, overwritten on rotation, cleared on logout. At most
/// one refresh token is valid per identity at any time.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub current_refresh_token: Option<String>,
}

/// Read access to identity records, owned by the external
/// user-management collaborator.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Username-or-email lookup.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Identity>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError>;
}

/// The refresh-token persistence contract.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Unconditional overwrite of the stored token.
    async fn set_refresh_token(&self, identity_id: Uuid, token: &str) -> Result<(), AppError>;

    async fn get_refresh_token(&self, identity_id: Uuid) -> Result<Option<String>, AppError>;

    /// Sets the stored token to null. Idempotent.
    async fn clear_refresh_token(&self, identity_id: Uuid) -> Result<(), AppError>;

    /// Atomically replaces the stored token with `new` only if the
    /// current value equals `expected`. Returns whether the swap
    /// happened. This is the per-identity critical section for
    /// rotation: two racers presenting the same token cannot both win.
    async fn swap_refresh_token(
        &self,
        identity_id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError>;
}

/// Postgres-backed store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type IdentityRow = (Uuid, String, String, String, Option<String>);

fn row_to_identity(row: IdentityRow) -> Identity {
    Identity {
        id: row.0,
        username: row.1,
        email: row.2,
        password_hash: row.3,
        current_refresh_token: row.4,
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, username, email, password_hash, current_refresh_token
            FROM users
            WHERE username = $1 OR email = $1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_identity))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, username, email, password_hash, current_refresh_token
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_identity))
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn set_refresh_token(&self, identity_id: Uuid, token: &str) -> Result<(), AppError> {
        // Single-column write: the rest of the record is not read,
        // touched, or re-validated.
        sqlx::query("UPDATE users SET current_refresh_token = $2 WHERE id = $1")
            .bind(identity_id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_refresh_token(&self, identity_id: Uuid) -> Result<Option<String>, AppError> {
        let row = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT current_refresh_token FROM users WHERE id = $1",
        )
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(token,)| token))
    }

    async fn clear_refresh_token(&self, identity_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET current_refresh_token = NULL WHERE id = $1")
            .bind(identity_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        identity_id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError> {
        // The row predicate makes the compare-and-swap atomic; a
        // concurrent rotation that already landed leaves zero rows to
        // update.
        let result = sqlx::query(
            "UPDATE users SET current_refresh_token = $3 WHERE id = $1 AND current_refresh_token = $2",
        )
        .bind(identity_id)
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// In-memory store used by the test suites. The map mutex serializes
/// every token operation, which makes the swap atomic.
#[derive(Default)]
pub struct MemoryStore {
    identities: Mutex<HashMap<Uuid, Identity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_identity(&self, identity: Identity) {
        if let Ok(mut map) = self.identities.lock() {
            map.insert(identity.id, identity);
        }
    }

    fn with_map<T>(
        &self,
        f: impl FnOnce(&mut HashMap<Uuid, Identity>) -> T,
    ) -> Result<T, AppError> {
        let mut map = self
            .identities
            .lock()
            .map_err(|_| AppError::Internal("identity map lock poisoned".to_string()))?;
        Ok(f(&mut map))
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Identity>, AppError> {
        self.with_map(|map| {
            map.values()
                .find(|i| i.username == identifier || i.email == identifier)
                .cloned()
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        self.with_map(|map| map.get(&id).cloned())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn set_refresh_token(&self, identity_id: Uuid, token: &str) -> Result<(), AppError> {
        self.with_map(|map| {
            if let Some(identity) = map.get_mut(&identity_id) {
                identity.current_refresh_token = Some(token.to_string());
            }
        })
    }

    async fn get_refresh_token(&self, identity_id: Uuid) -> Result<Option<String>, AppError> {
        self.with_map(|map| {
            map.get(&identity_id)
                .and_then(|i| i.current_refresh_token.clone())
        })
    }

    async fn clear_refresh_token(&self, identity_id: Uuid) -> Result<(), AppError> {
        self.with_map(|map| {
            if let Some(identity) = map.get_mut(&identity_id) {
                identity.current_refresh_token = None;
            }
        })
    }

    async fn swap_refresh_token(
        &self,
        identity_id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError> {
        self.with_map(|map| match map.get_mut(&identity_id) {
            Some(identity) if identity.current_refresh_token.as_deref() == Some(expected) => {
                identity.current_refresh_token = Some(new.to_string());
                true
            }
            _ => false,
        })
    }
}

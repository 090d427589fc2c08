use async_trait::async_trait;
use busline_core::identity::CustomerDirectory;
use busline_core::places::PlaceRegistry;
use busline_core::{CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db_err;

pub struct PgPlaceRegistry {
    pool: PgPool,
}

impl PgPlaceRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaceRegistry for PgPlaceRegistry {
    async fn place_exists(&self, name: &str) -> CoreResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM places WHERE LOWER(name) = LOWER($1))")
            .bind(name.trim())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}

/// Customers keyed by the identity provider's subject.
pub struct PgCustomerDirectory {
    pool: PgPool,
}

impl PgCustomerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerDirectory for PgCustomerDirectory {
    async fn resolve_customer(&self, external_user_id: &str) -> CoreResult<Uuid> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM customers WHERE external_id = $1")
            .bind(external_user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        id.ok_or_else(|| CoreError::NotFound(format!("customer for user {}", external_user_id)))
    }
}

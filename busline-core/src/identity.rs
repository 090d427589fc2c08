use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Maps the identity provider's user id onto the internal customer id.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn resolve_customer(&self, external_user_id: &str) -> CoreResult<Uuid>;
}

/// Fixed lookup table, for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct StaticCustomerDirectory {
    customers: HashMap<String, Uuid>,
}

impl StaticCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer(mut self, external_user_id: impl Into<String>, customer_id: Uuid) -> Self {
        self.customers.insert(external_user_id.into(), customer_id);
        self
    }
}

#[async_trait]
impl CustomerDirectory for StaticCustomerDirectory {
    async fn resolve_customer(&self, external_user_id: &str) -> CoreResult<Uuid> {
        tracing::debug!("Resolving customer for external id {}", external_user_id);
        self.customers
            .get(external_user_id)
            .copied()
            .ok_or_else(|| CoreError::NotFound(format!("customer for user {}", external_user_id)))
    }
}

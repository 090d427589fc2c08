use async_trait::async_trait;
use std::collections::HashSet;

use crate::CoreResult;

#[async_trait]
pub trait PlaceRegistry: Send + Sync {
    async fn place_exists(&self, name: &str) -> CoreResult<bool>;
}

/// Case-insensitive in-memory place list.
#[derive(Debug, Default, Clone)]
pub struct StaticPlaceRegistry {
    places: HashSet<String>,
}

impl StaticPlaceRegistry {
    pub fn new<I, S>(places: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            places: places.into_iter().map(|p| p.as_ref().trim().to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl PlaceRegistry for StaticPlaceRegistry {
    async fn place_exists(&self, name: &str) -> CoreResult<bool> {
        Ok(self.places.contains(&name.trim().to_lowercase()))
    }
}

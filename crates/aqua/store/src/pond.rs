//! Pond registry and id resolution.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use aqua_types::{Pond, PondId};

use crate::error::Result;

/// Lookup of the pond aggregate root.
#[async_trait]
pub trait PondDirectory: Send + Sync {
    async fn get(&self, pond_id: &PondId) -> Result<Option<Pond>>;

    /// Insert or replace a pond.
    async fn upsert(&self, pond: Pond) -> Result<()>;

    /// All known ponds, ordered by id.
    async fn list(&self) -> Result<Vec<Pond>>;
}

/// In-memory pond directory.
#[derive(Default)]
pub struct InMemoryPondDirectory {
    ponds: Arc<DashMap<PondId, Pond>>,
}

impl InMemoryPondDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PondDirectory for InMemoryPondDirectory {
    async fn get(&self, pond_id: &PondId) -> Result<Option<Pond>> {
        Ok(self.ponds.get(pond_id).map(|p| p.clone()))
    }

    async fn upsert(&self, pond: Pond) -> Result<()> {
        self.ponds.insert(pond.id.clone(), pond);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Pond>> {
        let mut ponds: Vec<Pond> = self.ponds.iter().map(|p| p.value().clone()).collect();
        ponds.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(ponds)
    }
}

/// Maps whatever id a viewer holds to the canonical shared pond id.
///
/// Owners, administrators and attached consumers must all land on the same
/// id so they read and write one set of documents.
#[async_trait]
pub trait PondResolver: Send + Sync {
    async fn resolve(&self, viewer_pond_id: &str) -> Result<PondId>;
}

/// Resolver for deployments where viewer ids already are canonical.
#[derive(Debug, Default, Clone)]
pub struct PassthroughResolver;

#[async_trait]
impl PondResolver for PassthroughResolver {
    async fn resolve(&self, viewer_pond_id: &str) -> Result<PondId> {
        Ok(PondId::new(viewer_pond_id))
    }
}

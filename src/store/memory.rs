//! In-process backing store
//!
//! A `MemoryCluster` plays the database server: a set of database names and
//! a table of advisory locks. Each `MemoryStore` is one session on it, so
//! several caches built on sessions of the same cluster contend for locks
//! exactly like separate connections to one PostgreSQL server.

use crate::error::{StencilError, StencilResult};
use crate::pattern::Wildcard;
use crate::store::{ListOrder, TemplateStore};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct ClusterState {
    databases: BTreeSet<String>,
    locks: HashMap<i64, Arc<AsyncMutex<()>>>,
}

/// Shared in-memory database server
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session on this cluster
    pub fn session(&self) -> MemoryStore {
        MemoryStore {
            cluster: self.clone(),
            held: HashMap::new(),
        }
    }

    /// Create an empty database directly, as an external builder would
    pub fn create_database(&self, name: &str) -> StencilResult<()> {
        let mut state = self.state();
        if !state.databases.insert(name.to_string()) {
            return Err(StencilError::DatabaseExists(name.to_string()));
        }
        Ok(())
    }

    /// Check whether a database exists
    pub fn contains(&self, name: &str) -> bool {
        self.state().databases.contains(name)
    }

    /// All database names, ascending
    pub fn databases(&self) -> Vec<String> {
        self.state().databases.iter().cloned().collect()
    }

    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_handle(&self, id: i64) -> Arc<AsyncMutex<()>> {
        self.state().locks.entry(id).or_default().clone()
    }

    /// Release a held lock, forgetting its entry once nobody holds or awaits it
    fn release_lock(&self, id: i64, guard: OwnedMutexGuard<()>) {
        let mut state = self.state();
        drop(guard);
        let idle = state
            .locks
            .get(&id)
            .is_some_and(|handle| Arc::strong_count(handle) == 1);
        if idle {
            state.locks.remove(&id);
        }
    }
}

/// One session on a [`MemoryCluster`]
pub struct MemoryStore {
    cluster: MemoryCluster,
    /// Advisory locks held by this session, with their re-entry count
    held: HashMap<i64, (OwnedMutexGuard<()>, usize)>,
}

impl MemoryStore {
    /// The cluster this session belongs to
    pub fn cluster(&self) -> &MemoryCluster {
        &self.cluster
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn create_database_from_template(
        &mut self,
        name: &str,
        template: &str,
    ) -> StencilResult<()> {
        debug!("Creating database {} from {}", name, template);
        let mut state = self.cluster.state();
        if !state.databases.contains(template) {
            return Err(StencilError::DatabaseNotFound(template.to_string()));
        }
        if !state.databases.insert(name.to_string()) {
            return Err(StencilError::DatabaseExists(name.to_string()));
        }
        Ok(())
    }

    async fn rename_database(&mut self, from: &str, to: &str) -> StencilResult<()> {
        debug!("Renaming database {} to {}", from, to);
        let mut state = self.cluster.state();
        if state.databases.contains(to) {
            return Err(StencilError::DatabaseExists(to.to_string()));
        }
        if !state.databases.remove(from) {
            return Err(StencilError::DatabaseNotFound(from.to_string()));
        }
        state.databases.insert(to.to_string());
        Ok(())
    }

    async fn drop_database(&mut self, name: &str) -> StencilResult<()> {
        debug!("Dropping database {}", name);
        if !self.cluster.state().databases.remove(name) {
            return Err(StencilError::DatabaseNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn list_databases_matching(
        &mut self,
        pattern: &str,
        order: ListOrder,
    ) -> StencilResult<Vec<String>> {
        let pattern = Wildcard::like(pattern);
        let state = self.cluster.state();
        let matching = state.databases.iter().filter(|name| pattern.matches(name));
        let names = match order {
            ListOrder::Ascending => matching.cloned().collect(),
            ListOrder::Descending => matching.rev().cloned().collect(),
        };
        Ok(names)
    }

    async fn count_databases_matching(&mut self, pattern: &str) -> StencilResult<u64> {
        let pattern = Wildcard::like(pattern);
        let state = self.cluster.state();
        Ok(state.databases.iter().filter(|name| pattern.matches(name)).count() as u64)
    }

    async fn advisory_lock(&mut self, id: i64) -> StencilResult<()> {
        if let Some((_, count)) = self.held.get_mut(&id) {
            *count += 1;
            return Ok(());
        }

        let handle = self.cluster.lock_handle(id);
        let guard = handle.lock_owned().await;
        self.held.insert(id, (guard, 1));
        Ok(())
    }

    async fn advisory_unlock(&mut self, id: i64) -> StencilResult<()> {
        let remaining = match self.held.get_mut(&id) {
            Some((_, count)) => {
                *count -= 1;
                *count
            }
            None => return Err(StencilError::LockNotHeld(id)),
        };
        if remaining == 0 {
            // Dropping the guard wakes the next waiting session
            if let Some((guard, _)) = self.held.remove(&id) {
                self.cluster.release_lock(id, guard);
            }
        }
        Ok(())
    }

    async fn close(self) -> StencilResult<()> {
        debug!("Closing session holding {} advisory lock(s)", self.held.len());
        for (id, (guard, _)) in self.held {
            self.cluster.release_lock(id, guard);
        }
        Ok(())
    }
}

//! Backing store abstraction
//!
//! The template cache only needs a handful of primitives from the database
//! server: cloning a database from a template, renaming and dropping
//! databases, listing names by `LIKE` pattern, and session-scoped advisory
//! locks. Implementations:
//! - PostgreSQL: one dedicated session on the maintenance database
//! - Memory: an in-process cluster, for tests and embedding

mod memory;
mod postgres;

pub use memory::{MemoryCluster, MemoryStore};
pub use postgres::{execute_in_database, quote_ident, PgTemplateStore};

use crate::error::StencilResult;
use async_trait::async_trait;

/// Sort order for database listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    /// Byte-wise ascending
    Ascending,
    /// Byte-wise descending (most recently touched entries first)
    Descending,
}

/// Database server operations used by the template cache
///
/// Every method runs on the store's single session. Advisory locks are held
/// by that session, block until available, and are re-entrant within it.
#[async_trait]
pub trait TemplateStore: Send {
    /// Create `name` as a copy of `template`
    async fn create_database_from_template(&mut self, name: &str, template: &str)
        -> StencilResult<()>;

    /// Rename a database
    async fn rename_database(&mut self, from: &str, to: &str) -> StencilResult<()>;

    /// Drop a database
    async fn drop_database(&mut self, name: &str) -> StencilResult<()>;

    /// List database names matching a `LIKE` pattern
    async fn list_databases_matching(
        &mut self,
        pattern: &str,
        order: ListOrder,
    ) -> StencilResult<Vec<String>>;

    /// Count database names matching a `LIKE` pattern
    async fn count_databases_matching(&mut self, pattern: &str) -> StencilResult<u64>;

    /// Block until the advisory lock `id` is held by this session
    async fn advisory_lock(&mut self, id: i64) -> StencilResult<()>;

    /// Release one hold of the advisory lock `id`
    async fn advisory_unlock(&mut self, id: i64) -> StencilResult<()>;

    /// End the session, releasing any advisory locks it still holds
    async fn close(self) -> StencilResult<()>
    where
        Self: Sized;
}

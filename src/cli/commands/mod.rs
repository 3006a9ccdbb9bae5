//! CLI command implementations

pub mod config;
pub mod digest;
pub mod init;
pub mod list;
pub mod purge;
pub mod trim;

pub use config::execute as config;
pub use digest::execute as digest;
pub use init::execute as init;
pub use list::execute as list;
pub use purge::execute as purge;
pub use trim::execute as trim;

use crate::cache::{addons_digest, Digest, Prefix, TemplateCache};
use crate::cli::args::{CacheSelector, ModuleArgs};
use crate::config::Config;
use crate::error::{StencilError, StencilResult};
use crate::store::{PgTemplateStore, TemplateStore};
use tracing::debug;

/// Cache namespace from the command line, falling back to config
fn resolve_prefix(selector: &CacheSelector, config: &Config) -> StencilResult<Prefix> {
    let prefix = selector.prefix.as_deref().unwrap_or(&config.cache.prefix);
    Prefix::new(prefix)
}

/// Maintenance database URL, required by every command touching the server
fn database_url(config: &Config) -> StencilResult<&str> {
    config
        .database
        .url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or(StencilError::DatabaseUrlMissing)
}

/// Connect to the server and bind the cache namespace
async fn open_cache(
    config: &Config,
    prefix: Prefix,
) -> StencilResult<TemplateCache<PgTemplateStore>> {
    let store = PgTemplateStore::connect(database_url(config)?).await?;
    Ok(TemplateCache::new(store, prefix))
}

/// Close the cache session, keeping the first error
async fn close_cache<T>(
    cache: TemplateCache<PgTemplateStore>,
    result: StencilResult<T>,
) -> StencilResult<T> {
    let closed = cache.into_store().close().await;
    let value = result?;
    closed?;
    Ok(value)
}

/// Modules from the command line, trimmed and without empties
fn module_list(args: &ModuleArgs) -> Vec<String> {
    args.modules
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect()
}

/// Digest of a module set, hashed off the async runtime
async fn compute_digest(
    config: &Config,
    modules: &[String],
    with_demo: bool,
) -> StencilResult<Digest> {
    let paths = config.addons.paths.clone();
    let exclude = config.addons.exclude.clone();
    let modules = modules.to_vec();

    let digest = tokio::task::spawn_blocking(move || {
        addons_digest(&paths, &modules, with_demo, &exclude)
    })
    .await
    .map_err(|e| StencilError::Internal(format!("Digest task failed: {}", e)))??;

    debug!("Digest: {}", digest);
    Ok(digest)
}

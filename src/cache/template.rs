//! Database template cache
//!
//! Templates are databases named `prefix-YYYYmmddHHMM-digest`, where the
//! timestamp records when the digest was last used under that prefix. Every
//! operation runs under a per-prefix advisory lock, so caches on different
//! sessions (or processes) sharing one server serialize their work on a
//! namespace, while different prefixes never contend.

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::naming::{
    age_cutoff, digest_pattern, entry_name, lock_id, namespace_pattern, CacheEntry, Digest,
    Prefix,
};
use crate::error::StencilResult;
use crate::store::{ListOrder, TemplateStore};
use chrono::Duration;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// Content-addressed cache of database templates
pub struct TemplateCache<S, C = SystemClock> {
    store: S,
    prefix: Prefix,
    lock_id: i64,
    clock: C,
}

impl<S: TemplateStore> TemplateCache<S, SystemClock> {
    /// Bind a cache namespace to a store session, using the wall clock
    pub fn new(store: S, prefix: Prefix) -> Self {
        Self::with_clock(store, prefix, SystemClock)
    }
}

impl<S: TemplateStore, C: Clock> TemplateCache<S, C> {
    /// Bind a cache namespace to a store session with an explicit clock
    pub fn with_clock(store: S, prefix: Prefix, clock: C) -> Self {
        let lock_id = lock_id(&prefix);
        debug!("Template cache '{}' uses advisory lock {}", prefix, lock_id);
        Self {
            store,
            prefix,
            lock_id,
            clock,
        }
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn lock_id(&self) -> i64 {
        self.lock_id
    }

    /// The store session, for work outside the cache namespace
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Give back the store session, e.g. to close it
    pub fn into_store(self) -> S {
        self.store
    }

    /// Create `target` from the cached template matching `digest`
    ///
    /// Returns `false` without side effects when no template matches. On a
    /// hit the template is touched, making it the most recently used.
    pub async fn create(&mut self, target: &str, digest: &Digest) -> StencilResult<bool> {
        self.lock().await?;
        let result = self.create_locked(target, digest).await;
        self.unlock(result).await
    }

    /// Register the freshly built database `source` as the template for `digest`
    ///
    /// `source` is renamed into the cache, not copied. If a template for the
    /// digest already exists it is touched instead and `source` is left in
    /// place for the caller to reuse or drop.
    pub async fn add(&mut self, source: &str, digest: &Digest) -> StencilResult<()> {
        self.lock().await?;
        let result = self.add_locked(source, digest).await;
        self.unlock(result).await
    }

    /// Number of templates under this prefix
    pub async fn size(&mut self) -> StencilResult<u64> {
        self.lock().await?;
        let pattern = namespace_pattern(&self.prefix);
        let result = self.store.count_databases_matching(&pattern).await;
        self.unlock(result).await
    }

    /// Templates under this prefix, most recently used first
    pub async fn entries(&mut self) -> StencilResult<Vec<CacheEntry>> {
        self.lock().await?;
        let result = self.list(ListOrder::Descending).await.map(|names| {
            names
                .iter()
                .filter_map(|name| CacheEntry::parse(&self.prefix, name))
                .collect()
        });
        self.unlock(result).await
    }

    /// Drop every template under this prefix, returning how many were dropped
    pub async fn purge(&mut self) -> StencilResult<u64> {
        self.lock().await?;
        let result = self.purge_locked().await;
        self.unlock(result).await
    }

    /// Keep the `max_size` most recently used templates and drop the rest
    pub async fn trim_size(&mut self, max_size: u64) -> StencilResult<u64> {
        self.lock().await?;
        let result = self.trim_size_locked(max_size).await;
        self.unlock(result).await
    }

    /// Drop templates not used within `max_age`
    ///
    /// Age is measured in whole minutes: a template last used in the minute
    /// exactly `max_age` ago is kept.
    pub async fn trim_age(&mut self, max_age: Duration) -> StencilResult<u64> {
        self.lock().await?;
        let result = self.trim_age_locked(max_age).await;
        self.unlock(result).await
    }

    async fn create_locked(&mut self, target: &str, digest: &Digest) -> StencilResult<bool> {
        let Some(template) = self.find_template(digest).await? else {
            debug!("No template for digest {} under '{}'", digest, self.prefix);
            return Ok(false);
        };

        self.store
            .create_database_from_template(target, &template)
            .await?;
        self.touch(&template, digest).await?;
        info!("Created database {} from template {}", target, template);
        Ok(true)
    }

    async fn add_locked(&mut self, source: &str, digest: &Digest) -> StencilResult<()> {
        if let Some(template) = self.find_template(digest).await? {
            self.touch(&template, digest).await?;
            info!(
                "Template for digest {} already cached as {}, leaving {} in place",
                digest, template, source
            );
            return Ok(());
        }

        let name = entry_name(&self.prefix, self.clock.now(), digest);
        self.store.rename_database(source, &name).await?;
        info!("Database {} cached as {}", source, name);
        Ok(())
    }

    async fn purge_locked(&mut self) -> StencilResult<u64> {
        let names = self.list(ListOrder::Ascending).await?;
        self.drop_all(&names).await
    }

    async fn trim_size_locked(&mut self, max_size: u64) -> StencilResult<u64> {
        let keep = usize::try_from(max_size).unwrap_or(usize::MAX);
        let names = self.list(ListOrder::Descending).await?;
        let expired = names.get(keep..).unwrap_or_default();
        self.drop_all(expired).await
    }

    async fn trim_age_locked(&mut self, max_age: Duration) -> StencilResult<u64> {
        let Some(cutoff) = age_cutoff(&self.prefix, self.clock.now(), max_age) else {
            debug!("Age limit reaches past the earliest timestamp, nothing to trim");
            return Ok(0);
        };
        debug!("Trimming templates at or below {}", cutoff);
        let expired: Vec<String> = self
            .list(ListOrder::Descending)
            .await?
            .into_iter()
            .filter(|name| name.as_str() <= cutoff.as_str())
            .collect();
        self.drop_all(&expired).await
    }

    async fn find_template(&mut self, digest: &Digest) -> StencilResult<Option<String>> {
        let pattern = digest_pattern(&self.prefix, digest);
        let names = self
            .store
            .list_databases_matching(&pattern, ListOrder::Descending)
            .await?;
        Ok(names.into_iter().next())
    }

    /// Re-timestamp a template to now; timestamps never move backwards
    async fn touch(&mut self, template: &str, digest: &Digest) -> StencilResult<()> {
        let name = entry_name(&self.prefix, self.clock.now(), digest);
        match name.as_str().cmp(template) {
            Ordering::Greater => self.store.rename_database(template, &name).await,
            Ordering::Equal => Ok(()),
            Ordering::Less => {
                debug!("Clock is behind {}, keeping its timestamp", template);
                Ok(())
            }
        }
    }

    async fn list(&mut self, order: ListOrder) -> StencilResult<Vec<String>> {
        let pattern = namespace_pattern(&self.prefix);
        self.store.list_databases_matching(&pattern, order).await
    }

    async fn drop_all(&mut self, names: &[String]) -> StencilResult<u64> {
        let mut dropped = 0;
        for name in names {
            self.store.drop_database(name).await?;
            dropped += 1;
        }
        Ok(dropped)
    }

    async fn lock(&mut self) -> StencilResult<()> {
        self.store.advisory_lock(self.lock_id).await
    }

    /// Release the prefix lock, whatever the outcome of the locked work
    async fn unlock<T>(&mut self, result: StencilResult<T>) -> StencilResult<T> {
        let released = self.store.advisory_unlock(self.lock_id).await;
        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(unlock_err)) => {
                warn!(
                    "Failed to release advisory lock {} after error: {}",
                    self.lock_id, unlock_err
                );
                Err(e)
            }
        }
    }
}

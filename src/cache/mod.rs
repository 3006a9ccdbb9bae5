//! Database template cache
//!
//! Provides content-addressed caching of fully initialized databases keyed
//! by a digest of their build inputs. Building a database from modules is
//! slow; cloning a template is cheap.
//!
//! # Naming Model
//!
//! - Templates live in the database server itself, one database each
//! - Name = `prefix-YYYYmmddHHMM-digest`, the timestamp being last use
//! - Names sort by last use within a prefix, so listing order is MRU order
//! - A per-prefix advisory lock serializes all work on a namespace
//!
//! # Retention
//!
//! | Policy | Keeps |
//! |--------|-------|
//! | `trim_size(n)` | the `n` most recently used templates |
//! | `trim_age(d)` | templates used within the last `d` |
//! | `purge()` | nothing |

pub mod clock;
pub mod digest;
pub mod naming;
mod template;

pub use clock::{Clock, ManualClock, SystemClock};
pub use digest::{addons_digest, resolve_module, DEFAULT_EXCLUDES};
pub use naming::{CacheEntry, Digest, Prefix, MAX_IDENTIFIER_LEN};
pub use template::TemplateCache;

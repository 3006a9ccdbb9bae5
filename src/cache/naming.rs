//! Cache entry naming
//!
//! Entries carry no metadata table: everything is encoded in the database
//! name as `prefix-YYYYmmddHHMM-digest`, truncated to the PostgreSQL
//! identifier limit. The fixed-width timestamp makes lexicographic order of
//! names equal to chronological order within a prefix.

use crate::error::{StencilError, StencilResult};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a PostgreSQL identifier (NAMEDATALEN - 1)
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Maximum length of a prefix accepted by [`Prefix::new`]
///
/// With this limit an entry name always fits the identifier limit untruncated.
pub const MAX_PREFIX_LEN: usize = 8;

/// Maximum length of a prefix accepted by [`Prefix::lenient`]
///
/// Longer prefixes shorten the digest suffix of entry names; this limit keeps
/// at least 32 hex characters of it.
pub const MAX_LENIENT_PREFIX_LEN: usize = MAX_IDENTIFIER_LEN - TIMESTAMP_LEN - 2 - 32;

/// Number of raw bytes in a digest
pub const DIGEST_BYTES: usize = 20;

/// Number of hex characters in a digest
pub const DIGEST_HEX_LEN: usize = DIGEST_BYTES * 2;

/// Sentinel sorting above every real digest of the same length
pub const MAX_DIGEST: &str = "ffffffffffffffffffffffffffffffffffffffff";

/// Minute-granularity timestamp format used in entry names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

const TIMESTAMP_LEN: usize = 12;

/// A validated cache namespace
///
/// Letters, digits and hyphens only, so a prefix never contains `LIKE`
/// wildcards and always leaves room for the timestamp and digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prefix(String);

impl Prefix {
    /// Validate and wrap a prefix: `^[A-Za-z0-9][A-Za-z0-9-]{0,7}$`
    pub fn new(prefix: impl Into<String>) -> StencilResult<Self> {
        Self::validated(prefix.into(), MAX_PREFIX_LEN)
    }

    /// Like [`Prefix::new`], but allows prefixes long enough for entry names
    /// to be truncated
    ///
    /// The CLI never accepts such prefixes. This exists for exercising the
    /// truncated-name paths of the cache.
    #[doc(hidden)]
    pub fn lenient(prefix: impl Into<String>) -> StencilResult<Self> {
        Self::validated(prefix.into(), MAX_LENIENT_PREFIX_LEN)
    }

    fn validated(prefix: String, max_len: usize) -> StencilResult<Self> {
        let mut chars = prefix.chars();
        let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
        let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '-');

        if first_ok && rest_ok && prefix.len() <= max_len {
            Ok(Self(prefix))
        } else {
            Err(StencilError::InvalidPrefix(prefix))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Prefix {
    type Err = StencilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A validated build-input fingerprint (40 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Validate a hex digest, normalizing to lowercase
    pub fn new(digest: impl Into<String>) -> StencilResult<Self> {
        let digest = digest.into();
        if digest.len() == DIGEST_HEX_LEN && digest.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(digest.to_ascii_lowercase()))
        } else {
            Err(StencilError::InvalidDigest(digest))
        }
    }

    /// Build a digest from the leading bytes of a hash output
    pub fn from_hash(hash: &[u8]) -> StencilResult<Self> {
        if hash.len() < DIGEST_BYTES {
            return Err(StencilError::InvalidDigest(hex::encode(hash)));
        }
        Ok(Self(hex::encode(&hash[..DIGEST_BYTES])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = StencilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Format a point in time as the fixed-width `YYYYmmddHHMM` name component
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Cut an identifier down to the store's limit, always from the right
pub fn truncate_identifier(mut name: String) -> String {
    if let Some((idx, _)) = name.char_indices().nth(MAX_IDENTIFIER_LEN) {
        name.truncate(idx);
    }
    name
}

/// Name of the entry for `digest` touched at `at`
pub fn entry_name(prefix: &Prefix, at: DateTime<Utc>, digest: &Digest) -> String {
    truncate_identifier(format!("{}-{}-{}", prefix, format_timestamp(at), digest))
}

/// `LIKE` pattern matching the entry for `digest` at any timestamp
///
/// Truncated the same way as entry names, so a shortened digest suffix
/// still matches.
pub fn digest_pattern(prefix: &Prefix, digest: &Digest) -> String {
    truncate_identifier(format!("{}-{}-{}", prefix, "_".repeat(TIMESTAMP_LEN), digest))
}

/// `LIKE` pattern matching every entry under `prefix`
pub fn namespace_pattern(prefix: &Prefix) -> String {
    truncate_identifier(format!(
        "{}-{}-{}",
        prefix,
        "_".repeat(TIMESTAMP_LEN),
        "_".repeat(DIGEST_HEX_LEN)
    ))
}

/// Highest entry name considered expired by an age trim
///
/// Entries whose name sorts at or below this value were last touched
/// strictly before the minute `now - max_age`. An entry touched in that exact
/// minute sorts above the cutoff and survives.
///
/// Returns `None` when the boundary falls outside the representable range,
/// in which case nothing is old enough to expire.
pub fn age_cutoff(prefix: &Prefix, now: DateTime<Utc>, max_age: Duration) -> Option<String> {
    let boundary = now
        .checked_sub_signed(max_age)?
        .checked_sub_signed(Duration::minutes(1))?;
    Some(truncate_identifier(format!(
        "{}-{}-{}",
        prefix,
        format_timestamp(boundary),
        MAX_DIGEST
    )))
}

/// Advisory lock id for a prefix
///
/// First 7 bytes of the SHA-256 of the prefix, so the id is always a
/// positive `bigint`.
pub fn lock_id(prefix: &Prefix) -> i64 {
    let hash = Sha256::digest(prefix.as_str().as_bytes());
    let mut bytes = [0u8; 8];
    bytes[1..].copy_from_slice(&hash[..7]);
    i64::from_be_bytes(bytes)
}

/// A cache entry decoded from its database name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Full database name
    pub name: String,
    /// When the entry was last used (minute precision)
    pub last_used: DateTime<Utc>,
    /// Digest suffix, possibly shortened by identifier truncation
    pub digest: String,
}

impl CacheEntry {
    /// Decode an entry name belonging to `prefix`
    pub fn parse(prefix: &Prefix, name: &str) -> Option<Self> {
        let rest = name.strip_prefix(prefix.as_str())?.strip_prefix('-')?;
        if rest.len() < TIMESTAMP_LEN + 1 || !rest.is_char_boundary(TIMESTAMP_LEN) {
            return None;
        }
        let (timestamp, rest) = rest.split_at(TIMESTAMP_LEN);
        let digest = rest.strip_prefix('-')?;

        if digest.is_empty()
            || digest.len() > DIGEST_HEX_LEN
            || !digest.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
        {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            last_used: parse_timestamp(timestamp)?,
            digest: digest.to_string(),
        })
    }
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if !ts.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| ts[range].parse::<u32>().ok();

    let year = ts[0..4].parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?;
    let time = date.and_hms_opt(field(8..10)?, field(10..12)?, 0)?;
    Some(time.and_utc())
}

//! Trim command - evict templates by count and age

use super::{close_cache, open_cache, resolve_prefix};
use crate::cache::{Clock, TemplateCache};
use crate::cli::args::TrimArgs;
use crate::config::Config;
use crate::error::StencilResult;
use crate::store::TemplateStore;
use crate::ui::{self, UiContext};
use chrono::Duration;

/// Retention limits; a negative value disables that policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPolicy {
    pub max_size: i64,
    pub max_age_days: i64,
}

impl TrimPolicy {
    /// Limits from the command line, falling back to config
    pub fn resolve(max_size: Option<i64>, max_age_days: Option<i64>, config: &Config) -> Self {
        Self {
            max_size: max_size.unwrap_or(config.cache.max_size),
            max_age_days: max_age_days.unwrap_or(config.cache.max_age_days),
        }
    }
}

/// Templates dropped per policy; `None` when the policy was disabled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimReport {
    pub max_size: Option<u64>,
    pub max_age: Option<u64>,
}

/// Execute the trim command
pub async fn execute(args: TrimArgs, config: &Config) -> StencilResult<()> {
    let ctx = UiContext::detect();
    let prefix = resolve_prefix(&args.cache, config)?;
    let policy = TrimPolicy::resolve(args.max_size, args.max_age, config);

    let mut cache = open_cache(config, prefix).await?;
    let result = apply(&mut cache, policy).await;
    let report = close_cache(cache, result).await?;

    print_report(&ctx, &report);
    Ok(())
}

/// Apply size then age retention to a cache
pub async fn apply<S: TemplateStore, C: Clock>(
    cache: &mut TemplateCache<S, C>,
    policy: TrimPolicy,
) -> StencilResult<TrimReport> {
    let mut report = TrimReport::default();

    if let Ok(max_size) = u64::try_from(policy.max_size) {
        report.max_size = Some(cache.trim_size(max_size).await?);
    }
    if policy.max_age_days >= 0 {
        // Limits too large for a duration cannot expire anything
        report.max_age = Some(match Duration::try_days(policy.max_age_days) {
            Some(max_age) => cache.trim_age(max_age).await?,
            None => 0,
        });
    }

    Ok(report)
}

/// Print one line per applied policy
pub fn print_report(ctx: &UiContext, report: &TrimReport) {
    for (count, policy) in [(report.max_size, "max-size"), (report.max_age, "max-age")] {
        if let Some(count) = count {
            ui::step_info(ctx, &trim_message(count, policy));
        }
    }
}

fn trim_message(count: u64, policy: &str) -> String {
    if count == 0 {
        format!("No database cleared from cache ({})", policy)
    } else {
        format!("{} database(s) cleared from cache ({})", count, policy)
    }
}

//! List command - show cached templates

use super::{close_cache, open_cache, resolve_prefix};
use crate::cache::CacheEntry;
use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::Config;
use crate::error::StencilResult;
use chrono::Utc;
use console::style;
use serde::Serialize;

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> StencilResult<()> {
    let prefix = resolve_prefix(&args.cache, config)?;

    let mut cache = open_cache(config, prefix).await?;
    let result = cache.entries().await;
    let entries = close_cache(cache, result).await?;

    match args.format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => print_plain(&entries),
    }

    Ok(())
}

fn print_table(entries: &[CacheEntry]) {
    if entries.is_empty() {
        println!("No cached templates.");
        return;
    }

    println!("{:<63}  {:<16}  {:>8}", "TEMPLATE", "LAST USED", "AGE");
    println!("{}", "-".repeat(91));

    let now = Utc::now();
    for entry in entries {
        let days = (now - entry.last_used).num_days();
        let age = format!("{}d", days);
        let age = if days > 7 {
            style(age).yellow().to_string()
        } else {
            style(age).dim().to_string()
        };
        println!(
            "{:<63}  {:<16}  {:>8}",
            entry.name,
            entry.last_used.format("%Y-%m-%d %H:%M"),
            age
        );
    }

    println!();
    println!("Total: {} template(s)", entries.len());
}

#[derive(Serialize)]
struct EntryJson<'a> {
    name: &'a str,
    digest: &'a str,
    last_used: String,
}

fn entries_json(entries: &[CacheEntry]) -> StencilResult<String> {
    let json: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            name: &e.name,
            digest: &e.digest,
            last_used: e.last_used.to_rfc3339(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&json)?)
}

fn print_json(entries: &[CacheEntry]) -> StencilResult<()> {
    println!("{}", entries_json(entries)?);
    Ok(())
}

fn print_plain(entries: &[CacheEntry]) {
    for entry in entries {
        println!("{}", entry.name);
    }
}

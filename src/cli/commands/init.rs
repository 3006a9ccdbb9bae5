//! Init command - create a database, through the template cache when enabled

use super::{close_cache, compute_digest, database_url, module_list, open_cache, resolve_prefix};
use crate::builder::{BuildRequest, TemplateBuilder};
use crate::cache::naming::truncate_identifier;
use crate::cache::{Digest, TemplateCache};
use crate::cli::args::InitArgs;
use crate::cli::commands::trim::{self, TrimPolicy};
use crate::config::Config;
use crate::error::StencilResult;
use crate::store::{execute_in_database, PgTemplateStore, TemplateStore};
use crate::ui::{self, BuildProgress, TaskSpinner, UiContext};
use tracing::{debug, warn};

/// Execute the init command
pub async fn execute(args: InitArgs, config: &Config) -> StencilResult<()> {
    let ctx = UiContext::detect();

    // Configuration problems surface before anything touches the server
    let prefix = resolve_prefix(&args.cache, config)?;
    let builder = TemplateBuilder::from_config(&config.builder)?;
    if !args.no_cache || args.rawsql.is_some() {
        database_url(config)?;
    }
    let modules = module_list(&args.modules);
    let request = BuildRequest {
        database: &args.database,
        modules: &modules,
        with_demo: args.modules.with_demo,
    };

    if args.no_cache {
        run_builder(&ctx, &builder, &request).await?;
        ui::step_ok(&ctx, &format!("New database {} created", args.database));
    } else {
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Computing module digest...");
        let digest = match compute_digest(config, &modules, request.with_demo).await {
            Ok(digest) => digest,
            Err(e) => {
                spinner.stop_error("Digest failed");
                return Err(e);
            }
        };
        spinner.clear();

        let policy = TrimPolicy::resolve(args.max_size, args.max_age, config);
        let mut cache = open_cache(config, prefix).await?;
        let result = init_cached(&ctx, &mut cache, &builder, &request, &digest, policy).await;
        let report = close_cache(cache, result).await?;
        trim::print_report(&ctx, &report);
    }

    if let Some(sql) = args.rawsql.as_deref() {
        debug!("Running raw SQL in {}", args.database);
        execute_in_database(database_url(config)?, &args.database, sql).await?;
        ui::step_ok(&ctx, "Raw SQL executed");
    }

    Ok(())
}

/// Clone a cached template or build and cache a new one, then trim
async fn init_cached(
    ctx: &UiContext,
    cache: &mut TemplateCache<PgTemplateStore>,
    builder: &TemplateBuilder,
    request: &BuildRequest<'_>,
    digest: &Digest,
    policy: TrimPolicy,
) -> StencilResult<trim::TrimReport> {
    let target = request.database;

    if cache.create(target, digest).await? {
        ui::step_ok_detail(ctx, "Found matching database template", digest.as_str());
    } else {
        run_builder(ctx, builder, request).await?;

        // The cache takes ownership of a copy; the built database stays the caller's
        let staging = staging_name(target);
        let store = cache.store_mut();
        let lingering = store.terminate_connections(target).await?;
        if lingering > 0 {
            debug!("Terminated {} builder session(s) on {}", lingering, target);
        }
        store.create_database_from_template(&staging, target).await?;
        let added = cache.add(&staging, digest).await;
        discard_staging(cache.store_mut(), &staging).await;
        added?;

        ui::step_ok_detail(ctx, "New database created and cached", digest.as_str());
    }

    trim::apply(cache, policy).await
}

/// Run the builder with live output
async fn run_builder(
    ctx: &UiContext,
    builder: &TemplateBuilder,
    request: &BuildRequest<'_>,
) -> StencilResult<()> {
    let progress = BuildProgress::new(ctx, request.database);
    let result = builder.build(request, &|line| progress.on_line(line)).await;
    progress.finish();
    result
}

/// Temporary name of the copy handed to the cache
///
/// Starts with `_`, which no cache prefix can, so it never shows up in a
/// cache listing.
fn staging_name(target: &str) -> String {
    truncate_identifier(format!("_stencil_{}", target))
}

/// Drop the staging copy if the cache left it behind
async fn discard_staging(store: &mut PgTemplateStore, staging: &str) {
    match store.database_exists(staging).await {
        Ok(false) => {}
        Ok(true) => {
            debug!("Template already cached, dropping {}", staging);
            if let Err(e) = store.drop_database(staging).await {
                warn!("Failed to drop staging database {}: {}", staging, e);
            }
        }
        Err(e) => warn!("Failed to check staging database {}: {}", staging, e),
    }
}

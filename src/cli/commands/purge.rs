//! Purge command - drop every template in a namespace

use super::{close_cache, open_cache, resolve_prefix};
use crate::cli::args::PurgeArgs;
use crate::config::Config;
use crate::error::StencilResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the purge command
pub async fn execute(args: PurgeArgs, config: &Config) -> StencilResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let prefix = resolve_prefix(&args.cache, config)?;

    let mut cache = open_cache(config, prefix.clone()).await?;
    let size = match cache.size().await {
        Ok(size) => size,
        Err(e) => return close_cache(cache, Err(e)).await,
    };

    if size == 0 {
        close_cache(cache, Ok(())).await?;
        ui::step_info(&ctx, &format!("Cache '{}' is empty", prefix));
        return Ok(());
    }

    let question = format!("Drop {} cached template(s) under '{}'?", size, prefix);
    let confirmed = match ui::confirm(&ctx, &question, false).await {
        Ok(confirmed) => confirmed,
        Err(e) => return close_cache(cache, Err(e)).await,
    };
    if !confirmed {
        close_cache(cache, Ok(())).await?;
        ui::step_warn_hint(&ctx, "Aborted", "Use --yes to purge without asking");
        return Ok(());
    }

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Dropping {} template(s)...", size));
    let result = cache.purge().await;
    match close_cache(cache, result).await {
        Ok(dropped) => {
            spinner.stop(&format!(
                "{} database(s) cleared from cache '{}'",
                dropped, prefix
            ));
            Ok(())
        }
        Err(e) => {
            spinner.stop_error("Purge failed");
            Err(e)
        }
    }
}

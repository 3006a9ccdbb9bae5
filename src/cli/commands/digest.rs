//! Digest command - print the cache key of a module set

use super::{compute_digest, module_list};
use crate::cli::args::DigestArgs;
use crate::config::Config;
use crate::error::StencilResult;

/// Execute the digest command
pub async fn execute(args: DigestArgs, config: &Config) -> StencilResult<()> {
    let modules = module_list(&args.modules);
    let digest = compute_digest(config, &modules, args.modules.with_demo).await?;
    println!("{}", digest);
    Ok(())
}

//! UI module for consistent CLI output
//!
//! Uses `cliclack` for interactive prompts and spinners, with automatic
//! fallback to plain output in CI/non-interactive environments.
//!
//! # Example
//!
//! ```rust,ignore
//! use stencil::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect().with_auto_yes(args.yes);
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Looking up template...");
//! spinner.stop("Found matching database template");
//!
//! if ui::confirm(&ctx, "Drop 3 cached templates?", false).await? {
//!     // ...
//! }
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{step_info, step_ok, step_ok_detail, step_warn_hint};
pub use progress::{BuildProgress, TaskSpinner};
pub use prompts::confirm;
pub use theme::{init_theme, StencilTheme};

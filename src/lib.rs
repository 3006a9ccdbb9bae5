//! Stencil - database template cache
//!
//! Creates ERP databases by cloning cached templates, keyed by a digest of
//! the modules and sources they were built from.

pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod pattern;
pub mod store;
pub mod ui;

pub use error::{StencilError, StencilResult};

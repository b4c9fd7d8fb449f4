//! Command-line interface module.
//!
//! This module handles:
//! - Argument parsing via clap
//! - Output formatting (text tree, JSON Lines)

mod args;
mod output;

pub use args::Args;
pub use output::{OutputFormat, OutputFormatter};

//! Command-line interface for flatwatch.

mod commands;

pub use commands::{is_verbose, run};

//! Command-line front end for the `lpmfwd` binary.

pub mod args;
pub mod dispatch;

pub use args::{Cli, Command};

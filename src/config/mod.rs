//! Configuration for runbook.
//!
//! A YAML file passed with `--config` supplies global defaults: where the
//! resume store lives, the ssh settings every book inherits, and the external
//! binaries to call. Unknown fields are ignored for forward compatibility and
//! every field has a default, so an empty file is a valid config.

mod model;
mod operations;
pub mod types;


pub use model::Config;

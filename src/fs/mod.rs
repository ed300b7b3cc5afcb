//! Filesystem utilities.
//!
//! The resume store and saved pane layouts are rewritten after every statement,
//! so all writes go through [`atomic_write`].

pub mod atomic;

pub use atomic::{atomic_write, atomic_write_file, remove_if_exists};

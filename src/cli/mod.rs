//! CLI argument parsing for runbook.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runbook: view and execute declarative operational runbooks.
///
/// A book is a YAML file of sections, steps and statements. Runs can be
/// interrupted and resumed after the last completed statement.
#[derive(Parser, Debug)]
#[command(name = "runbook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (YAML).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for runbook.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a book as markdown without running anything.
    View(ViewArgs),

    /// Execute a book.
    ///
    /// Offers to resume an interrupted run of the same book unless
    /// --start-at is given.
    Exec(ExecArgs),

    /// Show the saved progress of a book.
    Status(StatusArgs),
}

/// Arguments for the `view` command.
#[derive(Parser, Debug)]
pub struct ViewArgs {
    /// Path to the book file.
    pub book: PathBuf,
}

/// Arguments for the `exec` command.
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Path to the book file.
    pub book: PathBuf,

    /// Print what would be done without doing it.
    #[arg(short, long)]
    pub noop: bool,

    /// Answer every prompt with its default and confirm everything.
    #[arg(short, long)]
    pub auto: bool,

    /// Confirm each step before running it.
    #[arg(short = 'P', long)]
    pub paranoid: bool,

    /// Skip everything before this position (e.g. 1.2.0).
    #[arg(short, long, value_name = "POSITION")]
    pub start_at: Option<String>,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Path to the book file.
    pub book: PathBuf,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

//! Command implementations for runbook.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations and wires the concrete collaborators (console, ssh, tmux)
//! into the engine.

use crate::cancel::{CancelToken, ThreadSleeper};
use crate::cli::{Command, ExecArgs, StatusArgs, ViewArgs};
use crate::config::Config;
use crate::context::RunFlags;
use crate::entities::Book;
use crate::error::Result;
use crate::position::Position;
use crate::remote::SshTransport;
use crate::run::{self, Mode, RunRequest, Services};
use crate::tmux::TmuxCli;
use crate::toolbox::ConsoleToolbox;
use std::path::Path;

/// Load the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command, config: &Config, cancel: &CancelToken) -> Result<()> {
    match command {
        Command::View(args) => cmd_view(args, config, cancel),
        Command::Exec(args) => cmd_exec(args, config, cancel),
        Command::Status(args) => cmd_status(args, config),
    }
}

fn cmd_view(args: ViewArgs, config: &Config, cancel: &CancelToken) -> Result<()> {
    let mut book = Book::load(&args.book)?;
    let request = RunRequest {
        mode: Mode::View,
        flags: RunFlags::default(),
    };
    execute_with_console(&mut book, &request, config, cancel)
}

fn cmd_exec(args: ExecArgs, config: &Config, cancel: &CancelToken) -> Result<()> {
    let mut book = Book::load(&args.book)?;
    let request = RunRequest {
        mode: Mode::Run,
        flags: RunFlags {
            noop: args.noop,
            auto: args.auto,
            paranoid: args.paranoid,
            start_at: parse_start_at(args.start_at.as_deref())?,
        },
    };
    execute_with_console(&mut book, &request, config, cancel)
}

fn cmd_status(args: StatusArgs, config: &Config) -> Result<()> {
    let book = Book::load(&args.book)?;
    run::status(&book, config, &ConsoleToolbox)
}

fn execute_with_console(
    book: &mut Book,
    request: &RunRequest,
    config: &Config,
    cancel: &CancelToken,
) -> Result<()> {
    let transport = SshTransport::new(config.ssh_binary.clone(), config.scp_binary.clone());
    let multiplexer = TmuxCli::new(config.tmux_binary.clone());
    let sleeper = ThreadSleeper::default();

    let services = Services {
        config,
        toolbox: &ConsoleToolbox,
        transport: &transport,
        multiplexer: &multiplexer,
        sleeper: &sleeper,
        cancel,
    };
    run::execute(book, request, &services)
}

fn parse_start_at(value: Option<&str>) -> Result<Option<Position>> {
    value.map(str::parse).transpose()
}

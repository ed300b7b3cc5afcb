//! Runbook: an execution engine for declarative operational runbooks.
//!
//! A [`Book`](entities::Book) is an ordered tree of sections, setups and steps
//! holding statements. [`run::execute`] either renders it as markdown or runs
//! it against one or more hosts, persisting progress so an interrupted run can
//! be resumed, and switching steps into reverse when a rollback is requested.

pub mod cancel;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod entities;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod logging;
pub mod position;
pub mod remote;
pub mod run;
pub mod slug;
pub mod statements;
pub mod store;
pub mod tmux;
pub mod toolbox;

#[cfg(test)]
pub(crate) mod test_support;

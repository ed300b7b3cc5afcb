//! Walking a book: the visitor protocol and its two handlers.
//!
//! [`walk`] visits every node of a book in document order and hands each one to
//! a [`Handler`]. [`Viewer`] renders the book as markdown; [`Runner`] performs
//! the effects. [`execute`] wires a handler, the resume store and the
//! collaborators together for one invocation.

mod engine;
mod retry;
mod runner;
mod view;
mod walker;

#[cfg(test)]
mod tests;

use crate::context::Context;
use crate::entities::{Book, Section, Setup, Step};
use crate::error::Result;
use crate::position::Position;
use crate::statements::{
    Ask, Assert, Callback, Capture, CaptureAll, Command, Condition, Confirm, Description, Download,
    Layout, Note, Notice, Rollback, Statement, StatementKind, TmuxCommand, Upload, Wait,
};

pub use engine::{RunRequest, Services, execute, status};
pub use retry::{RetryOutcome, RetryPolicy, retry};
pub use runner::Runner;
pub use view::{Viewer, describe};
pub use walker::walk;

/// What a walk does with the nodes it visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Perform every statement.
    #[default]
    Run,
    /// Render the book without side effects.
    View,
}

/// Whether the walker descends into a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Run,
    Skip,
}

/// One method per node and statement variant.
///
/// Statement methods that can branch return follow-up statements; the walker
/// marks them dynamic and runs them right after the statement that produced
/// them.
pub trait Handler {
    fn book(&mut self, book: &Book, ctx: &Context<'_>) -> Result<()>;
    fn section(&mut self, section: &Section, ctx: &Context<'_>) -> Result<()>;
    fn setup(&mut self, setup: &Setup, ctx: &Context<'_>) -> Result<()>;
    fn step(&mut self, step: &Step, ctx: &Context<'_>) -> Result<StepDecision>;

    fn ask(&mut self, ask: &Ask, ctx: &Context<'_>) -> Result<()>;
    fn assert(&mut self, assert: &Assert, ctx: &Context<'_>) -> Result<Vec<Statement>>;
    fn capture(&mut self, capture: &Capture, ctx: &Context<'_>) -> Result<()>;
    fn capture_all(&mut self, capture: &CaptureAll, ctx: &Context<'_>) -> Result<()>;
    fn command(&mut self, command: &Command, ctx: &Context<'_>) -> Result<()>;
    fn condition(&mut self, condition: &Condition, ctx: &Context<'_>) -> Result<Vec<Statement>>;
    fn confirm(&mut self, confirm: &Confirm, ctx: &Context<'_>) -> Result<()>;
    fn description(&mut self, description: &Description, ctx: &Context<'_>) -> Result<()>;
    fn download(&mut self, download: &Download, ctx: &Context<'_>) -> Result<()>;
    fn layout(&mut self, layout: &Layout, ctx: &Context<'_>) -> Result<()>;
    fn note(&mut self, note: &Note, ctx: &Context<'_>) -> Result<()>;
    fn notice(&mut self, notice: &Notice, ctx: &Context<'_>) -> Result<()>;
    fn callback(&mut self, callback: &Callback, ctx: &Context<'_>) -> Result<Vec<Statement>>;
    fn tmux_command(&mut self, command: &TmuxCommand, ctx: &Context<'_>) -> Result<()>;
    fn upload(&mut self, upload: &Upload, ctx: &Context<'_>) -> Result<()>;
    fn wait(&mut self, wait: &Wait, ctx: &Context<'_>) -> Result<()>;
    fn rollback(&mut self, rollback: &Rollback, ctx: &Context<'_>) -> Result<()>;

    /// Entry point for every statement. Override to intercept all variants.
    fn statement(&mut self, kind: &StatementKind, ctx: &Context<'_>) -> Result<Vec<Statement>> {
        dispatch(self, kind, ctx)
    }

    /// Called after a static statement and everything it spawned completed.
    fn checkpoint(&mut self, _position: &Position, _ctx: &Context<'_>) -> Result<()> {
        Ok(())
    }
}

/// Route a statement to the handler method of its variant.
pub fn dispatch<H: Handler + ?Sized>(
    handler: &mut H,
    kind: &StatementKind,
    ctx: &Context<'_>,
) -> Result<Vec<Statement>> {
    let none = |r: Result<()>| r.map(|()| Vec::new());
    match kind {
        StatementKind::Ask(s) => none(handler.ask(s, ctx)),
        StatementKind::Assert(s) => handler.assert(s, ctx),
        StatementKind::Capture(s) => none(handler.capture(s, ctx)),
        StatementKind::CaptureAll(s) => none(handler.capture_all(s, ctx)),
        StatementKind::Command(s) => none(handler.command(s, ctx)),
        StatementKind::Condition(s) => handler.condition(s, ctx),
        StatementKind::Confirm(s) => none(handler.confirm(s, ctx)),
        StatementKind::Description(s) => none(handler.description(s, ctx)),
        StatementKind::Download(s) => none(handler.download(s, ctx)),
        StatementKind::Layout(s) => none(handler.layout(s, ctx)),
        StatementKind::Note(s) => none(handler.note(s, ctx)),
        StatementKind::Notice(s) => none(handler.notice(s, ctx)),
        StatementKind::Callback(s) => handler.callback(s, ctx),
        StatementKind::TmuxCommand(s) => none(handler.tmux_command(s, ctx)),
        StatementKind::Upload(s) => none(handler.upload(s, ctx)),
        StatementKind::Wait(s) => none(handler.wait(s, ctx)),
        StatementKind::Rollback(s) => none(handler.rollback(s, ctx)),
    }
}

/// `#` repeated for a node at `depth`, capped at markdown's six levels.
pub(crate) fn heading(depth: usize, title: &str) -> String {
    format!("{} {}", "#".repeat((depth + 1).min(6)), title)
}

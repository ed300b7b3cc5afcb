//! One invocation: validate, pick a start position, walk, settle the store.

use super::runner::Runner;
use super::view::Viewer;
use super::walker::walk;
use super::Mode;
use crate::cancel::{CancelToken, Sleeper};
use crate::config::Config;
use crate::context::{RunFlags, RunState};
use crate::entities::Book;
use crate::error::{Result, RunbookError};
use crate::fs::remove_if_exists;
use crate::position::{Position, PositionEntry, compute_positions, next_statement_after};
use crate::remote::Transport;
use crate::statements::Variables;
use crate::store::{JournalAction, JournalEvent, Repo, ResumeStore};
use crate::tmux::layout::RUNBOOK_PANE;
use crate::tmux::{Multiplexer, Tmux};
use crate::toolbox::Toolbox;
use serde_json::json;

/// What the operator asked for.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub mode: Mode,
    pub flags: RunFlags,
}

/// Collaborators of a walk.
pub struct Services<'s> {
    pub config: &'s Config,
    pub toolbox: &'s dyn Toolbox,
    pub transport: &'s dyn Transport,
    pub multiplexer: &'s dyn Multiplexer,
    pub sleeper: &'s dyn Sleeper,
    pub cancel: &'s CancelToken,
}

/// Validate `book` and walk it in the requested mode.
///
/// Interactive runs consult the resume store first: when a previous run of the
/// same book stopped part-way, the operator is offered to continue after the
/// last completed statement (`--auto` accepts). A fresh run clears the store;
/// a successful one clears it again. `noop` runs and views never touch it.
pub fn execute(book: &mut Book, request: &RunRequest, services: &Services<'_>) -> Result<()> {
    book.validate()?;
    match request.mode {
        Mode::View => view(book, services),
        Mode::Run if request.flags.noop => dry_run(book, &request.flags, services),
        Mode::Run => run(book, &request.flags, services),
    }
}

fn view(book: &mut Book, services: &Services<'_>) -> Result<()> {
    let title = book.title.clone();
    let state = RunState::new();
    let flags = RunFlags::default();
    let ctx = state.root(
        &flags,
        services.toolbox,
        services.cancel,
        &title,
        services.config.ssh.clone(),
    );
    walk(book, &mut Viewer, &ctx)
}

fn dry_run(book: &mut Book, flags: &RunFlags, services: &Services<'_>) -> Result<()> {
    let title = book.title.clone();
    let tmux = tmux_for(services);
    let state = RunState::new();
    let ctx = state.root(
        flags,
        services.toolbox,
        services.cancel,
        &title,
        services.config.ssh.clone(),
    );
    let mut runner = Runner::new(services.transport, services.sleeper, &tmux);
    walk(book, &mut runner, &ctx)
}

fn run(book: &mut Book, flags: &RunFlags, services: &Services<'_>) -> Result<()> {
    let title = book.title.clone();
    let outline = compute_positions(book);
    let store = ResumeStore::new(services.config.store_dir(), &title);
    let tmux = tmux_for(services);

    let mut flags = flags.clone();
    if flags.start_at.is_none() {
        flags.start_at = resume_point(&store, &outline, flags.auto, services.toolbox)?;
    }

    let variables = match &flags.start_at {
        Some(_) => store
            .load_repo()?
            .filter(|repo| repo.matches(&outline))
            .map(|repo| repo.variables)
            .unwrap_or_default(),
        None => {
            store.clear()?;
            forget_layout(&tmux, &title)?;
            Variables::new()
        }
    };

    let mut repo = Repo::new(title.clone(), outline.clone());
    repo.variables = variables.clone();
    store.save_repo(&repo)?;

    let action = match flags.start_at {
        Some(_) => JournalAction::RunResumed,
        None => JournalAction::RunStarted,
    };
    store.journal().append(&JournalEvent::new(action).with_details(json!({
        "title": title,
        "start_at": flags.start_at.as_ref().map(Position::to_string),
    })))?;
    tracing::info!(title = %title, start_at = ?flags.start_at.as_ref().map(Position::to_string), "run started");

    let state = RunState::with_variables(variables);
    let ctx = state.root(
        &flags,
        services.toolbox,
        services.cancel,
        &title,
        services.config.ssh.clone(),
    );
    let mut runner = Runner::new(services.transport, services.sleeper, &tmux).with_store(&store, &outline);

    match walk(book, &mut runner, &ctx) {
        Ok(()) => {
            store.clear()?;
            record(&store, JournalEvent::new(JournalAction::RunCompleted));
            tracing::info!(title = %title, "run completed");
            offer_pane_cleanup(&tmux, &state, &flags, services.toolbox, &title)
        }
        Err(err) => {
            record(&store, failure_event(&err));
            Err(err)
        }
    }
}

fn tmux_for<'s>(services: &Services<'s>) -> Tmux<'s> {
    Tmux::new(services.multiplexer, services.config.store_dir())
        .with_origin_pane(std::env::var("TMUX_PANE").ok())
}

/// Saved panes only survive into resumed runs.
///
/// Outside tmux the layout file cannot be located; there is nothing to forget.
fn forget_layout(tmux: &Tmux<'_>, title: &str) -> Result<()> {
    match tmux.layout_file(title) {
        Ok(file) => {
            if remove_if_exists(&file)? {
                tracing::info!(file = %file.display(), "removed layout of a previous run");
            }
            Ok(())
        }
        Err(e) => {
            tracing::debug!(error = %e, "layout file not resolved");
            Ok(())
        }
    }
}

/// Where to continue a previous run, if the operator wants to.
fn resume_point(
    store: &ResumeStore,
    outline: &[PositionEntry],
    auto: bool,
    toolbox: &dyn Toolbox,
) -> Result<Option<Position>> {
    let Some(pose) = store.load_pose()? else {
        return Ok(None);
    };

    if !store.load_repo()?.is_some_and(|repo| repo.matches(outline)) {
        toolbox.warn(&format!(
            "Saved progress of '{}' belongs to a different version of the book; starting over",
            pose.title
        ));
        return Ok(None);
    }

    let Some(next) = next_statement_after(outline, &pose.position) else {
        return Ok(None);
    };

    let question = format!(
        "Resume '{}' at {} ({}), last saved {} by {}?",
        pose.title,
        next.position,
        next.title,
        pose.saved_at.format("%Y-%m-%d %H:%M:%S UTC"),
        pose.actor
    );
    if auto || toolbox.confirm(&question)? {
        toolbox.output(&format!("Resuming at {}", next.position));
        return Ok(Some(next.position.clone()));
    }
    Ok(None)
}

fn failure_event(err: &RunbookError) -> JournalEvent {
    if matches!(err, RunbookError::Cancelled) {
        return JournalEvent::new(JournalAction::RunCancelled);
    }

    let event = JournalEvent::new(JournalAction::StatementFailed)
        .with_details(json!({ "error": err.to_string() }));
    match err {
        RunbookError::StatementFailure { position, .. } => match position.parse() {
            Ok(position) => event.at(position),
            Err(_) => event,
        },
        _ => event,
    }
}

/// Journal writes after the walk must not mask the walk's own outcome.
fn record(store: &ResumeStore, event: JournalEvent) {
    if let Err(e) = store.journal().append(&event) {
        tracing::warn!(error = %e, action = %event.action, "failed to write journal");
    }
}

fn offer_pane_cleanup(
    tmux: &Tmux<'_>,
    state: &RunState,
    flags: &RunFlags,
    toolbox: &dyn Toolbox,
    title: &str,
) -> Result<()> {
    let panes: Vec<(String, String)> = state
        .layout_panes
        .borrow()
        .iter()
        .filter(|(name, _)| name.as_str() != RUNBOOK_PANE)
        .map(|(name, id)| (name.clone(), id.clone()))
        .collect();

    if panes.is_empty() || flags.auto || !toolbox.confirm("Kill the panes opened by this runbook?")? {
        return Ok(());
    }

    for (name, id) in &panes {
        tracing::debug!(pane = %name, id = %id, "killing pane");
        tmux.kill_pane(id)?;
    }
    remove_if_exists(tmux.layout_file(title)?)?;
    Ok(())
}

/// Print what the resume store knows about `book`.
pub fn status(book: &Book, config: &Config, toolbox: &dyn Toolbox) -> Result<()> {
    let store = ResumeStore::new(config.store_dir(), &book.title);

    match store.load_pose()? {
        None => toolbox.output(&format!("'{}': no run in progress", book.title)),
        Some(pose) => {
            let outline = compute_positions(book);
            let label = outline
                .iter()
                .find(|entry| entry.position == pose.position)
                .map(|entry| format!("{} `{}`", entry.kind, entry.title))
                .unwrap_or_else(|| "unknown statement".to_string());
            toolbox.output(&format!(
                "'{}': last completed {} ({}) at {} by {}",
                pose.title,
                pose.position,
                label,
                pose.saved_at.format("%Y-%m-%d %H:%M:%S UTC"),
                pose.actor
            ));
            match next_statement_after(&outline, &pose.position) {
                Some(next) => toolbox.output(&format!("Next: {} ({} `{}`)", next.position, next.kind, next.title)),
                None => toolbox.output("Next: nothing left to run"),
            }
        }
    }

    if let Some(last) = store.journal().read()?.last() {
        toolbox.output(&format!(
            "Last journal entry: {} at {} by {}",
            last.action,
            last.ts.format("%Y-%m-%d %H:%M:%S UTC"),
            last.actor
        ));
    }
    Ok(())
}

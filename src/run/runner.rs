//! The effectful handler.
//!
//! Commands go through the [`Transport`] and the host fan-out of
//! [`dispatch`]; pauses go through the [`Sleeper`]; panes go through [`Tmux`].
//! With `noop` set every effect is replaced by a `[NOOP]` description.

use super::retry::{RetryOutcome, RetryPolicy, retry};
use super::view::{describe, step_title};
use super::{Handler, StepDecision, dispatch, heading};
use crate::cancel::Sleeper;
use crate::context::Context;
use crate::entities::{Book, Section, Setup, Step};
use crate::error::{Result, RunbookError};
use crate::position::{Position, PositionEntry};
use crate::remote::{
    ExecOutput, ExecRequest, LOCAL_HOST, SshConfig, Transport, check_output, dispatch as fan_out,
};
use crate::statements::{
    Ask, Assert, Callback, Capture, CaptureAll, Command, Condition, Confirm, Description, Download,
    Layout, Note, Notice, Predicate, Rollback, Statement, StatementKind, TmuxCommand, Upload, Wait,
};
use crate::store::{JournalAction, JournalEvent, Repo, ResumeStore, StoredPose};
use crate::tmux::{LayoutEngine, Tmux};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

/// Performs statements against hosts and panes.
pub struct Runner<'r> {
    transport: &'r dyn Transport,
    sleeper: &'r dyn Sleeper,
    tmux: &'r Tmux<'r>,
    store: Option<(&'r ResumeStore, &'r [PositionEntry])>,
}

impl<'r> Runner<'r> {
    pub fn new(transport: &'r dyn Transport, sleeper: &'r dyn Sleeper, tmux: &'r Tmux<'r>) -> Self {
        Self {
            transport,
            sleeper,
            tmux,
            store: None,
        }
    }

    /// Persist the position of every completed static statement.
    pub fn with_store(mut self, store: &'r ResumeStore, outline: &'r [PositionEntry]) -> Self {
        self.store = Some((store, outline));
        self
    }

    /// Run `cmd` on every host of `ssh` using its fan-out strategy.
    fn run_everywhere(
        &self,
        cmd: &str,
        raw: bool,
        ssh: &SshConfig,
        timeout: Option<Duration>,
        ctx: &Context<'_>,
    ) -> Result<Vec<(String, ExecOutput)>> {
        let options = ssh.remote_options();
        let request = ExecRequest {
            cmd,
            raw,
            options: &options,
            timeout,
        };
        let transport = self.transport;
        let cancel = ctx.cancel;

        fan_out(&ssh.hosts(), &ssh.parallelization(), self.sleeper, cancel, |host| {
            let output = transport.execute(host, &request, cancel)?;
            check_output(host, output)
        })
    }

    /// Run `cmd` on the first host of `ssh` and return its output, successful or not.
    fn run_first(&self, cmd: &str, raw: bool, ssh: &SshConfig, ctx: &Context<'_>) -> Result<(String, ExecOutput)> {
        let host = first_host(ssh);
        let options = ssh.remote_options();
        let request = ExecRequest {
            cmd,
            raw,
            options: &options,
            timeout: None,
        };
        let output = self.transport.execute(&host, &request, ctx.cancel)?;
        Ok((host, output))
    }

    fn print_outputs(&self, outputs: &[(String, ExecOutput)], ctx: &Context<'_>) {
        let many = outputs.len() > 1;
        for (host, output) in outputs {
            let text = output.stdout.trim_end();
            if text.is_empty() {
                continue;
            }
            if many {
                for line in text.lines() {
                    ctx.toolbox.output(&format!("{}: {}", host, line));
                }
            } else {
                ctx.toolbox.output(text);
            }
        }
    }

    fn noop(&self, kind: &StatementKind, ctx: &Context<'_>) {
        let lines = match kind {
            StatementKind::Command(command) if ctx.is_reversed() => vec![match &command.undo {
                Some(undo) => format!("**Run:** `{}` (undoing `{}`)", undo, command.cmd),
                None => format!("Skip `{}`: no undo command", command.cmd),
            }],
            StatementKind::Upload(upload) if ctx.is_reversed() => vec![format!(
                "**Download:** `{}` to `{}`",
                upload.to,
                upload.from.display()
            )],
            StatementKind::Download(download) if ctx.is_reversed() => vec![format!(
                "**Upload:** `{}` to `{}`",
                download.local_path().display(),
                download.from
            )],
            _ => describe(kind),
        };
        for line in lines {
            ctx.toolbox.output(&format!("[NOOP] {}", line));
        }
    }

    fn download_from_first(&self, from: &str, to: &Path, ssh: &SshConfig, ctx: &Context<'_>) -> Result<()> {
        let host = first_host(ssh);
        self.transport.download(&host, from, to, ctx.cancel)?;
        ctx.toolbox
            .output(&format!("Downloaded {}:{} to {}", host, from, to.display()));
        Ok(())
    }

    fn upload_everywhere(&self, from: &Path, to: &str, ssh: &SshConfig, ctx: &Context<'_>) -> Result<()> {
        if !from.exists() {
            return Err(RunbookError::UserError(format!(
                "cannot upload '{}': file does not exist",
                from.display()
            )));
        }
        let transport = self.transport;
        let cancel = ctx.cancel;
        let hosts = fan_out(&ssh.hosts(), &ssh.parallelization(), self.sleeper, cancel, |host| {
            transport.upload(host, from, to, cancel)
        })?;
        ctx.toolbox.output(&format!(
            "Uploaded {} to {} on {} host(s)",
            from.display(),
            to,
            hosts.len()
        ));
        Ok(())
    }

    fn journal(&self, event: JournalEvent) -> Result<()> {
        match self.store {
            Some((store, _)) => store.journal().append(&event),
            None => Ok(()),
        }
    }
}

fn first_host(ssh: &SshConfig) -> String {
    ssh.hosts()
        .into_iter()
        .next()
        .unwrap_or_else(|| LOCAL_HOST.to_string())
}

fn captured(output: &ExecOutput, strip: bool) -> String {
    if strip {
        output.stdout.trim().to_string()
    } else {
        output.stdout.clone()
    }
}

impl Handler for Runner<'_> {
    fn book(&mut self, book: &Book, ctx: &Context<'_>) -> Result<()> {
        ctx.toolbox.output(&heading(ctx.depth, &book.title));
        Ok(())
    }

    fn section(&mut self, section: &Section, ctx: &Context<'_>) -> Result<()> {
        ctx.toolbox.output(&heading(ctx.depth, &section.title));
        Ok(())
    }

    fn setup(&mut self, setup: &Setup, ctx: &Context<'_>) -> Result<()> {
        ctx.toolbox.output(&heading(ctx.depth, &setup.title));
        Ok(())
    }

    fn step(&mut self, step: &Step, ctx: &Context<'_>) -> Result<StepDecision> {
        let title = step_title(step, ctx);
        let suffix = if ctx.is_reversed() { " (reverse)" } else { "" };
        ctx.toolbox
            .output(&format!("{}{}", heading(ctx.depth, &title), suffix));

        if ctx.paranoid && !ctx.noop && !ctx.auto && !ctx.toolbox.confirm(&format!("Run step '{}'?", title))? {
            ctx.toolbox.warn(&format!("Skipping step '{}'", title));
            return Ok(StepDecision::Skip);
        }
        Ok(StepDecision::Run)
    }

    fn ask(&mut self, ask: &Ask, ctx: &Context<'_>) -> Result<()> {
        let value = if ctx.auto {
            ask.default.clone().ok_or_else(|| {
                RunbookError::UserError(format!(
                    "cannot ask '{}' in auto mode: no default given",
                    ask.prompt
                ))
            })?
        } else {
            let prompt = match &ask.default {
                Some(default) => format!("{} [{}]", ask.prompt, default),
                None => ask.prompt.clone(),
            };
            let answer = ctx.toolbox.ask(&prompt)?;
            match (&ask.default, answer.trim().is_empty()) {
                (Some(default), true) => default.clone(),
                _ => answer,
            }
        };

        ctx.variables
            .borrow_mut()
            .insert(ask.into.clone(), Value::String(value));
        Ok(())
    }

    fn assert(&mut self, assert: &Assert, ctx: &Context<'_>) -> Result<Vec<Statement>> {
        let ssh = ctx.effective_ssh(assert.ssh_config.as_ref());
        let timeout = (assert.timeout > 0).then(|| Duration::from_secs(assert.timeout));
        let policy = RetryPolicy {
            attempts: assert.attempts,
            interval: Duration::from_secs(assert.interval),
        };

        let outcome = retry(&policy, self.sleeper, ctx.cancel, |attempt| {
            match self.run_everywhere(&assert.cmd, assert.raw, &ssh, timeout, ctx) {
                Ok(_) => Ok(true),
                Err(RunbookError::Cancelled) => Err(RunbookError::Cancelled),
                Err(e) => {
                    tracing::info!(attempt, cmd = %assert.cmd, error = %e, "assertion attempt failed");
                    Ok(false)
                }
            }
        })?;

        match outcome {
            RetryOutcome::Passed { attempts } => {
                tracing::info!(attempts, cmd = %assert.cmd, "assertion passed");
                Ok(Vec::new())
            }
            RetryOutcome::Exhausted { attempts } => match &assert.abort_statement {
                Some(abort) => {
                    ctx.toolbox.warn(&format!(
                        "Assertion `{}` failed after {} attempt(s); running abort statement",
                        assert.cmd, attempts
                    ));
                    Ok(vec![(**abort).clone()])
                }
                None => Err(RunbookError::UserError(format!(
                    "assertion `{}` failed after {} attempt(s)",
                    assert.cmd, attempts
                ))),
            },
        }
    }

    fn capture(&mut self, capture: &Capture, ctx: &Context<'_>) -> Result<()> {
        let ssh = ctx.effective_ssh(capture.ssh_config.as_ref());
        let (host, output) = self.run_first(&capture.cmd, capture.raw, &ssh, ctx)?;
        let output = check_output(&host, output)?;

        ctx.variables.borrow_mut().insert(
            capture.into.clone(),
            Value::String(captured(&output, capture.strip)),
        );
        Ok(())
    }

    fn capture_all(&mut self, capture: &CaptureAll, ctx: &Context<'_>) -> Result<()> {
        let ssh = ctx.effective_ssh(capture.ssh_config.as_ref());
        let outputs = self.run_everywhere(&capture.cmd, capture.raw, &ssh, None, ctx)?;

        let by_host: Map<String, Value> = outputs
            .iter()
            .map(|(host, output)| (host.clone(), Value::String(captured(output, capture.strip))))
            .collect();
        ctx.variables
            .borrow_mut()
            .insert(capture.into.clone(), Value::Object(by_host));
        Ok(())
    }

    fn command(&mut self, command: &Command, ctx: &Context<'_>) -> Result<()> {
        let cmd = if ctx.is_reversed() {
            match &command.undo {
                Some(undo) => undo.as_str(),
                None => {
                    ctx.toolbox
                        .output(&format!("Skipping `{}` in reverse: no undo command", command.cmd));
                    return Ok(());
                }
            }
        } else {
            command.cmd.as_str()
        };

        let ssh = ctx.effective_ssh(command.ssh_config.as_ref());
        let outputs = self.run_everywhere(cmd, command.raw, &ssh, None, ctx)?;
        self.print_outputs(&outputs, ctx);
        Ok(())
    }

    fn condition(&mut self, condition: &Condition, ctx: &Context<'_>) -> Result<Vec<Statement>> {
        let holds = match &condition.predicate {
            Predicate::Command { cmd, raw } => {
                let (_, output) = self.run_first(cmd, *raw, &ctx.effective_ssh(None), ctx)?;
                output.success()
            }
            Predicate::Variable { name, equals } => ctx.variables.borrow().get(name) == Some(equals),
            Predicate::Callback(predicate) => predicate(&ctx.variables.borrow()),
        };

        tracing::debug!(predicate = %condition.predicate.describe(), holds, "condition evaluated");
        Ok(if holds {
            condition.then.clone()
        } else {
            condition.otherwise.clone()
        })
    }

    fn confirm(&mut self, confirm: &Confirm, ctx: &Context<'_>) -> Result<()> {
        if ctx.auto || ctx.toolbox.confirm(&confirm.prompt)? {
            return Ok(());
        }
        if confirm.rollback_on_decline {
            ctx.reverse.set(true);
            ctx.toolbox
                .warn(&format!("Declined '{}': rolling back", confirm.prompt));
            return Ok(());
        }
        Err(RunbookError::UserError(format!(
            "'{}' was declined",
            confirm.prompt
        )))
    }

    fn description(&mut self, description: &Description, ctx: &Context<'_>) -> Result<()> {
        ctx.toolbox.output(&description.msg);
        Ok(())
    }

    fn download(&mut self, download: &Download, ctx: &Context<'_>) -> Result<()> {
        let ssh = ctx.effective_ssh(download.ssh_config.as_ref());
        let local = download.local_path();
        if ctx.is_reversed() {
            self.upload_everywhere(&local, &download.from, &ssh, ctx)
        } else {
            self.download_from_first(&download.from, &local, &ssh, ctx)
        }
    }

    fn layout(&mut self, layout: &Layout, ctx: &Context<'_>) -> Result<()> {
        let mut panes = ctx.layout_panes.borrow_mut();
        LayoutEngine::new(self.tmux).apply(layout, ctx.book_title, &mut panes)
    }

    fn note(&mut self, note: &Note, ctx: &Context<'_>) -> Result<()> {
        ctx.toolbox.output(&note.msg);
        Ok(())
    }

    fn notice(&mut self, notice: &Notice, ctx: &Context<'_>) -> Result<()> {
        ctx.toolbox.warn(&notice.msg);
        Ok(())
    }

    fn callback(&mut self, callback: &Callback, ctx: &Context<'_>) -> Result<Vec<Statement>> {
        callback.call(&mut ctx.variables.borrow_mut())
    }

    fn tmux_command(&mut self, command: &TmuxCommand, ctx: &Context<'_>) -> Result<()> {
        let known = ctx.layout_panes.borrow().get(&command.pane).cloned();
        let pane = match known {
            Some(id) => id,
            None if command.pane.starts_with('%') => command.pane.clone(),
            None => {
                return Err(RunbookError::UserError(format!(
                    "unknown pane '{}': declare it in a layout first",
                    command.pane
                )));
            }
        };
        self.tmux.send_keys(&command.cmd, &pane)
    }

    fn upload(&mut self, upload: &Upload, ctx: &Context<'_>) -> Result<()> {
        let ssh = ctx.effective_ssh(upload.ssh_config.as_ref());
        if ctx.is_reversed() {
            self.download_from_first(&upload.to, &upload.from, &ssh, ctx)
        } else {
            self.upload_everywhere(&upload.from, &upload.to, &ssh, ctx)
        }
    }

    fn wait(&mut self, wait: &Wait, ctx: &Context<'_>) -> Result<()> {
        ctx.toolbox.output(&format!("Waiting {}s", wait.time));
        self.sleeper.sleep(Duration::from_secs(wait.time), ctx.cancel)
    }

    fn rollback(&mut self, rollback: &Rollback, ctx: &Context<'_>) -> Result<()> {
        let reverse = ctx.reverse.flip();
        tracing::info!(reverse, msg = %rollback.msg, "rollback marker");
        ctx.toolbox.warn(&format!("Rollback: {}", rollback.msg));
        Ok(())
    }

    fn statement(&mut self, kind: &StatementKind, ctx: &Context<'_>) -> Result<Vec<Statement>> {
        if ctx.noop
            && !matches!(
                kind,
                StatementKind::Description(_)
                    | StatementKind::Note(_)
                    | StatementKind::Notice(_)
                    | StatementKind::Rollback(_)
            )
        {
            self.noop(kind, ctx);
            return Ok(Vec::new());
        }
        dispatch(self, kind, ctx)
    }

    fn checkpoint(&mut self, position: &Position, ctx: &Context<'_>) -> Result<()> {
        let Some((store, outline)) = self.store else {
            return Ok(());
        };

        store.save_pose(&StoredPose::new(ctx.book_title, position.clone()))?;
        let mut repo = Repo::new(ctx.book_title, outline.to_vec());
        repo.variables = ctx.variables.borrow().clone();
        store.save_repo(&repo)?;
        self.journal(JournalEvent::new(JournalAction::StatementCompleted).at(position.clone()))
    }
}

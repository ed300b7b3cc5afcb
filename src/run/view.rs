//! Markdown rendering of a book.

use super::{Handler, StepDecision, heading};
use crate::context::Context;
use crate::entities::{Book, Section, Setup, Step};
use crate::error::Result;
use crate::statements::{
    Ask, Assert, Callback, Capture, CaptureAll, Command, Condition, Confirm, Description, Download,
    Layout, Note, Notice, Rollback, Statement, StatementKind, TmuxCommand, Upload, Wait,
};

/// Renders every node through the toolbox and performs nothing.
///
/// Conditions render both branches inline, so the viewer never receives
/// follow-up statements.
#[derive(Debug, Default, Clone, Copy)]
pub struct Viewer;

impl Viewer {
    fn render(&self, item: &dyn Describe, ctx: &Context<'_>) -> Result<()> {
        let mut lines = Vec::new();
        describe_into(item, 0, &mut lines);
        for line in lines {
            ctx.toolbox.output(&line);
        }
        Ok(())
    }
}

impl Handler for Viewer {
    fn book(&mut self, book: &Book, ctx: &Context<'_>) -> Result<()> {
        ctx.toolbox.output(&heading(ctx.depth, &book.title));
        if !ctx.ssh_config.servers.is_empty() {
            ctx.toolbox
                .output(&format!("Hosts: {}", ctx.ssh_config.servers.join(", ")));
        }
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
        let suffix = if step.parallel { " _(parallel)_" } else { "" };
        ctx.toolbox
            .output(&format!("{}{}", heading(ctx.depth, &title), suffix));
        Ok(StepDecision::Run)
    }

    fn ask(&mut self, ask: &Ask, ctx: &Context<'_>) -> Result<()> {
        self.render(ask, ctx)
    }

    fn assert(&mut self, assert: &Assert, ctx: &Context<'_>) -> Result<Vec<Statement>> {
        self.render(assert, ctx)?;
        Ok(Vec::new())
    }

    fn capture(&mut self, capture: &Capture, ctx: &Context<'_>) -> Result<()> {
        self.render(capture, ctx)
    }

    fn capture_all(&mut self, capture: &CaptureAll, ctx: &Context<'_>) -> Result<()> {
        self.render(capture, ctx)
    }

    fn command(&mut self, command: &Command, ctx: &Context<'_>) -> Result<()> {
        self.render(command, ctx)
    }

    fn condition(&mut self, condition: &Condition, ctx: &Context<'_>) -> Result<Vec<Statement>> {
        self.render(condition, ctx)?;
        Ok(Vec::new())
    }

    fn confirm(&mut self, confirm: &Confirm, ctx: &Context<'_>) -> Result<()> {
        self.render(confirm, ctx)
    }

    fn description(&mut self, description: &Description, ctx: &Context<'_>) -> Result<()> {
        self.render(description, ctx)
    }

    fn download(&mut self, download: &Download, ctx: &Context<'_>) -> Result<()> {
        self.render(download, ctx)
    }

    fn layout(&mut self, layout: &Layout, ctx: &Context<'_>) -> Result<()> {
        self.render(layout, ctx)
    }

    fn note(&mut self, note: &Note, ctx: &Context<'_>) -> Result<()> {
        self.render(note, ctx)
    }

    fn notice(&mut self, notice: &Notice, ctx: &Context<'_>) -> Result<()> {
        self.render(notice, ctx)
    }

    fn callback(&mut self, callback: &Callback, ctx: &Context<'_>) -> Result<Vec<Statement>> {
        self.render(callback, ctx)?;
        Ok(Vec::new())
    }

    fn tmux_command(&mut self, command: &TmuxCommand, ctx: &Context<'_>) -> Result<()> {
        self.render(command, ctx)
    }

    fn upload(&mut self, upload: &Upload, ctx: &Context<'_>) -> Result<()> {
        self.render(upload, ctx)
    }

    fn wait(&mut self, wait: &Wait, ctx: &Context<'_>) -> Result<()> {
        self.render(wait, ctx)
    }

    fn rollback(&mut self, rollback: &Rollback, ctx: &Context<'_>) -> Result<()> {
        self.render(rollback, ctx)
    }
}

pub(crate) fn step_title(step: &Step, ctx: &Context<'_>) -> String {
    match step.title.as_deref() {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => format!("Step {}", ctx.index + 1),
    }
}

/// Markdown lines describing a statement.
///
/// Conditions list both branches and asserts their abort statement, indented
/// as nested list items.
pub fn describe(kind: &StatementKind) -> Vec<String> {
    let mut lines = Vec::new();
    describe_into(describable(kind), 0, &mut lines);
    lines
}

/// A statement variant rendered as one summary line plus nested items.
trait Describe {
    fn summary(&self) -> String;

    fn nested(&self, _indent: usize, _lines: &mut Vec<String>) {}
}

fn describable(kind: &StatementKind) -> &dyn Describe {
    match kind {
        StatementKind::Ask(s) => s,
        StatementKind::Assert(s) => s,
        StatementKind::Capture(s) => s,
        StatementKind::CaptureAll(s) => s,
        StatementKind::Command(s) => s,
        StatementKind::Condition(s) => s,
        StatementKind::Confirm(s) => s,
        StatementKind::Description(s) => s,
        StatementKind::Download(s) => s,
        StatementKind::Layout(s) => s,
        StatementKind::Note(s) => s,
        StatementKind::Notice(s) => s,
        StatementKind::Callback(s) => s,
        StatementKind::TmuxCommand(s) => s,
        StatementKind::Upload(s) => s,
        StatementKind::Wait(s) => s,
        StatementKind::Rollback(s) => s,
    }
}

fn describe_into(item: &dyn Describe, indent: usize, lines: &mut Vec<String>) {
    let pad = "  ".repeat(indent);
    let bullet = if indent == 0 { "" } else { "- " };
    lines.push(format!("{}{}{}", pad, bullet, item.summary()));
    item.nested(indent, lines);
}

fn describe_list(label: &str, statements: &[Statement], indent: usize, lines: &mut Vec<String>) {
    lines.push(format!("{}- {}:", "  ".repeat(indent + 1), label));
    for statement in statements {
        describe_into(describable(&statement.kind), indent + 2, lines);
    }
}

impl Describe for Ask {
    fn summary(&self) -> String {
        match &self.default {
            Some(default) => format!("**Ask:** {} (into `{}`, default `{}`)", self.prompt, self.into, default),
            None => format!("**Ask:** {} (into `{}`)", self.prompt, self.into),
        }
    }
}

impl Describe for Assert {
    fn summary(&self) -> String {
        let mut text = format!("**Assert:** `{}` every {}s", self.cmd, self.interval);
        if let Some(attempts) = self.attempts {
            text.push_str(&format!(", at most {} attempts", attempts));
        }
        if self.timeout > 0 {
            text.push_str(&format!(", {}s per attempt", self.timeout));
        }
        text
    }

    fn nested(&self, indent: usize, lines: &mut Vec<String>) {
        if let Some(abort) = &self.abort_statement {
            describe_list("On failure", std::slice::from_ref(abort.as_ref()), indent, lines);
        }
    }
}

impl Describe for Capture {
    fn summary(&self) -> String {
        format!("**Capture:** `{}` into `{}`", self.cmd, self.into)
    }
}

impl Describe for CaptureAll {
    fn summary(&self) -> String {
        format!("**Capture on every host:** `{}` into `{}`", self.cmd, self.into)
    }
}

impl Describe for Command {
    fn summary(&self) -> String {
        match &self.undo {
            Some(undo) => format!("**Run:** `{}` (undo: `{}`)", self.cmd, undo),
            None => format!("**Run:** `{}`", self.cmd),
        }
    }
}

impl Describe for Condition {
    fn summary(&self) -> String {
        format!("**If** {}", self.predicate.describe())
    }

    fn nested(&self, indent: usize, lines: &mut Vec<String>) {
        describe_list("Then", &self.then, indent, lines);
        if !self.otherwise.is_empty() {
            describe_list("Otherwise", &self.otherwise, indent, lines);
        }
    }
}

impl Describe for Confirm {
    fn summary(&self) -> String {
        format!("**Confirm:** {}", self.prompt)
    }
}

impl Describe for Description {
    fn summary(&self) -> String {
        self.msg.clone()
    }
}

impl Describe for Download {
    fn summary(&self) -> String {
        format!("**Download:** `{}` to `{}`", self.from, self.local_path().display())
    }
}

impl Describe for Layout {
    fn summary(&self) -> String {
        let windows = if self.windows.is_empty() {
            String::new()
        } else {
            format!(" and {} extra window(s)", self.windows.len())
        };
        match &self.name {
            Some(name) => format!("**Layout:** `{}`{}", name, windows),
            None => format!("**Layout**{}", windows),
        }
    }
}

impl Describe for Note {
    fn summary(&self) -> String {
        format!("_Note:_ {}", self.msg)
    }
}

impl Describe for Notice {
    fn summary(&self) -> String {
        format!("**Notice:** {}", self.msg)
    }
}

impl Describe for Callback {
    fn summary(&self) -> String {
        format!("**Code block:** {}", self.label)
    }
}

impl Describe for TmuxCommand {
    fn summary(&self) -> String {
        format!("**In pane `{}`:** `{}`", self.pane, self.cmd)
    }
}

impl Describe for Upload {
    fn summary(&self) -> String {
        format!("**Upload:** `{}` to `{}`", self.from.display(), self.to)
    }
}

impl Describe for Wait {
    fn summary(&self) -> String {
        format!("**Wait** {}s", self.time)
    }
}

impl Describe for Rollback {
    fn summary(&self) -> String {
        format!("**Rollback:** {}", self.msg)
    }
}

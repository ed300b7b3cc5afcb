use crate::cancel::{CancelToken, Sleeper};
use crate::error::{Result, RunbookError};
use crate::remote::{ExecOutput, ExecRequest, Transport};
use crate::tmux::Multiplexer;
use crate::toolbox::Toolbox;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Toolbox that records output and answers prompts from scripted queues.
#[derive(Default)]
pub(crate) struct RecordingToolbox {
    outputs: RefCell<Vec<String>>,
    warnings: RefCell<Vec<String>>,
    prompts: RefCell<Vec<String>>,
    answers: RefCell<VecDeque<String>>,
    confirmations: RefCell<VecDeque<bool>>,
}

impl RecordingToolbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn answer(self, answer: &str) -> Self {
        self.answers.borrow_mut().push_back(answer.to_string());
        self
    }

    pub(crate) fn confirm_with(self, value: bool) -> Self {
        self.confirmations.borrow_mut().push_back(value);
        self
    }

    pub(crate) fn outputs(&self) -> Vec<String> {
        self.outputs.borrow().clone()
    }

    pub(crate) fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    /// All output joined into one string, for `contains` checks.
    pub(crate) fn transcript(&self) -> String {
        self.outputs.borrow().join("\n")
    }
}

impl Toolbox for RecordingToolbox {
    fn output(&self, message: &str) {
        self.outputs.borrow_mut().push(message.to_string());
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| RunbookError::UserError(format!("no scripted answer for '{}'", prompt)))
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.confirmations
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| RunbookError::UserError(format!("no scripted confirmation for '{}'", prompt)))
    }

    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }
}

/// One call seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportCall {
    Execute {
        host: String,
        cmd: String,
        line: String,
        timeout: Option<Duration>,
    },
    Upload { host: String, from: String, to: String },
    Download { host: String, from: String, to: String },
}

/// Transport that records calls and replies from per-command queues.
///
/// Commands without a scripted reply succeed with empty output.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    calls: Mutex<Vec<TransportCall>>,
    replies: Mutex<HashMap<String, VecDeque<Result<ExecOutput>>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, cmd: &str, stdout: &str, exit_code: i32) -> Self {
        self.push(
            cmd,
            Ok(ExecOutput {
                stdout: stdout.to_string(),
                exit_code: Some(exit_code),
                ..ExecOutput::default()
            }),
        );
        self
    }

    pub(crate) fn fail(self, cmd: &str, err: RunbookError) -> Self {
        self.push(cmd, Err(err));
        self
    }

    fn push(&self, cmd: &str, reply: Result<ExecOutput>) {
        self.replies
            .lock()
            .unwrap()
            .entry(cmd.to_string())
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Raw commands executed, in call order.
    pub(crate) fn executed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Execute { cmd, .. } => Some(cmd),
                _ => None,
            })
            .collect()
    }

    /// Per-attempt time limits `cmd` was run with, in call order.
    pub(crate) fn timeouts_for(&self, cmd: &str) -> Vec<Option<Duration>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Execute { cmd: c, timeout, .. } if c == cmd => Some(timeout),
                _ => None,
            })
            .collect()
    }

    /// Hosts that ran `cmd`.
    pub(crate) fn hosts_for(&self, cmd: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Execute { host, cmd: c, .. } if c == cmd => Some(host),
                _ => None,
            })
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, host: &str, request: &ExecRequest<'_>, cancel: &CancelToken) -> Result<ExecOutput> {
        cancel.check()?;
        self.calls.lock().unwrap().push(TransportCall::Execute {
            host: host.to_string(),
            cmd: request.cmd.to_string(),
            line: request.command_line(),
            timeout: request.timeout,
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(request.cmd)
            .and_then(VecDeque::pop_front);
        reply.unwrap_or_else(|| {
            Ok(ExecOutput {
                exit_code: Some(0),
                ..ExecOutput::default()
            })
        })
    }

    fn upload(&self, host: &str, from: &Path, to: &str, _cancel: &CancelToken) -> Result<()> {
        self.calls.lock().unwrap().push(TransportCall::Upload {
            host: host.to_string(),
            from: from.to_string_lossy().into_owned(),
            to: to.to_string(),
        });
        Ok(())
    }

    fn download(&self, host: &str, from: &str, to: &Path, _cancel: &CancelToken) -> Result<()> {
        self.calls.lock().unwrap().push(TransportCall::Download {
            host: host.to_string(),
            from: from.to_string(),
            to: to.to_string_lossy().into_owned(),
        });
        Ok(())
    }
}

/// Multiplexer that records argv and hands out sequential pane ids.
///
/// The runbook's own pane is `%0`; splits and new windows get `%1`, `%2`, ...
/// Layout file templates come back with fixed values for the tmux formats.
pub(crate) struct ScriptedMultiplexer {
    calls: RefCell<Vec<Vec<String>>>,
    next_pane: Cell<usize>,
}

impl ScriptedMultiplexer {
    pub(crate) fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            next_pane: Cell::new(1),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    fn allocate(&self) -> String {
        let id = self.next_pane.get();
        self.next_pane.set(id + 1);
        format!("%{}", id)
    }
}

impl Multiplexer for ScriptedMultiplexer {
    fn run(&self, args: &[&str]) -> Result<String> {
        self.calls
            .borrow_mut()
            .push(args.iter().map(|a| a.to_string()).collect());

        let reply = match args {
            ["display-message", "-p", "#D"] => "%0".to_string(),
            ["display-message", .., template] => template
                .replace("#{pid}", "123")
                .replace("#{session_name}", "main")
                .replace("#{pane_pid}", "456")
                .replace("#{pane_id}", "%0"),
            ["split-window", ..] | ["new-window", ..] => self.allocate(),
            _ => String::new(),
        };
        Ok(reply)
    }
}

/// Sleeper that records requested durations and returns immediately.
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        self.sleeps.lock().unwrap().push(duration);
        Ok(())
    }
}

//! End-to-end walks through the engine with scripted collaborators.

use super::{Mode, RunRequest, Services, execute, status};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::context::RunFlags;
use crate::entities::{Book, Node};
use crate::error::{Result, RunbookError};
use crate::remote::{Parallelization, SshConfig, Strategy};
use crate::statements::{
    Ask, Assert, Callback, Command, Condition, Confirm, Layout, Predicate, Rollback, Statement,
    Upload,
};
use crate::store::{JournalAction, ResumeStore};
use crate::test_support::{
    RecordingSleeper, RecordingToolbox, ScriptedMultiplexer, ScriptedTransport, TransportCall,
};
use crate::tmux::LayoutNode;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    config: Config,
    toolbox: RecordingToolbox,
    transport: ScriptedTransport,
    mux: ScriptedMultiplexer,
    sleeper: RecordingSleeper,
    cancel: CancelToken,
}

impl Harness {
    fn new() -> Self {
        Self::with(RecordingToolbox::new(), ScriptedTransport::new())
    }

    fn with(toolbox: RecordingToolbox, transport: ScriptedTransport) -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config {
            store_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        Self {
            _dir: dir,
            config,
            toolbox,
            transport,
            mux: ScriptedMultiplexer::new(),
            sleeper: RecordingSleeper::default(),
            cancel: CancelToken::new(),
        }
    }

    fn services(&self) -> Services<'_> {
        Services {
            config: &self.config,
            toolbox: &self.toolbox,
            transport: &self.transport,
            multiplexer: &self.mux,
            sleeper: &self.sleeper,
            cancel: &self.cancel,
        }
    }

    fn run(&self, book: &mut Book, flags: RunFlags) -> Result<()> {
        let request = RunRequest {
            mode: Mode::Run,
            flags,
        };
        execute(book, &request, &self.services())
    }

    fn view(&self, book: &mut Book) -> Result<()> {
        let request = RunRequest {
            mode: Mode::View,
            flags: RunFlags::default(),
        };
        execute(book, &request, &self.services())
    }

    fn store(&self, title: &str) -> ResumeStore {
        ResumeStore::new(self.config.store_dir(), title)
    }
}

fn auto() -> RunFlags {
    RunFlags {
        auto: true,
        ..RunFlags::default()
    }
}

fn start_at(position: &str) -> RunFlags {
    RunFlags {
        start_at: Some(position.parse().unwrap()),
        ..RunFlags::default()
    }
}

/// `Prepare` at 0, `Ship` at 1 with statements 1.0, 1.1 and 1.2.
fn deploy_book() -> Book {
    Book::builder("Deploy")
        .step("Prepare", |s| s.command("a"))
        .step("Ship", |s| s.command("b").command("c").command("d"))
        .build()
        .unwrap()
}

fn failure_position(err: &RunbookError) -> &str {
    match err {
        RunbookError::StatementFailure { position, .. } => position,
        other => panic!("expected a statement failure, got {other:?}"),
    }
}

// ============================================================================
// View
// ============================================================================

#[test]
fn view_renders_markdown_without_running() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .section("Prepare", |section| {
            section.step("Check", |s| s.note("read the docs").command("uptime"))
        })
        .step("Ship", |s| {
            s.statement(
                Condition::new(Predicate::Command {
                    cmd: "test -f /etc/app".to_string(),
                    raw: false,
                })
                .then(Command::new("deploy"))
                .otherwise(Command::new("install")),
            )
        })
        .build()
        .unwrap();

    h.view(&mut book).unwrap();

    let outputs = h.toolbox.outputs();
    assert_eq!(outputs[0], "# Deploy");
    assert!(outputs.contains(&"## Prepare".to_string()));
    assert!(outputs.contains(&"### Check".to_string()));
    assert!(outputs.contains(&"**Run:** `uptime`".to_string()));
    assert!(outputs.contains(&"    - **Run:** `deploy`".to_string()));
    assert!(outputs.contains(&"    - **Run:** `install`".to_string()));
    assert!(h.transport.calls().is_empty());
    assert!(!h.store("Deploy").repo_path().exists());
}

#[test]
fn view_renders_assert_with_its_abort_statement() {
    let h = Harness::new();
    let mut book = Book::builder("Verify")
        .step("Health", |s| {
            s.statement(
                Assert::new("curl -f localhost")
                    .attempts(2)
                    .abort_statement(Rollback {
                        msg: "never healthy".to_string(),
                    }),
            )
            .wait(5)
        })
        .build()
        .unwrap();

    h.view(&mut book).unwrap();

    let outputs = h.toolbox.outputs();
    let start = outputs
        .iter()
        .position(|line| line.starts_with("**Assert:**"))
        .unwrap();
    assert_eq!(
        &outputs[start..],
        &[
            "**Assert:** `curl -f localhost` every 1s, at most 2 attempts".to_string(),
            "  - On failure:".to_string(),
            "    - **Rollback:** never healthy".to_string(),
            "**Wait** 5s".to_string(),
        ]
    );
    assert!(h.transport.calls().is_empty());
    assert!(h.sleeper.sleeps().is_empty());
}

#[test]
fn view_rejects_invalid_book() {
    let h = Harness::new();
    let mut book = deploy_book();
    book.title = String::new();

    let err = h.view(&mut book).unwrap_err();
    assert!(matches!(err, RunbookError::ValidationError(_)));
}

// ============================================================================
// Run, positions and resume
// ============================================================================

#[test]
fn run_executes_in_document_order_and_clears_store() {
    let h = Harness::new();
    let mut book = deploy_book();

    h.run(&mut book, RunFlags::default()).unwrap();

    assert_eq!(h.transport.executed(), vec!["a", "b", "c", "d"]);
    let store = h.store("Deploy");
    assert!(store.load_pose().unwrap().is_none());
    assert!(store.load_repo().unwrap().is_none());

    let actions: Vec<JournalAction> = store
        .journal()
        .read()
        .unwrap()
        .iter()
        .map(|event| event.action)
        .collect();
    assert_eq!(actions.first(), Some(&JournalAction::RunStarted));
    assert_eq!(actions.last(), Some(&JournalAction::RunCompleted));
    assert_eq!(
        actions
            .iter()
            .filter(|a| **a == JournalAction::StatementCompleted)
            .count(),
        4
    );
}

#[test]
fn failure_keeps_last_completed_position() {
    let h = Harness::with(RecordingToolbox::new(), ScriptedTransport::new().reply("d", "", 1));
    let mut book = deploy_book();

    let err = h.run(&mut book, RunFlags::default()).unwrap_err();
    assert_eq!(failure_position(&err), "1.2");
    assert_eq!(err.exit_code(), crate::exit_codes::STATEMENT_FAILURE);

    let pose = h.store("Deploy").load_pose().unwrap().unwrap();
    assert_eq!(pose.position.to_string(), "1.1");

    let last = h.store("Deploy").journal().read().unwrap().pop().unwrap();
    assert_eq!(last.action, JournalAction::StatementFailed);
    assert_eq!(last.position.map(|p| p.to_string()).as_deref(), Some("1.2"));
}

#[test]
fn start_at_reruns_from_the_failed_statement() {
    let h = Harness::with(RecordingToolbox::new(), ScriptedTransport::new().reply("d", "", 1));

    assert!(h.run(&mut deploy_book(), RunFlags::default()).is_err());
    h.run(&mut deploy_book(), start_at("1.2")).unwrap();

    assert_eq!(h.transport.executed(), vec!["a", "b", "c", "d", "d"]);
    assert!(h.store("Deploy").load_pose().unwrap().is_none());
}

#[test]
fn auto_resumes_after_last_completed_statement() {
    let h = Harness::with(RecordingToolbox::new(), ScriptedTransport::new().reply("c", "", 1));

    assert!(h.run(&mut deploy_book(), RunFlags::default()).is_err());
    h.run(&mut deploy_book(), auto()).unwrap();

    assert_eq!(h.transport.executed(), vec!["a", "b", "c", "c", "d"]);
    assert!(h.toolbox.transcript().contains("Resuming at 1.1"));

    let actions: Vec<JournalAction> = h
        .store("Deploy")
        .journal()
        .read()
        .unwrap()
        .iter()
        .map(|event| event.action)
        .collect();
    assert!(actions.contains(&JournalAction::RunResumed));
}

#[test]
fn declining_resume_starts_over() {
    let toolbox = RecordingToolbox::new().confirm_with(false);
    let h = Harness::with(toolbox, ScriptedTransport::new().reply("c", "", 1));

    assert!(h.run(&mut deploy_book(), RunFlags::default()).is_err());
    h.run(&mut deploy_book(), RunFlags::default()).unwrap();

    assert_eq!(h.transport.executed(), vec!["a", "b", "c", "a", "b", "c", "d"]);
    assert!(h.toolbox.prompts()[0].starts_with("Resume 'Deploy' at 1.1"));
}

#[test]
fn changed_book_does_not_resume() {
    let h = Harness::with(RecordingToolbox::new(), ScriptedTransport::new().reply("c", "", 1));
    assert!(h.run(&mut deploy_book(), RunFlags::default()).is_err());

    let mut changed = Book::builder("Deploy")
        .step("Ship", |s| s.command("e"))
        .build()
        .unwrap();
    h.run(&mut changed, auto()).unwrap();

    assert_eq!(h.transport.executed(), vec!["a", "b", "c", "e"]);
    assert!(h.toolbox.warnings().iter().any(|w| w.contains("different version")));
}

#[test]
fn setup_runs_even_when_resuming_past_it() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .setup(|s| s.command("prep"))
        .step("A", |s| s.command("a"))
        .step("B", |s| s.command("b"))
        .build()
        .unwrap();

    h.run(&mut book, start_at("2.0")).unwrap();

    assert_eq!(h.transport.executed(), vec!["prep", "b"]);
}

#[test]
fn captured_variables_survive_a_failed_run() {
    let transport = ScriptedTransport::new()
        .reply("hostname", "web1\n", 0)
        .reply("deploy", "", 1);
    let h = Harness::with(RecordingToolbox::new(), transport);
    let build = || {
        Book::builder("Deploy")
            .step("Gather", |s| s.capture("hostname", "host"))
            .step("Ship", |s| {
                s.command("deploy").callback("check host", |vars| {
                    assert_eq!(vars["host"], json!("web1"));
                    Ok(Vec::new())
                })
            })
            .build()
            .unwrap()
    };

    assert!(h.run(&mut build(), RunFlags::default()).is_err());
    let repo = h.store("Deploy").load_repo().unwrap().unwrap();
    assert_eq!(repo.variables["host"], json!("web1"));

    // The resumed run skips the capture and reads the stored value.
    h.run(&mut build(), auto()).unwrap();
    assert_eq!(h.transport.hosts_for("hostname").len(), 1);
}

// ============================================================================
// Dynamic statements
// ============================================================================

#[test]
fn condition_spawns_chosen_branch_as_dynamic_statements() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .step("Ship", |s| {
            s.statement(Ask {
                prompt: "Environment?".to_string(),
                into: "env".to_string(),
                default: Some("prod".to_string()),
            })
            .statement(
                Condition::new(Predicate::Variable {
                    name: "env".to_string(),
                    equals: json!("prod"),
                })
                .then(Command::new("deploy --prod"))
                .otherwise(Command::new("deploy --staging")),
            )
        })
        .build()
        .unwrap();

    h.run(&mut book, auto()).unwrap();

    assert_eq!(h.transport.executed(), vec!["deploy --prod"]);
    let Node::Step(step) = &book.children[0] else {
        panic!("expected a step");
    };
    let spawned = step.statements[1].spawned();
    assert_eq!(spawned.len(), 1);
    assert!(spawned[0].is_dynamic());
    assert!(spawned[0].is_visited());
    assert!(step.statements[1].is_visited());
    assert!(!step.statements[1].is_dynamic());
}

#[test]
fn failure_in_spawned_branch_resumes_at_spawning_statement() {
    let transport = ScriptedTransport::new().reply("deploy", "", 1);
    let h = Harness::with(RecordingToolbox::new(), transport);
    let build = || {
        Book::builder("Deploy")
            .step("Ship", |s| {
                s.command("prep").statement(
                    Condition::new(Predicate::callback(|_| true)).then(Command::new("deploy")),
                )
            })
            .build()
            .unwrap()
    };

    let err = h.run(&mut build(), RunFlags::default()).unwrap_err();
    assert_eq!(failure_position(&err), "0.1.0");

    let pose = h.store("Deploy").load_pose().unwrap().unwrap();
    assert_eq!(pose.position.to_string(), "0.0");

    h.run(&mut build(), auto()).unwrap();
    assert_eq!(h.transport.executed(), vec!["prep", "deploy", "deploy"]);
}

#[test]
fn visited_dynamic_statement_is_not_dispatched_again() {
    let h = Harness::new();
    let mut stale = Statement::from(Command::new("stale"));
    stale.mark_dynamic();
    stale.mark_visited();
    let mut book = Book::builder("Deploy")
        .step("Ship", |s| s.statement(stale).command("fresh"))
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();

    assert_eq!(h.transport.executed(), vec!["fresh"]);
}

#[test]
fn static_statements_run_again_on_the_next_walk() {
    let h = Harness::new();
    let mut book = deploy_book();

    h.run(&mut book, RunFlags::default()).unwrap();
    h.run(&mut book, RunFlags::default()).unwrap();

    assert_eq!(h.transport.hosts_for("b").len(), 2);
}

#[test]
fn callback_follow_ups_run_after_it() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .step("Ship", |s| {
            s.callback("fan out", |vars| {
                vars.insert("count".to_string(), json!(2));
                Ok(vec![Command::new("one").into(), Command::new("two").into()])
            })
            .command("after")
        })
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();

    assert_eq!(h.transport.executed(), vec!["one", "two", "after"]);
}

// ============================================================================
// Rollback
// ============================================================================

#[test]
fn rollback_reverses_every_later_step() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .step("One", |s| s.statement(Command::new("x").undo("undo-x")))
        .step("Two", |s| s.rollback("smoke test failed").command("w"))
        .step("Three", |s| {
            s.statement(Command::new("y").undo("undo-y"))
                .command("z")
        })
        .section("Later", |section| {
            section.step("Four", |s| {
                s.statement(Upload {
                    from: "app.tar".into(),
                    to: "/srv/app.tar".to_string(),
                    ssh_config: None,
                })
            })
        })
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();

    assert_eq!(h.transport.executed(), vec!["x", "w", "undo-y"]);
    assert!(h
        .transport
        .calls()
        .contains(&TransportCall::Download {
            host: "local".to_string(),
            from: "/srv/app.tar".to_string(),
            to: "app.tar".to_string(),
        }));
    assert!(h.toolbox.transcript().contains("Skipping `z` in reverse"));
    assert!(h.toolbox.outputs().contains(&"## Three (reverse)".to_string()));
    assert_eq!(h.toolbox.warnings(), vec!["Rollback: smoke test failed"]);
}

#[test]
fn declined_confirmation_rolls_back() {
    let toolbox = RecordingToolbox::new().confirm_with(false);
    let h = Harness::with(toolbox, ScriptedTransport::new());
    let mut book = Book::builder("Deploy")
        .step("Gate", |s| {
            s.statement(Confirm {
                prompt: "Traffic looks healthy?".to_string(),
                rollback_on_decline: true,
            })
        })
        .step("Revert", |s| s.statement(Command::new("enable").undo("disable")))
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();

    assert_eq!(h.transport.executed(), vec!["disable"]);
}

#[test]
fn declined_confirmation_without_rollback_fails() {
    let toolbox = RecordingToolbox::new().confirm_with(false);
    let h = Harness::with(toolbox, ScriptedTransport::new());
    let mut book = Book::builder("Deploy")
        .step("Gate", |s| s.confirm("Proceed?").command("never"))
        .build()
        .unwrap();

    let err = h.run(&mut book, RunFlags::default()).unwrap_err();
    assert_eq!(failure_position(&err), "0.0");
    assert!(h.transport.executed().is_empty());
}

// ============================================================================
// Assert
// ============================================================================

#[test]
fn assert_passes_on_third_attempt() {
    let transport = ScriptedTransport::new()
        .reply("curl -f localhost", "", 1)
        .reply("curl -f localhost", "", 1);
    let h = Harness::with(RecordingToolbox::new(), transport);
    let mut book = Book::builder("Deploy")
        .step("Verify", |s| {
            s.statement(Assert::new("curl -f localhost").attempts(3).interval(5))
                .command("next")
        })
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();

    assert_eq!(h.transport.hosts_for("curl -f localhost").len(), 3);
    assert_eq!(h.sleeper.sleeps(), vec![Duration::from_secs(5); 2]);
    assert_eq!(h.transport.executed().last().map(String::as_str), Some("next"));
}

#[test]
fn exhausted_assert_dispatches_abort_statement_once() {
    let transport = ScriptedTransport::new()
        .reply("check", "", 1)
        .reply("check", "", 1);
    let h = Harness::with(RecordingToolbox::new(), transport);
    let mut book = Book::builder("Deploy")
        .step("Verify", |s| {
            s.statement(
                Assert::new("check")
                    .attempts(2)
                    .abort_statement(Command::new("page-oncall")),
            )
            .command("continue")
        })
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();

    assert_eq!(h.transport.executed(), vec!["check", "check", "page-oncall", "continue"]);
    assert_eq!(h.sleeper.sleeps().len(), 1);
}

#[test]
fn exhausted_assert_without_abort_fails_the_statement() {
    let transport = ScriptedTransport::new().reply("check", "", 1);
    let h = Harness::with(RecordingToolbox::new(), transport);
    let mut book = Book::builder("Deploy")
        .step("Verify", |s| s.statement(Assert::new("check").attempts(1)))
        .build()
        .unwrap();

    let err = h.run(&mut book, RunFlags::default()).unwrap_err();
    assert_eq!(failure_position(&err), "0.0");
    assert!(err.to_string().contains("after 1 attempt"));
    assert!(h.sleeper.sleeps().is_empty());
}

#[test]
fn assert_timeout_bounds_each_attempt() {
    let transport = ScriptedTransport::new()
        .reply("slow-check", "", 1)
        .reply("slow-check", "", 1);
    let h = Harness::with(RecordingToolbox::new(), transport);
    let mut book = Book::builder("Deploy")
        .step("Verify", |s| {
            s.statement(Assert::new("slow-check").timeout(7).attempts(3))
                .statement(Assert::new("quick-check").attempts(1))
        })
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();

    assert_eq!(
        h.transport.timeouts_for("slow-check"),
        vec![Some(Duration::from_secs(7)); 3]
    );
    assert_eq!(h.transport.timeouts_for("quick-check"), vec![None]);
}

#[test]
fn assert_counts_transport_errors_as_failed_attempts() {
    let transport = ScriptedTransport::new().fail(
        "check",
        RunbookError::TransportFailure {
            host: "local".to_string(),
            message: "connection reset".to_string(),
        },
    );
    let h = Harness::with(RecordingToolbox::new(), transport);
    let mut book = Book::builder("Deploy")
        .step("Verify", |s| s.statement(Assert::new("check").attempts(2)))
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();
    assert_eq!(h.transport.hosts_for("check").len(), 2);
}

#[test]
fn abort_statement_can_trigger_rollback() {
    let transport = ScriptedTransport::new().reply("healthy", "", 1);
    let h = Harness::with(RecordingToolbox::new(), transport);
    let mut book = Book::builder("Deploy")
        .step("Verify", |s| {
            s.statement(
                Assert::new("healthy")
                    .attempts(1)
                    .abort_statement(Rollback {
                        msg: "unhealthy".to_string(),
                    }),
            )
        })
        .step("Release", |s| s.statement(Command::new("switch").undo("switch back")))
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();
    assert_eq!(h.transport.executed(), vec!["healthy", "switch back"]);
}

// ============================================================================
// Hosts
// ============================================================================

#[test]
fn grouped_hosts_pause_between_waves() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .ssh_config(SshConfig {
            parallelization: Some(Parallelization {
                strategy: Strategy::Groups,
                ..Parallelization::default()
            }),
            ..SshConfig::with_servers(["a", "b", "c", "d", "e"])
        })
        .step("Ship", |s| s.command("deploy"))
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();

    let mut hosts = h.transport.hosts_for("deploy");
    hosts.sort();
    assert_eq!(hosts, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(h.sleeper.sleeps(), vec![Duration::from_secs(2); 2]);
}

#[test]
fn global_config_servers_apply_when_book_has_none() {
    let mut h = Harness::new();
    h.config.ssh = SshConfig::with_servers(["db1"]);
    let mut book = deploy_book();

    h.run(&mut book, RunFlags::default()).unwrap();

    assert_eq!(h.transport.hosts_for("a"), vec!["db1"]);
}

#[test]
fn step_ssh_options_wrap_the_command_line() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .ssh_config(SshConfig::with_servers(["web1"]))
        .step("Ship", |s| {
            s.ssh_config(SshConfig {
                path: Some("/srv/app".to_string()),
                ..SshConfig::default()
            })
            .command("make deploy")
            .statement(Command::new("echo $HOME").raw())
        })
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();

    let lines: Vec<(String, String)> = h
        .transport
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            TransportCall::Execute { host, line, .. } => Some((host, line)),
            _ => None,
        })
        .collect();
    assert_eq!(
        lines,
        vec![
            ("web1".to_string(), "cd /srv/app && sh -c 'make deploy'".to_string()),
            ("web1".to_string(), "echo $HOME".to_string()),
        ]
    );
}

#[test]
fn command_output_is_printed() {
    let transport = ScriptedTransport::new().reply("uptime", "up 3 days\n", 0);
    let h = Harness::with(RecordingToolbox::new(), transport);
    let mut book = Book::builder("Deploy")
        .step("Check", |s| s.command("uptime"))
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();
    assert!(h.toolbox.outputs().contains(&"up 3 days".to_string()));
}

// ============================================================================
// Modes
// ============================================================================

#[test]
fn noop_describes_without_effects_or_store() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .step("Ship", |s| s.command("deploy").wait(30).note("done"))
        .build()
        .unwrap();

    h.run(
        &mut book,
        RunFlags {
            noop: true,
            ..RunFlags::default()
        },
    )
    .unwrap();

    assert!(h.transport.calls().is_empty());
    assert!(h.sleeper.sleeps().is_empty());
    let outputs = h.toolbox.outputs();
    assert!(outputs.contains(&"[NOOP] **Run:** `deploy`".to_string()));
    assert!(outputs.contains(&"[NOOP] **Wait** 30s".to_string()));
    assert!(outputs.contains(&"done".to_string()));
    assert!(!h.store("Deploy").repo_path().exists());
}

#[test]
fn paranoid_mode_skips_declined_steps() {
    let toolbox = RecordingToolbox::new().confirm_with(false).confirm_with(true);
    let h = Harness::with(toolbox, ScriptedTransport::new());
    let mut book = deploy_book();

    h.run(
        &mut book,
        RunFlags {
            paranoid: true,
            ..RunFlags::default()
        },
    )
    .unwrap();

    assert_eq!(h.transport.executed(), vec!["b", "c", "d"]);
    assert_eq!(h.toolbox.prompts(), vec!["Run step 'Prepare'?", "Run step 'Ship'?"]);
    assert_eq!(h.toolbox.warnings(), vec!["Skipping step 'Prepare'"]);
}

#[test]
fn auto_ask_without_default_fails() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .step("Ask", |s| s.ask("Ticket?", "ticket"))
        .build()
        .unwrap();

    let err = h.run(&mut book, auto()).unwrap_err();
    assert!(err.to_string().contains("auto mode"));
}

#[test]
fn cancelled_run_is_journaled() {
    let h = Harness::new();
    h.cancel.cancel();
    let mut book = deploy_book();

    let err = h.run(&mut book, RunFlags::default()).unwrap_err();
    assert!(matches!(err, RunbookError::Cancelled));
    let last = h.store("Deploy").journal().read().unwrap().pop().unwrap();
    assert_eq!(last.action, JournalAction::RunCancelled);
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn layout_panes_receive_tmux_commands_and_are_cleaned_up() {
    let toolbox = RecordingToolbox::new().confirm_with(true);
    let h = Harness::with(toolbox, ScriptedTransport::new());
    let mut book = Book::builder("Deploy")
        .step("Panes", |s| {
            s.statement(Layout {
                name: Some("deploy".to_string()),
                structure: vec![LayoutNode::pane("runbook"), LayoutNode::pane("logs")],
                windows: Vec::new(),
            })
            .tmux_command("tail -f /var/log/app.log", "logs")
        })
        .build()
        .unwrap();

    h.run(&mut book, RunFlags::default()).unwrap();

    let calls = h.mux.calls();
    let send = calls
        .iter()
        .find(|call| call[0] == "send-keys")
        .expect("send-keys call");
    assert_eq!(send[2], "%1");
    assert_eq!(send[send.len() - 2], "tail -f /var/log/app.log");
    assert!(calls.contains(&vec!["kill-pane".to_string(), "-t".to_string(), "%1".to_string()]));
    assert!(!calls
        .iter()
        .any(|call| call[0] == "kill-pane" && call[2] == "%0"));

    let leftover: Vec<_> = std::fs::read_dir(h.config.store_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("runbook_layout_"))
        .collect();
    assert!(leftover.is_empty());
}

fn split_count(mux: &ScriptedMultiplexer) -> usize {
    mux.calls()
        .iter()
        .filter(|call| call[0] == "split-window")
        .count()
}

#[test]
fn each_layout_registers_its_own_panes() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .step("Logs", |s| {
            s.statement(Layout {
                structure: vec![LayoutNode::pane("runbook"), LayoutNode::pane("logs")],
                ..Layout::default()
            })
        })
        .step("Database", |s| {
            s.statement(Layout {
                structure: vec![LayoutNode::pane("runbook"), LayoutNode::pane("db")],
                ..Layout::default()
            })
            .tmux_command("psql", "db")
        })
        .build()
        .unwrap();

    h.run(&mut book, auto()).unwrap();

    assert_eq!(split_count(&h.mux), 2);
    let send = h
        .mux
        .calls()
        .into_iter()
        .find(|call| call[0] == "send-keys")
        .expect("send-keys call");
    assert_eq!(send[2], "%2");
}

#[test]
fn fresh_run_does_not_restore_a_previous_layout() {
    let h = Harness::new();
    let build = || {
        Book::builder("Deploy")
            .step("Panes", |s| {
                s.statement(Layout {
                    structure: vec![LayoutNode::pane("runbook"), LayoutNode::pane("logs")],
                    ..Layout::default()
                })
            })
            .build()
            .unwrap()
    };

    h.run(&mut build(), auto()).unwrap();
    assert_eq!(split_count(&h.mux), 1);

    h.run(&mut build(), auto()).unwrap();
    assert_eq!(split_count(&h.mux), 2);
}

#[test]
fn tmux_command_to_unknown_pane_fails() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .step("Panes", |s| s.tmux_command("ls", "missing"))
        .build()
        .unwrap();

    let err = h.run(&mut book, RunFlags::default()).unwrap_err();
    assert!(err.to_string().contains("unknown pane 'missing'"));
}

// ============================================================================
// Status
// ============================================================================

#[test]
fn status_reports_saved_progress() {
    let h = Harness::with(RecordingToolbox::new(), ScriptedTransport::new().reply("d", "", 1));
    let book = deploy_book();
    assert!(h.run(&mut deploy_book(), RunFlags::default()).is_err());

    let toolbox = RecordingToolbox::new();
    status(&book, &h.config, &toolbox).unwrap();

    let transcript = toolbox.transcript();
    assert!(transcript.contains("last completed 1.1 (command `c`)"));
    assert!(transcript.contains("Next: 1.2 (command `d`)"));
    assert!(transcript.contains("statement_failed"));
}

#[test]
fn status_without_progress() {
    let h = Harness::new();
    let toolbox = RecordingToolbox::new();
    status(&deploy_book(), &h.config, &toolbox).unwrap();
    assert_eq!(toolbox.outputs(), vec!["'Deploy': no run in progress"]);
}

#[test]
fn callback_errors_fail_the_statement() {
    let h = Harness::new();
    let mut book = Book::builder("Deploy")
        .step("Check", |s| {
            s.statement(Callback::new("guard", |_| {
                Err(RunbookError::UserError("guard tripped".to_string()))
            }))
        })
        .build()
        .unwrap();

    let err = h.run(&mut book, RunFlags::default()).unwrap_err();
    assert_eq!(failure_position(&err), "0.0");
    assert!(err.to_string().contains("guard tripped"));
}

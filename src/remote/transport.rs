//! Remote-shell transport: the seam between statements and hosts.

use super::command;
use super::config::{LOCAL_HOST, RemoteOptions};
use super::process::{self, ExecOutput};
use crate::cancel::CancelToken;
use crate::error::{HostFailure, Result, RunbookError};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// ssh exits with 255 when the connection itself failed.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// One command to run on one host.
#[derive(Debug, Clone)]
pub struct ExecRequest<'a> {
    pub cmd: &'a str,
    pub raw: bool,
    pub options: &'a RemoteOptions,
    /// Kill the command after this long.
    pub timeout: Option<Duration>,
}

impl ExecRequest<'_> {
    /// The command line as it will be handed to the remote shell.
    pub fn command_line(&self) -> String {
        command::build(self.cmd, self.raw, self.options)
    }
}

/// Executes commands and copies files on hosts.
///
/// Implementations must be shareable across the threads of a parallel wave.
pub trait Transport: Sync {
    fn execute(&self, host: &str, request: &ExecRequest<'_>, cancel: &CancelToken) -> Result<ExecOutput>;

    fn upload(&self, host: &str, from: &Path, to: &str, cancel: &CancelToken) -> Result<()>;

    fn download(&self, host: &str, from: &str, to: &Path, cancel: &CancelToken) -> Result<()>;
}

/// Turn an unsuccessful run into the host-level error the dispatcher collects.
pub fn check_output(host: &str, output: ExecOutput) -> Result<ExecOutput> {
    if output.success() {
        return Ok(output);
    }
    if host != LOCAL_HOST && output.exit_code == Some(SSH_CONNECTION_FAILURE) {
        return Err(RunbookError::TransportFailure {
            host: host.to_string(),
            message: output.failure_reason(),
        });
    }
    Err(RunbookError::HostFailures(vec![HostFailure {
        host: host.to_string(),
        message: output.failure_reason(),
    }]))
}

/// `ssh`/`scp` for remote hosts, `sh` and plain copies for [`LOCAL_HOST`].
#[derive(Debug, Clone)]
pub struct SshTransport {
    ssh_binary: String,
    scp_binary: String,
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new("ssh", "scp")
    }
}

impl SshTransport {
    pub fn new(ssh_binary: impl Into<String>, scp_binary: impl Into<String>) -> Self {
        Self {
            ssh_binary: ssh_binary.into(),
            scp_binary: scp_binary.into(),
        }
    }

    fn ssh_command(&self, host: &str, line: &str) -> Command {
        let target = HostSpec::parse(host);
        let mut command = Command::new(&self.ssh_binary);
        command.args(["-o", "BatchMode=yes"]);
        if let Some(port) = target.port {
            command.arg("-p").arg(port);
        }
        command.arg(target.destination).arg(line);
        command
    }

    fn scp(&self, args: [String; 2], port: Option<&str>, host: &str, cancel: &CancelToken) -> Result<()> {
        let mut command = Command::new(&self.scp_binary);
        command.args(["-o", "BatchMode=yes", "-q"]);
        if let Some(port) = port {
            command.arg("-P").arg(port);
        }
        command.args(args);

        let output = process::run(command, None, cancel)?;
        if output.success() {
            Ok(())
        } else {
            Err(RunbookError::TransportFailure {
                host: host.to_string(),
                message: format!("scp failed: {}", output.failure_reason()),
            })
        }
    }
}

impl Transport for SshTransport {
    fn execute(&self, host: &str, request: &ExecRequest<'_>, cancel: &CancelToken) -> Result<ExecOutput> {
        let line = request.command_line();
        tracing::debug!(host, command = %line, "executing");

        let command = if host == LOCAL_HOST {
            let mut command = Command::new("sh");
            command.arg("-c").arg(&line);
            command
        } else {
            self.ssh_command(host, &line)
        };
        process::run(command, request.timeout, cancel)
    }

    fn upload(&self, host: &str, from: &Path, to: &str, cancel: &CancelToken) -> Result<()> {
        tracing::debug!(host, from = %from.display(), to, "uploading");
        if host == LOCAL_HOST {
            return copy_local(from, Path::new(to));
        }
        let target = HostSpec::parse(host);
        self.scp(
            [
                from.to_string_lossy().into_owned(),
                format!("{}:{}", target.destination, to),
            ],
            target.port,
            host,
            cancel,
        )
    }

    fn download(&self, host: &str, from: &str, to: &Path, cancel: &CancelToken) -> Result<()> {
        tracing::debug!(host, from, to = %to.display(), "downloading");
        if host == LOCAL_HOST {
            return copy_local(Path::new(from), to);
        }
        let target = HostSpec::parse(host);
        self.scp(
            [
                format!("{}:{}", target.destination, from),
                to.to_string_lossy().into_owned(),
            ],
            target.port,
            host,
            cancel,
        )
    }
}

fn copy_local(from: &Path, to: &Path) -> Result<()> {
    std::fs::copy(from, to).map(|_| ()).map_err(|e| RunbookError::TransportFailure {
        host: LOCAL_HOST.to_string(),
        message: format!("failed to copy '{}' to '{}': {}", from.display(), to.display(), e),
    })
}

/// `[user@]host[:port]`
#[derive(Debug, PartialEq, Eq)]
struct HostSpec<'a> {
    destination: &'a str,
    port: Option<&'a str>,
}

impl<'a> HostSpec<'a> {
    fn parse(host: &'a str) -> Self {
        match host.rsplit_once(':') {
            Some((destination, port))
                if !destination.contains(':')
                    && !port.is_empty()
                    && port.chars().all(|c| c.is_ascii_digit()) =>
            {
                Self {
                    destination,
                    port: Some(port),
                }
            }
            _ => Self {
                destination: host,
                port: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn host_spec_splits_numeric_port() {
        assert_eq!(
            HostSpec::parse("deploy@web1:2222"),
            HostSpec {
                destination: "deploy@web1",
                port: Some("2222")
            }
        );
        assert_eq!(HostSpec::parse("web1").port, None);
        assert_eq!(HostSpec::parse("fe80::1").destination, "fe80::1");
    }

    #[test]
    fn check_output_classifies_failures() {
        let ok = ExecOutput {
            exit_code: Some(0),
            ..ExecOutput::default()
        };
        assert!(check_output("web1", ok).is_ok());

        let unreachable = ExecOutput {
            exit_code: Some(255),
            ..ExecOutput::default()
        };
        assert!(matches!(
            check_output("web1", unreachable),
            Err(RunbookError::TransportFailure { .. })
        ));

        let failed = ExecOutput {
            exit_code: Some(1),
            stderr: "no such file".to_string(),
            ..ExecOutput::default()
        };
        match check_output("web1", failed) {
            Err(RunbookError::HostFailures(failures)) => {
                assert_eq!(failures[0].message, "exit status 1: no such file");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ssh_command_passes_wrapped_line_as_single_argument() {
        let transport = SshTransport::default();
        let command = transport.ssh_command("web1:2200", "sh -c 'uptime'");
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(command.get_program().to_string_lossy(), "ssh");
        assert_eq!(args, vec!["-o", "BatchMode=yes", "-p", "2200", "web1", "sh -c 'uptime'"]);
    }

    #[cfg(unix)]
    #[test]
    fn local_execution_uses_the_wrapper() {
        let mut options = RemoteOptions::default();
        options.env.insert("greeting".to_string(), "it's me".to_string());
        let request = ExecRequest {
            cmd: "echo \"$GREETING\"",
            raw: false,
            options: &options,
            timeout: None,
        };
        let output = SshTransport::default()
            .execute(LOCAL_HOST, &request, &CancelToken::new())
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "it's me\n");
    }

    #[test]
    fn local_transfers_copy_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("b.txt");
        std::fs::write(&src, "payload").unwrap();

        let transport = SshTransport::default();
        transport
            .upload(LOCAL_HOST, &src, &dst.to_string_lossy(), &CancelToken::new())
            .unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "payload");

        let back = dir.path().join("c.txt");
        transport
            .download(LOCAL_HOST, &dst.to_string_lossy(), &back, &CancelToken::new())
            .unwrap();
        assert_eq!(std::fs::read_to_string(&back).unwrap(), "payload");
    }
}

//! Shell wrapping of commands for remote execution.
//!
//! Non-raw commands are wrapped as
//! `[cd P && ][umask U && ][sudo -u USER -- ][sg GROUP -c ...][env K=V ...] sh -c <cmd>`
//! with every user-supplied token quoted by `shell_words`.

use super::config::RemoteOptions;
use shell_words::quote;

/// The command line sent to a host.
pub fn build(cmd: &str, raw: bool, options: &RemoteOptions) -> String {
    if raw {
        return cmd.to_string();
    }

    let mut inner = Vec::new();
    if !options.env.is_empty() {
        inner.push("env".to_string());
        for (key, value) in &options.env {
            inner.push(quote(&format!("{}={}", key.to_uppercase(), value)).into_owned());
        }
    }
    inner.push("sh".to_string());
    inner.push("-c".to_string());
    inner.push(quote(cmd).into_owned());
    let mut body = inner.join(" ");

    if let Some(group) = &options.group {
        body = format!("sg {} -c {}", quote(group), quote(&body));
    }
    if let Some(user) = &options.user {
        body = format!("sudo -u {} -- {}", quote(user), body);
    }
    if let Some(umask) = &options.umask {
        body = format!("umask {} && {}", quote(umask), body);
    }
    if let Some(path) = &options.path {
        body = format!("cd {} && {}", quote(path), body);
    }
    body
}

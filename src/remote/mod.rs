//! Remote execution: ssh settings, command wrapping, host fan-out and the
//! transport that actually reaches hosts.

pub mod command;
mod config;
pub mod process;
pub mod strategy;
pub mod transport;


pub use config::{LOCAL_HOST, Parallelization, RemoteOptions, SshConfig, Strategy};
pub use process::ExecOutput;
pub use strategy::dispatch;
pub use transport::{ExecRequest, SshTransport, Transport, check_output};

//! Exit code constants for the runbook CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, unreadable files, declined prompts)
//! - 2: Validation failure (malformed book or config)
//! - 3: Statement failure (a statement aborted the walk)
//! - 4: Transport failure (a host could not be reached)
//! - 130: Cancelled by the operator

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, unreadable input, or an invalid store state.
pub const USER_ERROR: i32 = 1;

/// Validation failure: the book or configuration is malformed.
pub const VALIDATION_FAILURE: i32 = 2;

/// A statement failed and the walk was aborted.
pub const STATEMENT_FAILURE: i32 = 3;

/// A remote host or the terminal multiplexer could not be driven.
pub const TRANSPORT_FAILURE: i32 = 4;

/// The run was interrupted (128 + SIGINT).
pub const CANCELLED: i32 = 130;

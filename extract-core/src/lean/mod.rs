//! Lean 4 REPL integration.
//!
//! This module drives the leanprover-community/repl JSON protocol for the
//! extraction engine.
//!
//! ## Components
//!
//! - **types**: Commands, responses and compiler messages
//! - **session**: Subprocess lifecycle and response framing

pub mod session;
pub mod types;

pub use session::{Session, SessionConfig, DEFAULT_MAX_READ_ATTEMPTS};
pub use types::{has_errors, LeanCommand, LeanMessage, LeanResponse, MessageSeverity, Position};

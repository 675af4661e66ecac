//! Typed error kinds for the bridge core.
//!
//! Mirrors the five failure categories the bridge distinguishes: a
//! recoverable protocol error (command completed with a failure
//! terminator), a recoverable I/O hiccup, transport loss, broker loss, and
//! a programmer-invariant violation. Binaries convert these to
//! `anyhow::Error` at the top level for reporting.

use thiserror::Error;

/// Errors surfaced by the bridge core.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A command completed with a non-`OK` terminator (`ERROR`, `FAIL`, `+CME ERROR: …`).
    #[error("command {command:?} failed: {terminator}")]
    Protocol { command: String, terminator: String },

    /// Underlying I/O failure that isn't one of the named categories below.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport is considered dead: five consecutive timeouts, EOF on
    /// read, or a short write. Graceful-but-final: no more command
    /// retries, proceed straight to draining.
    #[error("transport lost: {0}")]
    TransportLost(String),

    /// The MQTT broker connection was lost. There is no point publishing
    /// further, so this short-circuits the draining path.
    #[error("broker connection lost: {0}")]
    BrokerLost(String),

    /// A programmer invariant was violated (buffer overrun, cache
    /// desync). Always a bug; the process should abort.
    #[error("fatal invariant violation: {0}")]
    Fatal(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

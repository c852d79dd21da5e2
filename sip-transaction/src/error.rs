//! Errors produced by the transaction engine (`spec.md` §7 "Timer
//! expirations", "Transport errors").

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    /// A message handed to the engine had no transaction key material (no
    /// Via, or a Via with no branch).
    #[error("cannot derive a transaction key: {0}")]
    NoKey(String),

    /// The caller tried to create a transaction whose key already exists.
    #[error("transaction already exists for key {0}")]
    AlreadyExists(String),

    /// No transaction matches the given key.
    #[error("no transaction for key {0}")]
    NotFound(String),

    /// The requested state transition is not valid from the transaction's
    /// current state (e.g. sending a 1xx from Completed).
    #[error("invalid transition for transaction {key}: {from:?} -> {attempted}")]
    InvalidTransition { key: String, from: String, attempted: String },

    /// The transport failed to deliver a message; the transaction is marked
    /// delivery-failed and this is surfaced to the timeout callback, not
    /// propagated as a panic (`spec.md` §4.5 "A failed send ... does not
    /// panic").
    #[error("send failed for transaction {0}: {1}")]
    SendFailed(String, String),

    #[error(transparent)]
    Core(#[from] sip_core::Error),
}

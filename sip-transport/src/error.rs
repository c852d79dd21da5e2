//! Errors produced by the transport layer (`spec.md` §7 "Transport errors").

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    /// No registered or on-demand channel could reach the destination
    /// (`spec.md` §7: "send-host-not-found -> transaction delivery-failed").
    #[error("no channel available to reach {0}")]
    NoRoute(String),

    /// `send_secure` was called against a channel that isn't TLS/WSS.
    #[error("channel {0} does not support secure send")]
    NotSecure(String),

    /// The underlying socket/stream operation failed (`spec.md` §7
    /// "send-socket-error: connection dead; mark transaction failed").
    #[error("socket error on channel {0}: {1}")]
    Socket(String, std::io::Error),

    /// A channel ID was registered twice.
    #[error("channel {0} is already registered")]
    DuplicateChannel(String),

    /// No channel with this ID is registered.
    #[error("no such channel: {0}")]
    UnknownChannel(String),

    /// `spec.md` §5 "Cancellation": the transport-wide or per-send token
    /// was already cancelled.
    #[error("send cancelled")]
    Cancelled,

    /// The transport has been shut down and is no longer accepting sends.
    #[error("transport is shut down")]
    ShuttingDown,

    #[error(transparent)]
    Core(#[from] sip_core::Error),

    #[error(transparent)]
    Transaction(#[from] sip_transaction::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Socket(String::new(), e)
    }
}

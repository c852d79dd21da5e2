//! Error types for SIP message parsing, serialization and validation.
//!
//! Every fallible operation in this crate returns a `Result<T>` built on a
//! single [`Error`] enum. Parse failures are values, not panics: a malformed
//! URI, header or message always produces an `Error` variant that names the
//! field at fault so a caller at the transport boundary can turn it into the
//! appropriate SIP error response (400, 420, 483, 513 — see `spec.md` §7).

use thiserror::Error as ThisError;

/// A type alias for handling `Result`s with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, validating or serializing SIP
/// messages, URIs, headers and digest-authentication records.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A URI failed to parse; `field` names the offending component
    /// (scheme, host, port, user, parameter).
    #[error("invalid SIP URI: {field}: {message}")]
    InvalidUri { field: String, message: String },

    /// A header line or header value failed to parse.
    #[error("invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    /// A header that must occur at most once occurred more than once
    /// (e.g. Refer-To, Refer-Sub).
    #[error("header {0} must not be repeated")]
    DuplicateHeader(String),

    /// The request or status line failed to parse.
    #[error("invalid start line: {0}")]
    InvalidStartLine(String),

    /// Content-Length did not match the actual body length on a stream
    /// transport.
    #[error("Content-Length mismatch: header says {expected}, body is {actual} bytes")]
    ContentLengthMismatch { expected: usize, actual: usize },

    /// A request had no Via header.
    #[error("request has no Via header")]
    MissingVia,

    /// The message exceeded the maximum allowed size (spec §4.3: 65535 bytes).
    #[error("message too large: {0} bytes")]
    MessageTooLarge(usize),

    /// Max-Forwards reached zero (transport turns this into a 483 response).
    #[error("too many hops")]
    TooManyHops,

    /// The request's Require header named an extension this stack does not
    /// support (transport turns this into a 420 with Unsupported listing
    /// `unsupported`).
    #[error("unsupported extensions required: {0:?}")]
    UnsupportedRequire(Vec<String>),

    /// A digest-authentication header or parameter was malformed.
    #[error("invalid digest auth: {0}")]
    InvalidDigest(String),

    /// Generic parameter-bag parse failure.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// An integer field (CSeq, Max-Forwards, Expires, nonce-count, ...)
    /// failed to parse.
    #[error("invalid integer in {field}: {source}")]
    InvalidInteger {
        field: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Catch-all for malformed input that doesn't fit a more specific
    /// variant.
    #[error("{0}")]
    Malformed(String),
}

impl Error {
    pub fn invalid_uri(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidUri { field: field.into(), message: message.into() }
    }

    pub fn invalid_header(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidHeader { name: name.into(), message: message.into() }
    }
}

//! SIP status codes (`spec.md` §3 "Response": "Status code (integer),
//! reason phrase... derived status class").

use std::fmt;

/// The six status classes defined by RFC 3261 §21.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Provisional,
    Success,
    Redirection,
    ClientError,
    ServerError,
    GlobalFailure,
}

/// A bare numeric status code. Kept as a plain `u16` wrapper (rather than a
/// closed enum) since proxies and extensions routinely emit codes this
/// stack has never heard of and must still be able to round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const TRYING: StatusCode = StatusCode(100);
    pub const RINGING: StatusCode = StatusCode(180);
    pub const OK: StatusCode = StatusCode(200);
    pub const MOVED_TEMPORARILY: StatusCode = StatusCode(302);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const PROXY_AUTHENTICATION_REQUIRED: StatusCode = StatusCode(407);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const CALL_TRANSACTION_DOES_NOT_EXIST: StatusCode = StatusCode(481);
    pub const BUSY_HERE: StatusCode = StatusCode(486);
    pub const REQUEST_TERMINATED: StatusCode = StatusCode(487);
    pub const TOO_MANY_HOPS: StatusCode = StatusCode(483);
    pub const BAD_EXTENSION: StatusCode = StatusCode(420);
    pub const MESSAGE_TOO_LARGE: StatusCode = StatusCode(513);

    pub fn class(&self) -> StatusClass {
        match self.0 / 100 {
            1 => StatusClass::Provisional,
            2 => StatusClass::Success,
            3 => StatusClass::Redirection,
            4 => StatusClass::ClientError,
            5 => StatusClass::ServerError,
            _ => StatusClass::GlobalFailure,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.class() == StatusClass::Provisional
    }

    pub fn is_success(&self) -> bool {
        self.class() == StatusClass::Success
    }

    /// `true` for the 3xx-6xx range the transaction engine treats as "a
    /// final non-2xx response" (`spec.md` §4.5 INVITE client/server).
    pub fn is_final_non_success(&self) -> bool {
        self.0 >= 300
    }

    pub fn is_final(&self) -> bool {
        self.0 >= 200
    }

    /// The RFC 3261 §21 default reason phrase, or a generic class-level
    /// phrase for codes the table doesn't name explicitly.
    pub fn default_reason_phrase(&self) -> &'static str {
        match self.0 {
            100 => "Trying",
            180 => "Ringing",
            181 => "Call Is Being Forwarded",
            182 => "Queued",
            183 => "Session Progress",
            200 => "OK",
            202 => "Accepted",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Moved Temporarily",
            305 => "Use Proxy",
            380 => "Alternative Service",
            400 => "Bad Request",
            401 => "Unauthorized",
            402 => "Payment Required",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            407 => "Proxy Authentication Required",
            408 => "Request Timeout",
            410 => "Gone",
            413 => "Request Entity Too Large",
            414 => "Request-URI Too Long",
            415 => "Unsupported Media Type",
            416 => "Unsupported URI Scheme",
            420 => "Bad Extension",
            421 => "Extension Required",
            423 => "Interval Too Brief",
            480 => "Temporarily Unavailable",
            481 => "Call/Transaction Does Not Exist",
            482 => "Loop Detected",
            483 => "Too Many Hops",
            484 => "Address Incomplete",
            485 => "Ambiguous",
            486 => "Busy Here",
            487 => "Request Terminated",
            488 => "Not Acceptable Here",
            491 => "Request Pending",
            493 => "Undecipherable",
            500 => "Server Internal Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Server Time-out",
            505 => "Version Not Supported",
            513 => "Message Too Large",
            600 => "Busy Everywhere",
            603 => "Decline",
            604 => "Does Not Exist Anywhere",
            606 => "Not Acceptable",
            _ => match self.class() {
                StatusClass::Provisional => "Session Progress",
                StatusClass::Success => "OK",
                StatusClass::Redirection => "Multiple Choices",
                StatusClass::ClientError => "Bad Request",
                StatusClass::ServerError => "Server Internal Error",
                StatusClass::GlobalFailure => "Global Failure",
            },
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.default_reason_phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_first_digit() {
        assert_eq!(StatusCode(100).class(), StatusClass::Provisional);
        assert_eq!(StatusCode(404).class(), StatusClass::ClientError);
        assert!(StatusCode(404).is_final());
        assert!(!StatusCode(100).is_final());
    }

    #[test]
    fn known_codes_have_rfc_default_phrase() {
        assert_eq!(StatusCode::BUSY_HERE.default_reason_phrase(), "Busy Here");
    }
}

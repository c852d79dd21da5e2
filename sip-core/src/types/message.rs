//! Request/response wrappers around the header model plus body framing
//! (`spec.md` §3 "Request", "Response", §4.3).

use std::fmt;

use crate::types::endpoint::{ConnectionId, SipEndpoint};
use crate::types::header::HeaderBlock;
use crate::types::method::Method;
use crate::types::status::{StatusClass, StatusCode};
use crate::types::uri::Uri;

/// A SIP request: method, request-URI, headers, optional body, plus the
/// transport hints `spec.md` §3 calls for ("received-on/received-from
/// endpoints, send-from channel and connection hints").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub request_uri: Uri,
    pub headers: HeaderBlock,
    pub body: Vec<u8>,
    pub received_on: Option<SipEndpoint>,
    pub received_from: Option<SipEndpoint>,
    pub send_from_channel: Option<String>,
    pub send_from_connection: Option<ConnectionId>,
}

impl Request {
    pub fn new(method: Method, request_uri: Uri) -> Self {
        Self {
            method,
            request_uri,
            headers: HeaderBlock::new(),
            body: Vec::new(),
            received_on: None,
            received_from: None,
            send_from_channel: None,
            send_from_connection: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialized start line: `<METHOD> <request-URI> SIP/2.0`.
    pub fn start_line(&self) -> String {
        format!("{} {} SIP/2.0", self.method, self.request_uri)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.start_line().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.headers.serialize(true).as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.serialize()))
    }
}

/// A SIP response: status code, reason phrase, headers, optional body, plus
/// transport hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub reason: String,
    pub headers: HeaderBlock,
    pub body: Vec<u8>,
    pub received_on: Option<SipEndpoint>,
    pub received_from: Option<SipEndpoint>,
    pub send_from_channel: Option<String>,
    pub send_from_connection: Option<ConnectionId>,
}

impl Response {
    /// Builds a response using the status code's RFC 3261 §21 default reason
    /// phrase (`spec.md` §2 "Default reason phrases").
    pub fn new(status: StatusCode) -> Self {
        let reason = status.default_reason_phrase().to_string();
        Self {
            status,
            reason,
            headers: HeaderBlock::new(),
            body: Vec::new(),
            received_on: None,
            received_from: None,
            send_from_channel: None,
            send_from_connection: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn class(&self) -> StatusClass {
        self.status.class()
    }

    pub fn is_provisional(&self) -> bool {
        self.status.is_provisional()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Serialized start line: `SIP/2.0 <code> <reason>`.
    pub fn start_line(&self) -> String {
        format!("SIP/2.0 {} {}", self.status.0, self.reason)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.start_line().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.headers.serialize(false).as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.serialize()))
    }
}

/// Either half of the request/response pair, as produced by the top-level
/// parser (`spec.md` §4.3: "First line distinguishes request vs. response by
/// prefix").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn headers(&self) -> &HeaderBlock {
        match self {
            Message::Request(r) => &r.headers,
            Message::Response(r) => &r.headers,
        }
    }

    pub fn headers_mut(&mut self) -> &mut HeaderBlock {
        match self {
            Message::Request(r) => &mut r.headers,
            Message::Response(r) => &mut r.headers,
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            Message::Request(r) => &r.body,
            Message::Response(r) => &r.body,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response(_))
    }

    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Message::Request(r) => Some(r),
            Message::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Message::Response(r) => Some(r),
            Message::Request(_) => None,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Message::Request(r) => r.serialize(),
            Message::Response(r) => r.serialize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_start_line_format() {
        let req = Request::new(Method::Invite, "sip:bob@example.com".parse().unwrap());
        assert_eq!(req.start_line(), "INVITE sip:bob@example.com SIP/2.0");
    }

    #[test]
    fn response_uses_default_reason_phrase() {
        let resp = Response::new(StatusCode::RINGING);
        assert_eq!(resp.start_line(), "SIP/2.0 180 Ringing");
    }

    #[test]
    fn response_reason_can_be_overridden() {
        let resp = Response::new(StatusCode::OK).with_reason("Everything's Fine");
        assert_eq!(resp.start_line(), "SIP/2.0 200 Everything's Fine");
    }

    #[test]
    fn message_dispatches_to_request_or_response() {
        let msg = Message::Request(Request::new(Method::Bye, "sip:bob@example.com".parse().unwrap()));
        assert!(msg.is_request());
        assert!(msg.as_response().is_none());
    }

    /// RFC 3261 §20.22: Max-Forwards is a request-only header; a response's
    /// header block must never carry one even though the field exists on
    /// the shared `HeaderBlock`.
    #[test]
    fn response_serialization_never_carries_max_forwards() {
        let resp = Response::new(StatusCode::OK);
        let serialized = String::from_utf8(resp.serialize()).unwrap();
        assert!(!serialized.contains("Max-Forwards"));
    }

    /// `spec.md` §4.2/§8: Max-Forwards absent (`-1` sentinel) must stay
    /// absent through a serialize, not default to 70 on the wire.
    #[test]
    fn request_with_absent_max_forwards_omits_the_header() {
        let req = Request::new(Method::Options, "sip:bob@example.com".parse().unwrap());
        assert_eq!(req.headers.max_forwards, -1);
        let serialized = String::from_utf8(req.serialize()).unwrap();
        assert!(!serialized.contains("Max-Forwards"));
    }

    #[test]
    fn request_with_present_max_forwards_emits_it() {
        let mut req = Request::new(Method::Options, "sip:bob@example.com".parse().unwrap());
        req.headers.max_forwards = 70;
        let serialized = String::from_utf8(req.serialize()).unwrap();
        assert!(serialized.contains("Max-Forwards: 70"));
    }
}

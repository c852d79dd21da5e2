//! Top-level message framing and parse (`spec.md` §4.3).

use crate::error::{Error, Result};
use crate::parser::headers::parse_header_block;
use crate::types::message::{Message, Request, Response};
use crate::types::method::Method;
use crate::types::status::StatusCode;
use crate::types::uri::Uri;

/// The maximum message size this crate will attempt to parse (`spec.md`
/// §4.3: "A message larger than 65,535 bytes is rejected with 513").
pub const MAX_MESSAGE_SIZE: usize = 65_535;

/// `spec.md` §4.3 / §6 STUN co-tenancy: a payload whose first byte is `0x00`
/// or `0x01` and whose length is at least 20 bytes is a STUN message, not a
/// SIP one, and should be routed to the STUN collaborator instead of being
/// handed to [`parse_message`].
pub fn is_stun_payload(bytes: &[u8]) -> bool {
    bytes.len() >= 20 && matches!(bytes[0], 0x00 | 0x01)
}

/// `spec.md` §4.6 inbound dispatch step 3: an empty payload or a bare CRLF
/// is a connection keep-alive, not a message, and should be silently
/// dropped rather than parsed.
pub fn is_keepalive(bytes: &[u8]) -> bool {
    bytes.is_empty() || bytes == b"\r\n"
}

fn find_header_boundary(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
        .or_else(|| bytes.windows(2).position(|w| w == b"\n\n").map(|i| i + 2))
}

fn split_first_line(text: &str) -> (&str, &str) {
    match text.find("\r\n").or_else(|| text.find('\n')) {
        Some(idx) => {
            let line_end = idx;
            let rest_start = if text[idx..].starts_with("\r\n") { idx + 2 } else { idx + 1 };
            (&text[..line_end], &text[rest_start..])
        }
        None => (text, ""),
    }
}

fn parse_request_line(line: &str) -> Result<(Method, Uri)> {
    let mut parts = line.trim_end().splitn(3, ' ');
    let method_str = parts.next().ok_or_else(|| Error::InvalidStartLine(line.to_string()))?;
    let uri_str = parts.next().ok_or_else(|| Error::InvalidStartLine(line.to_string()))?;
    let version = parts.next().ok_or_else(|| Error::InvalidStartLine(line.to_string()))?;
    if !version.starts_with("SIP/") {
        return Err(Error::InvalidStartLine(line.to_string()));
    }
    let method: Method = method_str.parse()?;
    let uri: Uri = uri_str.parse()?;
    Ok((method, uri))
}

fn parse_status_line(line: &str) -> Result<(StatusCode, String)> {
    let line = line.trim_end();
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(|| Error::InvalidStartLine(line.to_string()))?;
    if !version.starts_with("SIP/") {
        return Err(Error::InvalidStartLine(line.to_string()));
    }
    let code_str = parts.next().ok_or_else(|| Error::InvalidStartLine(line.to_string()))?;
    let reason = parts.next().unwrap_or("").to_string();
    let code: u16 = code_str
        .parse()
        .map_err(|_| Error::InvalidStartLine(format!("non-numeric status code: {code_str:?}")))?;
    Ok((StatusCode(code), reason))
}

/// Parses a complete message buffer: first line, header block, and body
/// framed by Content-Length (falling back to "rest of buffer" when absent,
/// matching a UDP datagram's self-framing). Callers must check
/// [`is_stun_payload`] and [`is_keepalive`] and enforce [`MAX_MESSAGE_SIZE`]
/// before calling this (`spec.md` §4.3, §4.6 inbound dispatch steps 1-3).
pub fn parse_message(bytes: &[u8]) -> Result<Message> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        tracing::warn!(size = bytes.len(), max = MAX_MESSAGE_SIZE, "rejecting oversized message");
        return Err(Error::MessageTooLarge(bytes.len()));
    }

    let boundary = find_header_boundary(bytes).unwrap_or(bytes.len());
    let head = std::str::from_utf8(&bytes[..boundary]).map_err(|e| Error::Malformed(e.to_string()))?;
    let body_bytes = &bytes[boundary.min(bytes.len())..];

    let (start_line, header_block) = split_first_line(head);
    let headers = parse_header_block(header_block)?;

    let body_len_declared = headers.content_length;
    let body: Vec<u8> = match body_len_declared {
        Some(len) if len <= body_bytes.len() => body_bytes[..len].to_vec(),
        Some(len) => {
            return Err(Error::ContentLengthMismatch { expected: len, actual: body_bytes.len() });
        }
        None => body_bytes.to_vec(),
    };

    if start_line.trim_start().starts_with("SIP/") {
        let (status, reason) = parse_status_line(start_line)?;
        tracing::trace!(status = status.0, "parsed response");
        let mut response = Response::new(status);
        response.reason = reason;
        response.headers = headers;
        response.body = body;
        Ok(Message::Response(response))
    } else {
        let (method, uri) = parse_request_line(start_line)?;
        if !headers.has_via() {
            tracing::warn!(%method, "rejecting request with no Via header");
            return Err(Error::MissingVia);
        }
        tracing::trace!(%method, %uri, "parsed request");
        let mut request = Request::new(method, uri);
        request.headers = headers;
        request.body = body;
        Ok(Message::Request(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(s: &str) -> Vec<u8> {
        s.replace('\n', "\r\n").into_bytes()
    }

    #[test]
    fn parses_a_minimal_invite_request() {
        let msg = raw(
            "INVITE sip:bob@biloxi.example.com SIP/2.0\n\
Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds\n\
To: Bob <sip:bob@biloxi.example.com>\n\
From: Alice <sip:alice@atlanta.example.com>;tag=1928301774\n\
Call-ID: a84b4c76e66710@pc33.atlanta.example.com\n\
CSeq: 314159 INVITE\n\
Content-Length: 0\n\
\n",
        );
        let parsed = parse_message(&msg).unwrap();
        let req = parsed.as_request().unwrap();
        assert_eq!(req.method, Method::Invite);
        assert_eq!(req.headers.via.len(), 1);
        assert_eq!(req.headers.call_id.as_deref(), Some("a84b4c76e66710@pc33.atlanta.example.com"));
    }

    #[test]
    fn parses_a_response_and_preserves_reason() {
        let msg = raw(
            "SIP/2.0 486 Busy Here\n\
Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds\n\
Content-Length: 0\n\
\n",
        );
        let parsed = parse_message(&msg).unwrap();
        let resp = parsed.as_response().unwrap();
        assert_eq!(resp.status, StatusCode(486));
        assert_eq!(resp.reason, "Busy Here");
    }

    #[test]
    fn request_without_via_is_rejected() {
        let msg = raw("OPTIONS sip:bob@biloxi.example.com SIP/2.0\nContent-Length: 0\n\n");
        assert!(matches!(parse_message(&msg), Err(Error::MissingVia)));
    }

    #[test]
    fn oversized_message_is_rejected() {
        let mut msg = raw("OPTIONS sip:bob@biloxi.example.com SIP/2.0\nVia: SIP/2.0/UDP h;branch=z9hG4bK1\nContent-Length: 0\n\n");
        msg.extend(std::iter::repeat(b'x').take(MAX_MESSAGE_SIZE));
        assert!(matches!(parse_message(&msg), Err(Error::MessageTooLarge(_))));
    }

    #[test]
    fn content_length_short_of_declared_is_a_mismatch() {
        let msg = raw(
            "OPTIONS sip:bob@biloxi.example.com SIP/2.0\nVia: SIP/2.0/UDP h;branch=z9hG4bK1\nContent-Length: 10\n\n",
        );
        assert!(matches!(parse_message(&msg), Err(Error::ContentLengthMismatch { expected: 10, actual: 0 })));
    }

    #[test]
    fn stun_and_keepalive_detection() {
        assert!(is_stun_payload(&[0x00, 0x01, 0x00, 0x00, 0x21, 0x12, 0xA4, 0x42, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        assert!(!is_stun_payload(b"INVITE sip:bob@example.com SIP/2.0"));
        assert!(is_keepalive(b""));
        assert!(is_keepalive(b"\r\n"));
    }
}

//! The header block: a typed record of every recognized SIP header plus an
//! ordered list of anything this crate doesn't recognize (`spec.md` §3
//! "Header block", §4.2).

use std::fmt::Write as _;

use crate::auth::DigestRecord;
use crate::types::contact::ContactList;
use crate::types::extensions::ExtensionSet;
use crate::types::method::{CSeq, Method};
use crate::types::reason::Reason;
use crate::types::replaces::Replaces;
use crate::types::route::RouteSet;
use crate::types::user_field::UserField;
use crate::types::via::Via;

/// `RAck: <RSeq> <CSeq-number> <method>` (RFC 3262), acknowledging a
/// reliable provisional response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RAck {
    pub rseq: u32,
    pub cseq: u32,
    pub method: Method,
}

impl std::fmt::Display for RAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.rseq, self.cseq, self.method)
    }
}

/// The fully typed contents of a SIP message's header section. Every field
/// the data model names in `spec.md` §3 has a home here; anything this crate
/// does not recognize lands in `unknown`, preserved in arrival order so a
/// proxy can forward it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    /// Top-first; the first entry is the most recent hop (`spec.md` §3
    /// invariant "Vias are stored top-first").
    pub via: Vec<Via>,
    pub from: Option<UserField>,
    pub to: Option<UserField>,
    pub call_id: Option<String>,
    pub cseq: Option<CSeq>,
    /// `-1` is the sentinel for "absent" so a proxy can distinguish
    /// "not present" from "present and 0" (`spec.md` §4.2). Use
    /// [`HeaderBlock::effective_max_forwards`] for the RFC-default-applied
    /// value.
    pub max_forwards: i64,
    pub contacts: ContactList,
    /// Top-first (`spec.md` §3 invariant).
    pub routes: RouteSet,
    pub record_routes: RouteSet,
    pub content_length: Option<usize>,
    pub content_type: Option<String>,
    pub www_authenticate: Vec<DigestRecord>,
    pub proxy_authenticate: Vec<DigestRecord>,
    pub authorization: Vec<DigestRecord>,
    pub proxy_authorization: Vec<DigestRecord>,
    pub expires: Option<u32>,
    pub min_expires: Option<u32>,
    pub supported: ExtensionSet,
    pub require: ExtensionSet,
    pub proxy_require: ExtensionSet,
    pub unsupported: ExtensionSet,
    pub event: Option<String>,
    pub subscription_state: Option<String>,
    pub allow_events: Option<String>,
    pub refer_to: Option<UserField>,
    pub referred_by: Option<UserField>,
    /// Present only once per `spec.md` §4.2 ("at most one occurrence —
    /// multiple occurrences fail with a validation error").
    pub refer_sub: Option<bool>,
    pub replaces: Option<Replaces>,
    pub reason: Vec<Reason>,
    pub rseq: Option<u32>,
    pub rack: Option<RAck>,
    pub etag: Option<String>,
    /// Non-standard `Proxy-*` headers this crate doesn't otherwise model,
    /// preserved in order (`spec.md` §3 "Proxy-* custom headers").
    pub proxy_custom: Vec<(String, String)>,
    pub user_agent: Option<String>,
    pub server: Option<String>,
    pub date: Option<String>,
    pub timestamp: Option<String>,
    pub warning: Vec<String>,
    /// Everything this crate doesn't recognize, verbatim, in arrival order.
    pub unknown: Vec<(String, String)>,
}

/// RFC 3261 default for an absent Max-Forwards.
pub const DEFAULT_MAX_FORWARDS: u32 = 70;

impl HeaderBlock {
    pub fn new() -> Self {
        Self { max_forwards: -1, ..Default::default() }
    }

    /// `max_forwards` with the RFC 3261 default (70) applied when absent.
    pub fn effective_max_forwards(&self) -> u32 {
        if self.max_forwards < 0 {
            DEFAULT_MAX_FORWARDS
        } else {
            self.max_forwards as u32
        }
    }

    /// `spec.md` §3/§8 invariant: a valid request has at least one Via.
    pub fn has_via(&self) -> bool {
        !self.via.is_empty()
    }

    /// The top Via, which identifies the previous hop and carries the
    /// branch used for transaction matching (`spec.md` §4.5).
    pub fn top_via(&self) -> Option<&Via> {
        self.via.first()
    }

    pub fn top_via_mut(&mut self) -> Option<&mut Via> {
        self.via.first_mut()
    }

    pub fn push_unknown(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.unknown.push((name.into(), value.into()));
    }

    /// Rewrites Content-Length to match `body_len`, per the send-time fixup
    /// in `spec.md` §4.6 ("Set Content-Length to the body byte length").
    pub fn set_content_length(&mut self, body_len: usize) {
        self.content_length = Some(body_len);
    }

    /// Serializes every typed field plus the unknown tail in the fixed
    /// interoperability order from `spec.md` §4.2: "Via(s), To, From,
    /// Call-ID, CSeq, Contact, Max-Forwards, Route, Record-Route,
    /// User-Agent, content-related, then the rest, then unknown headers
    /// verbatim."
    ///
    /// `is_request` gates Max-Forwards: RFC 3261 §20.22 defines it as a
    /// request-only header, and the absent/present distinction (`spec.md`
    /// §4.2's `-1` sentinel) must survive a parse/serialize round-trip, so
    /// it is only emitted for requests that actually carry it.
    pub fn serialize(&self, is_request: bool) -> String {
        let mut out = String::new();

        for via in &self.via {
            writeln_header(&mut out, "Via", &via.to_string());
        }
        if let Some(to) = &self.to {
            writeln_header(&mut out, "To", &to.to_string());
        }
        if let Some(from) = &self.from {
            writeln_header(&mut out, "From", &from.to_string());
        }
        if let Some(call_id) = &self.call_id {
            writeln_header(&mut out, "Call-ID", call_id);
        }
        if let Some(cseq) = &self.cseq {
            writeln_header(&mut out, "CSeq", &cseq.to_string());
        }
        if !self.contacts.is_empty() {
            let joined = self.contacts.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ");
            writeln_header(&mut out, "Contact", &joined);
        }
        if is_request && self.max_forwards >= 0 {
            writeln_header(&mut out, "Max-Forwards", &self.max_forwards.to_string());
        }
        if !self.routes.is_empty() {
            let joined = self.routes.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ");
            writeln_header(&mut out, "Route", &joined);
        }
        if !self.record_routes.is_empty() {
            let joined = self.record_routes.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ");
            writeln_header(&mut out, "Record-Route", &joined);
        }
        if let Some(ua) = &self.user_agent {
            writeln_header(&mut out, "User-Agent", ua);
        }
        if let Some(ct) = &self.content_type {
            writeln_header(&mut out, "Content-Type", ct);
        }
        writeln_header(&mut out, "Content-Length", &self.content_length.unwrap_or(0).to_string());

        for record in &self.www_authenticate {
            writeln_header(&mut out, "WWW-Authenticate", &record.to_string());
        }
        for record in &self.proxy_authenticate {
            writeln_header(&mut out, "Proxy-Authenticate", &record.to_string());
        }
        for record in &self.authorization {
            writeln_header(&mut out, "Authorization", &record.to_string());
        }
        for record in &self.proxy_authorization {
            writeln_header(&mut out, "Proxy-Authorization", &record.to_string());
        }
        if let Some(expires) = self.expires {
            writeln_header(&mut out, "Expires", &expires.to_string());
        }
        if let Some(min_expires) = self.min_expires {
            writeln_header(&mut out, "Min-Expires", &min_expires.to_string());
        }
        if !self.supported.is_empty() {
            writeln_header(&mut out, "Supported", &self.supported.to_string());
        }
        if !self.require.is_empty() {
            writeln_header(&mut out, "Require", &self.require.to_string());
        }
        if !self.proxy_require.is_empty() {
            writeln_header(&mut out, "Proxy-Require", &self.proxy_require.to_string());
        }
        if !self.unsupported.is_empty() {
            writeln_header(&mut out, "Unsupported", &self.unsupported.to_string());
        }
        if let Some(event) = &self.event {
            writeln_header(&mut out, "Event", event);
        }
        if let Some(state) = &self.subscription_state {
            writeln_header(&mut out, "Subscription-State", state);
        }
        if let Some(allow_events) = &self.allow_events {
            writeln_header(&mut out, "Allow-Events", allow_events);
        }
        if let Some(refer_to) = &self.refer_to {
            writeln_header(&mut out, "Refer-To", &refer_to.to_string());
        }
        if let Some(referred_by) = &self.referred_by {
            writeln_header(&mut out, "Referred-By", &referred_by.to_string());
        }
        if let Some(refer_sub) = self.refer_sub {
            writeln_header(&mut out, "Refer-Sub", if refer_sub { "true" } else { "false" });
        }
        if let Some(replaces) = &self.replaces {
            writeln_header(&mut out, "Replaces", &replaces.to_string());
        }
        for reason in &self.reason {
            writeln_header(&mut out, "Reason", &reason.to_string());
        }
        if let Some(rseq) = self.rseq {
            writeln_header(&mut out, "RSeq", &rseq.to_string());
        }
        if let Some(rack) = &self.rack {
            writeln_header(&mut out, "RAck", &rack.to_string());
        }
        if let Some(etag) = &self.etag {
            writeln_header(&mut out, "SIP-ETag", etag);
        }
        for (name, value) in &self.proxy_custom {
            writeln_header(&mut out, name, value);
        }
        if let Some(server) = &self.server {
            writeln_header(&mut out, "Server", server);
        }
        if let Some(date) = &self.date {
            writeln_header(&mut out, "Date", date);
        }
        if let Some(timestamp) = &self.timestamp {
            writeln_header(&mut out, "Timestamp", timestamp);
        }
        for warning in &self.warning {
            writeln_header(&mut out, "Warning", warning);
        }

        for (name, value) in &self.unknown {
            writeln_header(&mut out, name, value);
        }

        out
    }
}

fn writeln_header(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, "{name}: {value}\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::uri::Uri;

    #[test]
    fn absent_max_forwards_defaults_to_seventy() {
        let block = HeaderBlock::new();
        assert_eq!(block.max_forwards, -1);
        assert_eq!(block.effective_max_forwards(), 70);
    }

    #[test]
    fn present_zero_is_distinct_from_absent() {
        let mut block = HeaderBlock::new();
        block.max_forwards = 0;
        assert_eq!(block.effective_max_forwards(), 0);
    }

    #[test]
    fn serialize_orders_via_before_to_and_from() {
        let mut block = HeaderBlock::new();
        block.to = Some(UserField::new("sip:bob@example.com".parse::<Uri>().unwrap()));
        block.from = Some(UserField::new("sip:alice@example.com".parse::<Uri>().unwrap()));
        block.call_id = Some("abc123@example.com".to_string());
        let serialized = block.serialize(true);
        let to_pos = serialized.find("To:").unwrap();
        let from_pos = serialized.find("From:").unwrap();
        let call_id_pos = serialized.find("Call-ID:").unwrap();
        assert!(to_pos < from_pos);
        assert!(from_pos < call_id_pos);
    }

    #[test]
    fn unknown_headers_round_trip_verbatim() {
        let mut block = HeaderBlock::new();
        block.push_unknown("X-Custom", "value");
        assert!(block.serialize(true).ends_with("X-Custom: value\r\n"));
    }
}

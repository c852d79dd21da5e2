//! Transaction key derivation (`spec.md` §4.5 "Transaction key").

use sip_core::prelude::{Method, Request, Response};

use crate::error::{Error, Result};

/// Identifies a transaction: the top Via's branch (case-sensitive), its
/// sent-by (host, port), the method the key is filed under, and whether
/// this is the client or server side transaction for that branch.
///
/// ACK and CANCEL are filed under `Method::Invite` rather than their own
/// method — RFC 3261 §17.2.3: an ACK for a non-2xx final response is routed
/// to the server INVITE transaction for absorption, and a CANCEL is matched
/// to its target INVITE server transaction the same way (`spec.md` §4.5).
/// ACK for a 2xx response is deliberately **not** matched here — it is an
/// end-to-end request the user agent handles directly; callers must check
/// for that case (no existing Completed INVITE server transaction for the
/// branch) before falling back to this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    pub branch: String,
    pub sent_by: (String, u16),
    pub method: Method,
    pub is_server: bool,
}

impl TransactionKey {
    pub fn new(branch: impl Into<String>, sent_by: (String, u16), method: Method, is_server: bool) -> Self {
        Self { branch: branch.into(), sent_by, method: key_method(&method), is_server }
    }

    /// Derives the key under which a brand-new transaction for `request`
    /// would be filed (i.e. the key a client uses when sending it, or a
    /// server uses when creating a transaction to handle it).
    pub fn for_request(request: &Request, is_server: bool) -> Result<Self> {
        let via = request.headers.top_via().ok_or_else(|| Error::NoKey("request has no Via".to_string()))?;
        let branch = via.branch().ok_or_else(|| Error::NoKey("top Via has no branch".to_string()))?;
        Ok(Self::new(branch, via.sent_by(), request.method.clone(), is_server))
    }

    /// Derives the key a client transaction would have been filed under for
    /// the request that produced `response` — used to match an inbound
    /// response to its client transaction.
    pub fn for_response(response: &Response, method: Method) -> Result<Self> {
        let via = response.headers.top_via().ok_or_else(|| Error::NoKey("response has no Via".to_string()))?;
        let branch = via.branch().ok_or_else(|| Error::NoKey("top Via has no branch".to_string()))?;
        Ok(Self::new(branch, via.sent_by(), method, false))
    }
}

/// ACK and CANCEL key under their target INVITE transaction's method.
fn key_method(method: &Method) -> Method {
    match method {
        Method::Ack | Method::Cancel => Method::Invite,
        other => other.clone(),
    }
}

impl std::fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}/{}:{}",
            if self.is_server { "srv" } else { "cli" },
            self.branch,
            self.method,
            self.sent_by.0,
            self.sent_by.1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_core::prelude::*;

    fn invite_request() -> Request {
        let mut req = Request::new(Method::Invite, "sip:bob@biloxi.example.com".parse().unwrap());
        let mut via = Via::new(TransportProtocol::Udp, "pc33.atlanta.example.com", None);
        via.set_branch("z9hG4bK776asdhds");
        req.headers.via.push(via);
        req
    }

    #[test]
    fn ack_keys_under_invite_method() {
        let mut ack = Request::new(Method::Ack, "sip:bob@biloxi.example.com".parse().unwrap());
        let mut via = Via::new(TransportProtocol::Udp, "pc33.atlanta.example.com", None);
        via.set_branch("z9hG4bK776asdhds");
        ack.headers.via.push(via);
        let key = TransactionKey::for_request(&ack, false).unwrap();
        assert_eq!(key.method, Method::Invite);
    }

    #[test]
    fn cancel_keys_under_invite_method() {
        let mut cancel = Request::new(Method::Cancel, "sip:bob@biloxi.example.com".parse().unwrap());
        let mut via = Via::new(TransportProtocol::Udp, "pc33.atlanta.example.com", None);
        via.set_branch("z9hG4bK776asdhds");
        cancel.headers.via.push(via);
        let key = TransactionKey::for_request(&cancel, true).unwrap();
        assert_eq!(key.method, Method::Invite);
    }

    #[test]
    fn missing_branch_fails_to_derive_a_key() {
        let mut req = invite_request();
        req.headers.via[0].params.remove("branch");
        assert!(TransactionKey::for_request(&req, true).is_err());
    }

    #[test]
    fn client_and_server_keys_for_same_branch_are_distinct() {
        let req = invite_request();
        let client_key = TransactionKey::for_request(&req, false).unwrap();
        let server_key = TransactionKey::for_request(&req, true).unwrap();
        assert_ne!(client_key, server_key);
    }
}

//! The `Transaction` data model and its state machines (`spec.md` §3
//! "Transaction", §4.5 "Transaction state machines").
//!
//! One flat [`TransactionState`] enum serves all four transaction kinds
//! rather than four separate per-kind enums — `spec.md` §9 Design Notes
//! calls for a tagged-variant design over a class hierarchy, and the RFC
//! 3261 §17 diagrams already share state *names* (`Proceeding`,
//! `Completed`, `Terminated`) across kinds; [`TransactionKind`] plus
//! [`Transaction::valid_transition`] is what gives each kind its own legal
//! transition set, not a distinct type per kind.

use tokio::time::Instant;

use sip_core::prelude::{CSeq, Method, Request, Response};

use crate::error::{Error, Result};
use crate::key::TransactionKey;

/// Which of the four RFC 3261 §17 state machines a transaction runs.
/// CANCEL doesn't get its own machine — `spec.md` §9 Design Notes: a CANCEL
/// is handled by calling the matching INVITE server transaction's cancel
/// entry point directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    InviteClient,
    InviteServer,
    NonInviteClient,
    NonInviteServer,
}

impl TransactionKind {
    pub fn for_request(method: &Method, is_server: bool) -> Self {
        let is_invite = matches!(method, Method::Invite);
        match (is_invite, is_server) {
            (true, true) => TransactionKind::InviteServer,
            (true, false) => TransactionKind::InviteClient,
            (false, true) => TransactionKind::NonInviteServer,
            (false, false) => TransactionKind::NonInviteClient,
        }
    }
}

/// States drawn from the union of all four RFC 3261 §17 diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// INVITE client only: request sent, awaiting any response.
    Calling,
    /// Non-INVITE client/server only: request sent/received, no response yet.
    Trying,
    /// A provisional response has been sent or received.
    Proceeding,
    /// A final response has been sent or received.
    Completed,
    /// INVITE server only: ACK received for a non-2xx final response.
    Confirmed,
    /// No further activity; eligible for reaping.
    Terminated,
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionState::Calling => "Calling",
            TransactionState::Trying => "Trying",
            TransactionState::Proceeding => "Proceeding",
            TransactionState::Completed => "Completed",
            TransactionState::Confirmed => "Confirmed",
            TransactionState::Terminated => "Terminated",
        };
        f.write_str(s)
    }
}

/// A single transaction's full mutable state (`spec.md` §3 "Transaction").
#[derive(Debug, Clone)]
pub struct Transaction {
    pub key: TransactionKey,
    pub kind: TransactionKind,
    pub state: TransactionState,
    /// The request that created this transaction (the INVITE/non-INVITE
    /// request on a server transaction; the request being sent on a client
    /// transaction).
    pub request: Request,
    /// Latest provisional response seen (for retransmit-on-duplicate and
    /// for `PRACK` correlation).
    pub last_provisional: Option<Response>,
    /// The final response, once one has been sent or received.
    pub last_final: Option<Response>,
    /// Retransmit attempts made so far for the current state (Timer
    /// A/E/G driven).
    pub retransmit_count: u32,
    pub created_at: Instant,
    /// Timestamp of the last state transition, used by the retransmit
    /// scheduler to compute next-fire times relative to state entry.
    pub state_entered_at: Instant,
    /// Set when a send attempt to the transport failed; surfaced to the
    /// timeout/error callback rather than panicking (`spec.md` §4.5).
    pub delivery_failed: bool,
    /// Set once the transaction's timeout timer (B/F/H) has fired.
    pub has_timed_out: bool,
    /// True once a 1xx response has been sent reliably (RFC 3262) and is
    /// awaiting its PRACK; retransmission of that 1xx is then driven by
    /// Timer RT1/RT2 rather than the ordinary provisional path.
    pub reliable_provisional_armed: bool,
    /// INVITE client transactions only: the ACK the engine generated for a
    /// 3xx-6xx final response (`spec.md` §4.5 "the engine generates the ACK
    /// automatically"). Retained so a retransmitted non-2xx final response
    /// resends the same ACK rather than rebuilding it.
    pub generated_ack: Option<Request>,
}

impl Transaction {
    pub fn new_client(request: Request) -> Result<Self> {
        let key = TransactionKey::for_request(&request, false)?;
        let kind = TransactionKind::for_request(&request.method, false);
        let state = if kind == TransactionKind::InviteClient { TransactionState::Calling } else { TransactionState::Trying };
        let now = Instant::now();
        Ok(Self {
            key,
            kind,
            state,
            request,
            last_provisional: None,
            last_final: None,
            retransmit_count: 0,
            created_at: now,
            state_entered_at: now,
            delivery_failed: false,
            has_timed_out: false,
            reliable_provisional_armed: false,
            generated_ack: None,
        })
    }

    pub fn new_server(request: Request) -> Result<Self> {
        let key = TransactionKey::for_request(&request, true)?;
        let kind = TransactionKind::for_request(&request.method, true);
        let state = if kind == TransactionKind::InviteServer { TransactionState::Proceeding } else { TransactionState::Trying };
        let now = Instant::now();
        Ok(Self {
            key,
            kind,
            state,
            request,
            last_provisional: None,
            last_final: None,
            retransmit_count: 0,
            created_at: now,
            state_entered_at: now,
            delivery_failed: false,
            has_timed_out: false,
            reliable_provisional_armed: false,
            generated_ack: None,
        })
    }

    /// Whether `to` is a legal transition from the current state, for this
    /// transaction's kind. This mirrors the RFC 3261 §17 diagrams rather
    /// than allowing every state to reach every other.
    pub fn valid_transition(&self, to: TransactionState) -> bool {
        use TransactionKind::*;
        use TransactionState::*;
        matches!(
            (self.kind, self.state, to),
            (InviteClient, Calling, Proceeding)
                | (InviteClient, Calling, Completed)
                | (InviteClient, Calling, Terminated)
                | (InviteClient, Proceeding, Proceeding)
                | (InviteClient, Proceeding, Completed)
                | (InviteClient, Proceeding, Terminated)
                | (InviteClient, Completed, Completed)
                | (InviteClient, Completed, Terminated)
                | (InviteServer, Proceeding, Proceeding)
                | (InviteServer, Proceeding, Completed)
                | (InviteServer, Proceeding, Terminated)
                | (InviteServer, Completed, Completed)
                | (InviteServer, Completed, Confirmed)
                | (InviteServer, Completed, Terminated)
                | (InviteServer, Confirmed, Confirmed)
                | (InviteServer, Confirmed, Terminated)
                | (NonInviteClient, Trying, Trying)
                | (NonInviteClient, Trying, Proceeding)
                | (NonInviteClient, Trying, Completed)
                | (NonInviteClient, Proceeding, Proceeding)
                | (NonInviteClient, Proceeding, Completed)
                | (NonInviteClient, Completed, Completed)
                | (NonInviteClient, Completed, Terminated)
                | (NonInviteServer, Trying, Trying)
                | (NonInviteServer, Trying, Proceeding)
                | (NonInviteServer, Trying, Completed)
                | (NonInviteServer, Proceeding, Proceeding)
                | (NonInviteServer, Proceeding, Completed)
                | (NonInviteServer, Completed, Completed)
                | (NonInviteServer, Completed, Terminated)
        )
    }

    /// Attempts the transition, returning an error carrying the rejected
    /// `(from, to)` pair rather than silently ignoring it, per `spec.md`
    /// §7 "Invalid transitions are rejected, not silently dropped".
    pub fn transition(&mut self, to: TransactionState) -> Result<TransactionState> {
        if !self.valid_transition(to) {
            return Err(Error::InvalidTransition {
                key: self.key.to_string(),
                from: self.state.to_string(),
                attempted: to.to_string(),
            });
        }
        let from = self.state;
        self.state = to;
        self.state_entered_at = Instant::now();
        if to != from {
            self.retransmit_count = 0;
        }
        Ok(from)
    }

    pub fn is_terminated(&self) -> bool {
        self.state == TransactionState::Terminated
    }

    /// Status class of the final response, if one has been recorded.
    pub fn final_status_class(&self) -> Option<u16> {
        self.last_final.as_ref().map(|r| r.status.0 / 100)
    }

    /// Builds the ACK an INVITE client transaction owes a 3xx-6xx final
    /// response, per `spec.md` §4.5: "the engine generates the ACK
    /// automatically using the stored request and the response's To-tag,
    /// Call-ID and top Via" (RFC 3261 §17.1.1.3). The ACK for a 2xx response
    /// is end-to-end and never goes through this path.
    pub fn build_non_2xx_ack(request: &Request, response: &Response) -> Request {
        let mut ack = Request::new(Method::Ack, request.request_uri.clone());
        ack.headers.via = request.headers.via.clone();
        ack.headers.from = request.headers.from.clone();
        ack.headers.to = response.headers.to.clone().or_else(|| request.headers.to.clone());
        ack.headers.call_id = request.headers.call_id.clone();
        ack.headers.cseq = request.headers.cseq.clone().map(|c| CSeq::new(c.number, Method::Ack));
        ack.headers.routes = request.headers.routes.clone();
        ack.headers.max_forwards = request.headers.max_forwards;
        ack.headers.content_length = Some(0);
        ack
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

    fn options_request() -> Request {
        let mut req = Request::new(Method::Options, "sip:bob@biloxi.example.com".parse().unwrap());
        let mut via = Via::new(TransportProtocol::Udp, "pc33.atlanta.example.com", None);
        via.set_branch("z9hG4bK776asdhde");
        req.headers.via.push(via);
        req
    }

    #[test]
    fn invite_client_starts_in_calling() {
        let txn = Transaction::new_client(invite_request()).unwrap();
        assert_eq!(txn.kind, TransactionKind::InviteClient);
        assert_eq!(txn.state, TransactionState::Calling);
    }

    #[test]
    fn non_invite_server_starts_in_trying() {
        let txn = Transaction::new_server(options_request()).unwrap();
        assert_eq!(txn.kind, TransactionKind::NonInviteServer);
        assert_eq!(txn.state, TransactionState::Trying);
    }

    #[test]
    fn invite_server_cannot_skip_completed_to_reach_confirmed() {
        let txn = Transaction::new_server(invite_request()).unwrap();
        assert!(!txn.valid_transition(TransactionState::Confirmed));
    }

    #[test]
    fn invalid_transition_is_rejected_with_detail() {
        let mut txn = Transaction::new_client(invite_request()).unwrap();
        txn.transition(TransactionState::Terminated).unwrap();
        let err = txn.transition(TransactionState::Proceeding).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn successful_transition_resets_retransmit_count() {
        let mut txn = Transaction::new_client(invite_request()).unwrap();
        txn.retransmit_count = 3;
        txn.transition(TransactionState::Proceeding).unwrap();
        assert_eq!(txn.retransmit_count, 0);
    }
}

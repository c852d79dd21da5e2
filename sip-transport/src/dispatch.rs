//! The inbound dispatch pipeline (`spec.md` §4.6 "Inbound dispatch").
//!
//! One raw payload in, at most one of: a STUN forward, a dropped
//! keep-alive/oversized-message, a transaction-engine delivery, or a
//! "new request"/"stray response" observer callback plus whatever
//! validation response the pipeline itself had to generate.

use sip_core::prelude::{is_keepalive, is_stun_payload, parse_message, Message, Method, StatusCode};
use sip_transaction::prelude::{ReceiveOutcome, TransactionEngine};

use crate::channel::RawInbound;
use crate::observer::{Observer, TransportCounters};
use crate::stun::StunSink;

/// Read-only collaborators the dispatch pipeline needs; borrowed rather
/// than owned so [`crate::transport::Transport`] can pass `&self` fields
/// straight through.
pub struct DispatchContext<'a> {
    pub engine: &'a TransactionEngine,
    pub observer: &'a Observer,
    pub counters: &'a TransportCounters,
    pub stun_sink: Option<&'a StunSink>,
    pub max_message_size: usize,
}

/// What the dispatch pipeline decided, for the caller to act on: a response
/// to send back (validation failures, a too-late CANCEL's 481) is returned
/// rather than sent directly, so this module stays free of a dependency on
/// channel selection. Responses a live transaction already owns (the
/// CANCEL's own 200 OK, the cancelled INVITE's 487) go through the engine
/// instead and are delivered from its own outbound queue.
pub enum DispatchResult {
    Handled,
    Respond(Message),
}

pub async fn dispatch_inbound(ctx: &DispatchContext<'_>, raw: RawInbound) -> DispatchResult {
    if is_stun_payload(&raw.bytes) {
        ctx.counters.stun_forwarded.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if let Some(sink) = ctx.stun_sink {
            sink(raw.channel_id.clone(), raw.local.clone(), raw.remote.clone(), raw.bytes.clone());
        }
        return DispatchResult::Handled;
    }

    if raw.bytes.len() > ctx.max_message_size {
        ctx.counters.oversized_messages.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        ctx.observer.notify_bad_message(raw.remote.clone(), "message exceeds maximum size".to_string());
        return respond_with(StatusCode::MESSAGE_TOO_LARGE);
    }

    if is_keepalive(&raw.bytes) {
        ctx.counters.dropped_keepalives.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        return DispatchResult::Handled;
    }

    let mut message = match parse_message(&raw.bytes) {
        Ok(message) => message,
        Err(e) => {
            ctx.observer.notify_bad_message(raw.remote.clone(), e.to_string());
            return DispatchResult::Handled;
        }
    };

    if let Some(via) = message.headers_mut().top_via_mut() {
        via.set_received(raw.remote.addr.to_string());
        if via.rport().is_some() {
            via.set_rport(raw.remote.port);
        }
    }

    // `spec.md` §3 "received-on/received-from endpoints": stamp before the
    // message reaches the engine, so a reply built from it (a stored final
    // response, or a response the engine generates itself, e.g. the CANCEL
    // 200 OK) knows where to go.
    match &mut message {
        Message::Request(request) => {
            request.received_on = Some(raw.local.clone());
            request.received_from = Some(raw.remote.clone());
        }
        Message::Response(response) => {
            response.received_on = Some(raw.local.clone());
            response.received_from = Some(raw.remote.clone());
        }
    }

    match message {
        Message::Response(response) => {
            let Some(method) = response.headers.cseq.as_ref().map(|c| c.method.clone()) else {
                ctx.observer.notify_stray_response(Message::Response(response));
                return DispatchResult::Handled;
            };
            match ctx.engine.receive_response(response, method).await {
                Ok(Some(_)) | Ok(None) => DispatchResult::Handled,
                Err(_) => DispatchResult::Handled,
            }
        }
        Message::Request(request) => {
            if let Err(response) = validate_request(&request) {
                return DispatchResult::Respond(Message::Response(response));
            }

            match ctx.engine.receive_request(request.clone()).await {
                Ok(ReceiveOutcome::NewRequest(_)) => {
                    ctx.observer.notify_new_request(Message::Request(request));
                    DispatchResult::Handled
                }
                Ok(ReceiveOutcome::Retransmitted) | Ok(ReceiveOutcome::AckAbsorbed) | Ok(ReceiveOutcome::AckFor2xx) => {
                    DispatchResult::Handled
                }
                Ok(ReceiveOutcome::Cancel { target }) => {
                    let mut terminated = sip_core::prelude::Response::new(StatusCode::REQUEST_TERMINATED);
                    terminated.headers.via = request.headers.via.clone();
                    terminated.headers.to = request.headers.to.clone();
                    terminated.headers.from = request.headers.from.clone();
                    terminated.headers.call_id = request.headers.call_id.clone();
                    terminated.headers.cseq = request.headers.cseq.clone();
                    terminated.received_from = request.received_from.clone();
                    terminated.received_on = request.received_on.clone();
                    // Drive the existing INVITE server transaction's own
                    // Proceeding -> Completed transition (`spec.md` §4.5
                    // CANCEL(b), §8 scenario 4) instead of handing the 487
                    // straight to the wire — the transaction must see it to
                    // arm Timer H retransmission and later absorb the ACK
                    // into Confirmed.
                    if let Err(e) = ctx.engine.send_response(&target, terminated).await {
                        tracing::warn!(error = %e, "failed to deliver 487 to cancelled INVITE server transaction");
                    }
                    DispatchResult::Handled
                }
                Ok(ReceiveOutcome::CancelTooLate) => {
                    let mut not_exist = sip_core::prelude::Response::new(StatusCode::CALL_TRANSACTION_DOES_NOT_EXIST);
                    not_exist.headers.via = request.headers.via.clone();
                    DispatchResult::Respond(Message::Response(not_exist))
                }
                Err(_) => DispatchResult::Handled,
            }
        }
    }
}

/// `spec.md` §4.6 step 6 "validate (Max-Forwards, Require)". Returns the
/// response to send in place of delivering the request further.
fn validate_request(request: &sip_core::prelude::Request) -> Result<(), sip_core::prelude::Response> {
    if request.method != Method::Options && request.headers.effective_max_forwards() == 0 {
        let mut response = sip_core::prelude::Response::new(StatusCode::TOO_MANY_HOPS);
        response.headers.via = request.headers.via.clone();
        return Err(response);
    }
    if !request.headers.require.unknown.is_empty() {
        let mut response = sip_core::prelude::Response::new(StatusCode::BAD_EXTENSION);
        response.headers.via = request.headers.via.clone();
        response.headers.unsupported = request.headers.require.clone();
        return Err(response);
    }
    Ok(())
}

fn respond_with(status: StatusCode) -> DispatchResult {
    DispatchResult::Respond(Message::Response(sip_core::prelude::Response::new(status)))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use sip_core::prelude::{SipEndpoint, TransportProtocol};
    use sip_transaction::prelude::{TimerSettings, TransactionState};

    use super::*;

    fn raw(channel_id: &str, remote_port: u16, s: &str) -> RawInbound {
        RawInbound {
            channel_id: channel_id.to_string(),
            local: SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::new(127, 0, 0, 1).into(), 5060),
            remote: SipEndpoint::new(TransportProtocol::Udp, Ipv4Addr::new(127, 0, 0, 1).into(), remote_port),
            connection_id: None,
            bytes: bytes::Bytes::from(s.replace('\n', "\r\n").into_bytes()),
        }
    }

    /// `spec.md` §4.5 CANCEL(b), §8 scenario 4: a CANCEL matching a
    /// Proceeding INVITE server transaction must answer the CANCEL itself
    /// with 200 OK *and* drive the matched INVITE transaction to a 487,
    /// through `TransactionEngine::send_response` so its state machine (and
    /// Timer H retransmission) actually advances.
    #[tokio::test]
    async fn cancel_drives_the_invite_server_transaction_to_completed() {
        let (engine, mut outbound) = TransactionEngine::new(TimerSettings::default(), sip_transaction::prelude::Observer::default());
        let observer = Observer::default();
        let counters = TransportCounters::default();
        let ctx = DispatchContext { engine: &engine, observer: &observer, counters: &counters, stun_sink: None, max_message_size: 65_535 };

        let invite_raw = raw(
            "chan-1",
            6000,
            "INVITE sip:bob@biloxi.example.com SIP/2.0\n\
Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK-cancel\n\
To: Bob <sip:bob@biloxi.example.com>\n\
From: Alice <sip:alice@atlanta.example.com>;tag=1928301774\n\
Call-ID: a84b4c76e66710@pc33.atlanta.example.com\n\
CSeq: 314159 INVITE\n\
Content-Length: 0\n\
\n",
        );
        assert!(matches!(dispatch_inbound(&ctx, invite_raw).await, DispatchResult::Handled));

        let key = invite_server_key("z9hG4bK-cancel");
        engine.send_response(&key, sip_core::prelude::Response::new(StatusCode::RINGING)).await.unwrap();
        let _ringing = outbound.recv().await.unwrap();

        let cancel_raw = raw(
            "chan-1",
            6000,
            "CANCEL sip:bob@biloxi.example.com SIP/2.0\n\
Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK-cancel\n\
To: Bob <sip:bob@biloxi.example.com>\n\
From: Alice <sip:alice@atlanta.example.com>;tag=1928301774\n\
Call-ID: a84b4c76e66710@pc33.atlanta.example.com\n\
CSeq: 314159 CANCEL\n\
Content-Length: 0\n\
\n",
        );
        assert!(matches!(dispatch_inbound(&ctx, cancel_raw).await, DispatchResult::Handled));

        let cancel_ok = outbound.recv().await.unwrap();
        match cancel_ok.message {
            Message::Response(r) => {
                assert_eq!(r.status, StatusCode::OK);
                assert!(r.received_from.is_some(), "CANCEL 200 OK must carry a reply-to address");
            }
            other => panic!("expected the CANCEL's 200 OK, got {other:?}"),
        }

        let terminated = outbound.recv().await.unwrap();
        match terminated.message {
            Message::Response(r) => {
                assert_eq!(r.status, StatusCode::REQUEST_TERMINATED);
                assert!(r.received_from.is_some(), "487 must carry a reply-to address");
            }
            other => panic!("expected the INVITE's 487, got {other:?}"),
        }

        assert_eq!(engine.transaction_state(&key).await, Some(TransactionState::Completed));
    }

    /// The key an INVITE server transaction for `branch` files under,
    /// derived the same way `sip-transaction`'s own key tests do — the
    /// engine has no "list all keys" API to read it back from.
    fn invite_server_key(branch: &str) -> sip_transaction::prelude::TransactionKey {
        use sip_core::prelude::{Method, TransportProtocol, Via};

        let mut via = Via::new(TransportProtocol::Udp, "pc33.atlanta.example.com", None);
        via.set_branch(branch);
        let mut request = sip_core::prelude::Request::new(Method::Invite, "sip:bob@biloxi.example.com".parse().unwrap());
        request.headers.via.push(via);
        sip_transaction::prelude::TransactionKey::for_request(&request, true).unwrap()
    }
}

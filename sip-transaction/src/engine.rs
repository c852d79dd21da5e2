//! The shared transaction table and its single cooperative retransmit loop
//! (`spec.md` §4.5 "Retransmit scheduler", §5 "Concurrency model").
//!
//! One [`TransactionEngine`] owns every live transaction behind a single
//! mutex; a lone background task wakes on a fixed tick and drives every
//! due timer, rather than spawning a `tokio::time::sleep` per transaction.
//! `spec.md` §9 Design Notes calls this out explicitly as cheaper than a
//! timer task per transaction, and it keeps retransmit ordering
//! deterministic for tests.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

use sip_core::prelude::{Message, Method, Request, Response, StatusCode};
use tokio::sync::{mpsc, Mutex};

use crate::error::{Error, Result};
use crate::events::{Observer, TransactionEvent};
use crate::key::TransactionKey;
use crate::prack::PrackTracker;
use crate::timer::{retransmit_intervals, TimerSettings};
use crate::transaction::{Transaction, TransactionKind, TransactionState};

/// A message the engine wants delivered to the network, paired with the
/// transaction it belongs to so the transport layer can report delivery
/// failures back by key.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub key: TransactionKey,
    pub message: Message,
}

/// What happened to an inbound request once matched against the table.
#[derive(Debug)]
pub enum ReceiveOutcome {
    /// A brand-new transaction was created; hand the request up to the TU.
    NewRequest(TransactionKey),
    /// A retransmit of a request already being handled; the engine resent
    /// the last response (if any) on its own and there is nothing further
    /// for the TU to do.
    Retransmitted,
    /// A CANCEL matched a live INVITE server transaction in `Proceeding`.
    /// The engine has already queued the 200 OK for the CANCEL itself
    /// (RFC 3261 §9.2: that happens immediately, with no transaction of
    /// its own); the TU must still send the 487 on `target`.
    Cancel { target: TransactionKey },
    /// A CANCEL arrived with no matching INVITE transaction in a
    /// cancelable state (already answered, or never existed).
    CancelTooLate,
    /// An ACK for a non-2xx final response; absorbed into the INVITE
    /// server transaction's Completed -> Confirmed transition.
    AckAbsorbed,
    /// An ACK for a 2xx final response; this is end-to-end and out of
    /// scope for the transaction engine (`spec.md` §4.5).
    AckFor2xx,
}

struct Entry {
    transaction: Transaction,
    prack: Option<PrackTracker>,
}

/// Shared, cloneable handle to the transaction table. Cloning an engine
/// clones the `Arc`, not the table.
#[derive(Clone)]
pub struct TransactionEngine {
    inner: Arc<Mutex<HashMap<TransactionKey, Entry>>>,
    settings: TimerSettings,
    observer: Arc<Observer>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
}

impl TransactionEngine {
    pub fn new(settings: TimerSettings, observer: Observer) -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let engine = Self { inner: Arc::new(Mutex::new(HashMap::new())), settings, observer: Arc::new(observer), outbound };
        (engine, rx)
    }

    fn queue_outbound(&self, key: TransactionKey, message: Message) {
        if self.outbound.send(OutboundMessage { key, message }).is_err() {
            tracing::warn!("outbound queue has no receiver; dropping message");
        }
    }

    /// Starts a new client transaction for `request`, queues it for send,
    /// and returns its key.
    pub async fn send_request(&self, request: Request) -> Result<TransactionKey> {
        let transaction = Transaction::new_client(request.clone())?;
        let key = transaction.key.clone();
        let mut table = self.inner.lock().await;
        if table.contains_key(&key) {
            return Err(Error::AlreadyExists(key.to_string()));
        }
        table.insert(key.clone(), Entry { transaction, prack: None });
        drop(table);
        self.observer.notify(TransactionEvent::RequestIn { key: key.clone(), request: request.clone() });
        self.queue_outbound(key.clone(), Message::Request(request));
        Ok(key)
    }

    /// Matches an inbound response to its client transaction, advances its
    /// state, and returns the transaction's key so the caller can fetch
    /// the latest state if it needs to. Unmatched responses are counted as
    /// stray rather than erroring (`spec.md` §7 "Stray responses").
    pub async fn receive_response(&self, response: Response, method: Method) -> Result<Option<TransactionKey>> {
        let key = match TransactionKey::for_response(&response, method) {
            Ok(key) => key,
            Err(_) => {
                self.observer.notify(TransactionEvent::StrayResponse { response });
                return Ok(None);
            }
        };
        let mut table = self.inner.lock().await;
        let Some(entry) = table.get_mut(&key) else {
            drop(table);
            self.observer.notify(TransactionEvent::StrayResponse { response });
            return Ok(None);
        };

        let txn = &mut entry.transaction;
        let from = txn.state;
        let mut ack_to_send = None;

        if response.is_provisional() {
            txn.last_provisional = Some(response.clone());
            let _ = txn.transition(TransactionState::Proceeding);
        } else if txn.kind == TransactionKind::InviteClient && response.status.0 / 100 != 2 {
            // RFC 3261 §17.1.1.3: the engine owns the ACK for a non-2xx
            // INVITE final response. A duplicate final (the peer
            // retransmitting because our first ACK was lost) resends the
            // same ACK rather than rebuilding it.
            txn.last_final = Some(response.clone());
            let _ = txn.transition(TransactionState::Completed);
            let ack = txn.generated_ack.clone().unwrap_or_else(|| Transaction::build_non_2xx_ack(&txn.request, &response));
            txn.generated_ack = Some(ack.clone());
            ack_to_send = Some(ack);
        } else if txn.kind == TransactionKind::InviteClient {
            // A 2xx final is end-to-end (the TU ACKs it, not the engine);
            // the client transaction has nothing further to do and goes
            // straight to Terminated rather than lingering in Completed.
            txn.last_final = Some(response.clone());
            let _ = txn.transition(TransactionState::Terminated);
        } else {
            txn.last_final = Some(response.clone());
            let _ = txn.transition(TransactionState::Completed);
            // Non-INVITE client transactions on an unreliable transport wait
            // in Completed for Timer K before terminating.
        }
        let to = txn.state;
        drop(table);

        if from != to {
            self.observer.notify(TransactionEvent::StateChanged { key: key.clone(), from, to });
        }
        self.observer.notify(TransactionEvent::ResponseOut { key: key.clone(), response });
        if let Some(ack) = ack_to_send {
            self.queue_outbound(key.clone(), Message::Request(ack));
        }
        Ok(Some(key))
    }

    /// Matches (or creates) a server transaction for an inbound request,
    /// per `spec.md` §4.5 "Server transaction matching" and the CANCEL/ACK
    /// special cases in §9 Design Notes.
    pub async fn receive_request(&self, request: Request) -> Result<ReceiveOutcome> {
        let key = TransactionKey::for_request(&request, true)?;
        let mut table = self.inner.lock().await;

        match request.method {
            Method::Ack => {
                if let Some(entry) = table.get_mut(&key) {
                    if entry.transaction.kind == TransactionKind::InviteServer
                        && entry.transaction.state == TransactionState::Completed
                    {
                        let _ = entry.transaction.transition(TransactionState::Confirmed);
                        return Ok(ReceiveOutcome::AckAbsorbed);
                    }
                }
                return Ok(ReceiveOutcome::AckFor2xx);
            }
            Method::Cancel => {
                let Some(entry) = table.get_mut(&key) else {
                    return Ok(ReceiveOutcome::CancelTooLate);
                };
                if entry.transaction.kind != TransactionKind::InviteServer || entry.transaction.state != TransactionState::Proceeding {
                    return Ok(ReceiveOutcome::CancelTooLate);
                }
                let mut ok = Response::new(StatusCode(200));
                ok.headers = request.headers.clone();
                ok.headers.content_length = Some(0);
                // `spec.md` §3 "received-on/received-from endpoints": this
                // response never goes through `send_response`, so the
                // transport needs the reply-to address copied here, not
                // left at the `Response::new` default of `None`.
                ok.received_from = request.received_from.clone();
                ok.received_on = request.received_on.clone();
                drop(table);
                self.queue_outbound(key.clone(), Message::Response(ok));
                return Ok(ReceiveOutcome::Cancel { target: key });
            }
            _ => {}
        }

        if let Some(entry) = table.get(&key) {
            // Duplicate of a request already seen: RFC 3261 §17.2.1/§17.2.2
            // says to resend the last response rather than hand it up again.
            if let Some(last) = entry.transaction.last_final.clone().or_else(|| entry.transaction.last_provisional.clone()) {
                drop(table);
                self.queue_outbound(key, Message::Response(last));
            }
            return Ok(ReceiveOutcome::Retransmitted);
        }

        let transaction = Transaction::new_server(request.clone())?;
        let prack = if transaction.kind == TransactionKind::InviteServer { Some(PrackTracker::new()) } else { None };
        table.insert(key.clone(), Entry { transaction, prack });
        drop(table);
        self.observer.notify(TransactionEvent::RequestIn { key: key.clone(), request });
        Ok(ReceiveOutcome::NewRequest(key))
    }

    /// Sends a response on a server transaction, advancing its state and
    /// arming retransmission for non-2xx INVITE finals (Timer G) — 2xx
    /// INVITE responses are retransmitted end-to-end by the dialog layer,
    /// not by this engine (`spec.md` §4.5).
    pub async fn send_response(&self, key: &TransactionKey, response: Response) -> Result<()> {
        let mut table = self.inner.lock().await;
        let entry = table.get_mut(key).ok_or_else(|| Error::NotFound(key.to_string()))?;
        let txn = &mut entry.transaction;
        let from = txn.state;

        if response.is_provisional() {
            txn.last_provisional = Some(response.clone());
            txn.transition(TransactionState::Proceeding)?;
        } else {
            txn.last_final = Some(response.clone());
            txn.transition(TransactionState::Completed)?;
        }
        let to = txn.state;
        drop(table);

        if from != to {
            self.observer.notify(TransactionEvent::StateChanged { key: key.clone(), from, to });
        }
        self.observer.notify(TransactionEvent::ResponseOut { key: key.clone(), response: response.clone() });
        self.queue_outbound(key.clone(), Message::Response(response));
        Ok(())
    }

    /// Arms a reliable provisional response (RFC 3262) on an INVITE server
    /// transaction, assigning it the next RSeq.
    pub async fn send_reliable_provisional(&self, key: &TransactionKey, response: Response) -> Result<Response> {
        let mut table = self.inner.lock().await;
        let entry = table.get_mut(key).ok_or_else(|| Error::NotFound(key.to_string()))?;
        let prack = entry.prack.as_mut().ok_or_else(|| Error::NotFound(format!("{key} is not an INVITE server transaction")))?;
        let armed = prack.arm(response)?;
        entry.transaction.reliable_provisional_armed = true;
        entry.transaction.last_provisional = Some(armed.clone());
        drop(table);
        self.queue_outbound(key.clone(), Message::Response(armed.clone()));
        Ok(armed)
    }

    /// Matches an inbound PRACK's RAck against the armed reliable
    /// provisional for `key`, disarming it on a match.
    pub async fn receive_prack(&self, key: &TransactionKey, request_cseq: u32, rack_rseq: u32, rack_cseq: u32, rack_method: Method) -> Result<bool> {
        let mut table = self.inner.lock().await;
        let entry = table.get_mut(key).ok_or_else(|| Error::NotFound(key.to_string()))?;
        let prack = entry.prack.as_mut().ok_or_else(|| Error::NotFound(format!("{key} is not an INVITE server transaction")))?;
        let matched = prack.acknowledge(rack_rseq, rack_cseq, &rack_method, request_cseq);
        if matched {
            entry.transaction.reliable_provisional_armed = false;
        }
        Ok(matched)
    }

    /// One tick of the retransmit/timeout scheduler. Intended to be called
    /// in a loop from a single background task (`spec.md` §5 "Concurrency
    /// model" — one cooperative task drives every transaction's timers).
    pub async fn tick(&self) {
        let now = Instant::now();
        let mut table = self.inner.lock().await;
        let mut terminated = Vec::new();
        let mut to_retransmit = Vec::new();
        let mut timed_out = Vec::new();

        for (key, entry) in table.iter_mut() {
            let txn = &mut entry.transaction;
            let elapsed_in_state = now.duration_since(txn.state_entered_at);

            let timeout_limit = match (txn.kind, txn.state) {
                (TransactionKind::InviteClient, TransactionState::Calling) => Some(self.settings.timer_b()),
                (TransactionKind::InviteClient, TransactionState::Completed) => Some(self.settings.timer_d()),
                (TransactionKind::InviteServer, TransactionState::Completed) => Some(self.settings.timer_h()),
                (TransactionKind::InviteServer, TransactionState::Confirmed) => Some(self.settings.timer_i()),
                (TransactionKind::NonInviteClient, TransactionState::Trying) => Some(self.settings.timer_f()),
                (TransactionKind::NonInviteClient, TransactionState::Proceeding) => Some(self.settings.timer_f()),
                (TransactionKind::NonInviteClient, TransactionState::Completed) => Some(self.settings.timer_k()),
                (TransactionKind::NonInviteServer, TransactionState::Completed) => Some(self.settings.timer_j()),
                _ => None,
            };

            if let Some(limit) = timeout_limit {
                if elapsed_in_state >= limit {
                    match txn.state {
                        TransactionState::Calling | TransactionState::Trying | TransactionState::Proceeding => {
                            txn.has_timed_out = true;
                            timed_out.push(key.clone());
                        }
                        _ => {}
                    }
                    terminated.push(key.clone());
                    continue;
                }
            }

            let retransmits = match (txn.kind, txn.state) {
                (TransactionKind::InviteClient, TransactionState::Calling) => true,
                (TransactionKind::NonInviteClient, TransactionState::Trying) => true,
                (TransactionKind::NonInviteClient, TransactionState::Proceeding) => true,
                (TransactionKind::InviteServer, TransactionState::Completed) => true,
                (TransactionKind::NonInviteServer, TransactionState::Completed) => false,
                _ => false,
            };

            if retransmits {
                let next_due = retransmit_intervals(self.settings.t1, self.settings.t2)
                    .take(txn.retransmit_count as usize + 1)
                    .fold(std::time::Duration::ZERO, |acc, d| acc + d);
                if elapsed_in_state >= next_due {
                    txn.retransmit_count += 1;
                    let message = if let Some(resp) = &txn.last_final {
                        Message::Response(resp.clone())
                    } else {
                        Message::Request(txn.request.clone())
                    };
                    to_retransmit.push((key.clone(), message, txn.retransmit_count));
                }
            }

            // RFC 3262: an armed reliable provisional retransmits on the
            // same T1-doubling/T2-capped schedule, independent of the
            // transaction's own Proceeding-state timeout.
            if txn.state == TransactionState::Proceeding {
                if let Some(prack) = entry.prack.as_mut() {
                    if prack.is_due(self.settings.t1, self.settings.t2) {
                        if let Some((response, attempt)) = prack.retransmit() {
                            to_retransmit.push((key.clone(), Message::Response(response), attempt));
                        }
                    }
                }
            }
        }

        for key in &terminated {
            if let Some(entry) = table.get_mut(key) {
                entry.transaction.state = TransactionState::Terminated;
            }
        }
        table.retain(|_, entry| entry.transaction.state != TransactionState::Terminated);
        drop(table);

        for key in timed_out {
            self.observer.notify(TransactionEvent::BadMessage { key, reason: "transaction timed out".to_string() });
        }
        for (key, message, attempt) in to_retransmit {
            self.observer.notify(TransactionEvent::Retransmit { key: key.clone(), attempt });
            self.queue_outbound(key, message);
        }
    }

    /// Runs [`Self::tick`] on a fixed interval until the returned handle is
    /// dropped or the process shuts down. One task for the whole table,
    /// per `spec.md` §5.
    pub fn spawn_retransmit_loop(self, tick_interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }

    /// Drains every live transaction. Used by the transport's graceful
    /// shutdown path (`SPEC_FULL.md` §2 "Graceful shutdown"); safe to call
    /// more than once.
    pub async fn shutdown(&self) {
        let mut table = self.inner.lock().await;
        table.clear();
    }

    #[cfg(test)]
    pub async fn transaction_state(&self, key: &TransactionKey) -> Option<TransactionState> {
        self.inner.lock().await.get(key).map(|e| e.transaction.state)
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

    #[tokio::test]
    async fn server_transaction_resends_last_response_on_retransmitted_request() {
        let (engine, mut outbound) = TransactionEngine::new(TimerSettings::default(), Observer::default());
        let req = invite_request();
        let outcome = engine.receive_request(req.clone()).await.unwrap();
        let key = match outcome {
            ReceiveOutcome::NewRequest(k) => k,
            other => panic!("expected NewRequest, got {other:?}"),
        };
        engine.send_response(&key, Response::new(StatusCode(180))).await.unwrap();
        let _ = outbound.recv().await;

        let outcome = engine.receive_request(req).await.unwrap();
        assert!(matches!(outcome, ReceiveOutcome::Retransmitted));
        let resent = outbound.recv().await.unwrap();
        assert!(matches!(resent.message, Message::Response(r) if r.status == StatusCode(180)));
    }

    #[tokio::test]
    async fn cancel_routes_to_matching_invite_server_transaction() {
        let (engine, mut outbound) = TransactionEngine::new(TimerSettings::default(), Observer::default());
        let invite = invite_request();
        engine.receive_request(invite.clone()).await.unwrap();

        let mut cancel = Request::new(Method::Cancel, invite.request_uri.clone());
        cancel.headers.via = invite.headers.via.clone();
        let outcome = engine.receive_request(cancel).await.unwrap();
        match outcome {
            ReceiveOutcome::Cancel { target } => assert_eq!(target.method, Method::Invite),
            other => panic!("expected Cancel, got {other:?}"),
        }
        let ok_for_cancel = outbound.recv().await.unwrap();
        assert!(matches!(ok_for_cancel.message, Message::Response(r) if r.status == StatusCode(200)));
    }

    #[tokio::test]
    async fn ack_for_non_2xx_is_absorbed_into_confirmed() {
        let (engine, mut outbound) = TransactionEngine::new(TimerSettings::default(), Observer::default());
        let invite = invite_request();
        let key = match engine.receive_request(invite.clone()).await.unwrap() {
            ReceiveOutcome::NewRequest(k) => k,
            other => panic!("expected NewRequest, got {other:?}"),
        };
        engine.send_response(&key, Response::new(StatusCode(486))).await.unwrap();
        let _ = outbound.recv().await;

        let mut ack = Request::new(Method::Ack, invite.request_uri.clone());
        ack.headers.via = invite.headers.via.clone();
        let outcome = engine.receive_request(ack).await.unwrap();
        assert!(matches!(outcome, ReceiveOutcome::AckAbsorbed));
        assert_eq!(engine.transaction_state(&key).await, Some(TransactionState::Confirmed));
    }

    #[tokio::test]
    async fn stray_response_is_observed_and_not_an_error() {
        let counted = Arc::new(tokio::sync::Mutex::new(0u32));
        let counted_clone = counted.clone();
        let observer = Observer {
            on_stray_response: Some(Arc::new(move |_resp| {
                let counted = counted_clone.clone();
                tokio::spawn(async move {
                    *counted.lock().await += 1;
                });
            })),
            ..Observer::default()
        };
        let (engine, _outbound) = TransactionEngine::new(TimerSettings::default(), observer);
        let mut resp = Response::new(StatusCode(200));
        let mut via = Via::new(TransportProtocol::Udp, "nowhere.example.com", None);
        via.set_branch("z9hG4bK000");
        resp.headers.via.push(via);
        let result = engine.receive_response(resp, Method::Invite).await.unwrap();
        assert!(result.is_none());
    }
}

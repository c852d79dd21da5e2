//! Transaction lifecycle events and the observer callback table.
//!
//! `spec.md` doesn't require a notification surface beyond the request/response
//! queues, but `SPEC_FULL.md` §2 "Supplemented features" adds an `Observer`
//! so callers can watch retransmits, stray responses, and state changes for
//! metrics/logging without polling the engine. Modeled on the teacher's
//! callback-table pattern rather than a channel of its own, since an
//! `Observer` is consulted synchronously from inside the engine's lock and
//! must never block it.

use std::fmt;
use std::sync::Arc;

use sip_core::prelude::{Request, Response};

use crate::key::TransactionKey;
use crate::transaction::TransactionState;

/// A transaction lifecycle event, handed to [`Observer`] callbacks.
#[derive(Debug, Clone)]
pub enum TransactionEvent {
    /// A new request was handed to a server transaction, or a new request
    /// was sent by a client transaction.
    RequestIn { key: TransactionKey, request: Request },
    /// A response was sent out by a server transaction, or delivered up
    /// from a client transaction.
    ResponseOut { key: TransactionKey, response: Response },
    /// A request or response was retransmitted by the timer loop.
    Retransmit { key: TransactionKey, attempt: u32 },
    /// A message matching this transaction's key failed to parse or
    /// violated a protocol invariant and was dropped.
    BadMessage { key: TransactionKey, reason: String },
    /// The transaction moved from one state to another.
    StateChanged { key: TransactionKey, from: TransactionState, to: TransactionState },
    /// A response arrived that matched no known transaction (`spec.md` §7
    /// "Stray responses"); counted but otherwise dropped.
    StrayResponse { response: Response },
}

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Optional hooks into the engine's activity. Every field defaults to `None`
/// — an `Observer::default()` costs nothing. Each callback is invoked
/// synchronously and must not block or re-enter the engine.
#[derive(Clone, Default)]
pub struct Observer {
    pub on_request_in: Option<Callback<(TransactionKey, Request)>>,
    pub on_response_out: Option<Callback<(TransactionKey, Response)>>,
    pub on_retransmit: Option<Callback<(TransactionKey, u32)>>,
    pub on_bad_message: Option<Callback<(TransactionKey, String)>>,
    pub on_state_changed: Option<Callback<(TransactionKey, TransactionState, TransactionState)>>,
    pub on_stray_response: Option<Callback<Response>>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("on_request_in", &self.on_request_in.is_some())
            .field("on_response_out", &self.on_response_out.is_some())
            .field("on_retransmit", &self.on_retransmit.is_some())
            .field("on_bad_message", &self.on_bad_message.is_some())
            .field("on_state_changed", &self.on_state_changed.is_some())
            .field("on_stray_response", &self.on_stray_response.is_some())
            .finish()
    }
}

impl Observer {
    pub fn notify(&self, event: TransactionEvent) {
        match event {
            TransactionEvent::RequestIn { key, request } => {
                if let Some(cb) = &self.on_request_in {
                    cb((key, request));
                }
            }
            TransactionEvent::ResponseOut { key, response } => {
                if let Some(cb) = &self.on_response_out {
                    cb((key, response));
                }
            }
            TransactionEvent::Retransmit { key, attempt } => {
                if let Some(cb) = &self.on_retransmit {
                    cb((key, attempt));
                }
            }
            TransactionEvent::BadMessage { key, reason } => {
                if let Some(cb) = &self.on_bad_message {
                    cb((key, reason));
                }
            }
            TransactionEvent::StateChanged { key, from, to } => {
                if let Some(cb) = &self.on_state_changed {
                    cb((key, from, to));
                }
            }
            TransactionEvent::StrayResponse { response } => {
                if let Some(cb) = &self.on_stray_response {
                    cb(response);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc as StdArc;

    #[test]
    fn default_observer_ignores_every_event_without_panicking() {
        let observer = Observer::default();
        observer.notify(TransactionEvent::StrayResponse {
            response: Response::new(sip_core::prelude::StatusCode(200)),
        });
    }

    #[test]
    fn stray_response_callback_is_invoked() {
        let counter = StdArc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let observer = Observer {
            on_stray_response: Some(Arc::new(move |_resp| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            })),
            ..Observer::default()
        };
        observer.notify(TransactionEvent::StrayResponse {
            response: Response::new(sip_core::prelude::StatusCode(200)),
        });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

//! A single observer record of function values in place of the many
//! trace/event hooks the source exposes (`spec.md` §9 Design Notes: "Do not
//! reintroduce multicast delegates — a fixed observer struct is simpler to
//! reason about"), plus the plain counters `SPEC_FULL.md` §2 adds so an
//! embedding application can expose metrics without this stack depending on
//! a metrics crate.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sip_core::prelude::{Message, SipEndpoint};

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Transport-layer lifecycle hooks. Every field defaults to `None` and
/// costs nothing when unset. Callbacks run synchronously on the consumer
/// (or channel) task and must not block.
#[derive(Clone, Default)]
pub struct Observer {
    /// A new request was handed up to the TU (`spec.md` §4.6 "new request"
    /// callback).
    pub on_new_request: Option<Callback<Message>>,
    /// A response matched no known transaction (`spec.md` §4.6 "stray
    /// response" callback).
    pub on_stray_response: Option<Callback<Message>>,
    /// A message was rejected before reaching a transaction (bad Require,
    /// oversized, malformed) along with the endpoint it came from.
    pub on_bad_message: Option<Callback<(SipEndpoint, String)>>,
    /// A channel was selected (or created on demand) for an outbound send.
    pub on_channel_selected: Option<Callback<(String, SipEndpoint)>>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("on_new_request", &self.on_new_request.is_some())
            .field("on_stray_response", &self.on_stray_response.is_some())
            .field("on_bad_message", &self.on_bad_message.is_some())
            .field("on_channel_selected", &self.on_channel_selected.is_some())
            .finish()
    }
}

impl Observer {
    pub fn notify_new_request(&self, message: Message) {
        if let Some(cb) = &self.on_new_request {
            cb(message);
        }
    }

    pub fn notify_stray_response(&self, message: Message) {
        if let Some(cb) = &self.on_stray_response {
            cb(message);
        }
    }

    pub fn notify_bad_message(&self, endpoint: SipEndpoint, reason: String) {
        if let Some(cb) = &self.on_bad_message {
            cb((endpoint, reason));
        }
    }

    pub fn notify_channel_selected(&self, channel_id: String, destination: SipEndpoint) {
        if let Some(cb) = &self.on_channel_selected {
            cb((channel_id, destination));
        }
    }
}

/// Plain counters for conditions worth exposing as metrics but not worth a
/// metrics-crate dependency (`SPEC_FULL.md` §2).
#[derive(Debug, Default)]
pub struct TransportCounters {
    pub stray_responses: AtomicU64,
    pub dropped_keepalives: AtomicU64,
    pub oversized_messages: AtomicU64,
    pub stun_forwarded: AtomicU64,
}

impl TransportCounters {
    pub fn snapshot(&self) -> TransportCountersSnapshot {
        TransportCountersSnapshot {
            stray_responses: self.stray_responses.load(Ordering::Relaxed),
            dropped_keepalives: self.dropped_keepalives.load(Ordering::Relaxed),
            oversized_messages: self.oversized_messages.load(Ordering::Relaxed),
            stun_forwarded: self.stun_forwarded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportCountersSnapshot {
    pub stray_responses: u64,
    pub dropped_keepalives: u64,
    pub oversized_messages: u64,
    pub stun_forwarded: u64,
}

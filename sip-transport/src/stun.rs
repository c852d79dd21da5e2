//! STUN co-tenancy (`spec.md` §4.3, §4.6 step 1, §6 "STUN co-tenancy"): a
//! non-SIP binary payload sharing the same socket is forwarded to a
//! callback instead of being parsed as SIP.

use std::sync::Arc;

use sip_core::prelude::SipEndpoint;

/// Invoked with the channel ID, the local and remote endpoints, and the raw
/// bytes, for every inbound payload [`sip_core::is_stun_payload`] accepts.
pub type StunSink = Arc<dyn Fn(String, SipEndpoint, SipEndpoint, bytes::Bytes) + Send + Sync>;

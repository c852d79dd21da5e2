//! RFC 3261 §17 transaction layer: state machines, transaction-key
//! derivation, RFC 3262 reliable provisionals, and the shared engine that
//! drives them (`spec.md` §3-§5).
//!
//! ```
//! use sip_transaction::prelude::*;
//! use sip_core::prelude::*;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! rt.block_on(async {
//!     let (engine, mut outbound) = TransactionEngine::new(TimerSettings::default(), Observer::default());
//!     let mut request = Request::new(Method::Options, "sip:bob@biloxi.example.com".parse().unwrap());
//!     let mut via = Via::new(TransportProtocol::Udp, "pc33.atlanta.example.com", None);
//!     via.set_branch("z9hG4bK776asdhds");
//!     request.headers.via.push(via);
//!     let key = engine.send_request(request).await.unwrap();
//!     let queued = outbound.recv().await.unwrap();
//!     assert_eq!(queued.key, key);
//! });
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod key;
pub mod prack;
pub mod timer;
pub mod transaction;

pub use error::{Error, Result};

/// Re-exports the types most call sites need.
pub mod prelude {
    pub use crate::engine::{OutboundMessage, ReceiveOutcome, TransactionEngine};
    pub use crate::error::{Error, Result};
    pub use crate::events::{Observer, TransactionEvent};
    pub use crate::key::TransactionKey;
    pub use crate::prack::PrackTracker;
    pub use crate::timer::{retransmit_intervals, TimerSettings};
    pub use crate::transaction::{Transaction, TransactionKind, TransactionState};
}

//! Core SIP (RFC 3261) message model, wire-format parser/serializer and
//! digest authentication.
//!
//! This crate covers components A–D of the stack: primitive codecs (URI,
//! parameter bags, name-addr, endpoints), the typed header model, the
//! request/response message model and framing, and digest authentication
//! (RFC 2617/7616). The transaction state machines live in
//! `sip-transaction`; channel multiplexing and dispatch live in
//! `sip-transport`.
//!
//! ```
//! use sip_core::prelude::*;
//!
//! let msg = b"OPTIONS sip:bob@biloxi.example.com SIP/2.0\r\n\
//! Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776asdhds\r\n\
//! Content-Length: 0\r\n\r\n";
//! let parsed = parse_message(msg).unwrap();
//! assert!(parsed.is_request());
//! ```

pub mod auth;
pub mod error;
pub mod parser;
pub mod rng;
pub mod types;

pub use error::{Error, Result};
pub use parser::message::{is_keepalive, is_stun_payload, parse_message, MAX_MESSAGE_SIZE};

/// Re-exports the types most call sites need, mirroring the teacher's
/// `prelude` convention.
pub mod prelude {
    pub use crate::auth::{compute_ha1, compute_ha2, compute_response, Algorithm, DigestKind, DigestRecord, Secret};
    pub use crate::error::{Error, Result};
    pub use crate::parser::message::{is_keepalive, is_stun_payload, parse_message, MAX_MESSAGE_SIZE};
    pub use crate::rng::{OsRandomSource, RandomSource};
    pub use crate::types::contact::{Contact, ContactList};
    pub use crate::types::endpoint::{ChannelId, ConnectionId, SipEndpoint, TransportProtocol};
    pub use crate::types::extensions::{ExtensionSet, SipExtension};
    pub use crate::types::header::{HeaderBlock, RAck};
    pub use crate::types::message::{Message, Request, Response};
    pub use crate::types::method::{CSeq, Method};
    pub use crate::types::param::ParamBag;
    pub use crate::types::reason::Reason;
    pub use crate::types::replaces::Replaces;
    pub use crate::types::route::{Route, RouteSet};
    pub use crate::types::status::{StatusClass, StatusCode};
    pub use crate::types::uri::{Host, Scheme, Uri};
    pub use crate::types::user_field::UserField;
    pub use crate::types::via::{Via, BRANCH_MAGIC_COOKIE};
}

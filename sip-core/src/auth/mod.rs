//! Digest authentication (RFC 2617, RFC 7616/RFC 8760 SHA-256) — `spec.md`
//! §4.4.

mod compute;
mod digest;
mod params;

pub use compute::{compute_ha1, compute_ha2, compute_response, format_nonce_count};
pub use digest::{parse_digest, DigestRecord};
pub use params::{Algorithm, DigestKind, Secret};

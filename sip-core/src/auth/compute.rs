//! HA1/HA2/response hash computation (`spec.md` §4.4), MD5 (RFC 2617) or
//! SHA-256 (RFC 8760) selected by [`Algorithm`].

use sha2::{Digest, Sha256};

use super::params::{Algorithm, Secret};

fn hash_hex(algorithm: Algorithm, input: &str) -> String {
    match algorithm {
        Algorithm::Md5 => format!("{:x}", md5::compute(input.as_bytes())),
        Algorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(input.as_bytes());
            hex::encode(hasher.finalize())
        }
    }
}

/// `HA1 = H(username ":" realm ":" password)`, or the precomputed HA1
/// verbatim if that's the secret material supplied.
pub fn compute_ha1(algorithm: Algorithm, username: &str, realm: &str, secret: &Secret) -> String {
    match secret {
        Secret::PrecomputedHa1(ha1) => ha1.clone(),
        Secret::Password(password) => hash_hex(algorithm, &format!("{username}:{realm}:{password}")),
    }
}

/// `HA2 = H(method ":" digest-uri)`. `spec.md` §9 Open Questions: no
/// `qop=auth-int` support (would need the request body digest too).
pub fn compute_ha2(algorithm: Algorithm, method: &str, uri: &str) -> String {
    hash_hex(algorithm, &format!("{method}:{uri}"))
}

/// The `response` value. With `qop=auth`:
/// `H(HA1 ":" nonce ":" nc ":" cnonce ":" qop ":" HA2)`.
/// Without qop: `H(HA1 ":" nonce ":" HA2)`.
pub fn compute_response(
    algorithm: Algorithm,
    ha1: &str,
    nonce: &str,
    ha2: &str,
    qop_auth: Option<(&str, u32)>,
) -> String {
    match qop_auth {
        Some((cnonce, nc)) => {
            hash_hex(algorithm, &format!("{ha1}:{nonce}:{}:{cnonce}:auth:{ha2}", format_nonce_count(nc)))
        }
        None => hash_hex(algorithm, &format!("{ha1}:{nonce}:{ha2}")),
    }
}

/// Nonce-count serializes as eight lowercase hex digits, e.g. `00000001`
/// (`spec.md` §4.4, §8 "Nonce count zero-pads to 8 hex digits").
pub fn format_nonce_count(nc: u32) -> String {
    format!("{nc:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 7616 / `spec.md` §8 worked vector.
    #[test]
    fn rfc7616_md5_response_vector() {
        let ha1 = compute_ha1(
            Algorithm::Md5,
            "bob",
            "atlanta.example.com",
            &Secret::Password("zanzibar".to_string()),
        );
        let ha2 = compute_ha2(Algorithm::Md5, "INVITE", "sip:bob@atlanta.example.com");
        let response = compute_response(
            Algorithm::Md5,
            &ha1,
            "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            &ha2,
            Some(("0a4f113b", 1)),
        );
        assert_eq!(response, "bf57e4e0d0bffc0fbaedce64d59add5e");
    }

    #[test]
    fn nonce_count_zero_pads_to_eight_hex_digits() {
        assert_eq!(format_nonce_count(1), "00000001");
        assert_eq!(format_nonce_count(0xabc), "00000abc");
    }

    #[test]
    fn precomputed_ha1_is_used_verbatim() {
        let ha1 = compute_ha1(Algorithm::Md5, "bob", "realm", &Secret::PrecomputedHa1("deadbeef".into()));
        assert_eq!(ha1, "deadbeef");
    }

    #[test]
    fn no_qop_uses_the_shorter_response_formula() {
        let ha1 = compute_ha1(Algorithm::Md5, "bob", "realm", &Secret::Password("pw".into()));
        let ha2 = compute_ha2(Algorithm::Md5, "REGISTER", "sip:example.com");
        let response = compute_response(Algorithm::Md5, &ha1, "nonce123", &ha2, None);
        assert_eq!(response.len(), 32);
    }
}

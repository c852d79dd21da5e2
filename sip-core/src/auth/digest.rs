//! Digest authentication records (`spec.md` §3 "Digest record", §4.4, §6
//! "Digest header wire form").

use std::fmt;

use crate::error::{Error, Result};
use crate::types::param::ParamBag;

use super::compute::{compute_ha1, compute_ha2, compute_response, format_nonce_count};
use super::params::{Algorithm, DigestKind, Secret};

/// A parsed/constructed WWW-Authenticate, Proxy-Authenticate, Authorization
/// or Proxy-Authorization digest header. Fields that don't apply to a given
/// `kind` (e.g. `response` on a challenge) are simply `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestRecord {
    pub kind: DigestKind,
    pub realm: Option<String>,
    pub nonce: Option<String>,
    pub username: Option<String>,
    pub uri: Option<String>,
    pub response: Option<String>,
    pub cnonce: Option<String>,
    pub nonce_count: Option<u32>,
    pub qop: Option<String>,
    pub opaque: Option<String>,
    pub algorithm: Algorithm,
    pub secret: Option<Secret>,
    /// Anything else (`stale`, `domain`, ...), preserved verbatim.
    pub extra: ParamBag,
}

impl DigestRecord {
    pub fn challenge(kind: DigestKind, realm: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            kind,
            realm: Some(realm.into()),
            nonce: Some(nonce.into()),
            username: None,
            uri: None,
            response: None,
            cnonce: None,
            nonce_count: None,
            qop: None,
            opaque: None,
            algorithm: Algorithm::Md5,
            secret: None,
            extra: ParamBag::new(),
        }
    }

    /// Builds the credentials record answering this challenge, computing
    /// `response` over `method`/`request_uri` with `secret`. When the
    /// challenge advertises `qop=auth`, `cnonce` must be supplied and
    /// `nonce_count` is the count of uses of this nonce by this client
    /// (starting at 1, per `spec.md` §4.4).
    pub fn authorize(
        &self,
        username: impl Into<String>,
        request_uri: impl Into<String>,
        method: &str,
        secret: Secret,
        cnonce: Option<String>,
        nonce_count: Option<u32>,
    ) -> Result<DigestRecord> {
        let kind = self.kind.response_kind().ok_or_else(|| {
            Error::InvalidDigest(format!("{:?} is not a challenge header", self.kind))
        })?;
        let realm = self.realm.clone().ok_or_else(|| Error::InvalidDigest("challenge missing realm".into()))?;
        let nonce = self.nonce.clone().ok_or_else(|| Error::InvalidDigest("challenge missing nonce".into()))?;
        let username = username.into();
        let request_uri = request_uri.into();

        let wants_qop_auth = self.qop.as_deref().map(|q| q.split(',').any(|t| t.trim() == "auth")).unwrap_or(false);
        let (qop, cnonce, nonce_count) = if wants_qop_auth {
            let cnonce = cnonce.ok_or_else(|| Error::InvalidDigest("qop=auth requires a cnonce".into()))?;
            let nc = nonce_count.unwrap_or(1);
            (Some("auth".to_string()), Some(cnonce), Some(nc))
        } else {
            (None, None, None)
        };

        let ha1 = compute_ha1(self.algorithm, &username, &realm, &secret);
        let ha2 = compute_ha2(self.algorithm, method, &request_uri);
        let qop_auth_args = match (&qop, &cnonce, nonce_count) {
            (Some(_), Some(cnonce), Some(nc)) => Some((cnonce.as_str(), nc)),
            _ => None,
        };
        let response = compute_response(self.algorithm, &ha1, &nonce, &ha2, qop_auth_args);

        Ok(DigestRecord {
            kind,
            realm: Some(realm),
            nonce: Some(nonce),
            username: Some(username),
            uri: Some(request_uri),
            response: Some(response),
            cnonce,
            nonce_count,
            qop,
            opaque: self.opaque.clone(),
            algorithm: self.algorithm,
            secret: Some(secret),
            extra: ParamBag::new(),
        })
    }
}

impl fmt::Display for DigestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest ")?;
        let mut parts: Vec<String> = Vec::new();
        if let Some(realm) = &self.realm {
            parts.push(format!("realm=\"{realm}\""));
        }
        if let Some(username) = &self.username {
            parts.push(format!("username=\"{username}\""));
        }
        if let Some(nonce) = &self.nonce {
            parts.push(format!("nonce=\"{nonce}\""));
        }
        if let Some(uri) = &self.uri {
            parts.push(format!("uri=\"{uri}\""));
        }
        if let Some(response) = &self.response {
            parts.push(format!("response=\"{response}\""));
        }
        // algorithm, qop and nc are unquoted per RFC 7616/2617.
        parts.push(format!("algorithm={}", self.algorithm));
        if let Some(cnonce) = &self.cnonce {
            parts.push(format!("cnonce=\"{cnonce}\""));
        }
        if let Some(opaque) = &self.opaque {
            parts.push(format!("opaque=\"{opaque}\""));
        }
        if let Some(qop) = &self.qop {
            parts.push(format!("qop={qop}"));
        }
        if let Some(nc) = self.nonce_count {
            parts.push(format!("nc={}", format_nonce_count(nc)));
        }
        for (key, value) in self.extra.iter() {
            match value {
                Some(v) => parts.push(format!("{key}=\"{v}\"")),
                None => parts.push(key.to_string()),
            }
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Parse a digest header value (without the leading header name), tolerant
/// of unquoted values, out-of-order fields and irregular whitespace
/// (`spec.md` §4.4).
pub fn parse_digest(kind: DigestKind, value: &str) -> Result<DigestRecord> {
    let value = value.trim();
    let rest = value
        .strip_prefix("Digest")
        .map(str::trim_start)
        .ok_or_else(|| Error::InvalidDigest("missing 'Digest' scheme prefix".to_string()))?;

    let mut record = DigestRecord {
        kind,
        realm: None,
        nonce: None,
        username: None,
        uri: None,
        response: None,
        cnonce: None,
        nonce_count: None,
        qop: None,
        opaque: None,
        algorithm: Algorithm::Md5,
        secret: None,
        extra: ParamBag::new(),
    };

    for (key, value) in split_comma_pairs(rest) {
        let key_lower = key.to_ascii_lowercase();
        match key_lower.as_str() {
            "realm" => record.realm = Some(value),
            "nonce" => record.nonce = Some(value),
            "username" => record.username = Some(value),
            "uri" => record.uri = Some(value),
            "response" => record.response = Some(value),
            "cnonce" => record.cnonce = Some(value),
            "opaque" => record.opaque = Some(value),
            "qop" => record.qop = Some(value),
            "nc" => {
                record.nonce_count = Some(u32::from_str_radix(value.trim(), 16).map_err(|_| {
                    Error::InvalidDigest(format!("invalid nonce-count: {value:?}"))
                })?);
            }
            "algorithm" => {
                record.algorithm = value.parse().map_err(|_| {
                    Error::InvalidDigest(format!("unsupported algorithm: {value:?}"))
                })?;
            }
            _ => record.extra.set_value(key, value),
        }
    }

    Ok(record)
}

/// Split a comma-separated `key=value` (or bare `key`) sequence, honoring
/// quoted values so a `,` inside `realm="a,b"` doesn't split the pair.
fn split_comma_pairs(input: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut depth_quote = false;
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    let mut segments = Vec::new();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                depth_quote = !depth_quote;
                current.push(c);
            }
            ',' if !depth_quote => {
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        segments.push(current);
    }

    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if let Some((key, value)) = segment.split_once('=') {
            let value = value.trim();
            let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
            pairs.push((key.trim().to_string(), value.to_string()));
        }
    }
    pairs
}

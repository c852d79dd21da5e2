//! The Replaces header (RFC 3891), `spec.md` §8 scenario 5.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::parser::params::parse_params;
use crate::types::param::ParamBag;

/// `Replaces: call-id;to-tag=...;from-tag=...[;early-only]`. Identifies an
/// existing dialog a new INVITE is meant to replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replaces {
    pub call_id: String,
    pub to_tag: String,
    pub from_tag: String,
    pub early_only: bool,
    pub params: ParamBag,
}

impl Replaces {
    /// The `(Call-ID, local-tag, remote-tag)` triple this Replaces header
    /// targets, in the same shape used to key a dialog (`spec.md`
    /// GLOSSARY "Dialog").
    pub fn dialog_key(&self) -> (String, String, String) {
        (self.call_id.clone(), self.to_tag.clone(), self.from_tag.clone())
    }
}

impl fmt::Display for Replaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};to-tag={};from-tag={}", self.call_id, self.to_tag, self.from_tag)?;
        if self.early_only {
            write!(f, ";early-only")?;
        }
        write!(f, "{}", self.params.serialize(';'))
    }
}

impl FromStr for Replaces {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (call_id, rest) = s
            .split_once(';')
            .map(|(a, b)| (a, Some(b)))
            .unwrap_or((s, None));
        if call_id.is_empty() {
            return Err(Error::invalid_header("Replaces", "missing call-id"));
        }
        let mut params = ParamBag::new();
        if let Some(rest) = rest {
            let (_, parsed) = parse_params(&format!(";{rest}"), ';')
                .map_err(|e| Error::invalid_header("Replaces", e.to_string()))?;
            params = parsed;
        }
        let to_tag = params
            .get_str("to-tag")
            .ok_or_else(|| Error::invalid_header("Replaces", "missing to-tag"))?
            .to_string();
        let from_tag = params
            .get_str("from-tag")
            .ok_or_else(|| Error::invalid_header("Replaces", "missing from-tag"))?
            .to_string();
        let early_only = params.contains("early-only");
        params.remove("to-tag");
        params.remove("from-tag");
        params.remove("early-only");
        Ok(Replaces { call_id: call_id.to_string(), to_tag, from_tag, early_only, params })
    }
}

//! Contact header entries (`spec.md` §3 "Contact list").

use std::fmt;

use crate::types::user_field::UserField;

/// A single Contact entry: either a concrete address or the literal `*`
/// (valid only in a REGISTER request, meaning "remove all bindings").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contact {
    Star,
    Address(UserField),
}

impl Contact {
    /// `expires` parameter as an integer, or `-1` if absent, matching the
    /// sentinel convention `spec.md` §3 uses for Max-Forwards-style
    /// "not present" signaling.
    pub fn expires(&self) -> i64 {
        match self {
            Contact::Star => -1,
            Contact::Address(uf) => uf.params.get_str("expires").and_then(|s| s.parse().ok()).unwrap_or(-1),
        }
    }

    pub fn q(&self) -> Option<f32> {
        match self {
            Contact::Star => None,
            Contact::Address(uf) => uf.params.get_str("q").and_then(|s| s.parse().ok()),
        }
    }

    pub fn as_address(&self) -> Option<&UserField> {
        match self {
            Contact::Address(uf) => Some(uf),
            Contact::Star => None,
        }
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contact::Star => f.write_str("*"),
            Contact::Address(uf) => write!(f, "{uf}"),
        }
    }
}

/// An ordered list of Contact entries, as they appear (repeated header
/// lines or a single comma-separated line) in a Contact header block.
pub type ContactList = Vec<Contact>;

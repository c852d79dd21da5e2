//! `UserField`: the `[display-name] <uri> *(;param)` shape shared by
//! From, To, Contact, Route, Record-Route and Refer-To (`spec.md` §3).

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::parser::params::parse_params;
use crate::types::param::ParamBag;
use crate::types::uri::Uri;

/// A display name plus URI plus trailing parameters, as it appears in
/// name-addr headers. `display_name` is `None` when the header used the
/// bare `addr-spec` form (no angle brackets, no parameters allowed in that
/// form per the grammar — callers constructing one programmatically may
/// still attach params, which forces angle-bracket serialization).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserField {
    pub display_name: Option<String>,
    pub uri: Uri,
    pub params: ParamBag,
}

impl UserField {
    pub fn new(uri: Uri) -> Self {
        Self { display_name: None, uri, params: ParamBag::new() }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.params.get_str("tag")
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.params.set_value("tag", tag.into());
    }

    /// `true` when this entry's URI parameters carry `lr` — used by Route
    /// entries to decide loose- vs strict-router forwarding (`spec.md`
    /// §3 "Route set", §4.6).
    pub fn is_loose_route(&self) -> bool {
        self.uri.is_loose_route()
    }

    fn needs_angle_brackets(&self) -> bool {
        self.display_name.is_some() || !self.params.is_empty()
    }
}

impl fmt::Display for UserField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            if name.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-') && !name.is_empty() {
                write!(f, "{name} ")?;
            } else {
                write!(f, "\"{}\" ", name.replace('\\', "\\\\").replace('"', "\\\""))?;
            }
        }
        if self.needs_angle_brackets() {
            write!(f, "<{}>", self.uri)?;
        } else {
            write!(f, "{}", self.uri)?;
        }
        write!(f, "{}", self.params.serialize(';'))
    }
}

impl FromStr for UserField {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        crate::parser::user_field::parse_user_field(s.trim())
            .map(|(_, uf)| uf)
            .map_err(|e| Error::invalid_header("name-addr", e.to_string()))
    }
}

//! Insertion-ordered parameter bags (`;k=v` / `,k=v` sequences).
//!
//! Via, URI, Contact, Route and the digest-auth headers all attach a
//! sequence of key/value parameters to some other value. RFC 3261 never
//! requires a particular parameter order, but real deployments are sensitive
//! to it (some UAs grep raw headers), so [`ParamBag`] preserves insertion
//! order rather than normalizing into a sorted map. A parameter with no `=`
//! (a bare flag, e.g. `;lr`) stores `None` as its value and must round-trip
//! that way — `None` is "flag present", not "value is empty string".

use std::fmt;

/// An insertion-ordered, case-insensitively-keyed multimap of SIP
/// parameters, as described in `spec.md` §3 "Parameter bag".
///
/// Lookups are case-insensitive (`branch` and `Branch` refer to the same
/// entry); the case used on first insertion is preserved for serialization.
/// Inserting a key that already exists overwrites its value in place,
/// keeping the original position — this is the "last-wins" rule from the
/// spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamBag {
    entries: Vec<(String, Option<String>)>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Number of distinct parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    /// Insert or overwrite `key` with `value`. `None` means a bare flag
    /// (`;lr`, `;branch` with no `=`).
    pub fn set(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) {
        let key = key.into();
        let value = value.map(Into::into);
        if let Some(idx) = self.find(&key) {
            self.entries[idx].1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Convenience for `set(key, Some(value))`.
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, Some(value.into()));
    }

    /// Convenience for a bare flag parameter.
    pub fn set_flag(&mut self, key: impl Into<String>) {
        self.set::<String>(key, None);
    }

    /// The value for `key`, if present. Returns `Some(None)` for a bare
    /// flag, `None` if the key is absent entirely.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.find(key).map(|idx| self.entries[idx].1.as_deref())
    }

    /// The value for `key` as a string slice, or `None` if absent or a bare
    /// flag.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).flatten()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Option<String>> {
        self.find(key).map(|idx| self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Serialize with the given leading delimiter between entries (`;` for
    /// URI/Via parameters, `,` for comma-separated header lists). Values
    /// that contain the delimiter, whitespace or `"` are quoted.
    pub fn serialize(&self, delimiter: char) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push(delimiter);
            out.push_str(key);
            if let Some(value) = value {
                out.push('=');
                if needs_quoting(value) {
                    out.push('"');
                    out.push_str(&value.replace('\\', "\\\\").replace('"', "\\\""));
                    out.push('"');
                } else {
                    out.push_str(value);
                }
            }
        }
        out
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value.chars().any(|c| c.is_whitespace() || matches!(c, ';' | ',' | '"' | '='))
}

/// Default `Display` renders as a `;`-delimited URI/Via-style parameter
/// sequence. Use [`ParamBag::serialize`] directly for comma-separated
/// contexts.
impl fmt::Display for ParamBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize(';'))
    }
}

impl FromIterator<(String, Option<String>)> for ParamBag {
    fn from_iter<T: IntoIterator<Item = (String, Option<String>)>>(iter: T) -> Self {
        let mut bag = ParamBag::new();
        for (k, v) in iter {
            bag.set(k, v);
        }
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_wins_keeps_original_position() {
        let mut bag = ParamBag::new();
        bag.set_value("branch", "z9hG4bK1");
        bag.set_flag("lr");
        bag.set_value("branch", "z9hG4bK2");
        assert_eq!(bag.get_str("branch"), Some("z9hG4bK2"));
        assert_eq!(bag.serialize(';'), ";branch=z9hG4bK2;lr");
    }

    #[test]
    fn case_insensitive_lookup_preserves_original_case() {
        let mut bag = ParamBag::new();
        bag.set_value("Transport", "tcp");
        assert_eq!(bag.get_str("transport"), Some("tcp"));
        assert_eq!(bag.serialize(';'), ";Transport=tcp");
    }

    #[test]
    fn flag_round_trips_without_equals() {
        let mut bag = ParamBag::new();
        bag.set_flag("lr");
        assert_eq!(bag.serialize(';'), ";lr");
        assert_eq!(bag.get("lr"), Some(None));
    }

    #[test]
    fn quotes_values_needing_it() {
        let mut bag = ParamBag::new();
        bag.set_value("reason", "Call completed elsewhere");
        assert_eq!(bag.serialize(';'), ";reason=\"Call completed elsewhere\"");
    }
}

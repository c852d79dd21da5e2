//! Parser for the `[display-name] (name-addr / addr-spec) *(;param)` shape
//! used by From, To, Contact, Route, Record-Route and Refer-To.

use nom::IResult;

use crate::error::Error;
use crate::parser::params::parse_params;
use crate::parser::uri::parse_uri;
use crate::types::param::ParamBag;
use crate::types::user_field::UserField;

fn parse_display_name(input: &str) -> (Option<String>, &str) {
    let trimmed = input.trim_start();
    if let Some(rest) = trimmed.strip_prefix('"') {
        if let Some(end) = find_unescaped_quote(rest) {
            let name = unescape(&rest[..end]);
            return (Some(name), rest[end + 1..].trim_start());
        }
    }
    // Unquoted token sequence up to `<`.
    if let Some(idx) = trimmed.find('<') {
        let name = trimmed[..idx].trim();
        if !name.is_empty() {
            return (Some(name.to_string()), &trimmed[idx..]);
        }
        return (None, &trimmed[idx..]);
    }
    (None, trimmed)
}

fn find_unescaped_quote(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Parse a `name-addr` or bare `addr-spec` plus any trailing header
/// parameters, returning the unconsumed remainder.
pub fn parse_user_field(input: &str) -> IResult<&str, UserField> {
    let (display_name, rest) = parse_display_name(input);

    if let Some(inner) = rest.strip_prefix('<') {
        let end = inner.find('>').ok_or_else(|| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
        })?;
        let (_, uri) = parse_uri(&inner[..end])?;
        let after = &inner[end + 1..];
        let (after, params) = parse_params(after, ';')?;
        return Ok((after, UserField { display_name, uri, params }));
    }

    let (remainder, uri) = parse_uri(rest)?;
    Ok((remainder, UserField { display_name, uri, params: ParamBag::new() }))
}

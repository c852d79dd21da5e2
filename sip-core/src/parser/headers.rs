//! Header-block splitting/unfolding and per-header dispatch (`spec.md`
//! §4.2).

use crate::auth::{parse_digest, DigestKind};
use crate::error::{Error, Result};
use crate::types::contact::Contact;
use crate::types::extensions::ExtensionSet;
use crate::types::header::{HeaderBlock, RAck};
use crate::types::method::CSeq;
use crate::types::reason::Reason;
use crate::types::replaces::Replaces;
use crate::types::route::Route;
use crate::types::user_field::UserField;

/// Expands a compact header alias (RFC 3261 §20, `spec.md` §4.2) to its long
/// form. Anything not in the table passes through unchanged.
fn expand_compact_name(name: &str) -> &str {
    match name {
        "v" | "V" => "Via",
        "f" | "F" => "From",
        "t" | "T" => "To",
        "i" | "I" => "Call-ID",
        "m" | "M" => "Contact",
        "l" | "L" => "Content-Length",
        "c" | "C" => "Content-Type",
        "s" | "S" => "Subject",
        "k" | "K" => "Supported",
        "r" | "R" => "Refer-To",
        "u" | "U" => "Allow-Events",
        "o" | "O" => "Event",
        other => other,
    }
}

/// Unfolds CRLF/LF line continuations (a line beginning with whitespace
/// continues the previous header's value) and returns one string per
/// logical header line.
fn unfold(block: &str) -> Vec<String> {
    let normalized = block.replace("\r\n", "\n");
    let mut lines: Vec<String> = Vec::new();
    for line in normalized.split('\n') {
        if line.is_empty() {
            continue;
        }
        if (line.starts_with(' ') || line.starts_with('\t')) && !lines.is_empty() {
            let last = lines.last_mut().expect("checked non-empty above");
            last.push(' ');
            last.push_str(line.trim_start());
        } else {
            lines.push(line.to_string());
        }
    }
    lines
}

/// Splits a comma-separated header value at top-level commas only — commas
/// inside a quoted string or `<...>` name-addr are not delimiters.
pub fn split_top_level_commas(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut angle_depth = 0i32;
    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '<' if !in_quotes => {
                angle_depth += 1;
                current.push(c);
            }
            '>' if !in_quotes => {
                angle_depth -= 1;
                current.push(c);
            }
            ',' if !in_quotes && angle_depth <= 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts.into_iter().map(|p| p.trim().to_string()).collect()
}

fn parse_user_field_or_err(header: &str, value: &str) -> Result<UserField> {
    value.trim().parse().map_err(|e: Error| Error::invalid_header(header, e.to_string()))
}

/// Parses an already-extracted header block (the bytes between the start
/// line and the empty line terminating it) into a [`HeaderBlock`].
pub fn parse_header_block(block: &str) -> Result<HeaderBlock> {
    let mut headers = HeaderBlock::new();

    for line in unfold(block) {
        let (raw_name, raw_value) = line
            .split_once(':')
            .ok_or_else(|| Error::invalid_header("<header>", format!("missing ':' in {line:?}")))?;
        let name = expand_compact_name(raw_name.trim());
        let value = raw_value.trim();
        let canonical = name.to_ascii_lowercase();

        match canonical.as_str() {
            "via" => {
                for entry in split_top_level_commas(value) {
                    let via = entry.parse().map_err(|e: Error| Error::invalid_header("Via", e.to_string()))?;
                    headers.via.push(via);
                }
            }
            "from" => headers.from = Some(parse_user_field_or_err("From", value)?),
            "to" => headers.to = Some(parse_user_field_or_err("To", value)?),
            "call-id" => headers.call_id = Some(value.to_string()),
            "cseq" => {
                let cseq: CSeq = value.parse().map_err(|e: Error| Error::invalid_header("CSeq", e.to_string()))?;
                headers.cseq = Some(cseq);
            }
            "max-forwards" => {
                headers.max_forwards = value
                    .parse()
                    .map_err(|e| Error::InvalidInteger { field: "Max-Forwards".into(), source: e })?;
            }
            "contact" => {
                if value.trim() == "*" {
                    headers.contacts.push(Contact::Star);
                } else {
                    for entry in split_top_level_commas(value) {
                        let uf = parse_user_field_or_err("Contact", &entry)?;
                        headers.contacts.push(Contact::Address(uf));
                    }
                }
            }
            "route" => {
                for entry in split_top_level_commas(value) {
                    headers.routes.push(Route::new(parse_user_field_or_err("Route", &entry)?));
                }
            }
            "record-route" => {
                for entry in split_top_level_commas(value) {
                    headers.record_routes.push(Route::new(parse_user_field_or_err("Record-Route", &entry)?));
                }
            }
            "content-length" => {
                headers.content_length = Some(
                    value
                        .parse()
                        .map_err(|e| Error::InvalidInteger { field: "Content-Length".into(), source: e })?,
                );
            }
            "content-type" => headers.content_type = Some(value.to_string()),
            "www-authenticate" => {
                headers.www_authenticate.push(parse_digest(DigestKind::WwwAuthenticate, value)?)
            }
            "proxy-authenticate" => {
                headers.proxy_authenticate.push(parse_digest(DigestKind::ProxyAuthenticate, value)?)
            }
            "authorization" => headers.authorization.push(parse_digest(DigestKind::Authorization, value)?),
            "proxy-authorization" => {
                headers.proxy_authorization.push(parse_digest(DigestKind::ProxyAuthorization, value)?)
            }
            "expires" => {
                headers.expires =
                    Some(value.parse().map_err(|e| Error::InvalidInteger { field: "Expires".into(), source: e })?)
            }
            "min-expires" => {
                headers.min_expires = Some(
                    value.parse().map_err(|e| Error::InvalidInteger { field: "Min-Expires".into(), source: e })?,
                )
            }
            "supported" => merge_extension_set(&mut headers.supported, value),
            "require" => merge_extension_set(&mut headers.require, value),
            "proxy-require" => merge_extension_set(&mut headers.proxy_require, value),
            "unsupported" => merge_extension_set(&mut headers.unsupported, value),
            "event" => headers.event = Some(value.to_string()),
            "subscription-state" => headers.subscription_state = Some(value.to_string()),
            "allow-events" => headers.allow_events = Some(value.to_string()),
            "refer-to" => {
                if headers.refer_to.is_some() {
                    return Err(Error::DuplicateHeader("Refer-To".to_string()));
                }
                headers.refer_to = Some(parse_user_field_or_err("Refer-To", value)?);
            }
            "referred-by" => headers.referred_by = Some(parse_user_field_or_err("Referred-By", value)?),
            "refer-sub" => {
                if headers.refer_sub.is_some() {
                    return Err(Error::DuplicateHeader("Refer-Sub".to_string()));
                }
                headers.refer_sub = Some(match value.to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" => false,
                    other => return Err(Error::invalid_header("Refer-Sub", format!("expected true/false, got {other:?}"))),
                });
            }
            "replaces" => {
                headers.replaces =
                    Some(value.parse().map_err(|e: Error| Error::invalid_header("Replaces", e.to_string()))?)
            }
            "reason" => headers
                .reason
                .push(value.parse().map_err(|e: Error| Error::invalid_header("Reason", e.to_string()))?),
            "rseq" => {
                headers.rseq =
                    Some(value.parse().map_err(|e| Error::InvalidInteger { field: "RSeq".into(), source: e })?)
            }
            "rack" => headers.rack = Some(parse_rack(value)?),
            "sip-etag" | "etag" => headers.etag = Some(value.to_string()),
            "user-agent" => headers.user_agent = Some(value.to_string()),
            "server" => headers.server = Some(value.to_string()),
            "date" => headers.date = Some(value.to_string()),
            "timestamp" => headers.timestamp = Some(value.to_string()),
            "warning" => headers.warning.push(value.to_string()),
            _ if canonical.starts_with("proxy-") => headers.proxy_custom.push((name.to_string(), value.to_string())),
            _ => headers.push_unknown(name, value),
        }
    }

    Ok(headers)
}

fn merge_extension_set(set: &mut ExtensionSet, value: &str) {
    let parsed = ExtensionSet::parse(value);
    set.known.extend(parsed.known);
    set.unknown.extend(parsed.unknown);
}

fn parse_rack(value: &str) -> Result<RAck> {
    let mut parts = value.split_whitespace();
    let rseq = parts
        .next()
        .ok_or_else(|| Error::invalid_header("RAck", "missing RSeq"))?
        .parse()
        .map_err(|e| Error::InvalidInteger { field: "RAck.rseq".into(), source: e })?;
    let cseq = parts
        .next()
        .ok_or_else(|| Error::invalid_header("RAck", "missing CSeq number"))?
        .parse()
        .map_err(|e| Error::InvalidInteger { field: "RAck.cseq".into(), source: e })?;
    let method = parts
        .next()
        .ok_or_else(|| Error::invalid_header("RAck", "missing method"))?
        .parse()?;
    Ok(RAck { rseq, cseq, method })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfolds_continuation_lines() {
        let lines = unfold("Subject: Hello\r\n there\r\nTo: sip:bob@example.com\r\n");
        assert_eq!(lines, vec!["Subject: Hello there".to_string(), "To: sip:bob@example.com".to_string()]);
    }

    #[test]
    fn compact_aliases_expand() {
        let headers =
            parse_header_block("v: SIP/2.0/UDP pc33.example.com;branch=z9hG4bK1\r\ni: abc@example.com\r\n").unwrap();
        assert_eq!(headers.via.len(), 1);
        assert_eq!(headers.call_id.as_deref(), Some("abc@example.com"));
    }

    #[test]
    fn comma_separated_vias_all_parsed() {
        let headers = parse_header_block(
            "Via: SIP/2.0/UDP a.example.com;branch=z9hG4bK1, SIP/2.0/UDP b.example.com;branch=z9hG4bK2\r\n",
        )
        .unwrap();
        assert_eq!(headers.via.len(), 2);
        assert_eq!(headers.via[0].host, "a.example.com");
        assert_eq!(headers.via[1].host, "b.example.com");
    }

    #[test]
    fn duplicate_refer_to_is_a_validation_error() {
        let result = parse_header_block(
            "Refer-To: <sip:a@example.com>\r\nRefer-To: <sip:b@example.com>\r\n",
        );
        assert!(matches!(result, Err(Error::DuplicateHeader(name)) if name == "Refer-To"));
    }

    #[test]
    fn max_forwards_zero_is_preserved_distinct_from_absent() {
        let headers = parse_header_block("Max-Forwards: 0\r\n").unwrap();
        assert_eq!(headers.max_forwards, 0);
    }

    #[test]
    fn unknown_headers_preserve_order() {
        let headers = parse_header_block("X-First: 1\r\nX-Second: 2\r\n").unwrap();
        assert_eq!(headers.unknown, vec![("X-First".to_string(), "1".to_string()), ("X-Second".to_string(), "2".to_string())]);
    }
}

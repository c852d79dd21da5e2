//! Percent-encoding helpers for the different reserved-character sets used
//! by the `user`, `password` and URI-parameter-value productions of
//! RFC 3261 §19.1.2.

use crate::error::{Error, Result};

/// `unreserved = alphanum / mark`, `mark = "-_.!~*'()"` (RFC 2396 §2.3).
fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_.!~*'()".contains(c)
}

/// `user-unreserved = "&" / "=" / "+" / "$" / "," / ";" / "?" / "/"`
pub const USER_EXTRA: &str = "&=+$,;?/";
/// `password = *( unreserved / escaped / "&" / "=" / "+" / "$" / "," )`
pub const PASSWORD_EXTRA: &str = "&=+$,";
/// `param-unreserved = "[" / "]" / "/" / ":" / "&" / "+" / "$"`
pub const PARAM_EXTRA: &str = "[]/:&+$";

/// Percent-encode `s`, leaving `unreserved` characters and everything in
/// `extra` untouched.
pub fn percent_encode(s: &str, extra: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        let c = b as char;
        if is_unreserved(c) || extra.contains(c) {
            out.push(c);
        } else {
            out.push('%');
            out.push_str(&format!("{:02X}", b));
        }
    }
    out
}

/// Percent-decode `s`. Fails on a `%` not followed by two hex digits or on
/// invalid UTF-8 in the decoded byte stream.
pub fn percent_decode(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return Err(Error::Malformed(format!("truncated percent-escape in {s:?}")));
            }
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .map_err(|_| Error::Malformed(format!("invalid percent-escape in {s:?}")))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| Error::Malformed(format!("invalid percent-escape in {s:?}")))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| Error::Malformed(format!("invalid UTF-8 after decoding {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_user_part() {
        let original = "alice bob&x";
        let encoded = percent_encode(original, USER_EXTRA);
        assert_eq!(percent_decode(&encoded).unwrap(), original);
    }

    #[test]
    fn leaves_user_unreserved_chars_unescaped() {
        assert_eq!(percent_encode("a;b?c", USER_EXTRA), "a;b?c");
    }

    #[test]
    fn escapes_space_and_reencodes() {
        assert_eq!(percent_encode("a b", USER_EXTRA), "a%20b");
        assert_eq!(percent_decode("a%20b").unwrap(), "a b");
    }
}

//! nom combinators for `;k=v` / `,k=v` parameter sequences shared by URIs,
//! Via, Contact/Route and the digest-auth headers.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while, take_while1},
    character::complete::char,
    combinator::{map, opt, recognize, value},
    multi::{fold_many0, many0},
    sequence::{pair, preceded, separated_pair},
    IResult,
};

use crate::types::param::ParamBag;

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-.!%*_+`'~".contains(c)
}

fn token(input: &str) -> IResult<&str, &str> {
    take_while1(is_token_char)(input)
}

/// A quoted-string per RFC 3261 §25.1, returning the *unescaped* contents.
fn quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let mut out = String::new();
    let mut rest = input;
    loop {
        if let Some(stripped) = rest.strip_prefix('"') {
            return Ok((stripped, out));
        }
        if let Some(stripped) = rest.strip_prefix('\\') {
            let mut chars = stripped.chars();
            if let Some(c) = chars.next() {
                out.push(c);
                rest = chars.as_str();
                continue;
            }
            return Err(nom::Err::Error(nom::error::Error::new(rest, nom::error::ErrorKind::Escaped)));
        }
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) => {
                out.push(c);
                rest = chars.as_str();
            }
            None => {
                return Err(nom::Err::Error(nom::error::Error::new(rest, nom::error::ErrorKind::Tag)));
            }
        }
    }
}

fn param_value(input: &str) -> IResult<&str, String> {
    alt((quoted_string, map(token, str::to_string)))(input)
}

fn one_param(delimiter: char) -> impl Fn(&str) -> IResult<&str, (String, Option<String>)> {
    move |input: &str| {
        let (input, _) = char(delimiter)(input)?;
        let (input, _) = take_while(|c: char| c == ' ' || c == '\t')(input)?;
        let (input, key) = token(input)?;
        let (input, value) = opt(preceded(
            pair(
                take_while(|c: char| c == ' ' || c == '\t'),
                pair(char('='), take_while(|c: char| c == ' ' || c == '\t')),
            ),
            param_value,
        ))(input)?;
        Ok((input, (key.to_string(), value)))
    }
}

/// Parse a leading-delimiter parameter sequence (e.g. `;a=1;b;c="x,y"`) into
/// a [`ParamBag`], returning the unconsumed remainder of `input`.
pub fn parse_params<'a>(input: &'a str, delimiter: char) -> IResult<&'a str, ParamBag> {
    fold_many0(one_param(delimiter), ParamBag::new, |mut bag, (k, v)| {
        bag.set(k, v);
        bag
    })(input)
}

/// Parse a parameter sequence that may use either `;` or `,` as its
/// delimiter, switching per-entry (used for Via lists tolerantly folded onto
/// one comma-separated line, where parameters of each Via are still
/// semicolon-delimited).
pub fn parse_params_semicolon(input: &str) -> IResult<&str, ParamBag> {
    parse_params(input, ';')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_flags_and_values() {
        let (rest, bag) = parse_params(";a=1;b;c=\"x,y\"", ';').unwrap();
        assert_eq!(rest, "");
        assert_eq!(bag.get_str("a"), Some("1"));
        assert_eq!(bag.get("b"), Some(None));
        assert_eq!(bag.get_str("c"), Some("x,y"));
    }

    #[test]
    fn stops_at_unconsumed_remainder() {
        let (rest, bag) = parse_params(";transport=tcp?subject=x", ';').unwrap();
        assert_eq!(rest, "?subject=x");
        assert_eq!(bag.get_str("transport"), Some("tcp"));
    }

    #[test]
    fn quoted_value_with_escaped_quote_round_trips() {
        let (rest, bag) = parse_params(r#";reason="she said \"hi\"""#, ';').unwrap();
        assert_eq!(rest, "");
        assert_eq!(bag.get_str("reason"), Some("she said \"hi\""));
    }
}

//! Parser for a single Via-header entry: `SIP/2.0/UDP host[:port][;params]`.
//!
//! `spec.md` §4.2 calls out one tolerated malformation: `branch` appearing
//! without its preceding `;` (e.g. `...host:5060branch=z9hG4bK1`). We patch
//! that in before handing the rest to the generic parameter parser.

use nom::{
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map_res, opt},
    sequence::preceded,
    IResult,
};

use crate::parser::params::parse_params;
use crate::types::endpoint::TransportProtocol;
use crate::types::via::Via;

/// Insert a `;` before a `branch=` that isn't already preceded by a
/// delimiter, tolerating the malformed-Via case called out in the spec.
fn fixup_missing_branch_semicolon(input: &str) -> String {
    if let Some(idx) = input.find("branch=") {
        let preceding = input[..idx].chars().last();
        if !matches!(preceding, Some(';') | Some(',') | None) {
            let mut fixed = String::with_capacity(input.len() + 1);
            fixed.push_str(&input[..idx]);
            fixed.push(';');
            fixed.push_str(&input[idx..]);
            return fixed;
        }
    }
    input.to_string()
}

fn via_transport(input: &str) -> IResult<&str, TransportProtocol> {
    let (input, _) = tag_no_case("SIP")(input)?;
    let (input, _) = char('/')(input)?;
    let (input, version_major) = digit1(input)?;
    let (input, _) = char('.')(input)?;
    let (input, version_minor) = digit1(input)?;
    let (input, _) = char('/')(input)?;
    let (input, proto) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;
    let transport = proto
        .parse()
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))?;
    let _ = (version_major, version_minor);
    Ok((input, transport))
}

fn via_host(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != ':' && c != ';' && c != ',')(input)
}

fn via_port(input: &str) -> IResult<&str, u16> {
    preceded(char(':'), map_res(digit1, str::parse))(input)
}

/// Parse a single Via entry. Callers are responsible for splitting a
/// comma-separated Via line into entries first.
pub fn parse_via(input: &str) -> IResult<&str, Via> {
    let fixed = fixup_missing_branch_semicolon(input);
    let (rest, transport) = via_transport(&fixed)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))?;
    let (rest, _) = take_while(|c: char| c == ' ' || c == '\t')(rest)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))?;
    let (rest, host) = via_host(rest)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))?;
    let (rest, port) = opt(via_port)(rest)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))?;
    let (rest, params) = parse_params(rest, ';')
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))?;

    Ok((
        rest,
        Via { version: "2.0".to_string(), transport, host: host.to_string(), port, params },
    ))
}

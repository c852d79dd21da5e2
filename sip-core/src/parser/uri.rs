//! nom parser for `spec.md` §4.1 SIP URIs:
//! `scheme:[user[:password]@]host[:port][;params][?headers]`.

use nom::{
    bytes::complete::{is_not, tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map_res, opt, recognize},
    multi::{fold_many0, many0},
    sequence::{preceded, separated_pair, tuple},
    IResult,
};

use crate::parser::params::parse_params;
use crate::types::escape::percent_decode;
use crate::types::param::ParamBag;
use crate::types::uri::{Host, Scheme, Uri};

fn scheme(input: &str) -> IResult<&str, Scheme> {
    let (input, raw) = take_while1(|c: char| c.is_ascii_alphabetic())(input)?;
    let (input, _) = char(':')(input)?;
    Ok((input, raw.parse().unwrap_or(Scheme::Custom(raw.to_string()))))
}

fn is_user_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_.!~*'()&=+$,;?/".contains(c) || c == '%'
}

fn userinfo(input: &str) -> IResult<&str, (String, Option<String>)> {
    let (input, user_raw) = take_while1(is_user_char)(input)?;
    let (input, pass_raw) = opt(preceded(char(':'), take_while(|c: char| is_user_char(c) || c == ':')))(input)?;
    let (input, _) = char('@')(input)?;
    Ok((input, (user_raw.to_string(), pass_raw.map(str::to_string))))
}

fn ipv6_host(input: &str) -> IResult<&str, Host> {
    let (input, raw) = nom::sequence::delimited(char('['), is_not("]"), char(']'))(input)?;
    let addr: std::net::Ipv6Addr = raw
        .parse()
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify)))?;
    Ok((input, Host::Address(std::net::IpAddr::V6(addr))))
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-.".contains(c)
}

fn plain_host(input: &str) -> IResult<&str, Host> {
    let (input, raw) = take_while1(is_host_char)(input)?;
    if let Ok(addr) = raw.parse::<std::net::Ipv4Addr>() {
        return Ok((input, Host::Address(std::net::IpAddr::V4(addr))));
    }
    Ok((input, Host::Domain(raw.to_string())))
}

fn host(input: &str) -> IResult<&str, Host> {
    nom::branch::alt((ipv6_host, plain_host))(input)
}

fn port(input: &str) -> IResult<&str, u16> {
    preceded(char(':'), map_res(digit1, str::parse))(input)
}

fn header_params(input: &str) -> IResult<&str, ParamBag> {
    // `?k=v&k2=v2`: reuse the `;`-delimited parser by translating `&` into
    // `;` so a single combinator handles both param-bag flavors.
    let (input, _) = char('?')(input)?;
    let rewritten = format!(";{}", input.replace('&', ";"));
    let (_, bag) = parse_params(&rewritten, ';')
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))?;
    Ok(("", bag))
}

fn is_tel_subscriber_char(c: char) -> bool {
    c.is_ascii_digit() || "+-.()".contains(c)
}

/// `telephone-subscriber` (RFC 3966, simplified): digits plus the visual
/// separators `- . ( )` and a leading `+` for the global form. Stored as a
/// [`Host::Domain`] since `tel:` URIs have no notion of a network host.
fn tel_subscriber(input: &str) -> IResult<&str, Host> {
    let (input, raw) = take_while1(is_tel_subscriber_char)(input)?;
    Ok((input, Host::Domain(raw.to_string())))
}

/// Parse a SIP URI, returning the unconsumed remainder (normally empty).
pub fn parse_uri(input: &str) -> IResult<&str, Uri> {
    let (input, scheme) = scheme(input)?;

    if matches!(scheme, Scheme::Tel) {
        let (input, host) = tel_subscriber(input)?;
        let (input, params) = parse_params(input, ';')?;
        return Ok((
            input,
            Uri { scheme, user: None, password: None, host, port: None, params, headers: ParamBag::new() },
        ));
    }

    let (input, userinfo) = opt(userinfo)(input)?;
    let (input, host) = host(input)?;
    let (input, port) = opt(port)(input)?;
    let (input, params) = parse_params(input, ';')?;
    let (input, headers) = opt(header_params)(input)?;

    let (user, password) = match userinfo {
        Some((u, p)) => (
            Some(percent_decode(&u).unwrap_or(u)),
            p.map(|p| percent_decode(&p).unwrap_or(p)),
        ),
        None => (None, None),
    };

    Ok((
        input,
        Uri {
            scheme,
            user,
            password,
            host,
            port,
            params,
            headers: headers.unwrap_or_default(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_uri_with_headers() {
        let (rest, uri) = parse_uri("sip:alice@example.com:5060;transport=udp?subject=meeting").unwrap();
        assert_eq!(rest, "");
        assert_eq!(uri.scheme.as_str(), "sip");
        assert_eq!(uri.user.as_deref(), Some("alice"));
        assert_eq!(uri.port, Some(5060));
        assert_eq!(uri.transport(), Some("udp"));
        assert_eq!(uri.headers.get_str("subject"), Some("meeting"));
    }

    #[test]
    fn parses_user_and_password() {
        let (_, uri) = parse_uri("sip:alice:secret@example.com").unwrap();
        assert_eq!(uri.user.as_deref(), Some("alice"));
        assert_eq!(uri.password.as_deref(), Some("secret"));
    }

    #[test]
    fn parses_ipv4_and_ipv6_hosts() {
        let (_, v4) = parse_uri("sip:192.168.1.1:5060").unwrap();
        assert!(matches!(v4.host, Host::Address(std::net::IpAddr::V4(_))));
        let (_, v6) = parse_uri("sip:[2001:db8::1]:5060").unwrap();
        assert!(matches!(v6.host, Host::Address(std::net::IpAddr::V6(_))));
    }

    #[test]
    fn tel_uri_parses_as_tel_scheme() {
        let (_, uri) = parse_uri("tel:+15551234567").unwrap();
        assert_eq!(uri.scheme.as_str(), "tel");
    }
}

//! Strict mailbox parser
//!
//! Recipient and sender addresses are checked against the RFC 5321
//! Section 4.1.2 `Mailbox` production before they are ever handed to an
//! SMTP server. Display names, angle brackets and comments are not part of
//! a mailbox and are rejected here; the RFC 5322 forms that carry them are
//! handled in [`crate::address`].
//!
//! # ABNF Grammar (RFC 5321 Section 4.1.2)
//!
//! ```text
//! Mailbox        = Local-part "@" ( Domain / address-literal )
//! Local-part     = Dot-string / Quoted-string
//! Dot-string     = Atom *("." Atom)
//! Atom           = 1*atext
//! Quoted-string  = DQUOTE *QcontentSMTP DQUOTE
//! Domain         = sub-domain *("." sub-domain)
//! sub-domain     = Let-dig [Ldh-str]
//! address-literal = "[" ( IPv4-address-literal / IPv6-address-literal / General-address-literal ) "]"
//! ```
//!
//! # Size Constraints
//!
//! - Maximum mailbox length: 254 octets
//! - Maximum local-part: 64 octets
//! - Maximum domain: 255 octets

use std::{
    fmt,
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for address parsing
pub type Result<T> = std::result::Result<T, AddressError>;

const MAX_MAILBOX: usize = 254;
const MAX_LOCAL_PART: usize = 64;
const MAX_DOMAIN: usize = 255;

/// Errors raised while parsing or adding recipient addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Empty input
    #[error("Empty address")]
    Empty,
    /// A bulk add was attempted without any address
    #[error("No addresses given")]
    NoAddresses,
    /// The RFC 5322 address list could not be parsed at all
    #[error("Malformed address '{input}': {reason}")]
    Malformed { input: String, reason: String },
    /// Mailbox exceeds 254 octets
    #[error("Mailbox exceeds 254 octets")]
    TooLong,
    /// Local-part exceeds 64 octets
    #[error("Local-part exceeds 64 octets")]
    LocalPartTooLong,
    /// Domain exceeds 255 octets
    #[error("Domain exceeds 255 octets")]
    DomainTooLong,
    /// Missing '@' separator in mailbox
    #[error("Missing '@' separator in mailbox")]
    MissingAtSign,
    /// Invalid local-part
    #[error("Invalid local-part: {0}")]
    InvalidLocalPart(String),
    /// Invalid domain
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    /// Invalid address literal
    #[error("Invalid address literal: {0}")]
    InvalidAddressLiteral(String),
    /// Quoted local-part is not terminated
    #[error("Unclosed quoted string in local-part")]
    UnclosedQuotedString,
    /// Invalid character or escape inside a quoted local-part
    #[error("Invalid quoted string: {0}")]
    InvalidQuotedString(String),
}

/// A parsed mailbox (`local-part@domain`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mailbox {
    /// The local part (before @)
    pub local_part: String,
    /// The domain or address literal (after @)
    pub domain: String,
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}

impl FromStr for Mailbox {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self> {
        parse_mailbox(s)
    }
}

impl TryFrom<String> for Mailbox {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self> {
        parse_mailbox(&value)
    }
}

impl From<Mailbox> for String {
    fn from(value: Mailbox) -> Self {
        value.to_string()
    }
}

/// Parse a bare mailbox: `local-part@domain` or `local-part@[address-literal]`
///
/// Surrounding whitespace is ignored; anything else that is not part of
/// the mailbox grammar (display names, `<>`, comments) is an error.
///
/// # Errors
///
/// Returns `AddressError` if the input is not a valid mailbox.
pub fn parse_mailbox(input: &str) -> Result<Mailbox> {
    let input = input.trim();

    if input.is_empty() {
        return Err(AddressError::Empty);
    }

    if input.len() > MAX_MAILBOX {
        return Err(AddressError::TooLong);
    }

    let at = find_unquoted_at(input)?;
    let (local_part, domain) = (&input[..at], &input[at + 1..]);

    if local_part.len() > MAX_LOCAL_PART {
        return Err(AddressError::LocalPartTooLong);
    }
    if domain.len() > MAX_DOMAIN {
        return Err(AddressError::DomainTooLong);
    }

    if local_part.starts_with('"') {
        check_quoted_string(local_part)?;
    } else {
        check_dot_string(local_part)?;
    }

    if domain.starts_with('[') {
        check_address_literal(domain)?;
    } else {
        check_domain(domain)?;
    }

    Ok(Mailbox {
        local_part: local_part.to_string(),
        domain: domain.to_string(),
    })
}

/// Byte offset of the '@' that is not inside a quoted string or address literal.
///
/// The last such '@' separates the parts, so a stray '@' in the local part
/// is reported by the local-part check rather than as a bad domain.
fn find_unquoted_at(input: &str) -> Result<usize> {
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;
    let mut found = None;

    for (i, ch) in input.char_indices() {
        match ch {
            '"' if !escaped && !in_brackets => in_quotes = !in_quotes,
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            '@' if !in_quotes && !in_brackets => found = Some(i),
            _ => {}
        }

        escaped = ch == '\\' && !escaped;
    }

    found.ok_or(AddressError::MissingAtSign)
}

/// Dot-string: Atom *("." Atom)
fn check_dot_string(input: &str) -> Result<()> {
    if input.is_empty() {
        return Err(AddressError::InvalidLocalPart(
            "Empty local-part".to_string(),
        ));
    }

    for atom in input.split('.') {
        if atom.is_empty() {
            return Err(AddressError::InvalidLocalPart(
                "Dot-string contains an empty atom".to_string(),
            ));
        }

        if let Some(ch) = atom.chars().find(|ch| !is_atext(*ch)) {
            return Err(AddressError::InvalidLocalPart(format!(
                "Invalid character '{ch}' in atom"
            )));
        }
    }

    Ok(())
}

/// Quoted-string: DQUOTE *QcontentSMTP DQUOTE
fn check_quoted_string(input: &str) -> Result<()> {
    if input.len() < 2 || !input.ends_with('"') {
        return Err(AddressError::UnclosedQuotedString);
    }

    let mut chars = input[1..input.len() - 1].chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) if next.is_ascii_graphic() || next == ' ' => {}
                Some(next) => {
                    return Err(AddressError::InvalidQuotedString(format!(
                        "Invalid quoted-pair: \\{next}"
                    )));
                }
                None => {
                    return Err(AddressError::InvalidQuotedString(
                        "Backslash at end of quoted string".to_string(),
                    ));
                }
            }
        } else if !is_qtext_smtp(ch) {
            return Err(AddressError::InvalidQuotedString(format!(
                "Invalid character '{ch}' in quoted string"
            )));
        }
    }

    Ok(())
}

/// Domain: sub-domain *("." sub-domain), sub-domain = Let-dig [Ldh-str]
fn check_domain(input: &str) -> Result<()> {
    if input.is_empty() {
        return Err(AddressError::InvalidDomain("Empty domain".to_string()));
    }

    for label in input.split('.') {
        let (Some(first), Some(last)) = (label.chars().next(), label.chars().last()) else {
            return Err(AddressError::InvalidDomain(
                "Domain contains an empty label".to_string(),
            ));
        };

        if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
            return Err(AddressError::InvalidDomain(format!(
                "Label '{label}' must start and end with a letter or digit"
            )));
        }

        if let Some(ch) = label
            .chars()
            .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '-')
        {
            return Err(AddressError::InvalidDomain(format!(
                "Invalid character '{ch}' in label '{label}'"
            )));
        }
    }

    Ok(())
}

/// address-literal: `[IPv4]`, `[IPv6:...]` or `[tag:value]`
fn check_address_literal(input: &str) -> Result<()> {
    let Some(content) = input
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        return Err(AddressError::InvalidAddressLiteral(
            "Address literal must be enclosed in brackets".to_string(),
        ));
    };

    if content.parse::<Ipv4Addr>().is_ok() {
        return Ok(());
    }

    if let Some(v6) = content.strip_prefix("IPv6:") {
        return v6.parse::<Ipv6Addr>().map(|_| ()).map_err(|_| {
            AddressError::InvalidAddressLiteral(format!("Invalid IPv6 address: {v6}"))
        });
    }

    match content.split_once(':') {
        Some((tag, value)) if !tag.is_empty() && !value.is_empty() => Ok(()),
        _ => Err(AddressError::InvalidAddressLiteral(format!(
            "Invalid address literal format: {content}"
        ))),
    }
}

/// atext = ALPHA / DIGIT / "!" / "#" / "$" / "%" / "&" / "'" / "*" / "+" /
///         "-" / "/" / "=" / "?" / "^" / "_" / "\`" / "{" / "|" / "}" / "~"
#[inline]
const fn is_atext(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '/'
                | '='
                | '?'
                | '^'
                | '_'
                | '`'
                | '{'
                | '|'
                | '}'
                | '~'
        )
}

/// qtextSMTP = %d32-33 / %d35-91 / %d93-126
#[inline]
const fn is_qtext_smtp(ch: char) -> bool {
    matches!(ch, ' '..='!' | '#'..='[' | ']'..='~')
}

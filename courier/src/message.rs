//! MIME assembly for outgoing notifications.
//!
//! Messages are always a single part with a base64 body, so any text an
//! event renders survives transport unchanged. Header values are kept to
//! one logical line; non-ASCII text goes out as RFC 2047 encoded words.

use std::fmt::Write;

use base64::{Engine, engine::general_purpose::STANDARD};
use courier_common::{Mailbox, RecipientAddress};

use crate::negotiate::{ContentType, Envelope};

/// Maximum length of a base64 body line, excluding CRLF (RFC 2045).
const BODY_LINE_LENGTH: usize = 76;

/// Input bytes per encoded word; keeps each word under 75 characters.
const ENCODED_WORD_BYTES: usize = 45;

/// Builds the payload handed to `DATA`.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    subject: String,
    body: String,
    content_type: ContentType,
}

impl MessageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `From:` to `name <mailbox>`.
    #[must_use]
    pub fn from(mut self, name: &str, mailbox: &Mailbox) -> Self {
        self.from = Some(format_address(name, mailbox));
        self
    }

    /// Adds every recipient to `To:`, in order.
    #[must_use]
    pub fn to(mut self, recipients: &[RecipientAddress]) -> Self {
        self.to.extend(
            recipients
                .iter()
                .map(|recipient| format_address(recipient.name(), recipient.mailbox())),
        );
        self
    }

    /// Takes subject, body and content type from a negotiated envelope.
    #[must_use]
    pub fn envelope(mut self, envelope: &Envelope) -> Self {
        self.subject.clone_from(&envelope.subject);
        self.body.clone_from(&envelope.body);
        self.content_type = envelope.content_type;
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        let mut message = String::with_capacity(256 + self.body.len() * 4 / 3);

        if let Some(from) = &self.from {
            let _ = write!(message, "From: {from}\r\n");
        }
        if !self.to.is_empty() {
            let _ = write!(message, "To: {}\r\n", self.to.join(", "));
        }
        let _ = write!(message, "Subject: {}\r\n", encode_header(&self.subject));
        message.push_str("MIME-Version: 1.0\r\n");
        let _ = write!(
            message,
            "Content-Type: {}; charset=\"utf-8\"\r\n",
            self.content_type.mime_type()
        );
        message.push_str("Content-Transfer-Encoding: base64\r\n");
        message.push_str("\r\n");
        message.push_str(&encode_body(&self.body));

        message
    }
}

/// `"name" <mailbox>`, or the bare mailbox without a name.
fn format_address(name: &str, mailbox: &Mailbox) -> String {
    let name = unfold(name);

    if name.is_empty() {
        mailbox.to_string()
    } else if name.is_ascii() {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\" <{mailbox}>")
    } else {
        format!("{} <{mailbox}>", encode_words(&name))
    }
}

/// Replaces line breaks so a value cannot start a new header.
fn unfold(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn encode_header(value: &str) -> String {
    let value = unfold(value);

    if value.is_ascii() {
        value
    } else {
        encode_words(&value)
    }
}

/// RFC 2047 `B` encoding, split on character boundaries into words that
/// are folded onto continuation lines.
fn encode_words(value: &str) -> String {
    let mut words = Vec::new();
    let mut start = 0;

    for (index, ch) in value.char_indices() {
        if index + ch.len_utf8() - start > ENCODED_WORD_BYTES {
            words.push(&value[start..index]);
            start = index;
        }
    }
    words.push(&value[start..]);

    words
        .into_iter()
        .map(|word| format!("=?utf-8?b?{}?=", STANDARD.encode(word)))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Base64 with CRLF every [`BODY_LINE_LENGTH`] characters.
fn encode_body(body: &str) -> String {
    let encoded = STANDARD.encode(body);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BODY_LINE_LENGTH * 2 + 2);

    for line in encoded.as_bytes().chunks(BODY_LINE_LENGTH) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(line).unwrap_or_default());
        out.push_str("\r\n");
    }

    out
}

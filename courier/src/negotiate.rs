//! Turning rendered event text into a subject and body.
//!
//! The default behaviour is a fixed list of [`SubjectRule`]s tried in
//! order; the first one that applies to the options decides the subject.
//! Callers can replace the whole thing with their own [`Negotiate`].

use std::fmt;

use crate::config::SmtpOptions;

/// MIME type of the message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    Plain,
    #[default]
    Html,
}

impl ContentType {
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Plain => "text/plain",
            Self::Html => "text/html",
        }
    }

    const fn from_options(options: &SmtpOptions) -> Self {
        if options.plain_text_contents {
            Self::Plain
        } else {
            Self::Html
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// What one event becomes on the way out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    pub subject: String,
    pub body: String,
    pub content_type: ContentType,
}

/// Decides the subject and body for a rendered event.
pub trait Negotiate: Send + Sync {
    fn negotiate(&self, options: &SmtpOptions, text: &str) -> Envelope;
}

impl<F> Negotiate for F
where
    F: Fn(&SmtpOptions, &str) -> Envelope + Send + Sync,
{
    fn negotiate(&self, options: &SmtpOptions, text: &str) -> Envelope {
        self(options, text)
    }
}

/// One way of choosing a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectRule {
    /// The sender name is the subject; the text is the body.
    NameAsSubject,
    /// The text is the subject; the body is empty.
    MessageAsSubject,
    /// The text, cut to at most `truncated_subject_length` characters, is
    /// the subject; the full text is the body.
    TruncatedMessage,
    /// The configured subject, possibly empty; the text is the body.
    Configured,
}

impl SubjectRule {
    /// Precedence, highest first. `Configured` always applies.
    pub const ORDER: [Self; 4] = [
        Self::NameAsSubject,
        Self::MessageAsSubject,
        Self::TruncatedMessage,
        Self::Configured,
    ];

    #[must_use]
    pub const fn applies(self, options: &SmtpOptions) -> bool {
        match self {
            Self::NameAsSubject => options.name_as_subject,
            Self::MessageAsSubject => options.message_as_subject,
            Self::TruncatedMessage => options.truncated_subject_length > 0,
            Self::Configured => true,
        }
    }

    /// The first rule in [`Self::ORDER`] that applies.
    #[must_use]
    pub fn select(options: &SmtpOptions) -> Self {
        Self::ORDER
            .into_iter()
            .find(|rule| rule.applies(options))
            .unwrap_or(Self::Configured)
    }

    /// Returns `(subject, body)`.
    #[must_use]
    pub fn apply(self, options: &SmtpOptions, text: &str) -> (String, String) {
        match self {
            Self::NameAsSubject => (options.name.clone(), text.to_string()),
            Self::MessageAsSubject => (text.to_string(), String::new()),
            Self::TruncatedMessage => (
                truncate(text, options.truncated_subject_length),
                text.to_string(),
            ),
            Self::Configured => (options.subject.clone(), text.to_string()),
        }
    }
}

/// At most `limit` characters of `text`; `text` itself when it fits.
fn truncate(text: &str, limit: usize) -> String {
    text.char_indices()
        .nth(limit)
        .map_or(text, |(end, _)| &text[..end])
        .to_string()
}

/// The rule list, with the body type taken from `plain_text_contents`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNegotiator;

impl Negotiate for DefaultNegotiator {
    fn negotiate(&self, options: &SmtpOptions, text: &str) -> Envelope {
        let rule = SubjectRule::select(options);
        let (subject, body) = rule.apply(options, text);

        Envelope {
            subject,
            body,
            content_type: ContentType::from_options(options),
        }
    }
}

//! Sender configuration.
//!
//! [`SmtpOptions`] is what callers fill in or load from TOML.
//! [`SmtpOptions::resolve`] checks it and produces [`ResolvedOptions`],
//! with the default negotiator and delivery client installed wherever no
//! override was given. The caller's options are consumed, never patched.

use std::{fmt, sync::Arc};

use courier_common::{AddressBook, Mailbox};
use courier_smtp::{ConnectOptions, DeliveryClient, SmtpTransport};
use serde::Deserialize;

use crate::{
    error::ConfigError,
    negotiate::{DefaultNegotiator, Envelope, Negotiate},
};

/// Everything a sender needs to know.
#[derive(Deserialize)]
pub struct SmtpOptions {
    /// Sender name, used in `From:` and by `name_as_subject`.
    #[serde(default)]
    pub name: String,

    /// Envelope sender mailbox.
    ///
    /// Default: `logger@localhost`
    #[serde(default = "defaults::from")]
    pub from: String,

    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub name_as_subject: bool,

    #[serde(default)]
    pub message_as_subject: bool,

    /// Use at most this many characters of the event as the subject. `0`
    /// disables truncation.
    #[serde(default)]
    pub truncated_subject_length: usize,

    /// Send `text/plain` instead of `text/html`.
    #[serde(default)]
    pub plain_text_contents: bool,

    #[serde(flatten)]
    pub connect: ConnectOptions,

    #[serde(default)]
    pub recipients: AddressBook,

    /// Replaces the default subject rules.
    #[serde(skip)]
    pub negotiator: Option<Arc<dyn Negotiate>>,

    /// Replaces the network client.
    #[serde(skip)]
    pub client: Option<Box<dyn DeliveryClient>>,
}

impl Default for SmtpOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            from: defaults::from(),
            subject: String::new(),
            name_as_subject: false,
            message_as_subject: false,
            truncated_subject_length: 0,
            plain_text_contents: false,
            connect: ConnectOptions::default(),
            recipients: AddressBook::new(),
            negotiator: None,
            client: None,
        }
    }
}

impl fmt::Debug for SmtpOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpOptions")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("subject", &self.subject)
            .field("name_as_subject", &self.name_as_subject)
            .field("message_as_subject", &self.message_as_subject)
            .field("truncated_subject_length", &self.truncated_subject_length)
            .field("plain_text_contents", &self.plain_text_contents)
            .field("server", &self.connect.address())
            .field("use_tls", &self.connect.use_tls)
            .field("username", &self.connect.username)
            .field("recipients", &self.recipients.len())
            .field("negotiator", &self.negotiator.as_ref().map(|_| "custom"))
            .field("client", &self.client.as_ref().map(|_| "custom"))
            .finish_non_exhaustive()
    }
}

/// Top-level TOML document. The recipient list is taken apart from the
/// rest so a bad address is reported as such rather than as a parse error.
#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    recipients: Vec<String>,

    #[serde(flatten)]
    options: SmtpOptions,
}

impl SmtpOptions {
    /// Parses options from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the document is malformed and
    /// `ConfigError::Recipients` if any recipient is not a valid address.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let Document {
            recipients,
            mut options,
        } = toml::from_str(input)?;

        options.recipients = AddressBook::try_from(recipients).map_err(ConfigError::Recipients)?;
        Ok(options)
    }

    /// Checks the options without changing them.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: a missing name, both subject modes,
    /// no recipients, or an invalid `from` address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.checked_from().map(drop)
    }

    fn checked_from(&self) -> Result<Mailbox, ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingName);
        }

        if self.name_as_subject && self.message_as_subject {
            return Err(ConfigError::ConflictingSubjectModes);
        }

        if self.recipients.is_empty() {
            return Err(ConfigError::NoRecipients);
        }

        self.from.parse().map_err(ConfigError::InvalidFrom)
    }

    /// Validates the options and installs defaults for anything not
    /// overridden.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::validate`].
    pub fn resolve(mut self) -> Result<ResolvedOptions, ConfigError> {
        let from = self.checked_from()?;

        let negotiator = self
            .negotiator
            .take()
            .unwrap_or_else(|| Arc::new(DefaultNegotiator));
        let client = self
            .client
            .take()
            .unwrap_or_else(|| Box::new(SmtpTransport::new()));

        Ok(ResolvedOptions {
            options: self,
            from,
            negotiator,
            client,
        })
    }
}

/// Validated options with every default in place.
pub struct ResolvedOptions {
    options: SmtpOptions,
    from: Mailbox,
    negotiator: Arc<dyn Negotiate>,
    client: Box<dyn DeliveryClient>,
}

impl ResolvedOptions {
    /// The options as given, minus the overrides moved out of them.
    #[must_use]
    pub const fn options(&self) -> &SmtpOptions {
        &self.options
    }

    #[must_use]
    pub const fn sender(&self) -> &Mailbox {
        &self.from
    }

    #[must_use]
    pub fn negotiate(&self, text: &str) -> Envelope {
        self.negotiator.negotiate(&self.options, text)
    }

    pub(crate) fn into_parts(
        self,
    ) -> (SmtpOptions, Mailbox, Arc<dyn Negotiate>, Box<dyn DeliveryClient>) {
        (self.options, self.from, self.negotiator, self.client)
    }
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("options", &self.options)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

mod defaults {
    pub(super) fn from() -> String {
        "logger@localhost".to_string()
    }
}

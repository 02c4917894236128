//! The email sink.
//!
//! [`SmtpSender`] turns each accepted event into one message and delivers
//! it in a single transaction. Nothing is queued or retried: a delivery
//! that fails is reported to the [`ErrorHandler`] and dropped.

use std::{fmt, sync::Arc};

use courier_common::{AddressBook, AddressError, Event, LevelInfo, Mailbox, internal, tracing};
use courier_smtp::{ClientError, DeliveryClient, Transaction, TransactionError};
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::{
    config::SmtpOptions,
    error::{ConfigError, Error},
    message::MessageBuilder,
    negotiate::Negotiate,
};

/// What happened to an event handed to [`SmtpSender::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A message was accepted by the delivery client.
    Delivered,
    /// The event's level is outside the sender's range.
    Filtered,
    /// The event rendered to nothing.
    Empty,
}

/// Receives deliveries that failed inside [`SmtpSender::send`].
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &TransactionError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&TransactionError) + Send + Sync,
{
    fn handle(&self, error: &TransactionError) {
        self(error);
    }
}

/// Logs failed deliveries at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle(&self, error: &TransactionError) {
        tracing::error!(phase = ?error.phase(), "Failed to deliver event: {error}");
    }
}

/// Delivers leveled events as email.
pub struct SmtpSender {
    options: SmtpOptions,
    from: Mailbox,
    negotiator: Arc<dyn Negotiate>,
    client: Mutex<Box<dyn DeliveryClient>>,
    recipients: RwLock<AddressBook>,
    levels: RwLock<LevelInfo>,
    error_handler: RwLock<Arc<dyn ErrorHandler>>,
}

impl SmtpSender {
    /// Validates `options` and `levels`, then opens the delivery client.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if either is invalid and `Error::Connection`
    /// if the delivery client cannot open its session.
    pub async fn new(options: SmtpOptions, levels: LevelInfo) -> Result<Self, Error> {
        levels.validate().map_err(ConfigError::from)?;

        let (mut options, from, negotiator, mut client) = options.resolve()?.into_parts();

        client.create(&options.connect).await.inspect_err(|e| {
            tracing::warn!(server = %options.connect.address(), "Failed to open delivery client: {e}");
        })?;

        let recipients = std::mem::take(&mut options.recipients);

        tracing::info!(
            name = %options.name,
            %from,
            recipients = recipients.len(),
            floor = %levels.floor,
            ceiling = %levels.ceiling,
            "SMTP sender ready"
        );

        Ok(Self {
            options,
            from,
            negotiator,
            client: Mutex::new(client),
            recipients: RwLock::new(recipients),
            levels: RwLock::new(levels),
            error_handler: RwLock::new(Arc::new(LogErrorHandler)),
        })
    }

    /// Like [`Self::new`], for callers that may not have options at all.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for `None`, otherwise as [`Self::new`].
    pub async fn try_from_options(
        options: Option<SmtpOptions>,
        levels: LevelInfo,
    ) -> Result<Self, Error> {
        let options = options.ok_or(ConfigError::Missing)?;
        Self::new(options, levels).await
    }

    /// Like [`Self::new`], accepting every valid level.
    ///
    /// # Errors
    ///
    /// As [`Self::new`].
    pub async fn with_default_levels(options: SmtpOptions) -> Result<Self, Error> {
        Self::new(options, LevelInfo::default()).await
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// Settings the sender was built from. The recipient list lives on the
    /// sender itself; see [`Self::recipients`].
    #[must_use]
    pub const fn options(&self) -> &SmtpOptions {
        &self.options
    }

    #[must_use]
    pub fn level(&self) -> LevelInfo {
        *self.levels.read()
    }

    /// Replaces the accepted level range.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` and keeps the current range if `levels` is
    /// invalid.
    pub fn set_level(&self, levels: LevelInfo) -> Result<(), ConfigError> {
        levels.validate()?;
        *self.levels.write() = levels;
        Ok(())
    }

    pub fn set_error_handler(&self, handler: impl ErrorHandler + 'static) {
        *self.error_handler.write() = Arc::new(handler);
    }

    /// Adds one recipient; `address` must be a bare mailbox.
    ///
    /// # Errors
    ///
    /// Returns `AddressError` and leaves the list untouched if `address`
    /// is invalid.
    pub fn add_recipient(&self, name: impl Into<String>, address: &str) -> Result<(), AddressError> {
        self.recipients.write().add_recipient(name, address)
    }

    /// Adds every mailbox in `addresses`, or none of them.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NoAddresses` for an empty slice, otherwise the
    /// error of the first invalid entry.
    pub fn add_recipients<S: AsRef<str>>(&self, addresses: &[S]) -> Result<(), AddressError> {
        self.recipients.write().add_recipients(addresses)
    }

    pub fn reset_recipients(&self) {
        self.recipients.write().reset_recipients();
    }

    /// A snapshot of the current recipient list.
    #[must_use]
    pub fn recipients(&self) -> AddressBook {
        self.recipients.read().clone()
    }

    /// Delivers `event` if it is in range and non-empty. Failures go to the
    /// error handler.
    pub async fn send<E: Event + ?Sized>(&self, event: &E) {
        if let Err(e) = self.deliver(event).await {
            let handler = Arc::clone(&self.error_handler.read());
            handler.handle(&e);
        }
    }

    /// Runs the same pipeline as [`Self::send`] and reports the result.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::NoRecipients` if the recipient list is
    /// empty when the event is delivered, or the error of the first
    /// delivery phase that failed.
    pub async fn deliver<E: Event + ?Sized>(&self, event: &E) -> Result<Outcome, TransactionError> {
        let level = event.level();
        if !self.level().accepts(level) {
            internal!(%level, "Event outside level range");
            return Ok(Outcome::Filtered);
        }

        let text = event.render();
        if text.is_empty() {
            internal!(%level, "Event rendered empty");
            return Ok(Outcome::Empty);
        }

        let envelope = self.negotiator.negotiate(&self.options, &text);

        let recipients = self.recipients();
        if recipients.is_empty() {
            return Err(TransactionError::NoRecipients);
        }

        let payload = MessageBuilder::new()
            .from(&self.options.name, &self.from)
            .to(&recipients)
            .envelope(&envelope)
            .build();

        let mut client = self.client.lock().await;
        let log = Transaction::new(&mut **client)
            .execute(&self.from, &recipients, &payload)
            .await?;

        tracing::info!(
            %level,
            recipients = log.recipients,
            subject = %envelope.subject,
            "Delivered event"
        );

        Ok(Outcome::Delivered)
    }

    /// Ends the delivery client's session.
    ///
    /// # Errors
    ///
    /// Returns the client's error if closing fails.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.client.lock().await.close().await
    }
}

impl fmt::Debug for SmtpSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSender")
            .field("options", &self.options)
            .field("from", &self.from)
            .field("recipients", &*self.recipients.read())
            .field("levels", &*self.levels.read())
            .finish_non_exhaustive()
    }
}

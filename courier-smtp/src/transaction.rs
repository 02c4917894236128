//! Delivery transaction sequencing
//!
//! A delivery is `MAIL FROM`, one `RCPT TO` per recipient, then `DATA`,
//! with no step retried and nothing committed unless `DATA` is accepted.
//! [`TransactionState`] encodes that order; [`Transaction`] walks a
//! [`DeliveryClient`] through it.

use courier_common::{Mailbox, RecipientAddress, traits::fsm::FiniteStateMachine, tracing};
use thiserror::Error;

use crate::{
    client::ClientError,
    delivery::{DeliveryClient, Phase},
};

/// Where a delivery transaction stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No transaction open.
    #[default]
    Idle,
    /// The envelope sender was accepted.
    MailSent,
    /// At least one recipient was accepted.
    RecipientsAccepted,
    /// The message was accepted. Terminal.
    Delivered,
    /// A step was rejected or taken out of order. Terminal.
    Failed,
}

/// Outcome of one step, fed to [`TransactionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionInput {
    MailAccepted,
    RecipientAccepted,
    DataAccepted,
    Rejected,
}

/// Bookkeeping carried alongside the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionLog {
    /// Recipients accepted so far.
    pub recipients: usize,
}

impl TransactionState {
    /// Whether `phase` may be attempted from this state.
    #[must_use]
    pub const fn expects(self, phase: Phase) -> bool {
        matches!(
            (self, phase),
            (Self::Idle, Phase::MailFrom)
                | (Self::MailSent | Self::RecipientsAccepted, Phase::Recipient)
                | (Self::RecipientsAccepted, Phase::Data)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

impl FiniteStateMachine for TransactionState {
    type Input = TransactionInput;
    type Context = TransactionLog;

    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self {
        match (self, input) {
            (Self::Delivered, _) => Self::Delivered,
            (Self::Idle, TransactionInput::MailAccepted) => Self::MailSent,
            (Self::MailSent | Self::RecipientsAccepted, TransactionInput::RecipientAccepted) => {
                context.recipients += 1;
                Self::RecipientsAccepted
            }
            (Self::RecipientsAccepted, TransactionInput::DataAccepted) => Self::Delivered,
            _ => Self::Failed,
        }
    }
}

/// Why a delivery did not complete.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("No recipients to deliver to")]
    NoRecipients,

    #[error("MAIL FROM failed: {0}")]
    MailFrom(#[source] ClientError),

    #[error("RCPT TO {recipient} failed: {source}")]
    Recipient {
        recipient: String,
        #[source]
        source: ClientError,
    },

    #[error("DATA failed: {0}")]
    Data(#[source] ClientError),
}

impl TransactionError {
    /// The phase that failed, if the client was reached at all.
    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        match self {
            Self::NoRecipients => None,
            Self::MailFrom(_) => Some(Phase::MailFrom),
            Self::Recipient { .. } => Some(Phase::Recipient),
            Self::Data(_) => Some(Phase::Data),
        }
    }
}

/// One delivery attempt over a borrowed client.
pub struct Transaction<'a, C: DeliveryClient + ?Sized> {
    client: &'a mut C,
    state: TransactionState,
    log: TransactionLog,
}

impl<'a, C: DeliveryClient + ?Sized> Transaction<'a, C> {
    pub const fn new(client: &'a mut C) -> Self {
        Self {
            client,
            state: TransactionState::Idle,
            log: TransactionLog { recipients: 0 },
        }
    }

    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    fn advance(&mut self, input: TransactionInput) {
        self.state = self.state.transition(input, &mut self.log);
    }

    /// Runs `MAIL FROM`, `RCPT TO` for every recipient in order, then
    /// `DATA`, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::NoRecipients` without touching the client
    /// when `recipients` is empty, otherwise the error of the failing phase.
    pub async fn execute(
        &mut self,
        from: &Mailbox,
        recipients: &[RecipientAddress],
        payload: &str,
    ) -> Result<TransactionLog, TransactionError> {
        if recipients.is_empty() {
            self.advance(TransactionInput::Rejected);
            return Err(TransactionError::NoRecipients);
        }

        if let Err(e) = self.client.mail_from(from).await {
            self.advance(TransactionInput::Rejected);
            return Err(TransactionError::MailFrom(e));
        }
        self.advance(TransactionInput::MailAccepted);
        tracing::debug!(%from, "Envelope sender accepted");

        for recipient in recipients {
            if let Err(source) = self.client.recipient(recipient).await {
                self.advance(TransactionInput::Rejected);
                return Err(TransactionError::Recipient {
                    recipient: recipient.address(),
                    source,
                });
            }
            self.advance(TransactionInput::RecipientAccepted);
        }
        tracing::debug!(recipients = self.log.recipients, "Recipients accepted");

        if let Err(e) = self.client.data(payload).await {
            self.advance(TransactionInput::Rejected);
            return Err(TransactionError::Data(e));
        }
        self.advance(TransactionInput::DataAccepted);

        Ok(self.log)
    }
}

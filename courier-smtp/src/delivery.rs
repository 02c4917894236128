use std::fmt;

use async_trait::async_trait;
use courier_common::{Mailbox, RecipientAddress};

use crate::{client::Result, config::ConnectOptions};

/// The steps of a delivery session, in the order they must happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Create,
    MailFrom,
    Recipient,
    Data,
}

impl Phase {
    /// The SMTP command that carries this phase.
    #[must_use]
    pub const fn command(self) -> &'static str {
        match self {
            Self::Create => "CONNECT",
            Self::MailFrom => "MAIL FROM",
            Self::Recipient => "RCPT TO",
            Self::Data => "DATA",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// A transactional mail-delivery session.
///
/// `create` is called once, before anything else. Each delivery is then
/// `mail_from`, one `recipient` per destination and a final `data`; a
/// failed step ends that delivery and the next one starts again at
/// `mail_from`. Implementations must reject steps taken out of that order.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Opens the session.
    async fn create(&mut self, options: &ConnectOptions) -> Result<()>;

    /// Starts a transaction from `from`.
    async fn mail_from(&mut self, from: &Mailbox) -> Result<()>;

    /// Adds one destination to the open transaction.
    async fn recipient(&mut self, recipient: &RecipientAddress) -> Result<()>;

    /// Transmits the assembled message and completes the transaction.
    async fn data(&mut self, payload: &str) -> Result<()>;

    /// Ends the session.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<C: DeliveryClient + ?Sized> DeliveryClient for Box<C> {
    async fn create(&mut self, options: &ConnectOptions) -> Result<()> {
        (**self).create(options).await
    }

    async fn mail_from(&mut self, from: &Mailbox) -> Result<()> {
        (**self).mail_from(from).await
    }

    async fn recipient(&mut self, recipient: &RecipientAddress) -> Result<()> {
        (**self).recipient(recipient).await
    }

    async fn data(&mut self, payload: &str) -> Result<()> {
        (**self).data(payload).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

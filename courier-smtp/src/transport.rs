//! Network delivery client
//!
//! [`SmtpTransport`] keeps one SMTP session open for its whole life and
//! runs each delivery as a transaction on it. Every command is bounded by
//! the configured [`ClientTimeouts`](crate::config::ClientTimeouts).

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use courier_common::{Mailbox, RecipientAddress, tracing};

use crate::{
    client::{ClientError, Response, Result, SmtpClient},
    config::{ClientTimeouts, ConnectOptions},
    delivery::DeliveryClient,
    transaction::TransactionState,
};

async fn bounded<T>(
    command: &'static str,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| ClientError::Timeout { command, after })?
}

/// [`DeliveryClient`] speaking SMTP to a mail transfer agent.
#[derive(Default)]
pub struct SmtpTransport {
    client: Option<SmtpClient>,
    timeouts: ClientTimeouts,
    state: TransactionState,
}

impl SmtpTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&mut self) -> Result<&mut SmtpClient> {
        self.client
            .as_mut()
            .filter(|client| client.is_connected())
            .ok_or(ClientError::NotConnected)
    }

    async fn open(options: &ConnectOptions) -> Result<SmtpClient> {
        let address = options.address();

        let mut client = if options.use_tls {
            SmtpClient::connect_tls(&address, &options.server).await?
        } else {
            SmtpClient::connect(&address).await?
        };

        client
            .read_greeting()
            .await?
            .require("greeting", Response::is_success)?;

        Ok(client)
    }

    /// Records the outcome of a step. A rejection leaves the open
    /// transaction to be reset before the next MAIL FROM; anything that
    /// leaves a reply unread drops the session instead.
    fn settle<T>(&mut self, result: Result<T>, next: TransactionState) -> Result<T> {
        match &result {
            Ok(_) => self.state = next,
            Err(e) if e.breaks_session() => {
                tracing::warn!("Abandoning SMTP session: {e}");
                self.client = None;
                self.state = TransactionState::Idle;
            }
            Err(_) => self.state = TransactionState::Failed,
        }
        result
    }
}

#[async_trait]
impl DeliveryClient for SmtpTransport {
    async fn create(&mut self, options: &ConnectOptions) -> Result<()> {
        self.timeouts = options.timeouts.clone();

        let mut client = bounded("connect", self.timeouts.connect(), Self::open(options)).await?;

        let command = self.timeouts.command();
        let ehlo = bounded("EHLO", command, client.ehlo(&options.helo_domain)).await?;
        if matches!(ehlo.code, 500 | 502) {
            tracing::debug!("EHLO not supported, falling back to HELO");
            bounded("HELO", command, client.helo(&options.helo_domain))
                .await?
                .require("HELO", Response::is_success)?;
        } else {
            ehlo.require("EHLO", Response::is_success)?;
        }

        if let Some(username) = &options.username {
            let password = options.password.as_deref().unwrap_or_default();
            bounded("AUTH", command, client.auth_plain(username, password))
                .await?
                .require("AUTH", Response::is_success)?;
        }

        tracing::info!(
            server = %options.address(),
            tls = options.use_tls,
            "SMTP session established"
        );

        self.client = Some(client);
        self.state = TransactionState::Idle;
        Ok(())
    }

    async fn mail_from(&mut self, from: &Mailbox) -> Result<()> {
        let after = self.timeouts.command();
        let dirty = !matches!(self.state, TransactionState::Idle | TransactionState::Delivered);
        let client = self.client()?;

        let result = async {
            if dirty {
                tracing::debug!("Resetting unfinished transaction");
                bounded("RSET", after, client.rset())
                    .await?
                    .require("RSET", Response::is_success)?;
            }

            bounded("MAIL FROM", after, client.mail_from(&from.to_string()))
                .await?
                .require("MAIL FROM", Response::is_success)
                .map(drop)
        }
        .await;

        self.settle(result, TransactionState::MailSent)
    }

    async fn recipient(&mut self, recipient: &RecipientAddress) -> Result<()> {
        let after = self.timeouts.command();
        let client = self.client()?;

        let result = bounded("RCPT TO", after, client.rcpt_to(&recipient.address()))
            .await
            .and_then(|response| response.require("RCPT TO", Response::is_success))
            .map(drop);

        self.settle(result, TransactionState::RecipientsAccepted)
    }

    async fn data(&mut self, payload: &str) -> Result<()> {
        let after = self.timeouts.data();
        let client = self.client()?;

        let result = async {
            bounded("DATA", after, client.data())
                .await?
                .require("DATA", Response::is_intermediate)?;

            bounded("DATA", after, client.send_data(payload))
                .await?
                .require("DATA", Response::is_success)?;

            Ok::<(), ClientError>(())
        }
        .await;

        self.settle(result, TransactionState::Delivered)
    }

    async fn close(&mut self) -> Result<()> {
        let after = self.timeouts.command();
        let Some(mut client) = self.client.take() else {
            return Ok(());
        };
        self.state = TransactionState::Idle;

        if !client.is_connected() {
            return Ok(());
        }

        bounded("QUIT", after, client.quit()).await.map(drop)
    }
}

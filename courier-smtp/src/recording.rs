//! In-memory delivery client for tests.
//!
//! [`RecordingClient`] accepts deliveries without any network, keeps the
//! last message it accepted and counts successful deliveries. Any one
//! phase can be made to fail on demand. Steps taken out of order are
//! refused with `503`, as an SMTP server would.

use std::{io, sync::Arc};

use async_trait::async_trait;
use courier_common::{Mailbox, RecipientAddress, traits::fsm::FiniteStateMachine};
use parking_lot::Mutex;

use crate::{
    client::{ClientError, Result},
    config::ConnectOptions,
    delivery::{DeliveryClient, Phase},
    transaction::{TransactionInput, TransactionLog, TransactionState},
};

#[derive(Debug, Default)]
struct Recorder {
    fail_on: Option<Phase>,
    connected: Option<ConnectOptions>,
    state: TransactionState,
    log: TransactionLog,
    sender: Option<Mailbox>,
    recipients: Vec<RecipientAddress>,
    message: Option<String>,
    last_sender: Option<Mailbox>,
    last_recipients: Vec<RecipientAddress>,
    delivered: usize,
    closed: bool,
}

impl Recorder {
    fn check(&mut self, phase: Phase) -> Result<()> {
        if phase != Phase::Create && self.connected.is_none() {
            return Err(ClientError::NotConnected);
        }

        if phase == Phase::MailFrom && self.state.is_terminal() {
            self.state = TransactionState::Idle;
            self.log = TransactionLog::default();
            self.sender = None;
            self.recipients.clear();
        }

        if phase != Phase::Create && !self.state.expects(phase) {
            return Err(ClientError::Rejected {
                command: phase.command(),
                code: 503,
                message: "Bad sequence of commands".to_string(),
            });
        }

        if self.fail_on == Some(phase) {
            self.advance(TransactionInput::Rejected);

            return Err(if phase == Phase::Create {
                ClientError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "injected connection failure",
                ))
            } else {
                ClientError::Rejected {
                    command: phase.command(),
                    code: 554,
                    message: format!("Injected {phase} failure"),
                }
            });
        }

        Ok(())
    }

    fn advance(&mut self, input: TransactionInput) {
        self.state = self.state.transition(input, &mut self.log);
    }
}

/// Cloneable handle to a shared recording client.
///
/// Keep one clone for assertions and hand another to the sender.
#[derive(Debug, Clone, Default)]
pub struct RecordingClient {
    inner: Arc<Mutex<Recorder>>,
}

impl RecordingClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose `phase` always fails.
    #[must_use]
    pub fn failing_on(phase: Phase) -> Self {
        let client = Self::new();
        client.fail_on(Some(phase));
        client
    }

    /// Makes `phase` fail from now on, or clears injected failures with `None`.
    pub fn fail_on(&self, phase: Option<Phase>) {
        self.inner.lock().fail_on = phase;
    }

    /// Successful deliveries so far.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.inner.lock().delivered
    }

    /// The last message accepted by `data`.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.inner.lock().message.clone()
    }

    /// Envelope sender of the last delivered message.
    #[must_use]
    pub fn sender(&self) -> Option<Mailbox> {
        self.inner.lock().last_sender.clone()
    }

    /// Recipients of the last delivered message.
    #[must_use]
    pub fn recipients(&self) -> Vec<RecipientAddress> {
        self.inner.lock().last_recipients.clone()
    }

    /// Options passed to the last successful `create`.
    #[must_use]
    pub fn connected_with(&self) -> Option<ConnectOptions> {
        self.inner.lock().connected.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }
}

#[async_trait]
impl DeliveryClient for RecordingClient {
    async fn create(&mut self, options: &ConnectOptions) -> Result<()> {
        let mut recorder = self.inner.lock();
        recorder.check(Phase::Create)?;

        recorder.connected = Some(options.clone());
        recorder.closed = false;
        recorder.state = TransactionState::Idle;
        Ok(())
    }

    async fn mail_from(&mut self, from: &Mailbox) -> Result<()> {
        let mut recorder = self.inner.lock();
        recorder.check(Phase::MailFrom)?;

        recorder.sender = Some(from.clone());
        recorder.advance(TransactionInput::MailAccepted);
        Ok(())
    }

    async fn recipient(&mut self, recipient: &RecipientAddress) -> Result<()> {
        let mut recorder = self.inner.lock();
        recorder.check(Phase::Recipient)?;

        recorder.recipients.push(recipient.clone());
        recorder.advance(TransactionInput::RecipientAccepted);
        Ok(())
    }

    async fn data(&mut self, payload: &str) -> Result<()> {
        let mut recorder = self.inner.lock();
        recorder.check(Phase::Data)?;

        recorder.advance(TransactionInput::DataAccepted);
        recorder.message = Some(payload.to_string());
        recorder.last_sender = recorder.sender.take();
        recorder.last_recipients = std::mem::take(&mut recorder.recipients);
        recorder.delivered += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut recorder = self.inner.lock();
        recorder.connected = None;
        recorder.closed = true;
        recorder.state = TransactionState::Idle;
        Ok(())
    }
}

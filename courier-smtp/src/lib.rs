//! Delivery clients for the courier email sink.
//!
//! [`DeliveryClient`] is the seam between the sender and the wire. Two
//! implementations ship here: [`SmtpTransport`], which talks SMTP over
//! TCP or TLS, and [`RecordingClient`], which records deliveries in
//! memory and can be told to fail at any phase.

pub mod client;
pub mod config;
pub mod delivery;
pub mod recording;
pub mod transaction;
pub mod transport;

pub use client::{ClientError, Response, SmtpClient};
pub use config::{ClientTimeouts, ConnectOptions};
pub use delivery::{DeliveryClient, Phase};
pub use recording::RecordingClient;
pub use transaction::{Transaction, TransactionError, TransactionState};
pub use transport::SmtpTransport;

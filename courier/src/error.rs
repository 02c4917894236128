//! Error types for building and driving a sender.
//!
//! Configuration problems are [`ConfigError`]s and surface from
//! [`SmtpSender::new`](crate::SmtpSender::new). Delivery failures during
//! `send` go to the sender's [`ErrorHandler`](crate::ErrorHandler)
//! instead of being returned.

use courier_common::{AddressError, Level, level::LevelError};
use courier_smtp::{ClientError, TransactionError};
use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The options or level range cannot produce a working sender.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A recipient string was rejected.
    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    /// The delivery client could not open its session.
    #[error("Connection failed: {0}")]
    Connection(#[from] ClientError),

    /// A delivery did not complete.
    #[error("Delivery failed: {0}")]
    Transaction(#[from] TransactionError),
}

/// Why a set of options was refused.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No options were supplied at all.
    #[error("No SMTP options provided")]
    Missing,

    #[error("Sender name must not be empty")]
    MissingName,

    #[error("Only one of name_as_subject and message_as_subject may be set")]
    ConflictingSubjectModes,

    #[error("At least one recipient is required")]
    NoRecipients,

    #[error("Invalid from address: {0}")]
    InvalidFrom(#[source] AddressError),

    #[error("'{0}' is not a usable level bound")]
    InvalidLevel(Level),

    #[error("Level floor {floor} is above ceiling {ceiling}")]
    InconsistentLevels { floor: Level, ceiling: Level },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid recipient list: {0}")]
    Recipients(#[source] AddressError),
}

impl From<LevelError> for ConfigError {
    fn from(value: LevelError) -> Self {
        match value {
            LevelError::Invalid(level) => Self::InvalidLevel(level),
            LevelError::Inverted { floor, ceiling } => Self::InconsistentLevels { floor, ceiling },
        }
    }
}

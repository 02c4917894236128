//! Connection settings for the network delivery client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deadlines the network client applies to each protocol step.
///
/// The sender never times anything out itself; a delivery that stalls is
/// cut off here and surfaces as an ordinary client error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTimeouts {
    /// Connecting, the greeting and the TLS handshake.
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// EHLO, AUTH, MAIL FROM, RCPT TO, RSET and QUIT.
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::command_secs")]
    pub command_secs: u64,

    /// DATA and the message transfer.
    ///
    /// Default: 120 seconds
    #[serde(default = "defaults::data_secs")]
    pub data_secs: u64,
}

impl ClientTimeouts {
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    #[must_use]
    pub const fn data(&self) -> Duration {
        Duration::from_secs(self.data_secs)
    }
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect_secs(),
            command_secs: defaults::command_secs(),
            data_secs: defaults::data_secs(),
        }
    }
}

/// Where and how the network client connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    #[serde(default = "defaults::server")]
    pub server: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Negotiate TLS before the SMTP greeting (SMTPS).
    #[serde(default)]
    pub use_tls: bool,

    /// When set, the session authenticates with AUTH PLAIN.
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Name announced in EHLO.
    #[serde(default = "defaults::helo_domain")]
    pub helo_domain: String,

    #[serde(default)]
    pub timeouts: ClientTimeouts,
}

impl ConnectOptions {
    /// `server:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            server: defaults::server(),
            port: defaults::port(),
            use_tls: false,
            username: None,
            password: None,
            helo_domain: defaults::helo_domain(),
            timeouts: ClientTimeouts::default(),
        }
    }
}

mod defaults {
    pub(super) fn server() -> String {
        "localhost".to_string()
    }

    pub(super) const fn port() -> u16 {
        25
    }

    pub(super) fn helo_domain() -> String {
        "localhost".to_string()
    }

    pub(super) const fn connect_secs() -> u64 {
        30
    }

    pub(super) const fn command_secs() -> u64 {
        60
    }

    pub(super) const fn data_secs() -> u64 {
        120
    }
}

//! SMTP client connection over plain TCP or implicit TLS.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use courier_common::{incoming, outgoing, tracing};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore, pki_types::ServerName},
};

use super::{
    error::{ClientError, Result},
    response::Response,
};

/// Initial size of the read buffer for SMTP replies.
const BUFFER_SIZE: usize = 8192;

/// Upper bound for a single reply.
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

enum ClientConnection {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl ClientConnection {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(stream) => stream.write_all(data).await?,
            Self::Tls(stream) => stream.write_all(data).await?,
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        match self {
            Self::Plain(stream) => stream.flush().await?,
            Self::Tls(stream) => stream.flush().await?,
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self {
            Self::Plain(stream) => stream.read(buf).await?,
            Self::Tls(stream) => stream.read(buf).await?,
        };
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(n)
    }
}

fn tls_connector() -> Result<TlsConnector> {
    let mut root_store = RootCertStore::empty();

    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        root_store
            .add(cert)
            .map_err(|e| ClientError::TlsError(format!("Failed to add certificate: {e}")))?;
    }
    if !certs.errors.is_empty() {
        tracing::warn!(?certs.errors, "Some certificates could not be loaded");
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// An SMTP client connection.
///
/// Each command method sends one command and returns the server's reply
/// as-is; deciding whether a reply is acceptable is left to the caller.
pub struct SmtpClient {
    connection: Option<ClientConnection>,
    buffer: Vec<u8>,
    buffer_pos: usize,
}

impl SmtpClient {
    const fn with_connection(connection: ClientConnection) -> Self {
        Self {
            connection: Some(connection),
            buffer: Vec::new(),
            buffer_pos: 0,
        }
    }

    /// Connects over plain TCP.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::with_connection(ClientConnection::Plain(stream)))
    }

    /// Connects and negotiates TLS before any SMTP traffic (SMTPS).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the TLS handshake fails.
    pub async fn connect_tls(addr: &str, server_name: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;

        let server_name = ServerName::try_from(server_name.to_string())
            .map_err(|e| ClientError::TlsError(format!("Invalid server name: {e}")))?;

        let stream = tls_connector()?
            .connect(server_name, stream)
            .await
            .map_err(|e| ClientError::TlsError(e.to_string()))?;

        Ok(Self::with_connection(ClientConnection::Tls(Box::new(stream))))
    }

    /// Whether the session is still open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the greeting is malformed.
    pub async fn read_greeting(&mut self) -> Result<Response> {
        self.read_response().await
    }

    /// Sends a raw command line and reads the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading fails.
    pub async fn command(&mut self, command: &str) -> Result<Response> {
        outgoing!("{command}");

        let connection = self.connection.as_mut().ok_or(ClientError::NotConnected)?;
        connection.send(format!("{command}\r\n").as_bytes()).await?;
        connection.flush().await?;

        self.read_response().await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn ehlo(&mut self, domain: &str) -> Result<Response> {
        self.command(&format!("EHLO {domain}")).await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn helo(&mut self, domain: &str) -> Result<Response> {
        self.command(&format!("HELO {domain}")).await
    }

    /// `AUTH PLAIN` with an initial response (RFC 4616).
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn auth_plain(&mut self, username: &str, password: &str) -> Result<Response> {
        let token = STANDARD.encode(format!("\0{username}\0{password}"));
        outgoing!("AUTH PLAIN <redacted>");

        let connection = self.connection.as_mut().ok_or(ClientError::NotConnected)?;
        connection
            .send(format!("AUTH PLAIN {token}\r\n").as_bytes())
            .await?;
        connection.flush().await?;

        self.read_response().await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn mail_from(&mut self, from: &str) -> Result<Response> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn data(&mut self) -> Result<Response> {
        self.command("DATA").await
    }

    /// Sends the message content, dot-stuffed, followed by the
    /// terminating `CRLF.CRLF`.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails.
    pub async fn send_data(&mut self, data: &str) -> Result<Response> {
        let connection = self.connection.as_mut().ok_or(ClientError::NotConnected)?;

        let stuffed = dot_stuff(data);
        outgoing!(bytes = stuffed.len(), "<message data>");

        connection.send(stuffed.as_bytes()).await?;
        if !stuffed.ends_with("\r\n") {
            connection.send(b"\r\n").await?;
        }
        connection.send(b".\r\n").await?;
        connection.flush().await?;

        self.read_response().await
    }

    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rset(&mut self) -> Result<Response> {
        self.command("RSET").await
    }

    /// Sends QUIT and drops the connection whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn quit(&mut self) -> Result<Response> {
        let response = self.command("QUIT").await;
        self.connection = None;
        response
    }

    async fn read_response(&mut self) -> Result<Response> {
        if self.buffer.is_empty() {
            self.buffer.resize(BUFFER_SIZE, 0);
        }

        loop {
            match Response::parse(&self.buffer[..self.buffer_pos]) {
                Ok(Some((response, consumed))) => {
                    self.buffer.copy_within(consumed..self.buffer_pos, 0);
                    self.buffer_pos -= consumed;

                    incoming!("{} {}", response.code, response.message());
                    return Ok(response);
                }
                Ok(None) => {}
                Err(e) => return Err(self.abandon(e)),
            }

            if self.buffer_pos >= self.buffer.len() {
                let new_size = self.buffer.len() * 2;
                if new_size > MAX_BUFFER_SIZE {
                    return Err(self.abandon(ClientError::ParseError(format!(
                        "Reply too large (exceeds {MAX_BUFFER_SIZE} bytes)"
                    ))));
                }
                self.buffer.resize(new_size, 0);
            }

            let connection = self.connection.as_mut().ok_or(ClientError::NotConnected)?;
            match connection.read(&mut self.buffer[self.buffer_pos..]).await {
                Ok(n) => self.buffer_pos += n,
                Err(e) => return Err(self.abandon(e)),
            }
        }
    }

    /// Drops the connection along with any unread bytes. Used once the
    /// stream can no longer be parsed in step with the commands sent.
    fn abandon(&mut self, error: ClientError) -> ClientError {
        tracing::debug!("Dropping SMTP connection: {error}");
        self.connection = None;
        self.buffer_pos = 0;
        error
    }
}

/// Normalises line endings to CRLF and doubles any leading '.' (RFC 5321 4.5.2).
fn dot_stuff(data: &str) -> String {
    let mut out = String::with_capacity(data.len() + 16);

    for line in data.split_inclusive('\n') {
        let (text, terminated) = line
            .strip_suffix('\n')
            .map_or((line, false), |text| (text, true));
        let text = text.strip_suffix('\r').unwrap_or(text);

        if text.starts_with('.') {
            out.push('.');
        }
        out.push_str(text);
        if terminated {
            out.push_str("\r\n");
        }
    }

    out
}

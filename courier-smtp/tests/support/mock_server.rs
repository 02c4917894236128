//! Scriptable SMTP server for exercising [`SmtpTransport`] over a real socket.
//!
//! Every command has a configurable reply and every command received is
//! logged, so tests can assert both on what the client was told and on
//! what it said.
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

/// A command as the server saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    Helo(String),
    Auth(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Everything between `DATA` and the terminating dot, still dot-stuffed.
    MessageContent(String),
    Rset,
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
struct Reply {
    code: u16,
    message: String,
}

impl Reply {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Debug, Clone)]
struct MockServerConfig {
    greeting: Reply,
    ehlo: Reply,
    helo: Reply,
    auth: Reply,
    mail_from: Reply,
    rcpt_to: Reply,
    data: Reply,
    data_end: Reply,
    rset: Reply,
    quit: Reply,
    response_delay: Option<Duration>,
    /// Applied to the reply to the first `MAIL` only.
    first_mail_from_delay: Option<Duration>,
    /// Raw line sent instead of the reply to the first `MAIL`.
    first_mail_from_raw: Option<String>,
    mail_from_seen: Arc<AtomicUsize>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting: Reply::new(220, "mock.example.net ESMTP"),
            ehlo: Reply::new(250, "mock.example.net"),
            helo: Reply::new(250, "mock.example.net"),
            auth: Reply::new(235, "Authentication successful"),
            mail_from: Reply::new(250, "OK"),
            rcpt_to: Reply::new(250, "OK"),
            data: Reply::new(354, "End data with <CR><LF>.<CR><LF>"),
            data_end: Reply::new(250, "OK: queued"),
            rset: Reply::new(250, "OK"),
            quit: Reply::new(221, "Bye"),
            response_delay: None,
            first_mail_from_delay: None,
            first_mail_from_raw: None,
            mail_from_seen: Arc::new(AtomicUsize::new(0)),
        }
    }
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<SmtpCommand>>>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            config: MockServerConfig::default(),
        }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Commands received so far, across all connections.
    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands.read().await.clone()
    }

    /// Bodies received after `DATA`.
    pub async fn messages(&self) -> Vec<String> {
        self.commands()
            .await
            .into_iter()
            .filter_map(|command| match command {
                SmtpCommand::MessageContent(content) => Some(content),
                _ => None,
            })
            .collect()
    }

    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockServerConfig>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(&config.greeting.to_bytes()).await?;
        writer.flush().await?;

        loop {
            line.clear();

            let Ok(read) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }

            let command_line = line.trim();
            let (verb, argument) = command_line
                .split_once(' ')
                .unwrap_or((command_line, ""));

            let (reply, command) = match verb.to_uppercase().as_str() {
                "EHLO" => (&config.ehlo, SmtpCommand::Ehlo(argument.to_string())),
                "HELO" => (&config.helo, SmtpCommand::Helo(argument.to_string())),
                "AUTH" => (&config.auth, SmtpCommand::Auth(argument.to_string())),
                "MAIL" => (&config.mail_from, SmtpCommand::MailFrom(argument.to_string())),
                "RCPT" => (&config.rcpt_to, SmtpCommand::RcptTo(argument.to_string())),
                "DATA" => (&config.data, SmtpCommand::Data),
                "RSET" => (&config.rset, SmtpCommand::Rset),
                "QUIT" => (&config.quit, SmtpCommand::Quit),
                _ => {
                    commands
                        .write()
                        .await
                        .push(SmtpCommand::Other(command_line.to_string()));
                    writer.write_all(b"500 Unknown command\r\n").await?;
                    writer.flush().await?;
                    continue;
                }
            };

            commands.write().await.push(command.clone());

            let first_mail_from = matches!(command, SmtpCommand::MailFrom(_))
                && config.mail_from_seen.fetch_add(1, Ordering::SeqCst) == 0;

            if let Some(delay) = config.response_delay {
                tokio::time::sleep(delay).await;
            }
            if first_mail_from {
                if let Some(delay) = config.first_mail_from_delay {
                    tokio::time::sleep(delay).await;
                }
            }

            match &config.first_mail_from_raw {
                Some(raw) if first_mail_from => {
                    writer.write_all(format!("{raw}\r\n").as_bytes()).await?;
                }
                _ => writer.write_all(&reply.to_bytes()).await?,
            }
            writer.flush().await?;

            match command {
                SmtpCommand::Quit => return Ok(()),
                SmtpCommand::Data if reply.code == 354 => {
                    let mut content = String::new();
                    let mut data_line = String::new();

                    loop {
                        data_line.clear();
                        if reader.read_line(&mut data_line).await? == 0 {
                            return Ok(());
                        }
                        if data_line == ".\r\n" || data_line == ".\n" {
                            break;
                        }
                        content.push_str(&data_line);
                    }

                    commands
                        .write()
                        .await
                        .push(SmtpCommand::MessageContent(content));
                    writer.write_all(&config.data_end.to_bytes()).await?;
                    writer.flush().await?;
                }
                _ => {}
            }
        }
    }
}

pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_ehlo_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.ehlo = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_auth_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.auth = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_data_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data = Reply::new(code, message);
        self
    }

    /// Reply sent after the terminating dot.
    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end = Reply::new(code, message);
        self
    }

    /// Holds back the reply to the first `MAIL` received by the server.
    #[must_use]
    pub const fn with_mail_from_delay(mut self, delay: Duration) -> Self {
        self.config.first_mail_from_delay = Some(delay);
        self
    }

    /// Answers the first `MAIL` with `line` verbatim, then behaves normally.
    #[must_use]
    pub fn with_malformed_mail_from_reply(mut self, line: impl Into<String>) -> Self {
        self.config.first_mail_from_raw = Some(line.into());
        self
    }

    #[must_use]
    pub const fn with_response_delay(mut self, delay: Duration) -> Self {
        self.config.response_delay = Some(delay);
        self
    }

    /// Binds to an ephemeral port on localhost and starts serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn build(self) -> std::io::Result<MockSmtpServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));

        let task_commands = Arc::clone(&commands);
        tokio::spawn(async move {
            while let Ok((stream, _peer)) = listener.accept().await {
                let config = Arc::clone(&config);
                let commands = Arc::clone(&task_commands);

                tokio::spawn(async move {
                    if let Err(e) = MockSmtpServer::handle_client(stream, config, commands).await {
                        eprintln!("mock server client error: {e}");
                    }
                });
            }
        });

        Ok(MockSmtpServer { addr, commands })
    }
}

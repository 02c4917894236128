//! End-to-end behaviour of `SmtpSender` over the recording client

use std::sync::Arc;

use courier::{ConfigError, Error, Outcome, SmtpOptions, SmtpSender};
use courier_common::{AddressBook, AddressError, Level, LevelInfo, Message};
use courier_smtp::{ClientError, ConnectOptions, Phase, RecordingClient, TransactionError};
use pretty_assertions::assert_eq;

const TRACE_TO_INFO: LevelInfo = LevelInfo::new(Level::Trace, Level::Info);

fn options(client: &RecordingClient) -> SmtpOptions {
    let mut recipients = AddressBook::new();
    recipients.add_recipient("one", "one@example.net").unwrap();

    SmtpOptions {
        name: "test smtp sender".to_string(),
        subject: "test email from logger".to_string(),
        name_as_subject: true,
        recipients,
        client: Some(Box::new(client.clone())),
        ..SmtpOptions::default()
    }
}

async fn sender(client: &RecordingClient, levels: LevelInfo) -> SmtpSender {
    SmtpSender::new(options(client), levels).await.unwrap()
}

#[tokio::test]
async fn test_recipient_list_management() {
    let client = RecordingClient::new();
    let options = options(&client);
    assert!(options.validate().is_ok());

    let sender = SmtpSender::new(options, TRACE_TO_INFO).await.unwrap();
    assert_eq!(sender.recipients().len(), 1);

    sender.reset_recipients();
    assert!(sender.recipients().is_empty());
    sender.reset_recipients();
    assert!(sender.recipients().is_empty());

    assert!(matches!(
        sender.add_recipients::<&str>(&[]),
        Err(AddressError::NoAddresses)
    ));
    assert!(sender.recipients().is_empty());

    assert!(sender.add_recipients(&["foo", "bar", "baz"]).is_err());
    assert!(sender.recipients().is_empty());
}

#[tokio::test]
async fn test_adding_multiple_recipients() {
    let client = RecordingClient::new();
    let sender = sender(&client, TRACE_TO_INFO).await;
    sender.reset_recipients();

    sender.add_recipients(&["test <one@example.net>"]).unwrap();
    assert_eq!(sender.recipients().len(), 1);

    sender
        .add_recipients(&["test <one@example.net>", "test2 <two@example.net>"])
        .unwrap();
    assert_eq!(sender.recipients().len(), 3);

    let names: Vec<String> = sender
        .recipients()
        .iter()
        .map(|recipient| recipient.name().to_string())
        .collect();
    assert_eq!(names, vec!["test", "test", "test2"]);
}

#[tokio::test]
async fn test_adding_single_recipient() {
    let client = RecordingClient::new();
    let sender = sender(&client, TRACE_TO_INFO).await;
    sender.reset_recipients();

    assert!(sender.add_recipient("test", "address").is_err());
    assert!(
        sender
            .add_recipient("test <one@example.net>", "test2 <two@example.net>")
            .is_err()
    );
    assert!(sender.recipients().is_empty());

    sender.add_recipient("test", "one@example.net").unwrap();
    assert_eq!(sender.recipients().len(), 1);
}

#[tokio::test]
async fn test_content_type_follows_options() {
    let client = RecordingClient::new();

    let plain = SmtpSender::new(
        SmtpOptions {
            plain_text_contents: true,
            ..options(&client)
        },
        TRACE_TO_INFO,
    )
    .await
    .unwrap();

    let event = Message::new(Level::Info, "hello world!");
    assert_eq!(plain.deliver(&event).await.unwrap(), Outcome::Delivered);

    let message = client.message().unwrap();
    assert!(message.contains("test smtp sender"));
    assert!(message.contains("plain"));
    assert!(!message.contains("html"));

    let html = SmtpSender::new(options(&client), TRACE_TO_INFO)
        .await
        .unwrap();
    assert_eq!(html.deliver(&event).await.unwrap(), Outcome::Delivered);

    let message = client.message().unwrap();
    assert!(message.contains("test smtp sender"));
    assert!(message.contains("html"));
    assert!(!message.contains("plain"));
    assert_eq!(client.delivered(), 2);
}

#[tokio::test]
async fn test_level_range_is_inclusive() {
    let client = RecordingClient::new();
    let sender = sender(&client, TRACE_TO_INFO).await;
    assert_eq!(client.delivered(), 0);

    sender.send(&Message::new(Level::Debug, "")).await;
    assert_eq!(client.delivered(), 0);

    sender.send(&Message::new(Level::Debug, "hello")).await;
    assert_eq!(client.delivered(), 1);

    sender.send(&Message::new(Level::Alert, "world")).await;
    assert_eq!(client.delivered(), 1);

    sender.send(&Message::new(Level::Info, "at the ceiling")).await;
    sender.send(&Message::new(Level::Trace, "at the floor")).await;
    assert_eq!(client.delivered(), 3);
}

#[tokio::test]
async fn test_wider_range_accepts_alert() {
    let client = RecordingClient::new();
    let sender = sender(&client, LevelInfo::new(Level::Trace, Level::Emergency)).await;

    sender.send(&Message::new(Level::Alert, "")).await;
    assert_eq!(client.delivered(), 0);

    sender.send(&Message::new(Level::Alert, "world")).await;
    assert_eq!(client.delivered(), 1);
}

#[tokio::test]
async fn test_phase_failures_deliver_nothing() {
    for phase in [Phase::MailFrom, Phase::Recipient, Phase::Data] {
        let client = RecordingClient::new();
        let sender = sender(&client, TRACE_TO_INFO).await;
        client.fail_on(Some(phase));

        let err = sender
            .deliver(&Message::new(Level::Info, "hello world!"))
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(phase));
        assert_eq!(client.delivered(), 0);
        assert_eq!(client.message(), None);
    }
}

#[tokio::test]
async fn test_send_recovers_after_failure() {
    let client = RecordingClient::new();
    let sender = sender(&client, TRACE_TO_INFO).await;
    let event = Message::new(Level::Info, "world");

    sender.send(&event).await;
    assert_eq!(client.delivered(), 1);

    client.fail_on(Some(Phase::Data));
    sender.send(&event).await;
    assert_eq!(client.delivered(), 1);

    client.fail_on(None);
    sender.send(&event).await;
    assert_eq!(client.delivered(), 2);
}

#[tokio::test]
async fn test_empty_recipients_at_send() {
    let client = RecordingClient::new();
    let sender = sender(&client, TRACE_TO_INFO).await;
    sender.reset_recipients();

    assert!(matches!(
        sender.deliver(&Message::new(Level::Info, "hello world!")).await,
        Err(TransactionError::NoRecipients)
    ));
    assert_eq!(client.delivered(), 0);
}

#[tokio::test]
async fn test_concurrent_sends_do_not_interleave() {
    let client = RecordingClient::new();
    let sender = Arc::new(sender(&client, TRACE_TO_INFO).await);
    sender.add_recipient("two", "two@example.net").unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let sender = Arc::clone(&sender);
            tokio::spawn(async move {
                sender
                    .deliver(&Message::new(Level::Info, format!("event {i}")))
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), Outcome::Delivered);
    }
    assert_eq!(client.delivered(), 16);
    assert_eq!(client.recipients().len(), 2);
}

#[tokio::test]
async fn test_constructor_failures() {
    assert!(matches!(
        SmtpSender::try_from_options(None, TRACE_TO_INFO).await,
        Err(Error::Config(ConfigError::Missing))
    ));

    assert!(matches!(
        SmtpSender::new(SmtpOptions::default(), TRACE_TO_INFO).await,
        Err(Error::Config(ConfigError::MissingName))
    ));

    let client = RecordingClient::new();
    assert!(matches!(
        SmtpSender::new(options(&client), LevelInfo::new(Level::Invalid, Level::Info)).await,
        Err(Error::Config(ConfigError::InvalidLevel(Level::Invalid)))
    ));
    assert!(matches!(
        SmtpSender::new(options(&client), LevelInfo::new(Level::Info, Level::Trace)).await,
        Err(Error::Config(ConfigError::InconsistentLevels { .. }))
    ));
    assert!(client.connected_with().is_none());

    let failing = RecordingClient::failing_on(Phase::Create);
    assert!(matches!(
        SmtpSender::new(options(&failing), TRACE_TO_INFO).await,
        Err(Error::Connection(ClientError::Io(_)))
    ));

    assert!(
        SmtpSender::try_from_options(Some(options(&client)), TRACE_TO_INFO)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_default_client_needs_a_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    for use_tls in [false, true] {
        let options = SmtpOptions {
            client: None,
            connect: ConnectOptions {
                server: "127.0.0.1".to_string(),
                port,
                use_tls,
                ..ConnectOptions::default()
            },
            ..options(&RecordingClient::new())
        };
        assert!(options.validate().is_ok());

        assert!(matches!(
            SmtpSender::new(options, TRACE_TO_INFO).await,
            Err(Error::Connection(_))
        ));
    }
}

#[tokio::test]
async fn test_sender_from_toml() {
    let mut options = SmtpOptions::from_toml(
        r#"
        name = "alerts"
        from = "alerts@example.net"
        subject = "service alert"
        truncated_subject_length = 12
        plain_text_contents = true
        recipients = ["Ops <ops@example.net>"]
        "#,
    )
    .unwrap();

    let client = RecordingClient::new();
    options.client = Some(Box::new(client.clone()));

    let sender = SmtpSender::new(options, LevelInfo::new(Level::Warning, Level::Emergency))
        .await
        .unwrap();
    sender
        .send(&Message::new(Level::Error, "replica lag above threshold"))
        .await;

    let message = client.message().unwrap();
    assert!(message.contains("From: \"alerts\" <alerts@example.net>\r\n"));
    assert!(message.contains("To: \"Ops\" <ops@example.net>\r\n"));
    assert!(message.contains("Subject: replica lag \r\n"));
    assert_eq!(client.sender().unwrap().to_string(), "alerts@example.net");
}

#[tokio::test]
async fn test_custom_negotiator() {
    let client = RecordingClient::new();
    let options = SmtpOptions {
        negotiator: Some(Arc::new(|options: &SmtpOptions, text: &str| {
            courier::Envelope {
                subject: format!("[{}] {text}", options.name),
                body: text.to_string(),
                content_type: courier::ContentType::Plain,
            }
        })),
        ..options(&client)
    };

    let sender = SmtpSender::new(options, TRACE_TO_INFO).await.unwrap();
    sender.send(&Message::new(Level::Info, "disk full")).await;

    assert!(
        client
            .message()
            .unwrap()
            .contains("Subject: [test smtp sender] disk full\r\n")
    );
}

//! Email sink for leveled log events.
//!
//! ```no_run
//! use courier::{SmtpOptions, SmtpSender};
//! use courier_common::{Level, LevelInfo, Message};
//!
//! # async fn run() -> Result<(), courier::Error> {
//! courier_common::logging::init();
//!
//! let mut options = SmtpOptions {
//!     name: "billing".to_string(),
//!     plain_text_contents: true,
//!     ..SmtpOptions::default()
//! };
//! options.recipients.add_recipients(&["Ops <ops@example.net>"])?;
//!
//! let sender = SmtpSender::new(options, LevelInfo::new(Level::Error, Level::Emergency)).await?;
//! sender.send(&Message::new(Level::Critical, "payment queue stalled")).await;
//! sender.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod negotiate;
pub mod sender;

pub use config::{ResolvedOptions, SmtpOptions};
pub use error::{ConfigError, Error};
pub use negotiate::{ContentType, DefaultNegotiator, Envelope, Negotiate, SubjectRule};
pub use sender::{ErrorHandler, LogErrorHandler, Outcome, SmtpSender};

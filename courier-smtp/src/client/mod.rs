//! Low-level SMTP client.
//!
//! [`SmtpClient`] sends one command at a time and hands back the server's
//! [`Response`]. It knows nothing about transactions; sequencing and reply
//! checking live in [`crate::transport`].

mod error;
mod response;
mod smtp_client;

pub use error::{ClientError, Result};
pub use response::Response;
pub use smtp_client::SmtpClient;

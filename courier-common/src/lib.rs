pub mod address;
pub mod address_parser;
pub mod event;
pub mod level;
pub mod logging;
pub mod traits;

pub use tracing;

pub use address::{AddressBook, RecipientAddress};
pub use address_parser::{AddressError, Mailbox};
pub use event::{Event, Message};
pub use level::{Level, LevelInfo};

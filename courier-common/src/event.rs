//! The events a sender consumes.

use std::fmt;

use crate::level::Level;

/// Anything a host framework can hand to a sender: a severity plus a way
/// to render itself as text.
pub trait Event: Send + Sync {
    fn level(&self) -> Level;

    /// Rendered text of the event. An empty string means there is nothing
    /// to deliver.
    fn render(&self) -> String;
}

/// A plain text event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    level: Level,
    text: String,
}

impl Message {
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

impl Event for Message {
    fn level(&self) -> Level {
        self.level
    }

    fn render(&self) -> String {
        self.text.clone()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl<E: Event + ?Sized> Event for &E {
    fn level(&self) -> Level {
        (**self).level()
    }

    fn render(&self) -> String {
        (**self).render()
    }
}

//! Event severities and the inclusive range a sender accepts.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered event severity, least severe first.
///
/// `Invalid` is a sentinel: it sorts below every real level and is never
/// accepted as a filter bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Level {
    Invalid = 0,
    Trace = 20,
    Debug = 30,
    Info = 40,
    Notice = 50,
    Warning = 60,
    Error = 70,
    Critical = 80,
    Alert = 90,
    Emergency = 100,
}

impl Level {
    /// Every level that can be attached to an event, least severe first.
    pub const ALL: [Self; 9] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Notice,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Alert,
        Self::Emergency,
    ];

    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown level '{0}'")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "notice" => Ok(Self::Notice),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            "alert" => Ok(Self::Alert),
            "emergency" => Ok(Self::Emergency),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// Problems with a [`LevelInfo`] range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("'{0}' is not a usable level bound")]
    Invalid(Level),
    #[error("Level floor {floor} is above ceiling {ceiling}")]
    Inverted { floor: Level, ceiling: Level },
}

/// Inclusive `[floor, ceiling]` range of severities a sender delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub floor: Level,
    pub ceiling: Level,
}

impl LevelInfo {
    #[must_use]
    pub const fn new(floor: Level, ceiling: Level) -> Self {
        Self { floor, ceiling }
    }

    /// Checks that both bounds are real levels and that they are ordered.
    ///
    /// # Errors
    ///
    /// Returns `LevelError` describing the first problem found.
    pub fn validate(&self) -> Result<(), LevelError> {
        if !self.floor.is_valid() {
            return Err(LevelError::Invalid(self.floor));
        }
        if !self.ceiling.is_valid() {
            return Err(LevelError::Invalid(self.ceiling));
        }
        if self.floor > self.ceiling {
            return Err(LevelError::Inverted {
                floor: self.floor,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }

    /// Whether an event at `level` falls inside the range.
    #[must_use]
    pub fn accepts(&self, level: Level) -> bool {
        level.is_valid() && (self.floor..=self.ceiling).contains(&level)
    }
}

impl Default for LevelInfo {
    fn default() -> Self {
        Self::new(Level::Trace, Level::Emergency)
    }
}

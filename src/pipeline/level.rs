//! Log severity levels
//!
//! Seven levels ordered by severity. Rank 0 is the most severe, so a record
//! passes the minimum-level filter when its rank is less than or equal to the
//! configured minimum's rank.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Http,
    Verbose,
    Debug,
    Silly,
}

impl LogLevel {
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Http,
        LogLevel::Verbose,
        LogLevel::Debug,
        LogLevel::Silly,
    ];

    /// Severity rank (0 = most severe)
    pub fn rank(self) -> u8 {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            LogLevel::Info => 2,
            LogLevel::Http => 3,
            LogLevel::Verbose => 4,
            LogLevel::Debug => 5,
            LogLevel::Silly => 6,
        }
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.get(rank as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Http => "http",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Silly => "silly",
        }
    }

    /// Whether a record at this level passes a `min` threshold
    pub fn is_enabled_for(self, min: LogLevel) -> bool {
        self.rank() <= min.rank()
    }

    /// Level for an HTTP access record: 5xx errors, 4xx warnings, everything else info
    pub fn for_status(status_code: u16) -> Self {
        if status_code >= 500 {
            LogLevel::Error
        } else if status_code >= 400 {
            LogLevel::Warn
        } else {
            LogLevel::Info
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown log level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "http" => Ok(LogLevel::Http),
            "verbose" => Ok(LogLevel::Verbose),
            "debug" => Ok(LogLevel::Debug),
            "silly" => Ok(LogLevel::Silly),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

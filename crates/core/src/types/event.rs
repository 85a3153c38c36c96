//! Events delivered by a transport adapter

use serde::{Deserialize, Serialize};

/// Log severity as reported by the terminal SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Trace,
    Warn,
    Error,
    Fatal,
    Unknown,
}

impl Severity {
    /// Map the SDK's numeric level; out-of-range values are `Unknown`
    pub fn from_level(level: i32) -> Self {
        match level {
            0 => Severity::Debug,
            1 => Severity::Info,
            2 => Severity::Trace,
            3 => Severity::Warn,
            4 => Severity::Error,
            5 => Severity::Fatal,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Trace => "TRACE",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

/// Notification pushed by the adapter into the session's event channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportEvent {
    /// Session with the terminal is up
    Connected,

    /// Session with the terminal went away
    Disconnected,

    /// A started connection attempt gave up
    ConnectFailed { reason: String },

    /// Diagnostic line from the SDK
    Log { severity: Severity, message: String },

    /// Raw hex response to the last command
    Response { raw: String },
}

impl TransportEvent {
    pub fn response(raw: impl Into<String>) -> Self {
        Self::Response { raw: raw.into() }
    }

    pub fn log(level: i32, message: impl Into<String>) -> Self {
        Self::Log {
            severity: Severity::from_level(level),
            message: message.into(),
        }
    }

    pub fn connect_failed(reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            reason: reason.into(),
        }
    }
}

//! Session configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::RefundCheck;

/// Default capacity of the transport event channel
pub const DEFAULT_EVENT_BUFFER: usize = 32;

/// Secure-channel parameters handed to the adapter on connect
///
/// TLS is off by default. When enabled a certificate name is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub tls_enabled: bool,
    pub certificate_name: Option<String>,
    pub certificate_password: Option<String>,
}

/// Configuration for a [`crate::PosSession`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub security: SecurityConfig,
    pub refund_check: RefundCheck,
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            security: SecurityConfig::default(),
            refund_check: RefundCheck::Literal,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl SessionConfig {
    /// Enable TLS with the given certificate
    pub fn with_tls(mut self, certificate_name: String, certificate_password: String) -> Self {
        self.security = SecurityConfig {
            tls_enabled: true,
            certificate_name: Some(certificate_name),
            certificate_password: Some(certificate_password),
        };
        self
    }

    pub fn with_refund_check(mut self, check: RefundCheck) -> Self {
        self.refund_check = check;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_buffer == 0 {
            return Err(CoreError::InvalidConfig(
                "event_buffer must be greater than 0".into(),
            ));
        }
        if self.security.tls_enabled
            && self
                .security
                .certificate_name
                .as_deref()
                .map_or(true, str::is_empty)
        {
            return Err(CoreError::InvalidConfig(
                "TLS enabled without a certificate name".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document; missing keys take defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

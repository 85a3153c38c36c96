//! Transport that hands every request to a host-owned adapter
//!
//! Used when the terminal SDK lives outside Rust (e.g. in a mobile app): the
//! host drains [`AdapterRequest`]s, drives the SDK, and feeds SDK callbacks
//! back as [`crate::types::TransportEvent`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::SecurityConfig;
use crate::error::{CoreError, Result};
use crate::transport::{ConnectionResult, PosTransport};

/// Work item for the host adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterRequest {
    Connect {
        target: String,
        security: SecurityConfig,
    },
    Send {
        payload: String,
    },
    Disconnect,
}

pub struct ChannelTransport {
    requests: mpsc::UnboundedSender<AdapterRequest>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AdapterRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }

    fn forward(&self, request: AdapterRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| CoreError::Transport("adapter request receiver dropped".into()))
    }
}

#[async_trait]
impl PosTransport for ChannelTransport {
    /// Always `Started`: the host reports a failed start with a
    /// `ConnectFailed` event.
    async fn connect(
        &mut self,
        target: &str,
        security: &SecurityConfig,
    ) -> Result<ConnectionResult> {
        self.forward(AdapterRequest::Connect {
            target: target.to_string(),
            security: security.clone(),
        })?;
        Ok(ConnectionResult::Started)
    }

    async fn send(&mut self, payload_hex: &str) -> Result<()> {
        self.forward(AdapterRequest::Send {
            payload: payload_hex.to_string(),
        })
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.forward(AdapterRequest::Disconnect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_forwarded_in_order() {
        let (mut transport, mut rx) = ChannelTransport::new();

        let result = transport
            .connect("PAYMENT-01", &SecurityConfig::default())
            .await
            .unwrap();
        assert_eq!(result, ConnectionResult::Started);
        transport.send("0230383030030B").await.unwrap();
        transport.disconnect().await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            AdapterRequest::Connect {
                target: "PAYMENT-01".into(),
                security: SecurityConfig::default()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            AdapterRequest::Send {
                payload: "0230383030030B".into()
            }
        );
        assert_eq!(rx.recv().await.unwrap(), AdapterRequest::Disconnect);
    }

    #[tokio::test]
    async fn test_dropped_host_is_transport_error() {
        let (mut transport, rx) = ChannelTransport::new();
        drop(rx);
        assert!(matches!(
            transport.send("020303").await,
            Err(CoreError::Transport(_))
        ));
    }
}

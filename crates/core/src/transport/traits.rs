//! Transport adapter abstraction

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::SecurityConfig;
use crate::error::{CoreError, Result};
use crate::transport::{ConnectionResult, EventSender};
use crate::types::TransportEvent;

/// Adapter over the terminal SDK session
///
/// Implementations report link changes and responses through the
/// [`EventSender`] they were built with; the session owns the receiving end.
#[async_trait]
pub trait PosTransport: Send {
    /// Start a session with `target`
    async fn connect(&mut self, target: &str, security: &SecurityConfig)
        -> Result<ConnectionResult>;

    /// Transmit an already framed, hex-encoded payload
    async fn send(&mut self, payload_hex: &str) -> Result<()>;

    /// Tear the session down
    async fn disconnect(&mut self) -> Result<()>;
}

/// Mock transport for testing
///
/// Answers each payload with the next scripted response, if any.
pub struct MockTransport {
    events: EventSender,
    connect_result: ConnectionResult,
    auto_connect: bool,
    linked: bool,
    responses: VecDeque<String>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// Create new mock transport that connects immediately
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            connect_result: ConnectionResult::Started,
            auto_connect: true,
            linked: false,
            responses: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Result returned by the next `connect` calls
    pub fn with_connect_result(mut self, result: ConnectionResult) -> Self {
        self.connect_result = result;
        self
    }

    /// Keep the link pending after `connect` until an event is injected
    pub fn without_auto_connect(mut self) -> Self {
        self.auto_connect = false;
        self
    }

    /// Queue a raw hex response
    pub fn with_response(mut self, raw: impl Into<String>) -> Self {
        self.responses.push_back(raw.into());
        self
    }

    /// Shared log of payloads that reached the link
    pub fn sent_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }

    async fn emit(&self, event: TransportEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| CoreError::ChannelClosed)
    }
}

#[async_trait]
impl PosTransport for MockTransport {
    async fn connect(
        &mut self,
        _target: &str,
        _security: &SecurityConfig,
    ) -> Result<ConnectionResult> {
        if self.connect_result == ConnectionResult::Started {
            self.linked = true;
            if self.auto_connect {
                self.emit(TransportEvent::Connected).await?;
            }
        }
        Ok(self.connect_result)
    }

    async fn send(&mut self, payload_hex: &str) -> Result<()> {
        if !self.linked {
            // Mirrors the SDK: sending without a link is silently dropped
            return Ok(());
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(payload_hex.to_string());
        }
        if let Some(raw) = self.responses.pop_front() {
            self.emit(TransportEvent::response(raw)).await?;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.linked {
            self.linked = false;
            self.emit(TransportEvent::Disconnected).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::event_channel;

    #[tokio::test]
    async fn test_mock_transport() {
        let (tx, mut rx) = event_channel(8);
        let mut transport = MockTransport::new(tx).with_response("4F4B");
        let sent = transport.sent_log();

        let result = transport
            .connect("terminal-0", &SecurityConfig::default())
            .await
            .unwrap();
        assert_eq!(result, ConnectionResult::Started);
        assert_eq!(rx.recv().await.unwrap(), TransportEvent::Connected);

        transport.send("0230383030030B").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), TransportEvent::response("4F4B"));
        assert_eq!(*sent.lock().unwrap(), vec!["0230383030030B".to_string()]);

        transport.disconnect().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), TransportEvent::Disconnected);
    }

    #[tokio::test]
    async fn test_send_without_link_is_dropped() {
        let (tx, mut rx) = event_channel(8);
        let mut transport = MockTransport::new(tx).with_response("4F4B");
        let sent = transport.sent_log();

        transport.send("020303").await.unwrap();
        assert!(sent.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_connect_emits_nothing() {
        let (tx, mut rx) = event_channel(8);
        let mut transport =
            MockTransport::new(tx).with_connect_result(ConnectionResult::FailedNoConnection);

        let result = transport
            .connect("terminal-0", &SecurityConfig::default())
            .await
            .unwrap();
        assert_eq!(result, ConnectionResult::FailedNoConnection);
        assert!(rx.try_recv().is_err());
    }
}

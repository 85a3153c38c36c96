//! Line-oriented TCP bridge to a terminal
//!
//! Each payload is written as one line of hex followed by `\n`. Every
//! non-empty line read back is a raw hex response.

use async_trait::async_trait;
use mpos_core::transport::EventSender;
use mpos_core::{
    ConnectionResult, CoreError, PosTransport, Result, SecurityConfig, TransportEvent,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct TcpBridgeTransport {
    events: EventSender,
    writer: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
}

impl TcpBridgeTransport {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            writer: None,
            reader: None,
        }
    }

    async fn emit(&self, event: TransportEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| CoreError::ChannelClosed)
    }
}

#[async_trait]
impl PosTransport for TcpBridgeTransport {
    async fn connect(
        &mut self,
        target: &str,
        security: &SecurityConfig,
    ) -> Result<ConnectionResult> {
        if security.tls_enabled {
            return Err(CoreError::Transport(
                "TLS is not supported by the TCP bridge".to_string(),
            ));
        }

        let stream = match TcpStream::connect(target).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(terminal = target, error = %e, "TCP bridge unreachable");
                return Ok(ConnectionResult::FailedNoConnection);
            }
        };
        info!(terminal = target, "TCP bridge connected");

        let (read_half, write_half) = stream.into_split();
        self.writer = Some(write_half);
        self.reader = Some(tokio::spawn(read_lines(read_half, self.events.clone())));

        self.emit(TransportEvent::Connected).await?;
        Ok(ConnectionResult::Started)
    }

    async fn send(&mut self, payload_hex: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(CoreError::NotConnected)?;
        debug!(payload = payload_hex, "Writing payload to bridge");

        writer.write_all(payload_hex.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut writer) = self.writer.take() {
            // Peer may already be gone
            let _ = writer.shutdown().await;
        }
        Ok(())
    }
}

/// Forward each received line as a response until the peer closes
async fn read_lines(read_half: OwnedReadHalf, events: EventSender) {
    let mut lines = BufReader::new(read_half).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let raw = line.trim();
                if raw.is_empty() {
                    continue;
                }
                if events.send(TransportEvent::response(raw)).await.is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "TCP bridge read failed");
                break;
            }
        }
    }

    info!("TCP bridge closed by peer");
    let _ = events.send(TransportEvent::Disconnected).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpos_core::{event_channel, FrameCodec, PosSession, SessionConfig, TracingNotifier};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// Bridge that answers every line with `reply`, returning what it received
    async fn spawn_bridge(reply: &'static str) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let mut received = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                received.push(line);
                write_half
                    .write_all(format!("{reply}\n").as_bytes())
                    .await
                    .unwrap();
            }
            received
        });

        (addr, handle)
    }

    #[tokio::test]
    async fn test_totals_over_tcp() {
        let (addr, bridge) = spawn_bridge("0x300x370x310x30").await;

        let (events_tx, events_rx) = event_channel(8);
        let mut session = PosSession::new(
            Box::new(TcpBridgeTransport::new(events_tx)),
            events_rx,
            Arc::new(TracingNotifier),
            SessionConfig::default(),
        );

        session.connect(&addr).await.unwrap();
        session.wait_until_connected().await.unwrap();

        let response = session.totals().await.unwrap();
        assert_eq!(response.text, "0710");

        session.shutdown().await.unwrap();
        let received = bridge.await.unwrap();
        assert_eq!(received, vec![FrameCodec::encode("0700||").unwrap()]);
    }

    #[tokio::test]
    async fn test_unreachable_bridge() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let (events_tx, _events_rx) = event_channel(8);
        let mut transport = TcpBridgeTransport::new(events_tx);
        let result = transport
            .connect(&addr, &SecurityConfig::default())
            .await
            .unwrap();
        assert_eq!(result, ConnectionResult::FailedNoConnection);
    }

    #[tokio::test]
    async fn test_tls_rejected() {
        let (events_tx, _events_rx) = event_channel(8);
        let mut transport = TcpBridgeTransport::new(events_tx);
        let security = SecurityConfig {
            tls_enabled: true,
            certificate_name: Some("serverb".into()),
            certificate_password: None,
        };
        let result = transport.connect("127.0.0.1:1", &security).await;
        assert!(matches!(result, Err(CoreError::Transport(_))));
    }

    #[tokio::test]
    async fn test_send_before_connect() {
        let (events_tx, _events_rx) = event_channel(8);
        let mut transport = TcpBridgeTransport::new(events_tx);
        assert!(matches!(
            transport.send("020303").await,
            Err(CoreError::NotConnected)
        ));
    }
}

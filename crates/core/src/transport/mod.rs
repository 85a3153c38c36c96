//! Transport seam between the protocol core and the terminal SDK
//!
//! This module provides:
//! - The [`PosTransport`] adapter trait and a scriptable [`MockTransport`]
//! - [`ChannelTransport`] for adapters that live in a host application
//! - The connection state machine
//! - The bounded event channel adapters report through

pub mod channel;
pub mod state;
pub mod traits;

pub use channel::{AdapterRequest, ChannelTransport};
pub use state::ConnectionState;
pub use traits::{MockTransport, PosTransport};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::TransportEvent;

/// Producer half of the adapter event channel
pub type EventSender = mpsc::Sender<TransportEvent>;
/// Consumer half, owned by the session
pub type EventReceiver = mpsc::Receiver<TransportEvent>;

/// Outcome of starting an SDK session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionResult {
    /// Service started; `Connected` follows once the terminal links up
    Started,
    /// No Wi-Fi or local hotspot available
    FailedNoConnection,
    /// SDK internal failure
    FailedInternal,
}

impl ConnectionResult {
    pub fn is_started(self) -> bool {
        self == ConnectionResult::Started
    }
}

/// Create the bounded channel an adapter uses to report events
///
/// # Arguments
/// * `capacity` - Maximum number of undelivered events
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_result() {
        assert!(ConnectionResult::Started.is_started());
        assert!(!ConnectionResult::FailedInternal.is_started());
    }

    #[tokio::test]
    async fn test_event_channel_delivers_in_order() {
        let (tx, mut rx) = event_channel(4);
        tx.send(TransportEvent::Connected).await.unwrap();
        tx.send(TransportEvent::response("4F4B")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), TransportEvent::Connected);
        assert_eq!(rx.recv().await.unwrap(), TransportEvent::response("4F4B"));
    }
}

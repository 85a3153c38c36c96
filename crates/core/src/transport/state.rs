//! Connection state machine
//!
//! `Disconnected -> Connecting -> Connected`, driven by explicit calls on the
//! session side and by [`TransportEvent`]s on the adapter side.

use serde::{Deserialize, Serialize};

use crate::types::TransportEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    /// A connect call was issued
    pub fn begin_connect(self) -> Self {
        match self {
            ConnectionState::Disconnected => ConnectionState::Connecting,
            other => other,
        }
    }

    /// A connect call was refused by the adapter
    pub fn connect_refused(self) -> Self {
        match self {
            ConnectionState::Connecting => ConnectionState::Disconnected,
            other => other,
        }
    }

    /// Apply an adapter event
    ///
    /// The adapter is authoritative for link status: `Connected` and
    /// `Disconnected` apply from any state.
    pub fn on_event(self, event: &TransportEvent) -> Self {
        match event {
            TransportEvent::Connected => ConnectionState::Connected,
            TransportEvent::Disconnected => ConnectionState::Disconnected,
            TransportEvent::ConnectFailed { .. } => self.connect_refused(),
            TransportEvent::Log { .. } | TransportEvent::Response { .. } => self,
        }
    }
}

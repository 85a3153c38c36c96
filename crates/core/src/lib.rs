//! mPOS Core - Point-of-sale terminal command protocol
//!
//! This crate provides:
//! - Frame codec (STX/ETX framing, LRC checksum, hex payloads)
//! - Permissive hex response decoding
//! - Validated command construction (sale, refund, totals, ...)
//! - Transport adapter trait and connection state machine
//! - Session gating commands on connectivity
//! - Error types and operator notices

// Version constants
pub const APP_VERSION_STRING: &str = "0.1.0";

pub mod config;
pub mod error;
pub mod notice;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// Re-export common types
pub use config::{SecurityConfig, SessionConfig};
pub use error::{CoreError, FramingError, Result, ValidationError};
pub use notice::{ChannelNotifier, Notifier, TracingNotifier};
pub use protocol::{compute_lrc, DecodeReport, Frame, FrameCodec, ResponseDecoder};
pub use session::PosSession;
pub use transport::{
    event_channel, AdapterRequest, ChannelTransport, ConnectionResult, ConnectionState,
    EventSender, MockTransport, PosTransport,
};
pub use types::{Opcode, PosCommand, RefundCheck, Severity, TerminalResponse, TransportEvent};

//! Mobile bridge for the mPOS integration app
//!
//! Exposes the terminal session to a Flutter host through flutter_rust_bridge.
//! The host app keeps the vendor SDK; this crate keeps the protocol and the
//! connection state.

pub mod api;
pub mod bridge;

pub use bridge::{HostRequest, MobileBridge, PosAction, PosReply};

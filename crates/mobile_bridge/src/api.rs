//! Flutter Rust Bridge API
//!
//! FFI-safe functions for Dart integration. The Dart side owns the terminal
//! SDK: it polls [`next_adapter_request`] and reports SDK callbacks through the
//! `notify_*` / [`deliver_response`] functions.

use flutter_rust_bridge::frb;
use mpos_core::{FrameCodec, ResponseDecoder, SessionConfig, TransportEvent};
use once_cell::sync::OnceCell;

use crate::bridge::{preview_body, HostRequest, MobileBridge, PosAction, PosReply};

/// Global bridge instance (thread-safe, no unsafe needed)
static BRIDGE: OnceCell<MobileBridge> = OnceCell::new();

fn bridge() -> Result<&'static MobileBridge, String> {
    BRIDGE
        .get()
        .ok_or_else(|| "Session not initialized. Call init_session first.".to_string())
}

/// Install the tracing subscriber
///
/// Safe to call more than once; later calls are ignored.
#[frb(sync)]
pub fn init_logging(level: String) {
    let filter = tracing_subscriber::EnvFilter::try_new(&level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Create the session
///
/// # Arguments
/// * `config_json` - Optional `SessionConfig` JSON; defaults when absent
///
/// # Errors
/// Invalid configuration, or the session already exists.
#[frb(sync)]
pub fn init_session(config_json: Option<String>) -> Result<(), String> {
    let config = match config_json {
        Some(json) => SessionConfig::from_json_str(&json).map_err(|e| e.to_string())?,
        None => SessionConfig::default(),
    };

    BRIDGE
        .set(MobileBridge::new(config))
        .map_err(|_| "Session already initialized. Please restart app to reset.".to_string())
}

/// Terminals discovered by the host, first one is used on connect
#[frb(sync)]
pub fn set_terminals(terminals: Vec<String>) -> Result<(), String> {
    bridge()?.set_terminals(terminals);
    Ok(())
}

/// Connect to the first known terminal, or disconnect if connected
#[frb]
pub async fn toggle_connection() -> Result<(), String> {
    bridge()?.toggle_connection().await
}

/// Check if connected
///
/// Returns false if the session is not initialized.
#[frb]
pub async fn is_connected() -> bool {
    match BRIDGE.get() {
        Some(bridge) => bridge.is_connected().await,
        None => false,
    }
}

#[frb]
pub async fn load_keys() -> Result<PosReply, String> {
    bridge()?.run(PosAction::LoadKeys).await
}

#[frb]
pub async fn last_sale() -> Result<PosReply, String> {
    bridge()?.run(PosAction::LastSale).await
}

#[frb]
pub async fn totals() -> Result<PosReply, String> {
    bridge()?.run(PosAction::Totals).await
}

#[frb]
pub async fn close() -> Result<PosReply, String> {
    bridge()?.run(PosAction::Close).await
}

#[frb]
pub async fn details() -> Result<PosReply, String> {
    bridge()?.run(PosAction::Details).await
}

/// Run a sale for the amount typed by the operator
#[frb]
pub async fn sale(amount: String) -> Result<PosReply, String> {
    bridge()?.run(PosAction::Sale { amount }).await
}

/// Run a refund for the operation number typed by the operator
#[frb]
pub async fn refund(operation_number: String) -> Result<PosReply, String> {
    bridge()?.run(PosAction::Refund { operation_number }).await
}

// ===== Host adapter callbacks =====

/// Next request to perform with the SDK, if any
#[frb(sync)]
pub fn next_adapter_request() -> Result<Option<HostRequest>, String> {
    Ok(bridge()?.next_host_request())
}

/// SDK reported the terminal as connected
#[frb]
pub async fn notify_connection() -> Result<(), String> {
    bridge()?.push_event(TransportEvent::Connected).await
}

/// SDK reported the terminal as disconnected
#[frb]
pub async fn notify_disconnection() -> Result<(), String> {
    bridge()?.push_event(TransportEvent::Disconnected).await
}

/// SDK could not bring the connection up
#[frb]
pub async fn notify_connect_failed(reason: String) -> Result<(), String> {
    bridge()?
        .push_event(TransportEvent::connect_failed(reason))
        .await
}

/// SDK log line with its numeric severity
#[frb]
pub async fn pcl_log_entry(message: String, severity: i32) -> Result<(), String> {
    bridge()?
        .push_event(TransportEvent::log(severity, message))
        .await
}

/// Raw hex response from the terminal
#[frb]
pub async fn deliver_response(raw_hex: String) -> Result<(), String> {
    bridge()?
        .push_event(TransportEvent::response(raw_hex))
        .await
}

/// Next operator notice to show, if any
#[frb(sync)]
pub fn next_notice() -> Option<String> {
    BRIDGE.get().and_then(MobileBridge::next_notice)
}

/// Disconnect before the screen goes away
#[frb]
pub async fn shutdown_session() -> Result<(), String> {
    bridge()?.shutdown().await
}

// ===== Stateless helpers =====

/// Frame and hex-encode a command body
#[frb(sync)]
pub fn encode_command(command: String) -> Result<String, String> {
    FrameCodec::encode(&command).map_err(|e| e.to_string())
}

/// Decode a raw hex response into text
#[frb(sync)]
pub fn decode_response(raw_hex: String) -> String {
    ResponseDecoder::decode(&raw_hex)
}

/// Body a sale would send for `amount`, validated
#[frb(sync)]
pub fn preview_sale(amount: String) -> Result<String, String> {
    preview_body(&PosAction::Sale { amount }, &SessionConfig::default())
}

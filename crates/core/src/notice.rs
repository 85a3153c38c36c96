//! Operator notices and the capability used to show them
//!
//! Notices are transient and non-blocking: the core calls [`Notifier::notify`]
//! and carries on, the host decides how to present the text.

use tokio::sync::mpsc;

pub const NOT_CONNECTED: &str = "POS no conectado";
pub const CONNECT_FAILED: &str = "No se pudo conectar al POS";
pub const NO_TERMINAL_FOUND: &str = "No se encontro ningún POS";

pub const AMOUNT_NOT_NUMERIC: &str = "El monto debe ser un número entero";
pub const AMOUNT_TOO_LOW: &str = "El monto debe ser mayor o igual a $50";
pub const AMOUNT_TOO_HIGH: &str = "El monto debe ser menor o igual a $999.999.999";

pub const OPERATION_NUMBER_NOT_NUMERIC: &str = "El número de operación debe ser un número entero";
pub const OPERATION_NUMBER_NOT_POSITIVE: &str = "El número de operación debe ser mayor a 0";
pub const OPERATION_NUMBER_TOO_HIGH: &str =
    "El número de operación debe ser menor o igual a 999999";

/// Sink for transient operator notices
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str) + Send + Sync,
{
    fn notify(&self, message: &str) {
        self(message)
    }
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!(notice = message, "Operator notice");
    }
}

/// Notifier that forwards notices over an unbounded channel
///
/// Used when another task (a UI loop, an FFI poller) owns presentation.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: &str) {
        if self.tx.send(message.to_string()).is_err() {
            tracing::debug!(notice = message, "Notice dropped, receiver gone");
        }
    }
}

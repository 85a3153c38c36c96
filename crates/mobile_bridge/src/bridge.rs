//! Mobile bridge session holder
//!
//! The host app owns the terminal SDK. Rust owns the session: outbound work
//! is queued as [`HostRequest`]s for the host to poll, SDK callbacks come back
//! through [`MobileBridge::push_event`], and operator notices are queued for
//! the host to display.
//!
//! A command holds the session until its response arrives. Status queries
//! read a state watch instead, and connection changes cancel the command in
//! flight.

use std::sync::Mutex as StdMutex;

use mpos_core::transport::EventSender;
use mpos_core::{
    event_channel, AdapterRequest, ChannelNotifier, ChannelTransport, ConnectionState, CoreError,
    PosCommand, PosSession, SessionConfig, TerminalResponse, TransportEvent,
};
use tokio::sync::mpsc::{error::TrySendError, UnboundedReceiver};
use tokio::sync::{watch, Mutex, MutexGuard, Notify};

/// Work for the host to perform with the terminal SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    Connect {
        target: String,
        tls_enabled: bool,
        certificate_name: Option<String>,
        certificate_password: Option<String>,
    },
    Send {
        payload: String,
    },
    Disconnect,
}

impl From<AdapterRequest> for HostRequest {
    fn from(request: AdapterRequest) -> Self {
        match request {
            AdapterRequest::Connect { target, security } => HostRequest::Connect {
                target,
                tls_enabled: security.tls_enabled,
                certificate_name: security.certificate_name,
                certificate_password: security.certificate_password,
            },
            AdapterRequest::Send { payload } => HostRequest::Send { payload },
            AdapterRequest::Disconnect => HostRequest::Disconnect,
        }
    }
}

/// Decoded terminal reply handed to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosReply {
    pub raw: String,
    pub text: String,
    pub fields: Vec<String>,
    pub checksum_ok: Option<bool>,
}

impl From<TerminalResponse> for PosReply {
    fn from(response: TerminalResponse) -> Self {
        Self {
            raw: response.raw,
            text: response.text,
            fields: response.fields,
            checksum_ok: response.checksum_ok,
        }
    }
}

/// Operator actions exposed to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosAction {
    LoadKeys,
    LastSale,
    Totals,
    Close,
    Details,
    Sale { amount: String },
    Refund { operation_number: String },
}

pub struct MobileBridge {
    session: Mutex<PosSession>,
    state: watch::Receiver<ConnectionState>,
    cancel: Notify,
    events: EventSender,
    requests: StdMutex<UnboundedReceiver<AdapterRequest>>,
    notices: StdMutex<UnboundedReceiver<String>>,
    terminals: StdMutex<Vec<String>>,
}

impl MobileBridge {
    pub fn new(config: SessionConfig) -> Self {
        let (events, events_rx) = event_channel(config.event_buffer);
        let (transport, requests) = ChannelTransport::new();
        let (notifier, notices) = ChannelNotifier::new();
        let session = PosSession::new(
            Box::new(transport),
            events_rx,
            std::sync::Arc::new(notifier),
            config,
        );

        Self {
            state: session.watch_state(),
            session: Mutex::new(session),
            cancel: Notify::new(),
            events,
            requests: StdMutex::new(requests),
            notices: StdMutex::new(notices),
            terminals: StdMutex::new(Vec::new()),
        }
    }

    /// Replace the list of terminals the host discovered
    pub fn set_terminals(&self, terminals: Vec<String>) {
        if let Ok(mut known) = self.terminals.lock() {
            *known = terminals;
        }
    }

    fn known_terminals(&self) -> Vec<String> {
        self.terminals
            .lock()
            .map(|known| known.clone())
            .unwrap_or_default()
    }

    /// Never waits for a command in flight
    pub async fn is_connected(&self) -> bool {
        match self.session.try_lock() {
            Ok(mut session) => session.is_connected(),
            Err(_) => self.state.borrow().is_connected(),
        }
    }

    /// Connect to the first known terminal, or disconnect if connected
    ///
    /// Cancels a command waiting for its response.
    pub async fn toggle_connection(&self) -> Result<(), String> {
        let terminals = self.known_terminals();
        let mut session = self.lock_interrupting().await;
        session
            .toggle_connection(&terminals)
            .await
            .map_err(to_message)
    }

    /// Run an operator action and wait for the terminal's reply
    ///
    /// Holds the session for the whole exchange; concurrent actions queue
    /// behind it. Fails with `Cancelled` if a connection change interrupts it.
    pub async fn run(&self, action: PosAction) -> Result<PosReply, String> {
        // Registered before locking so an interrupt during the wait is not lost
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();

        let mut session = self.session.lock().await;
        let result = tokio::select! {
            biased;
            _ = &mut cancelled => {
                tracing::warn!("Command interrupted by a connection change");
                Err(CoreError::Cancelled)
            }
            result = dispatch(&mut session, action) => result,
        };
        result.map(PosReply::from).map_err(to_message)
    }

    /// Take the session, cancelling whatever command holds it
    async fn lock_interrupting(&self) -> MutexGuard<'_, PosSession> {
        match self.session.try_lock() {
            Ok(session) => session,
            Err(_) => {
                self.cancel.notify_waiters();
                self.session.lock().await
            }
        }
    }

    /// Next request the host should perform, if any
    pub fn next_host_request(&self) -> Option<HostRequest> {
        let mut requests = self.requests.lock().ok()?;
        requests.try_recv().ok().map(HostRequest::from)
    }

    /// Next operator notice to display, if any
    pub fn next_notice(&self) -> Option<String> {
        let mut notices = self.notices.lock().ok()?;
        notices.try_recv().ok()
    }

    /// Feed an SDK callback into the session
    ///
    /// Log entries are dropped when the event buffer is full; link and
    /// response events wait for room.
    pub async fn push_event(&self, event: TransportEvent) -> Result<(), String> {
        if let TransportEvent::Log { .. } = event {
            return match self.events.try_send(event) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(dropped)) => {
                    tracing::debug!(?dropped, "Event buffer full, dropping SDK log entry");
                    Ok(())
                }
                Err(TrySendError::Closed(_)) => Err(to_message(CoreError::ChannelClosed)),
            };
        }
        self.events
            .send(event)
            .await
            .map_err(|_| to_message(CoreError::ChannelClosed))
    }

    /// Stop the SDK session, pending or established
    pub async fn shutdown(&self) -> Result<(), String> {
        let mut session = self.lock_interrupting().await;
        if session.state() != ConnectionState::Disconnected {
            session.disconnect().await.map_err(to_message)?;
        }
        Ok(())
    }
}

async fn dispatch(
    session: &mut PosSession,
    action: PosAction,
) -> mpos_core::Result<TerminalResponse> {
    match action {
        PosAction::LoadKeys => session.load_keys().await,
        PosAction::LastSale => session.last_sale().await,
        PosAction::Totals => session.totals().await,
        PosAction::Close => session.close().await,
        PosAction::Details => session.details().await,
        PosAction::Sale { amount } => session.sale(&amount).await,
        PosAction::Refund { operation_number } => session.refund(&operation_number).await,
    }
}

/// Build the command body an action would send, without a session
pub fn preview_body(action: &PosAction, config: &SessionConfig) -> Result<String, String> {
    let command = match action {
        PosAction::LoadKeys => PosCommand::LoadKeys,
        PosAction::LastSale => PosCommand::LastSale,
        PosAction::Totals => PosCommand::Totals,
        PosAction::Close => PosCommand::Close,
        PosAction::Details => PosCommand::Details,
        PosAction::Sale { amount } => PosCommand::sale(amount).map_err(|e| e.to_string())?,
        PosAction::Refund { operation_number } => {
            PosCommand::refund(operation_number, config.refund_check).map_err(|e| e.to_string())?
        }
    };
    Ok(command.body())
}

/// Operator-facing text for an error
fn to_message(err: CoreError) -> String {
    err.notice().unwrap_or_else(|| err.to_string())
}

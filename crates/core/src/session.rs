//! Terminal session: connection gating and request/response pairing
//!
//! A [`PosSession`] owns one transport, the receiving end of its event
//! channel and the connection state machine. Commands take `&mut self`, so a
//! session never has more than one request in flight.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::{CoreError, Result, ValidationError};
use crate::notice::Notifier;
use crate::protocol::FrameCodec;
use crate::transport::{ConnectionState, EventReceiver, PosTransport};
use crate::types::{PosCommand, Severity, TerminalResponse, TransportEvent};

/// Responses kept while nothing is waiting; older ones are dropped first
pub const MAX_UNCLAIMED_RESPONSES: usize = 16;

pub struct PosSession {
    transport: Box<dyn PosTransport>,
    events: EventReceiver,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    notifier: Arc<dyn Notifier>,
    config: SessionConfig,
    /// Responses that arrived while no request was awaiting one
    unclaimed: VecDeque<String>,
}

impl PosSession {
    pub fn new(
        transport: Box<dyn PosTransport>,
        events: EventReceiver,
        notifier: Arc<dyn Notifier>,
        config: SessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            events,
            state: ConnectionState::Disconnected,
            state_tx,
            notifier,
            config,
            unclaimed: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current state after applying every event already queued
    pub fn state(&mut self) -> ConnectionState {
        self.refresh();
        self.state
    }

    pub fn is_connected(&mut self) -> bool {
        self.state().is_connected()
    }

    /// Receiver that follows every state change, readable without the session
    ///
    /// Only as fresh as the last event the session applied.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Start a session with the first available terminal
    ///
    /// Notifies and fails with `NoTerminalFound` when `targets` is empty.
    pub async fn connect_first(&mut self, targets: &[String]) -> Result<()> {
        match targets.first() {
            Some(target) => self.connect(target).await,
            None => {
                warn!("No terminal available to connect to");
                self.notifier.notify(crate::notice::NO_TERMINAL_FOUND);
                Err(CoreError::NoTerminalFound)
            }
        }
    }

    /// Start a session with `target`
    ///
    /// Returns once the adapter accepted the request; the session becomes
    /// connected when the adapter reports `Connected`. A pending attempt is
    /// stopped and started over.
    pub async fn connect(&mut self, target: &str) -> Result<()> {
        match self.state() {
            ConnectionState::Connected => return Err(CoreError::AlreadyConnected),
            ConnectionState::Connecting => {
                info!(terminal = target, "Restarting pending connection attempt");
                self.transport.disconnect().await?;
                self.set_state(ConnectionState::Disconnected);
                // Link events from the stopped attempt no longer apply
                self.drain_stale_events();
            }
            ConnectionState::Disconnected => {}
        }

        self.set_state(self.state.begin_connect());
        info!(
            terminal = target,
            tls = self.config.security.tls_enabled,
            "Connecting to terminal"
        );

        let outcome = self.transport.connect(target, &self.config.security).await;
        match outcome {
            Ok(result) if result.is_started() => Ok(()),
            Ok(result) => {
                self.set_state(self.state.connect_refused());
                warn!(terminal = target, ?result, "Terminal service did not start");
                self.notifier.notify(crate::notice::CONNECT_FAILED);
                Err(CoreError::ConnectFailed(result))
            }
            Err(err) => {
                self.set_state(self.state.connect_refused());
                error!(terminal = target, error = %err, "Connect request failed");
                self.notifier.notify(crate::notice::CONNECT_FAILED);
                Err(err)
            }
        }
    }

    /// Wait for a pending connect to settle
    pub async fn wait_until_connected(&mut self) -> Result<()> {
        loop {
            match self.state() {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected => {
                    self.notifier.notify(crate::notice::CONNECT_FAILED);
                    return Err(CoreError::NotConnected);
                }
                ConnectionState::Connecting => {
                    self.next_event().await.ok_or(CoreError::ChannelClosed)?;
                }
            }
        }
    }

    /// Connect when disconnected, disconnect otherwise
    pub async fn toggle_connection(&mut self, targets: &[String]) -> Result<()> {
        if self.is_connected() {
            self.disconnect().await
        } else {
            self.connect_first(targets).await
        }
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        let result = self.transport.disconnect().await;
        self.set_state(ConnectionState::Disconnected);
        info!("Disconnected from terminal");
        result
    }

    /// Stop the transport and release the event channel
    pub async fn shutdown(mut self) -> Result<()> {
        if self.state() != ConnectionState::Disconnected {
            self.disconnect().await?;
        }
        self.events.close();
        Ok(())
    }

    /// Receive and apply the next adapter event
    ///
    /// Returns `None` once every sender is gone.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        let event = self.events.recv().await?;
        self.apply(&event);
        Some(event)
    }

    /// Frame and send a command without waiting for the answer
    pub async fn submit(&mut self, command: &PosCommand) -> Result<()> {
        self.ensure_connected()?;

        let body = command.body();
        let payload = FrameCodec::encode(&body).map_err(|err| {
            error!(command = %body, error = %err, "Command cannot be framed");
            err
        })?;

        if !self.unclaimed.is_empty() {
            warn!(
                count = self.unclaimed.len(),
                "Discarding responses nobody waited for"
            );
            self.unclaimed.clear();
        }

        self.transport.send(&payload).await?;
        info!(opcode = %command.opcode(), "Command sent");
        Ok(())
    }

    /// Wait for the response to the last submitted command
    pub async fn await_response(&mut self) -> Result<TerminalResponse> {
        if let Some(raw) = self.unclaimed.pop_front() {
            return Ok(Self::decode_response(raw));
        }

        loop {
            let event = self.next_event().await.ok_or(CoreError::ChannelClosed)?;
            match event {
                TransportEvent::Response { raw } => return Ok(Self::decode_response(raw)),
                TransportEvent::Disconnected | TransportEvent::ConnectFailed { .. } => {
                    warn!("Link lost while waiting for a response");
                    self.notifier.notify(crate::notice::NOT_CONNECTED);
                    return Err(CoreError::NotConnected);
                }
                _ => {}
            }
        }
    }

    /// Send a command and wait for its response
    pub async fn execute(&mut self, command: &PosCommand) -> Result<TerminalResponse> {
        self.submit(command).await?;
        self.await_response().await
    }

    pub async fn load_keys(&mut self) -> Result<TerminalResponse> {
        self.execute(&PosCommand::LoadKeys).await
    }

    pub async fn last_sale(&mut self) -> Result<TerminalResponse> {
        self.execute(&PosCommand::LastSale).await
    }

    pub async fn totals(&mut self) -> Result<TerminalResponse> {
        self.execute(&PosCommand::Totals).await
    }

    pub async fn close(&mut self) -> Result<TerminalResponse> {
        self.execute(&PosCommand::Close).await
    }

    pub async fn details(&mut self) -> Result<TerminalResponse> {
        self.execute(&PosCommand::Details).await
    }

    /// Validate `amount` and run a sale
    pub async fn sale(&mut self, amount: &str) -> Result<TerminalResponse> {
        let command = self.validated(PosCommand::sale(amount))?;
        self.execute(&command).await
    }

    /// Validate `operation_number` and run a refund
    pub async fn refund(&mut self, operation_number: &str) -> Result<TerminalResponse> {
        let command =
            self.validated(PosCommand::refund(operation_number, self.config.refund_check))?;
        self.execute(&command).await
    }

    fn validated(
        &self,
        built: std::result::Result<PosCommand, ValidationError>,
    ) -> Result<PosCommand> {
        built.map_err(|err| {
            warn!(?err, "Rejected operator input");
            self.notifier.notify(&err.to_string());
            CoreError::from(err)
        })
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        warn!(state = ?self.state, "Command issued without a terminal session");
        self.notifier.notify(crate::notice::NOT_CONNECTED);
        Err(CoreError::NotConnected)
    }

    /// Apply queued events without waiting
    fn refresh(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply(&event);
            if let TransportEvent::Response { raw } = event {
                self.queue_unclaimed(raw);
            }
        }
    }

    fn queue_unclaimed(&mut self, raw: String) {
        if self.unclaimed.len() == MAX_UNCLAIMED_RESPONSES {
            if let Some(dropped) = self.unclaimed.pop_front() {
                debug!(raw = %dropped, "Unclaimed response queue full, dropping oldest");
            }
        }
        self.unclaimed.push_back(raw);
    }

    /// Discard queued link events; logs and responses are still handled
    fn drain_stale_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                TransportEvent::Connected
                | TransportEvent::Disconnected
                | TransportEvent::ConnectFailed { .. } => {
                    debug!(?event, "Ignoring link event from stopped attempt")
                }
                other => {
                    self.apply(&other);
                    if let TransportEvent::Response { raw } = other {
                        self.queue_unclaimed(raw);
                    }
                }
            }
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        self.state = next;
        self.state_tx.send_replace(next);
    }

    fn apply(&mut self, event: &TransportEvent) {
        let next = self.state.on_event(event);
        if next != self.state {
            info!(from = ?self.state, to = ?next, "Connection state changed");
            self.set_state(next);
        }

        match event {
            TransportEvent::Log { severity, message } => log_sdk_entry(*severity, message),
            TransportEvent::ConnectFailed { reason } => {
                warn!(reason = %reason, "Terminal connection failed")
            }
            TransportEvent::Response { raw } => debug!(raw = %raw, "Raw response"),
            _ => {}
        }
    }

    fn decode_response(raw: String) -> TerminalResponse {
        let response = TerminalResponse::from_raw(raw);
        info!(raw = %response.raw, text = %response.text, "Terminal response");
        response
    }
}

fn log_sdk_entry(severity: Severity, message: &str) {
    let sdk_level = severity.as_str();
    match severity {
        Severity::Trace => trace!(sdk_level, "{}", message),
        Severity::Debug => debug!(sdk_level, "{}", message),
        Severity::Info | Severity::Unknown => info!(sdk_level, "{}", message),
        Severity::Warn => warn!(sdk_level, "{}", message),
        Severity::Error | Severity::Fatal => error!(sdk_level, "{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::{self, ChannelNotifier};
    use crate::protocol::Frame;
    use crate::transport::{event_channel, ConnectionResult, EventSender, MockTransport};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        session: PosSession,
        sent: Arc<std::sync::Mutex<Vec<String>>>,
        notices: UnboundedReceiver<String>,
        events: EventSender,
    }

    fn harness(configure: impl FnOnce(MockTransport) -> MockTransport) -> Harness {
        harness_with_config(configure, SessionConfig::default())
    }

    fn harness_with_config(
        configure: impl FnOnce(MockTransport) -> MockTransport,
        config: SessionConfig,
    ) -> Harness {
        let (tx, rx) = event_channel(16);
        let transport = configure(MockTransport::new(tx.clone()));
        let sent = transport.sent_log();
        let (notifier, notices) = ChannelNotifier::new();
        let session = PosSession::new(Box::new(transport), rx, Arc::new(notifier), config);
        Harness {
            session,
            sent,
            notices,
            events: tx,
        }
    }

    fn ok_response(body: &str) -> String {
        Frame::new(body).unwrap().to_hex()
    }

    #[tokio::test]
    async fn test_command_without_connection() {
        let mut h = harness(|t| t);

        let result = h.session.totals().await;
        assert!(matches!(result, Err(CoreError::NotConnected)));
        assert!(h.sent.lock().unwrap().is_empty());
        assert_eq!(h.notices.try_recv().unwrap(), notice::NOT_CONNECTED);
    }

    #[tokio::test]
    async fn test_connect_and_execute() {
        let mut h = harness(|t| t.with_response(ok_response("0710|00|Totales")));

        h.session.connect("terminal-0").await.unwrap();
        assert!(h.session.is_connected());

        let response = h.session.totals().await.unwrap();
        assert_eq!(response.opcode(), Some("0710"));
        assert_eq!(response.checksum_ok, Some(true));
        assert_eq!(
            *h.sent.lock().unwrap(),
            vec![FrameCodec::encode("0700||").unwrap()]
        );
    }

    #[tokio::test]
    async fn test_sale_validation_sends_nothing() {
        let mut h = harness(|t| t);
        h.session.connect("terminal-0").await.unwrap();

        let result = h.session.sale("49").await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
        assert!(h.sent.lock().unwrap().is_empty());
        assert_eq!(h.notices.try_recv().unwrap(), notice::AMOUNT_TOO_LOW);
    }

    #[tokio::test]
    async fn test_sale_sends_framed_body() {
        let mut h = harness(|t| t.with_response(ok_response("0210|00")));
        h.session.connect("terminal-0").await.unwrap();

        h.session.sale("50").await.unwrap();
        let sent = h.sent.lock().unwrap();
        assert_eq!(sent[0], FrameCodec::encode("0200|50|123456|||0").unwrap());
    }

    #[tokio::test]
    async fn test_refund_literal_blocks_positive() {
        let mut h = harness(|t| t);
        h.session.connect("terminal-0").await.unwrap();

        assert!(h.session.refund("15").await.is_err());
        assert!(h.sent.lock().unwrap().is_empty());
        assert_eq!(
            h.notices.try_recv().unwrap(),
            notice::OPERATION_NUMBER_NOT_POSITIVE
        );
    }

    #[tokio::test]
    async fn test_refund_corrected_mode() {
        let config = SessionConfig::default().with_refund_check(crate::RefundCheck::Corrected);
        let mut h = harness_with_config(|t| t.with_response(ok_response("1210|00")), config);
        h.session.connect("terminal-0").await.unwrap();

        h.session.refund("15").await.unwrap();
        assert_eq!(
            h.sent.lock().unwrap()[0],
            FrameCodec::encode("1200|15|").unwrap()
        );
    }

    #[tokio::test]
    async fn test_failed_start_notifies() {
        let mut h = harness(|t| t.with_connect_result(ConnectionResult::FailedNoConnection));

        let result = h.session.connect("terminal-0").await;
        assert!(matches!(
            result,
            Err(CoreError::ConnectFailed(ConnectionResult::FailedNoConnection))
        ));
        assert_eq!(h.session.state(), ConnectionState::Disconnected);
        assert_eq!(h.notices.try_recv().unwrap(), notice::CONNECT_FAILED);
    }

    #[tokio::test]
    async fn test_no_terminal_found() {
        let mut h = harness(|t| t);
        let result = h.session.connect_first(&[]).await;
        assert!(matches!(result, Err(CoreError::NoTerminalFound)));
        assert_eq!(h.notices.try_recv().unwrap(), notice::NO_TERMINAL_FOUND);
    }

    #[tokio::test]
    async fn test_pending_connect_settles_on_event() {
        let mut h = harness(|t| t.without_auto_connect());
        h.session.connect("terminal-0").await.unwrap();
        assert_eq!(h.session.state(), ConnectionState::Connecting);

        h.events.send(TransportEvent::Connected).await.unwrap();
        h.session.wait_until_connected().await.unwrap();
        assert!(h.session.is_connected());
    }

    #[tokio::test]
    async fn test_pending_connect_fails_on_event() {
        let mut h = harness(|t| t.without_auto_connect());
        h.session.connect("terminal-0").await.unwrap();

        h.events
            .send(TransportEvent::connect_failed("no hotspot"))
            .await
            .unwrap();
        assert!(matches!(
            h.session.wait_until_connected().await,
            Err(CoreError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_while_waiting() {
        let mut h = harness(|t| t);
        h.session.connect("terminal-0").await.unwrap();
        h.session.submit(&PosCommand::Close).await.unwrap();

        h.events.send(TransportEvent::Disconnected).await.unwrap();
        assert!(matches!(
            h.session.await_response().await,
            Err(CoreError::NotConnected)
        ));
        assert!(!h.session.is_connected());
    }

    #[tokio::test]
    async fn test_toggle_connection() {
        let mut h = harness(|t| t);
        let targets = vec!["terminal-0".to_string()];

        h.session.toggle_connection(&targets).await.unwrap();
        assert!(h.session.is_connected());

        h.session.toggle_connection(&targets).await.unwrap();
        assert!(!h.session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_twice_rejected() {
        let mut h = harness(|t| t);
        h.session.connect("terminal-0").await.unwrap();
        assert!(matches!(
            h.session.connect("terminal-0").await,
            Err(CoreError::AlreadyConnected)
        ));
    }

    #[tokio::test]
    async fn test_stale_response_discarded_on_submit() {
        let mut h = harness(|t| t.with_response(ok_response("0510|00")));
        h.session.connect("terminal-0").await.unwrap();

        h.events
            .send(TransportEvent::response(ok_response("9999|late")))
            .await
            .unwrap();
        // Picks up the late response into the unclaimed queue
        assert!(h.session.is_connected());

        let response = h.session.close().await.unwrap();
        assert_eq!(response.opcode(), Some("0510"));
    }

    #[tokio::test]
    async fn test_log_events_do_not_disturb_response() {
        let mut h = harness(|t| t);
        h.session.connect("terminal-0").await.unwrap();
        h.session.submit(&PosCommand::Details).await.unwrap();

        h.events.send(TransportEvent::log(1, "printing")).await.unwrap();
        h.events
            .send(TransportEvent::response("48656C6C6F"))
            .await
            .unwrap();

        let response = h.session.await_response().await.unwrap();
        assert_eq!(response.text, "Hello");
    }

    #[tokio::test]
    async fn test_connect_while_pending_restarts() {
        let mut h = harness(|t| t.without_auto_connect());
        let targets = vec!["terminal-0".to_string()];

        h.session.toggle_connection(&targets).await.unwrap();
        assert_eq!(h.session.state(), ConnectionState::Connecting);

        // No callback from the SDK: pressing toggle again starts over
        h.session.toggle_connection(&targets).await.unwrap();
        assert_eq!(h.session.state(), ConnectionState::Connecting);
        assert!(h.notices.try_recv().is_err());

        h.events.send(TransportEvent::Connected).await.unwrap();
        h.session.wait_until_connected().await.unwrap();
        assert!(h.session.is_connected());
    }

    #[tokio::test]
    async fn test_watch_state_follows_transitions() {
        let mut h = harness(|t| t.without_auto_connect());
        let state = h.session.watch_state();
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);

        h.session.connect("terminal-0").await.unwrap();
        assert_eq!(*state.borrow(), ConnectionState::Connecting);

        h.events.send(TransportEvent::Connected).await.unwrap();
        h.session.wait_until_connected().await.unwrap();
        assert_eq!(*state.borrow(), ConnectionState::Connected);

        h.session.disconnect().await.unwrap();
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_unclaimed_responses_are_bounded() {
        let mut h = harness(|t| t);
        h.session.connect("terminal-0").await.unwrap();

        let total = MAX_UNCLAIMED_RESPONSES + 4;
        for i in 0..total {
            h.events
                .send(TransportEvent::response(format!("{i:02X}")))
                .await
                .unwrap();
            assert!(h.session.is_connected());
        }

        assert_eq!(h.session.unclaimed.len(), MAX_UNCLAIMED_RESPONSES);
        assert_eq!(
            h.session.unclaimed.back().map(String::as_str),
            Some(format!("{:02X}", total - 1).as_str())
        );
        assert_eq!(
            h.session.unclaimed.front().map(String::as_str),
            Some(format!("{:02X}", total - MAX_UNCLAIMED_RESPONSES).as_str())
        );
    }

    #[tokio::test]
    async fn test_shutdown_disconnects() {
        let h = harness(|t| t);
        let mut session = h.session;
        session.connect("terminal-0").await.unwrap();
        session.shutdown().await.unwrap();
    }
}

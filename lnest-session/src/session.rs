use std::sync::Mutex;

use lnest::bitcoin::Transaction;
use lnest::channel::ChannelRecord;
use lnest::handshake::{Handshake, PeerTransport, Role, Stage};
use lnest::msgs::EstablishMessage;
use lnest::util::status::Status;
use lnest::SendSync;
use log::*;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time;
use triggered::Listener;

/// A [PeerTransport] over an unbounded tokio channel.
///
/// Closing drops the sender, so the peer's receiver sees the end of the stream.
pub struct ChannelTransport {
    sender: Mutex<Option<UnboundedSender<EstablishMessage>>>,
}

impl SendSync for ChannelTransport {}

impl ChannelTransport {
    /// Wrap a sender
    pub fn new(sender: UnboundedSender<EstablishMessage>) -> Self {
        ChannelTransport { sender: Mutex::new(Some(sender)) }
    }

    /// Whether [PeerTransport::close] was called
    pub fn is_closed(&self) -> bool {
        self.sender.lock().map(|s| s.is_none()).unwrap_or(true)
    }
}

impl PeerTransport for ChannelTransport {
    fn send_message(&self, msg: EstablishMessage) -> Result<(), Status> {
        let guard = self.sender.lock().map_err(|_| Status::internal("transport lock poisoned"))?;
        let sender = guard.as_ref().ok_or_else(|| Status::unavailable("transport closed"))?;
        debug!("send {}", msg.name());
        sender.send(msg).map_err(|_| Status::unavailable("peer disconnected"))
    }

    fn close(&self, reason: &str) {
        if let Ok(mut guard) = self.sender.lock() {
            if guard.take().is_some() {
                info!("closing transport: {}", reason);
            }
        }
    }
}

/// A connected pair of transports and their receivers: messages sent on
/// the first transport arrive on the second receiver and vice versa.
pub fn channel_transport() -> (
    (ChannelTransport, UnboundedReceiver<EstablishMessage>),
    (ChannelTransport, UnboundedReceiver<EstablishMessage>),
) {
    let (a_tx, a_rx) = unbounded_channel();
    let (b_tx, b_rx) = unbounded_channel();
    ((ChannelTransport::new(a_tx), b_rx), (ChannelTransport::new(b_tx), a_rx))
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// The handshake completed.  The funding transaction is for the host to broadcast.
    Established {
        /// The established channel
        record: ChannelRecord,
        /// The local funding transaction
        funding_tx: Option<Transaction>,
    },
    /// The handshake failed
    Failed(Status),
    /// The peer went away before the handshake completed
    Disconnected,
    /// The session was shut down by its owner
    Shutdown,
}

/// Runs one handshake to completion over a message stream
pub struct Session {
    handshake: Handshake,
    inbound: UnboundedReceiver<EstablishMessage>,
    shutdown: Option<Listener>,
}

impl Session {
    /// Create a session.  An initiator handshake is activated when the session runs.
    pub fn new(handshake: Handshake, inbound: UnboundedReceiver<EstablishMessage>) -> Self {
        Session { handshake, inbound, shutdown: None }
    }

    /// End the session early when the trigger fires
    pub fn with_shutdown(mut self, shutdown: Listener) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run the handshake until it is established, fails, or the peer disconnects.
    ///
    /// Each wait is bounded by the handshake's current deadline.  Any error
    /// from the handshake, including a message it does not expect, ends the
    /// session as failed and closes the transport.
    pub async fn run(mut self) -> (Handshake, SessionOutcome) {
        let outcome = self.drive().await;
        match &outcome {
            SessionOutcome::Established { record, .. } =>
                info!("session established channel {}", record.channel_index),
            SessionOutcome::Failed(status) => {
                warn!("session failed: {}", status);
                self.handshake.close("handshake failed");
            }
            other => info!("session ended: {:?}", other),
        }
        (self.handshake, outcome)
    }

    async fn drive(&mut self) -> SessionOutcome {
        if self.handshake.role() == Role::Initiator && self.handshake.stage() == Stage::Idle {
            if let Err(e) = self.handshake.activate() {
                return SessionOutcome::Failed(e.into());
            }
        }
        loop {
            match self.handshake.stage() {
                Stage::Established | Stage::Open => {
                    let record = match self.handshake.record() {
                        Some(r) => r.clone(),
                        None => return SessionOutcome::Failed(Status::internal("no record")),
                    };
                    let funding_tx = self.handshake.funding_transaction().cloned();
                    return SessionOutcome::Established { record, funding_tx };
                }
                Stage::Failed => {
                    let status = match self.handshake.error() {
                        Some(e) => e.clone().into(),
                        None => Status::internal("failed without error"),
                    };
                    return SessionOutcome::Failed(status);
                }
                _ => {}
            }

            let remaining = self.handshake.time_remaining().unwrap_or_default();
            let shutdown = self.shutdown.clone();
            let received = tokio::select! {
                r = time::timeout(remaining, self.inbound.recv()) => r,
                _ = async move {
                    match shutdown {
                        Some(s) => s.await,
                        None => std::future::pending().await,
                    }
                } => return SessionOutcome::Shutdown,
            };

            match received {
                Ok(Some(msg)) => {
                    if let Err(e) = self.handshake.receive(msg) {
                        return SessionOutcome::Failed(e.into());
                    }
                }
                Ok(None) => return SessionOutcome::Disconnected,
                Err(_elapsed) => {
                    // the handshake's clock has the final word on expiry
                    if let Err(e) = self.handshake.check_deadline() {
                        return SessionOutcome::Failed(e.into());
                    }
                }
            }
        }
    }
}

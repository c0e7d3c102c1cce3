use core::fmt;
use core::mem;
use core::time::Duration;

use bitcoin::secp256k1::PublicKey;
use bitcoin::{Amount, Transaction, Txid};
use tracing::*;

use crate::channel::{ChannelAnnouncement, ChannelRecord};
use crate::error::{
    funding_format_error, insufficient_funds, protocol_violation, timeout_error,
    unexpected_message, EstablishError,
};
use crate::funding::{channel_share, FundingRequest};
use crate::msgs::{EstablishA, EstablishB, EstablishC, EstablishD, EstablishMessage};
use crate::node::Node;
use crate::prelude::*;
use crate::tx::script::make_funding_redeemscript;
use crate::tx::tx::{funding_output_matches, EscapeTxParams};
use crate::util::crypto_utils::signature_to_bitcoin_vec;
use crate::util::debug_utils::DebugEscapeTx;
use crate::util::status::{internal_error, Status};
use crate::Arc;

/// Sends decoded establishment messages to the peer
pub trait PeerTransport: SendSync {
    /// Send a message
    fn send_message(&self, msg: EstablishMessage) -> Result<(), Status>;

    /// Close the connection.  Called when the handshake deadline expires.
    fn close(&self, reason: &str);
}

/// Which side of the handshake the local party is on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Activates the handshake and sends A
    Initiator,
    /// Answers A
    Responder,
}

/// The stage of a handshake, without its data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Nothing has happened yet
    Idle,
    /// Local amounts and keys are ready, nothing sent
    Prepared,
    /// The initiator sent A and awaits B
    SentA,
    /// The responder sent B and awaits C
    SentB,
    /// The initiator sent C and awaits D
    SentC,
    /// Signatures exchanged and verified, funding not yet confirmed
    Established,
    /// Funding confirmed
    Open,
    /// Terminal failure
    Failed,
}

impl Stage {
    /// Open and Failed accept nothing further
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Open | Stage::Failed)
    }
}

/// The handshake state, carrying only data valid in that state
#[derive(Clone)]
pub enum HandshakeState {
    /// Nothing has happened yet
    Idle,
    /// Local amounts and keys are ready
    Prepared(ChannelRecord),
    /// The initiator awaits B
    SentA(ChannelRecord),
    /// The responder awaits C
    SentB(ChannelRecord),
    /// The initiator awaits D
    SentC(ChannelRecord),
    /// Handshake complete, pending funding confirmation
    Established(ChannelRecord),
    /// Funding confirmed
    Open(ChannelRecord),
    /// Terminal failure, the record was discarded
    Failed(EstablishError),
}

impl HandshakeState {
    /// The stage of this state
    pub fn stage(&self) -> Stage {
        match self {
            HandshakeState::Idle => Stage::Idle,
            HandshakeState::Prepared(_) => Stage::Prepared,
            HandshakeState::SentA(_) => Stage::SentA,
            HandshakeState::SentB(_) => Stage::SentB,
            HandshakeState::SentC(_) => Stage::SentC,
            HandshakeState::Established(_) => Stage::Established,
            HandshakeState::Open(_) => Stage::Open,
            HandshakeState::Failed(_) => Stage::Failed,
        }
    }

    /// The channel record, if this state carries one
    pub fn record(&self) -> Option<&ChannelRecord> {
        match self {
            HandshakeState::Idle | HandshakeState::Failed(_) => None,
            HandshakeState::Prepared(r)
            | HandshakeState::SentA(r)
            | HandshakeState::SentB(r)
            | HandshakeState::SentC(r)
            | HandshakeState::Established(r)
            | HandshakeState::Open(r) => Some(r),
        }
    }

    fn into_record(self) -> Option<ChannelRecord> {
        match self {
            HandshakeState::Idle | HandshakeState::Failed(_) => None,
            HandshakeState::Prepared(r)
            | HandshakeState::SentA(r)
            | HandshakeState::SentB(r)
            | HandshakeState::SentC(r)
            | HandshakeState::Established(r)
            | HandshakeState::Open(r) => Some(r),
        }
    }
}

impl fmt::Debug for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Failed(e) => write!(f, "Failed({})", e),
            s => write!(f, "{:?}", s.stage()),
        }
    }
}

/// The establishment handshake of one channel with one peer.
///
/// Driven by [Handshake::activate] on the initiator and by [Handshake::receive]
/// for every inbound message.  Once established, a chain watcher drives it to
/// [Stage::Open] with [Handshake::funding_depth].
///
/// Dropping the handshake before it is established has no effect outside of
/// it: the funding transaction is never broadcast and nothing was announced.
pub struct Handshake {
    node: Arc<Node>,
    transport: Arc<dyn PeerTransport>,
    role: Role,
    state: HandshakeState,
    deadline: Option<Duration>,
    funding_tx: Option<Transaction>,
}

impl Handshake {
    pub(crate) fn new(node: Arc<Node>, transport: Arc<dyn PeerTransport>, role: Role) -> Self {
        let mut handshake =
            Handshake { node, transport, role, state: HandshakeState::Idle, deadline: None, funding_tx: None };
        handshake.reset_deadline();
        handshake
    }

    /// Our role
    pub fn role(&self) -> Role {
        self.role
    }

    /// The current stage
    pub fn stage(&self) -> Stage {
        self.state.stage()
    }

    /// The current state
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// The channel record, absent while idle or after failure
    pub fn record(&self) -> Option<&ChannelRecord> {
        self.state.record()
    }

    /// The error which failed the handshake
    pub fn error(&self) -> Option<&EstablishError> {
        match &self.state {
            HandshakeState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// The local funding transaction, for the host to broadcast once established
    pub fn funding_transaction(&self) -> Option<&Transaction> {
        match self.stage() {
            Stage::Failed => None,
            _ => self.funding_tx.as_ref(),
        }
    }

    /// When the current stage expires, as a duration since the UNIX epoch
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Time left before the current stage expires
    pub fn time_remaining(&self) -> Option<Duration> {
        let now = self.node.services().clock.now();
        self.deadline.map(|d| d.saturating_sub(now))
    }

    fn reset_deadline(&mut self) {
        self.deadline = match self.stage() {
            Stage::Established | Stage::Open | Stage::Failed => None,
            _ => Some(self.node.services().clock.now() + self.node.config().handshake_timeout),
        };
    }

    /// Fail the handshake and close the transport if the current stage has expired
    pub fn check_deadline(&mut self) -> Result<(), EstablishError> {
        let deadline = match self.deadline {
            Some(d) => d,
            None => return Ok(()),
        };
        if self.node.services().clock.now() < deadline {
            return Ok(());
        }
        let stage = self.stage();
        warn!("handshake deadline expired in {:?}", stage);
        let err = timeout_error(format!("no progress in {:?}", stage));
        self.fail(err.clone());
        self.transport.close("handshake timeout");
        Err(err)
    }

    /// Close the peer connection.  The session owner does this after any failure.
    pub fn close(&self, reason: &str) {
        self.transport.close(reason);
    }

    fn fail(&mut self, err: EstablishError) {
        if err.is_fraud() {
            error!("counterparty signature rejected: {}", err);
        } else {
            warn!("handshake failed: {}", err);
        }
        self.state = HandshakeState::Failed(err);
        self.deadline = None;
        self.funding_tx = None;
    }

    // Take the record out of the current state and run a transition on it.
    // On success the returned state is installed, on error the handshake fails.
    fn transition<F>(&mut self, f: F) -> Result<(), EstablishError>
    where
        F: FnOnce(&mut Self, Option<ChannelRecord>) -> Result<HandshakeState, EstablishError>,
    {
        let from = self.stage();
        let record = mem::replace(&mut self.state, HandshakeState::Idle).into_record();
        match f(self, record) {
            Ok(next) => {
                debug!("{:?} -> {:?}", from, next.stage());
                if let Some(r) = next.record() {
                    trace_channel_record!(r);
                }
                self.state = next;
                self.reset_deadline();
                Ok(())
            }
            Err(e) => {
                self.fail(e.clone());
                Err(e)
            }
        }
    }

    /// Size the local amount, allocate a channel index and derive the
    /// channel keys.  Done implicitly by [Handshake::activate] and on
    /// receipt of A if not called first.
    #[instrument(skip(self), fields(role = ?self.role))]
    pub fn prepare(&mut self) -> Result<(), EstablishError> {
        if self.stage() != Stage::Idle {
            protocol_err!("prepare in {:?}", self.stage());
        }
        self.check_deadline()?;
        self.transition(|hs, _| hs.prepare_record().map(HandshakeState::Prepared))
    }

    fn prepare_record(&mut self) -> Result<ChannelRecord, EstablishError> {
        let services = self.node.services();
        let balance = services.funding.spendable_balance()?;
        let share = channel_share(balance, self.node.config().funding_percent);
        if share == 0 {
            return Err(insufficient_funds(format!("spendable balance {} sat", balance)));
        }
        let channel_index = services.persister.next_channel_index().map_err(Status::from)?;
        let secrets = self
            .node
            .channel_keys(channel_index)
            .map_err(|e| internal_error(format!("channel keys: {}", e)))?;
        let is_initiator = self.role == Role::Initiator;
        // the initiator proposes that both sides commit the same amount
        let client = if is_initiator { share } else { 0 };
        info!("prepared channel {} with {} sat", channel_index, share);
        Ok(ChannelRecord::new(secrets, channel_index, is_initiator, share, client))
    }

    /// Start the handshake by sending A
    #[instrument(skip(self))]
    pub fn activate(&mut self) -> Result<(), EstablishError> {
        if self.role != Role::Initiator {
            protocol_err!("responder cannot activate");
        }
        self.check_deadline()?;
        match self.stage() {
            Stage::Idle => self.prepare()?,
            Stage::Prepared => {}
            s => protocol_err!("activate in {:?}", s),
        }
        self.transition(|hs, record| {
            let record = record.ok_or_else(|| protocol_violation("no record"))?;
            let secp_ctx = hs.node.secp_ctx();
            let a = EstablishA {
                client_amount: record.amount_client,
                server_amount: record.amount_server,
                pub_key_escape: record.pubkey_server(secp_ctx),
                pub_key_fast_escape: record.pubkey_server_a(secp_ctx),
                secret_hash_fast_escape: record.anchor_secret_hash_server,
                revocation_hash: record.anchor_revocation_hash_server,
            };
            hs.transport.send_message(EstablishMessage::A(a))?;
            Ok(HandshakeState::SentA(record))
        })
    }

    /// Handle a message from the peer.
    ///
    /// A message the current stage does not expect is rejected with a
    /// protocol violation and leaves the handshake unchanged.  An unknown
    /// message type is rejected the same way.  Any failure while handling an
    /// expected message fails the handshake.
    #[instrument(skip(self, msg), fields(msg = msg.name(), stage = ?self.stage()))]
    pub fn receive(&mut self, msg: EstablishMessage) -> Result<(), EstablishError> {
        self.check_deadline()?;
        let stage = self.stage();
        match (msg, stage, self.role) {
            (EstablishMessage::Unknown(t), _, _) =>
                Err(unexpected_message(format!("message type {} in {:?}", t, stage))),
            (EstablishMessage::A(a), Stage::Idle | Stage::Prepared, Role::Responder) => {
                if stage == Stage::Idle {
                    self.prepare()?;
                }
                self.transition(|hs, record| hs.on_a(record, a))
            }
            (EstablishMessage::B(b), Stage::SentA, _) =>
                self.transition(|hs, record| hs.on_b(record, b)),
            (EstablishMessage::C(c), Stage::SentB, _) =>
                self.transition(|hs, record| hs.on_c(record, c)),
            (EstablishMessage::D(d), Stage::SentC, _) =>
                self.transition(|hs, record| hs.on_d(record, d)),
            (msg, stage, role) => protocol_err!("{} in {:?} as {:?}", msg.name(), stage, role),
        }
    }

    fn on_a(
        &mut self,
        record: Option<ChannelRecord>,
        a: EstablishA,
    ) -> Result<HandshakeState, EstablishError> {
        let mut record = record.ok_or_else(|| protocol_violation("no record"))?;
        // commit what was asked for, up to our own share
        let amount = a.client_amount.min(record.initial_amount_server);
        if amount == 0 {
            return Err(insufficient_funds(format!(
                "requested {} sat, share {} sat",
                a.client_amount, record.initial_amount_server
            )));
        }
        record.initial_amount_server = amount;
        record.amount_server = amount;
        record.initial_amount_client = a.server_amount;
        record.amount_client = a.server_amount;
        record.set_remote_material(
            a.pub_key_escape,
            a.pub_key_fast_escape,
            a.secret_hash_fast_escape,
            a.revocation_hash,
        );
        debug!(
            "{}: {}",
            short_function!(),
            vals_str!(record.amount_server, record.amount_client)
        );

        let anchor_hash = self.fund(&record, &a.pub_key_fast_escape)?;
        record.anchor_tx_hash_server = Some(anchor_hash);

        let secp_ctx = self.node.secp_ctx();
        let b = EstablishB {
            pub_key_escape: record.pubkey_server(secp_ctx),
            pub_key_fast_escape: record.pubkey_server_a(secp_ctx),
            secret_hash_fast_escape: record.anchor_secret_hash_server,
            revocation_hash: record.anchor_revocation_hash_server,
            server_amount: record.amount_server,
            anchor_hash,
        };
        self.transport.send_message(EstablishMessage::B(b))?;
        Ok(HandshakeState::SentB(record))
    }

    fn on_b(
        &mut self,
        record: Option<ChannelRecord>,
        b: EstablishB,
    ) -> Result<HandshakeState, EstablishError> {
        let mut record = record.ok_or_else(|| protocol_violation("no record"))?;
        if b.server_amount == 0 || b.server_amount > record.initial_amount_client {
            protocol_err!(
                "responder committed {} sat, requested {} sat",
                b.server_amount,
                record.initial_amount_client
            );
        }
        record.initial_amount_client = b.server_amount;
        record.amount_client = b.server_amount;
        record.set_remote_material(
            b.pub_key_escape,
            b.pub_key_fast_escape,
            b.secret_hash_fast_escape,
            b.revocation_hash,
        );
        record.anchor_tx_hash_client = Some(b.anchor_hash);

        let anchor_hash = self.fund(&record, &b.pub_key_fast_escape)?;
        record.anchor_tx_hash_server = Some(anchor_hash);

        let (signature_escape, signature_fast_escape) = self.sign_counterparty(&record)?;
        let c = EstablishC { anchor_hash, signature_escape, signature_fast_escape };
        self.transport.send_message(EstablishMessage::C(c))?;
        Ok(HandshakeState::SentC(record))
    }

    fn on_c(
        &mut self,
        record: Option<ChannelRecord>,
        c: EstablishC,
    ) -> Result<HandshakeState, EstablishError> {
        let mut record = record.ok_or_else(|| protocol_violation("no record"))?;
        record.anchor_tx_hash_client = Some(c.anchor_hash);
        self.verify_holder(&mut record, &c.signature_escape, &c.signature_fast_escape)
            .map_err(|e| e.prepend_msg("message C: ".to_string()))?;

        let (signature_escape, signature_fast_escape) = self.sign_counterparty(&record)?;
        let d = EstablishD { signature_escape, signature_fast_escape };
        self.transport.send_message(EstablishMessage::D(d))?;
        self.complete(record)
    }

    fn on_d(
        &mut self,
        record: Option<ChannelRecord>,
        d: EstablishD,
    ) -> Result<HandshakeState, EstablishError> {
        let mut record = record.ok_or_else(|| protocol_violation("no record"))?;
        self.verify_holder(&mut record, &d.signature_escape, &d.signature_fast_escape)
            .map_err(|e| e.prepend_msg("message D: ".to_string()))?;
        self.complete(record)
    }

    // Build the local funding transaction through the funding source
    fn fund(
        &mut self,
        record: &ChannelRecord,
        key_client_a: &PublicKey,
    ) -> Result<Txid, EstablishError> {
        let redeemscript =
            make_funding_redeemscript(&record.pubkey_server(self.node.secp_ctx()), key_client_a);
        let request = FundingRequest {
            script_pubkey: bitcoin::ScriptBuf::new_p2wsh(&redeemscript.wscript_hash()),
            value: Amount::from_sat(record.amount_server),
            network: self.node.config().network,
        };
        let tx = self.node.services().funding.build_funding_transaction(&request)?;
        if !funding_output_matches(&tx, &request.script_pubkey, request.value) {
            return Err(funding_format_error(format!(
                "funding transaction {} does not pay {} to output 0",
                tx.compute_txid(),
                request.value
            )));
        }
        let txid = tx.compute_txid();
        debug!("funding transaction {} for {}", txid, request.value);
        self.funding_tx = Some(tx);
        Ok(txid)
    }

    fn sign_counterparty(
        &self,
        record: &ChannelRecord,
    ) -> Result<(Vec<u8>, Vec<u8>), EstablishError> {
        let secp_ctx = self.node.secp_ctx();
        let params = record.counterparty_escape_params(secp_ctx)?;
        let escape_tx = params.build_escape_tx();
        let fast_escape_tx = params.build_fast_escape_tx();
        trace!("signing {:?} and {:?}", DebugEscapeTx(&escape_tx), DebugEscapeTx(&fast_escape_tx));
        let sign = |tx: &Transaction| {
            params
                .sign(secp_ctx, tx, &record.key_server_a)
                .map(signature_to_bitcoin_vec)
                .ok_or_else(|| internal_error("escape sighash"))
        };
        Ok((sign(&escape_tx)?, sign(&fast_escape_tx)?))
    }

    // Verify the counterparty's signatures over our escape transactions and
    // record them.  Nothing is recorded unless both verify.
    fn verify_holder(
        &self,
        record: &mut ChannelRecord,
        signature_escape: &[u8],
        signature_fast_escape: &[u8],
    ) -> Result<(), EstablishError> {
        let params: EscapeTxParams = record.holder_escape_params(self.node.secp_ctx())?;
        let escape_tx = params.build_escape_tx();
        let fast_escape_tx = params.build_fast_escape_tx();
        trace!("verifying {:?} and {:?}", DebugEscapeTx(&escape_tx), DebugEscapeTx(&fast_escape_tx));
        let escape_sig = match params.verify(self.node.secp_ctx(), &escape_tx, signature_escape) {
            Some(sig) => sig,
            None => signature_err!("escape signature {:?}", log_bytes!(signature_escape)),
        };
        let fast_escape_sig =
            match params.verify(self.node.secp_ctx(), &fast_escape_tx, signature_fast_escape) {
                Some(sig) => sig,
                None => signature_err!(
                    "fast-escape signature {:?}",
                    log_bytes!(signature_fast_escape)
                ),
            };
        record.escape_tx_sig = Some(escape_sig);
        record.fast_escape_tx_sig = Some(fast_escape_sig);
        Ok(())
    }

    // Announce and persist a channel whose signatures have been verified
    fn complete(&mut self, record: ChannelRecord) -> Result<HandshakeState, EstablishError> {
        let channel_id =
            record.channel_id().ok_or_else(|| protocol_violation("funding txids unknown"))?;
        let services = self.node.services();
        services.announcer.announce(&ChannelAnnouncement { channel_id: channel_id.clone() })?;
        services.persister.persist_channel(&record).map_err(Status::from)?;
        info!(
            "channel {} established, {} sat local, {} sat remote",
            channel_id, record.amount_server, record.amount_client
        );
        Ok(HandshakeState::Established(record))
    }

    /// Report the confirmation depth of both funding transactions.
    ///
    /// Opens the channel once both have reached the node's minimum depth,
    /// returning whether the channel is open.  If the record cannot be
    /// persisted the channel stays established and the call may be repeated.
    #[instrument(skip(self))]
    pub fn funding_depth(
        &mut self,
        server_depth: u32,
        client_depth: u32,
    ) -> Result<bool, EstablishError> {
        let minimum_depth = self.node.config().minimum_depth;
        let record = match &self.state {
            HandshakeState::Established(r) => r,
            HandshakeState::Open(_) => return Ok(true),
            s => protocol_err!("funding depth in {:?}", s.stage()),
        };
        if server_depth < minimum_depth || client_depth < minimum_depth {
            return Ok(false);
        }
        let mut record = record.clone();
        record.is_ready = true;
        self.node.services().persister.persist_channel(&record).map_err(Status::from)?;
        info!("channel {} open", record.channel_index);
        trace_channel_record!(&record);
        self.state = HandshakeState::Open(record);
        self.reset_deadline();
        Ok(true)
    }
}

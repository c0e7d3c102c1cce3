use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::collections::VecDeque;

use bitcoin::absolute::LockTime;
use bitcoin::hashes::sha256::Hash as Sha256Hash;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use lnest_common::hex_to_array;

use crate::announce::Announcer;
use crate::channel::ChannelAnnouncement;
use crate::error::EstablishError;
use crate::funding::{FundingRequest, FundingSource};
use crate::handshake::{Handshake, PeerTransport};
use crate::msgs::EstablishMessage;
use crate::node::{Node, NodeConfig, NodeServices};
use crate::persist::MemoryPersister;
use crate::prelude::*;
use crate::util::clock::ManualClock;
use crate::util::status::Status;
use crate::Arc;

pub const TEST_SEED: &[&str] = &[
    "6c6e6573742d3100000000000000000000000000000000000000000000000000",
    "6c6e6573742d3200000000000000000000000000000000000000000000000000",
    "6c6e6573742d3300000000000000000000000000000000000000000000000000",
];

/// Start of the test clock, 2023-11-14
pub const TEST_EPOCH: Duration = Duration::from_secs(1_700_000_000);

pub fn test_seed(ndx: usize) -> [u8; 32] {
    hex_to_array(TEST_SEED[ndx]).expect("test seed")
}

pub fn test_node_config() -> NodeConfig {
    NodeConfig::new(Network::Regtest)
}

/// A wallet with a fixed balance which pays exactly what is requested
pub struct MockFundingSource {
    balance: Mutex<u64>,
    pub requests: Mutex<Vec<FundingRequest>>,
    malformed: AtomicBool,
    unavailable: AtomicBool,
}

impl SendSync for MockFundingSource {}

impl MockFundingSource {
    pub fn new(balance: u64) -> Self {
        MockFundingSource {
            balance: Mutex::new(balance),
            requests: Mutex::new(Vec::new()),
            malformed: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_balance(&self, balance: u64) {
        *self.balance.lock().unwrap() = balance;
    }

    /// Pay one satoshi less than requested
    pub fn set_malformed(&self, malformed: bool) {
        self.malformed.store(malformed, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl FundingSource for MockFundingSource {
    fn spendable_balance(&self) -> Result<u64, Status> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Status::unavailable("wallet offline"));
        }
        Ok(*self.balance.lock().unwrap())
    }

    fn build_funding_transaction(&self, request: &FundingRequest) -> Result<Transaction, Status> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Status::unavailable("wallet offline"));
        }
        self.requests.lock().unwrap().push(request.clone());
        let balance = *self.balance.lock().unwrap();
        let value = if self.malformed.load(Ordering::SeqCst) {
            request.value - Amount::from_sat(1)
        } else {
            request.value
        };
        // a unique fake coin per funding script
        let coin = Txid::from_byte_array(
            Sha256Hash::hash(request.script_pubkey.as_bytes()).to_byte_array(),
        );
        let mut output = vec![TxOut { value, script_pubkey: request.script_pubkey.clone() }];
        let change = balance.saturating_sub(request.value.to_sat());
        if change > 0 {
            output.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: ScriptBuf::new_op_return([0u8; 4]),
            });
        }
        Ok(Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint { txid: coin, vout: 0 },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output,
        })
    }
}

/// Records announcements
#[derive(Default)]
pub struct MockAnnouncer {
    pub announcements: Mutex<Vec<ChannelAnnouncement>>,
}

impl SendSync for MockAnnouncer {}

impl MockAnnouncer {
    pub fn count(&self) -> usize {
        self.announcements.lock().unwrap().len()
    }
}

impl Announcer for MockAnnouncer {
    fn announce(&self, announcement: &ChannelAnnouncement) -> Result<(), Status> {
        self.announcements.lock().unwrap().push(announcement.clone());
        Ok(())
    }
}

/// Queues sent messages for delivery by the test
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<VecDeque<EstablishMessage>>,
    closed: Mutex<Option<String>>,
    fail_send: AtomicBool,
}

impl SendSync for RecordingTransport {}

impl RecordingTransport {
    pub fn pop(&self) -> Option<EstablishMessage> {
        self.sent.lock().unwrap().pop_front()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn closed_reason(&self) -> Option<String> {
        self.closed.lock().unwrap().clone()
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }
}

impl PeerTransport for RecordingTransport {
    fn send_message(&self, msg: EstablishMessage) -> Result<(), Status> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Status::unavailable("connection reset"));
        }
        self.sent.lock().unwrap().push_back(msg);
        Ok(())
    }

    fn close(&self, reason: &str) {
        *self.closed.lock().unwrap() = Some(reason.to_string());
    }
}

/// Concrete handles on the services given to a test node
#[derive(Clone)]
pub struct TestServices {
    pub funding: Arc<MockFundingSource>,
    pub announcer: Arc<MockAnnouncer>,
    pub persister: Arc<MemoryPersister>,
    pub clock: ManualClock,
}

pub fn make_services_with_clock(balance: u64, clock: ManualClock) -> (NodeServices, TestServices) {
    let test = TestServices {
        funding: Arc::new(MockFundingSource::new(balance)),
        announcer: Arc::new(MockAnnouncer::default()),
        persister: Arc::new(MemoryPersister::new()),
        clock,
    };
    let services = NodeServices {
        funding: test.funding.clone(),
        announcer: test.announcer.clone(),
        persister: test.persister.clone(),
        clock: Arc::new(test.clock.clone()),
    };
    (services, test)
}

pub fn make_services(balance: u64) -> (NodeServices, TestServices) {
    make_services_with_clock(balance, ManualClock::new(TEST_EPOCH))
}

pub struct TestNode {
    pub node: Arc<Node>,
    pub services: TestServices,
}

pub fn make_test_node(ndx: usize, balance: u64, clock: ManualClock) -> TestNode {
    let (services, test) = make_services_with_clock(balance, clock);
    let node = Node::new(test_node_config(), &test_seed(ndx), services).expect("node");
    TestNode { node: Arc::new(node), services: test }
}

/// An initiator and a responder wired through recording transports, on a shared clock
pub struct HandshakePair {
    pub initiator: Handshake,
    pub responder: Handshake,
    pub initiator_transport: Arc<RecordingTransport>,
    pub responder_transport: Arc<RecordingTransport>,
    pub initiator_node: TestNode,
    pub responder_node: TestNode,
    pub clock: ManualClock,
}

pub fn make_handshake_pair(initiator_balance: u64, responder_balance: u64) -> HandshakePair {
    let clock = ManualClock::new(TEST_EPOCH);
    let initiator_node = make_test_node(0, initiator_balance, clock.clone());
    let responder_node = make_test_node(1, responder_balance, clock.clone());
    let initiator_transport = Arc::new(RecordingTransport::default());
    let responder_transport = Arc::new(RecordingTransport::default());
    let initiator = initiator_node.node.initiator(initiator_transport.clone());
    let responder = responder_node.node.responder(responder_transport.clone());
    HandshakePair {
        initiator,
        responder,
        initiator_transport,
        responder_transport,
        initiator_node,
        responder_node,
        clock,
    }
}

impl HandshakePair {
    /// Deliver the next message sent by the initiator
    pub fn to_responder(&mut self) -> Result<(), EstablishError> {
        let msg = self.initiator_transport.pop().expect("initiator sent nothing");
        self.responder.receive(msg)
    }

    /// Deliver the next message sent by the responder
    pub fn to_initiator(&mut self) -> Result<(), EstablishError> {
        let msg = self.responder_transport.pop().expect("responder sent nothing");
        self.initiator.receive(msg)
    }

    /// Run all four messages
    pub fn establish(&mut self) -> Result<(), EstablishError> {
        self.initiator.activate()?;
        self.to_responder()?;
        self.to_initiator()?;
        self.to_responder()?;
        self.to_initiator()
    }
}

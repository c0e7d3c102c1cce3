use std::sync::Arc;
use std::time::Duration;

use lnest::bitcoin::hashes::Hash;
use lnest::bitcoin::{Network, Txid};
use lnest::handshake::{PeerTransport, Stage};
use lnest::msgs::{EstablishC, EstablishMessage};
use lnest::node::{Node, NodeConfig, NodeServices};
use lnest::persist::MemoryPersister;
use lnest::util::clock::StandardClock;
use lnest::util::status::Code;
use lnest::util::test_utils::{test_seed, MockAnnouncer, MockFundingSource, RecordingTransport};
use lnest_session::{channel_transport, Session, SessionOutcome};

fn make_node(ndx: usize, balance: u64, timeout: Duration) -> Arc<Node> {
    let services = NodeServices {
        funding: Arc::new(MockFundingSource::new(balance)),
        announcer: Arc::new(MockAnnouncer::default()),
        persister: Arc::new(MemoryPersister::new()),
        clock: Arc::new(StandardClock()),
    };
    let mut config = NodeConfig::new(Network::Regtest);
    config.handshake_timeout = timeout;
    Arc::new(Node::new(config, &test_seed(ndx), services).unwrap())
}

#[test_log::test(tokio::test)]
async fn session_pair_establishes() {
    let initiator_node = make_node(0, 1_000_000, Duration::from_secs(5));
    let responder_node = make_node(1, 500_000, Duration::from_secs(5));
    let ((i_transport, i_inbound), (r_transport, r_inbound)) = channel_transport();

    let initiator = Session::new(initiator_node.initiator(Arc::new(i_transport)), i_inbound);
    let responder = Session::new(responder_node.responder(Arc::new(r_transport)), r_inbound);
    let i_task = tokio::spawn(initiator.run());
    let r_task = tokio::spawn(responder.run());

    let (i_hs, i_outcome) = i_task.await.unwrap();
    let (r_hs, r_outcome) = r_task.await.unwrap();
    assert_eq!(i_hs.stage(), Stage::Established);
    assert_eq!(r_hs.stage(), Stage::Established);

    match (i_outcome, r_outcome) {
        (
            SessionOutcome::Established { record: i, funding_tx: Some(i_tx) },
            SessionOutcome::Established { record: r, funding_tx: Some(r_tx) },
        ) => {
            assert_eq!((i.amount_server, i.amount_client), (100_000, 50_000));
            assert_eq!((r.amount_server, r.amount_client), (50_000, 100_000));
            assert_eq!(i.anchor_tx_hash_server, Some(i_tx.compute_txid()));
            assert_eq!(r.anchor_tx_hash_server, Some(r_tx.compute_txid()));
            assert_eq!(i.channel_id(), r.channel_id());
        }
        other => panic!("unexpected outcomes {:?}", other),
    }
}

#[test_log::test(tokio::test)]
async fn silent_peer_times_out() {
    let responder_node = make_node(1, 500_000, Duration::from_millis(200));
    // the peer end stays open but never sends
    let ((_peer_transport, _peer_inbound), (r_transport, r_inbound)) = channel_transport();
    let r_transport = Arc::new(r_transport);
    let responder = Session::new(responder_node.responder(r_transport.clone()), r_inbound);

    let (hs, outcome) =
        tokio::time::timeout(Duration::from_secs(5), responder.run()).await.expect("session hung");
    match outcome {
        SessionOutcome::Failed(status) => assert_eq!(status.code(), Code::DeadlineExceeded),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(hs.stage(), Stage::Failed);
    assert!(r_transport.is_closed());
}

#[test_log::test(tokio::test)]
async fn vanished_peer_disconnects() {
    let responder_node = make_node(1, 500_000, Duration::from_secs(5));
    let ((peer_transport, _peer_inbound), (r_transport, r_inbound)) = channel_transport();
    drop(peer_transport);
    let responder = Session::new(responder_node.responder(Arc::new(r_transport)), r_inbound);
    let (hs, outcome) = responder.run().await;
    assert!(matches!(outcome, SessionOutcome::Disconnected));
    assert_eq!(hs.stage(), Stage::Idle);
}

#[test_log::test(tokio::test)]
async fn shutdown_ends_session() {
    let responder_node = make_node(1, 500_000, Duration::from_secs(5));
    let ((_peer_transport, _peer_inbound), (r_transport, r_inbound)) = channel_transport();
    let (trigger, listener) = triggered::trigger();
    let responder = Session::new(responder_node.responder(Arc::new(r_transport)), r_inbound)
        .with_shutdown(listener);
    let task = tokio::spawn(responder.run());
    trigger.trigger();
    let (_, outcome) = task.await.unwrap();
    assert!(matches!(outcome, SessionOutcome::Shutdown));
}

#[test_log::test(tokio::test)]
async fn initiator_without_funds_fails_at_once() {
    let initiator_node = make_node(0, 5, Duration::from_secs(5));
    let ((i_transport, i_inbound), (_peer_transport, mut peer_inbound)) = channel_transport();
    let initiator = Session::new(initiator_node.initiator(Arc::new(i_transport)), i_inbound);
    let (_, outcome) = initiator.run().await;
    match outcome {
        SessionOutcome::Failed(status) => assert_eq!(status.code(), Code::FailedPrecondition),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(peer_inbound.try_recv().is_err());
}

#[test_log::test(tokio::test)]
async fn out_of_order_message_fails_at_once() {
    let premature_c = EstablishMessage::C(EstablishC {
        anchor_hash: Txid::from_byte_array([1u8; 32]),
        signature_escape: vec![0x30, 0x01],
        signature_fast_escape: vec![0x30, 0x02],
    });
    for msg in [premature_c, EstablishMessage::Unknown(9999)] {
        let responder_node = make_node(1, 500_000, Duration::from_secs(30));
        let ((peer_transport, mut peer_inbound), (r_transport, r_inbound)) = channel_transport();
        let r_transport = Arc::new(r_transport);
        let responder = Session::new(responder_node.responder(r_transport.clone()), r_inbound);
        peer_transport.send_message(msg).unwrap();

        // well before the stage deadline
        let (hs, outcome) = tokio::time::timeout(Duration::from_secs(2), responder.run())
            .await
            .expect("session kept waiting");
        match outcome {
            SessionOutcome::Failed(status) => assert_eq!(status.code(), Code::InvalidArgument),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(hs.stage(), Stage::Idle);
        assert!(hs.record().is_none());
        assert!(r_transport.is_closed());
        assert!(peer_inbound.recv().await.is_none());
    }
}

#[test_log::test(tokio::test)]
async fn swapped_signatures_fail_and_close_session() {
    let initiator_node = make_node(0, 1_000_000, Duration::from_secs(30));
    let responder_node = make_node(1, 500_000, Duration::from_secs(30));
    let ((peer_transport, mut peer_inbound), (r_transport, r_inbound)) = channel_transport();
    let r_transport = Arc::new(r_transport);
    let responder = Session::new(responder_node.responder(r_transport.clone()), r_inbound);
    let task = tokio::spawn(responder.run());

    // the initiator is driven by hand so that its C can be altered
    let i_transport = Arc::new(RecordingTransport::default());
    let mut initiator = initiator_node.initiator(i_transport.clone());
    initiator.activate().unwrap();
    peer_transport.send_message(i_transport.pop().expect("A")).unwrap();
    let b = peer_inbound.recv().await.expect("B");
    initiator.receive(b).unwrap();
    let c = match i_transport.pop() {
        Some(EstablishMessage::C(c)) => c,
        other => panic!("expected C, got {:?}", other),
    };
    let swapped = EstablishC {
        anchor_hash: c.anchor_hash,
        signature_escape: c.signature_fast_escape,
        signature_fast_escape: c.signature_escape,
    };
    peer_transport.send_message(EstablishMessage::C(swapped)).unwrap();

    let (hs, outcome) =
        tokio::time::timeout(Duration::from_secs(5), task).await.expect("session hung").unwrap();
    match outcome {
        SessionOutcome::Failed(status) => assert_eq!(status.code(), Code::FailedPrecondition),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(hs.error().unwrap().is_fraud());
    assert!(r_transport.is_closed());
    // the peer sees the connection end instead of waiting for D
    assert!(peer_inbound.recv().await.is_none());
    assert!(responder_node.channels().unwrap().is_empty());
}

//! End-to-end scenarios driving the ICN engine without a real transport.

use std::sync::Arc;
use std::time::Duration;

use rust_udcn_common::config::NodeConfig;
use rust_udcn_common::metrics::UdcnMetrics;
use rust_udcn_common::ndn::{Content, Interest, Nack, NackReason, Packet};
use rust_udcn_common::types::FaceId;
use rust_udcn_common::ndn::Name;
use rust_udcn_core::aging::AgingTask;
use rust_udcn_core::fib::FibEntry;
use rust_udcn_core::session::repository::SessionRepository;
use rust_udcn_core::IcnEngine;
use tokio::sync::mpsc;

fn engine(node_name: &str) -> IcnEngine {
    let mut config = NodeConfig::default();
    config.node_name = node_name.to_string();
    IcnEngine::new(&config, Arc::new(UdcnMetrics::new()))
}

fn config_named(node_name: &str) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.node_name = node_name.to_string();
    config
}

/// S1 — single-node CS hit.
#[tokio::test]
async fn s1_single_node_cs_hit() {
    let engine = engine("n1");
    engine
        .cs()
        .write()
        .await
        .insert(Content::new(Name::from_string("/test/data/object"), "HelloWorld"));

    let out = engine
        .handle_interest(FaceId(1), Interest::new(Name::from_string("/test/data/object")), false)
        .await;

    assert_eq!(out.len(), 1);
    match &out[0] {
        (face, Packet::Content(c)) => {
            assert_eq!(*face, FaceId(1));
            assert_eq!(c.payload.as_ref(), b"HelloWorld");
        }
        _ => panic!("expected Content"),
    }
    assert!(engine.pit().lock().await.is_empty());
}

/// S2 — two-node forwarding.
#[tokio::test]
async fn s2_two_node_forwarding_empties_pit_after_answer() {
    let a = engine("A");
    let b = engine("B");

    let face_to_b = FaceId(50);
    a.fib()
        .write()
        .await
        .add(FibEntry::new(Name::from_string("/test/data"), vec![face_to_b]));
    b.cs()
        .write()
        .await
        .insert(Content::new(Name::from_string("/test/data/object"), "HelloWorld"));

    let requester = FaceId(1);
    let interest = Interest::new(Name::from_string("/test/data/object"));
    let out_a = a.handle_interest(requester, interest, false).await;
    assert_eq!(out_a.len(), 1);
    let (upstream, packet) = out_a.into_iter().next().unwrap();
    assert_eq!(upstream, face_to_b);
    let Packet::Interest(forwarded) = packet else {
        panic!("expected Interest forwarded to B");
    };

    let face_from_a = FaceId(60);
    let out_b = b.handle_interest(face_from_a, forwarded, false).await;
    assert_eq!(out_b.len(), 1);
    let Packet::Content(content) = out_b.into_iter().next().unwrap().1 else {
        panic!("expected Content from B's CS");
    };

    let out_a2 = a.handle_content(face_to_b, content).await;
    assert_eq!(out_a2.len(), 1);
    assert_eq!(out_a2[0].0, requester);
    assert!(a.pit().lock().await.is_empty());
}

/// S3 — no-route Nack.
#[tokio::test]
async fn s3_no_route_nack_on_empty_fib() {
    let engine = engine("n1");
    let out = engine
        .handle_interest(FaceId(7), Interest::new(Name::from_string("/nowhere")), false)
        .await;

    assert_eq!(out.len(), 1);
    match &out[0] {
        (face, Packet::Nack(nack)) => {
            assert_eq!(*face, FaceId(7));
            assert_eq!(nack.reason, NackReason::NoRoute);
        }
        _ => panic!("expected Nack"),
    }
    assert!(engine.pit().lock().await.is_empty());
}

/// Aggregation invariant: two back-to-back Interests for the same name from
/// distinct faces produce exactly one upstream forward and, on answer,
/// exactly two downstream Contents.
#[tokio::test]
async fn aggregation_produces_single_upstream_forward_and_two_answers() {
    let engine = engine("n1");
    engine
        .fib()
        .write()
        .await
        .add(FibEntry::new(Name::from_string("/test/data"), vec![FaceId(100)]));

    let interest = Interest::new(Name::from_string("/test/data/object"));
    let out1 = engine.handle_interest(FaceId(1), interest.clone(), false).await;
    assert_eq!(out1.len(), 1);

    let out2 = engine.handle_interest(FaceId(2), interest, false).await;
    assert!(out2.is_empty());

    let content = Content::new(Name::from_string("/test/data/object"), "HelloWorld");
    let out3 = engine.handle_content(FaceId(100), content).await;
    assert_eq!(out3.len(), 2);
    assert!(engine.pit().lock().await.is_empty());
}

/// S6 — Nack fallback exhausted: the first of two forwarded Nacks is
/// suppressed, the second propagates downstream once no further FIB entry
/// remains.
#[tokio::test]
async fn s6_nack_fallback_exhausted_propagates_downstream() {
    let engine = engine("n1");
    engine.fib().write().await.add(FibEntry::new(
        Name::from_string("/x"),
        vec![FaceId(1), FaceId(2)],
    ));

    let interest = Interest::new(Name::from_string("/x/y"));
    let out = engine.handle_interest(FaceId(9), interest.clone(), false).await;
    assert_eq!(out.len(), 2);

    let suppressed = engine
        .handle_nack(FaceId(1), Nack::new(NackReason::NoRoute, interest.clone()))
        .await;
    assert!(suppressed.is_empty());

    let propagated = engine
        .handle_nack(FaceId(2), Nack::new(NackReason::NoRoute, interest))
        .await;
    assert_eq!(propagated.len(), 1);
    assert_eq!(propagated[0].0, FaceId(9));
    assert!(matches!(propagated[0].1, Packet::Nack(_)));
    assert!(engine.pit().lock().await.is_empty());
}

/// Loop avoidance: a FIB lookup never returns an upstream equal to the
/// incoming face.
#[tokio::test]
async fn loop_avoidance_excludes_incoming_face() {
    let engine = engine("n1");
    let only_upstream = FaceId(5);
    engine
        .fib()
        .write()
        .await
        .add(FibEntry::new(Name::from_string("/x"), vec![only_upstream]));

    let out = engine
        .handle_interest(only_upstream, Interest::new(Name::from_string("/x/y")), false)
        .await;

    assert_eq!(out.len(), 1);
    assert!(matches!(out[0].1, Packet::Nack(_)));
}

/// S4 — session handshake survives past the PIT timeout and leaves a
/// session FIB entry in place.
#[tokio::test]
async fn s4_session_handshake_survives_pit_timeout() {
    let config = config_named("forwarder");
    let engine = IcnEngine::new(&config, Arc::new(UdcnMetrics::new()));
    let mut repo = SessionRepository::new(&config.session);

    let fetcher_face = FaceId(1);
    let repo_face = FaceId(2);
    engine.fib().write().await.add(FibEntry::new(
        Name::from_string("/u/s1"),
        vec![repo_face],
    ));

    // Step 1: fetcher's Interest reaches the repository through the FIB.
    let initiate = Interest::new(Name::from_string("/u/s1/session_connector"));
    let out1 = engine.handle_interest(fetcher_face, initiate.clone(), false).await;
    assert_eq!(out1.len(), 1);
    let (to_repo_face, Packet::Interest(forwarded)) = out1.into_iter().next().unwrap() else {
        panic!("expected Interest forwarded to repository");
    };
    assert_eq!(to_repo_face, repo_face);

    // Step 2: repository answers with a token; the forwarder relays it back
    // and mirrors its PIT state under the eventual `/sid/<token>` name.
    let reply = repo.handle_interest(repo_face, &forwarded).unwrap();
    let token = String::from_utf8(reply.payload.to_vec()).unwrap();
    let out2 = engine.handle_content(repo_face, reply).await;
    assert_eq!(out2.len(), 1);
    assert_eq!(out2[0].0, fetcher_face);

    let sid_name = Name::from_string(&format!("/sid/{token}"));
    assert!(engine.pit().lock().await.contains(&sid_name));

    // Step 3: the fetcher echoes the token back; the forwarder relays it
    // toward the repository and installs a static session FIB entry.
    let confirm = Content::new(sid_name.clone(), token.clone());
    let out3 = engine.handle_content(fetcher_face, confirm.clone()).await;
    assert_eq!(out3.len(), 1);
    assert_eq!(out3[0].0, repo_face);

    let ack = repo.handle_content(repo_face, &confirm).unwrap();
    assert!(ack.payload.is_empty());
    assert!(repo.is_running(&token));

    {
        let fib = engine.fib().read().await;
        let hit = fib.lookup(&sid_name, &[], &[]).unwrap();
        assert_eq!(hit.upstreams, vec![fetcher_face]);
        assert!(hit.is_session);
    }

    // The session PIT entry is exempt from ageing and survives arbitrarily
    // long idle periods, unlike an ordinary entry (§3.2, §4.4).
    {
        let mut pit = engine.pit().lock().await;
        let (retransmit, removed) = pit.ageing(Duration::from_millis(0), 0);
        assert!(retransmit.is_empty());
        assert!(removed.is_empty());
        assert!(pit.contains(&sid_name));
        let entry = pit.get(&sid_name).unwrap();
        assert!(entry.is_session);
    }
}

/// S5 — a PIT entry with a FIB route to an unresponsive upstream is
/// retransmitted, then times out after exhausting its retransmits, emitting
/// a `PitTimeout` Nack to the local originator only.
#[tokio::test]
async fn s5_aging_timeout_emits_pit_timeout_nack_to_local_originator() {
    let mut config = config_named("n1");
    config.pit.default_lifetime_ms = 0;
    config.pit.retransmits = 1;
    let engine = Arc::new(IcnEngine::new(&config, Arc::new(UdcnMetrics::new())));
    engine
        .fib()
        .write()
        .await
        .add(FibEntry::new(Name::from_string("/orphan"), vec![FaceId(5)]));

    let out = engine
        .handle_interest(FaceId::LOCAL_APP, Interest::new(Name::from_string("/orphan")), true)
        .await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, FaceId(5));

    let aging = AgingTask::new(Arc::clone(&engine), &config);
    let (tx, mut rx) = mpsc::unbounded_channel();

    // First tick: still within (zero) timeout grace but retransmits once.
    aging.tick(&tx).await.unwrap();
    // Second tick: retransmits exceeded, entry times out and is removed.
    aging.tick(&tx).await.unwrap();

    drop(tx);
    let mut emitted = Vec::new();
    while let Some(msg) = rx.recv().await {
        emitted.push(msg);
    }

    let nacks: Vec<_> = emitted
        .iter()
        .filter(|(face, packet)| *face == FaceId::LOCAL_APP && matches!(packet, Packet::Nack(_)))
        .collect();
    assert_eq!(nacks.len(), 1);
    if let (_, Packet::Nack(nack)) = nacks[0] {
        assert_eq!(nack.reason, NackReason::PitTimeout);
        assert_eq!(nack.name.to_string(), "/orphan");
    }
    assert!(engine.pit().lock().await.is_empty());
}

/// §4.3 step 6 subtlety: when fallback is exhausted and the PIT entry has
/// both a local and a network downstream, the local downstream is answered
/// immediately while the network downstream is kept pending instead of
/// being Nacked, and the entry is not destroyed.
#[tokio::test]
async fn nack_exhausted_answers_local_downstream_and_keeps_network_one_pending() {
    let engine = engine("n1");
    engine.fib().write().await.add(FibEntry::new(
        Name::from_string("/x"),
        vec![FaceId(1)],
    ));

    let interest = Interest::new(Name::from_string("/x/y"));
    let local_requester = FaceId::LOCAL_APP;
    let network_requester = FaceId(9);

    let out1 = engine.handle_interest(local_requester, interest.clone(), true).await;
    assert_eq!(out1.len(), 1);
    let out2 = engine.handle_interest(network_requester, interest.clone(), false).await;
    assert!(out2.is_empty());

    let propagated = engine
        .handle_nack(FaceId(1), Nack::new(NackReason::NoRoute, interest))
        .await;

    assert_eq!(propagated.len(), 1);
    assert_eq!(propagated[0].0, local_requester);
    assert!(matches!(propagated[0].1, Packet::Nack(_)));

    let pit = engine.pit().lock().await;
    let entry = pit.get(&Name::from_string("/x/y")).expect("entry persists for the network retry");
    assert_eq!(entry.downstream_count(), 1);
    assert!(entry.has_downstream(network_requester));
    assert!(!entry.has_downstream(local_requester));
}

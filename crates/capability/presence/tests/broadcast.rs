use api_contract::ServerMessage;
use domain::{ConnectionId, Role};
use signage_gateway::{ConnectionGateway, GatewayConfig, GatewayError, Outbound};
use signage_presence::{DisconnectCleanup, PresenceBroadcaster};
use signage_registry::{DeviceRegistry, DisconnectPolicy, PlaybackIntents};
use std::sync::Arc;

struct Fixture {
    gateway: Arc<ConnectionGateway>,
    registry: Arc<DeviceRegistry>,
    intents: Arc<PlaybackIntents>,
    broadcaster: Arc<PresenceBroadcaster>,
}

fn fixture(policy: DisconnectPolicy) -> Fixture {
    fixture_with_buffer(policy, GatewayConfig::default().outbound_buffer)
}

fn fixture_with_buffer(policy: DisconnectPolicy, outbound_buffer: usize) -> Fixture {
    let gateway = Arc::new(ConnectionGateway::new(GatewayConfig { outbound_buffer }));
    let registry = Arc::new(DeviceRegistry::new(policy));
    let intents = Arc::new(PlaybackIntents::new());
    let broadcaster = Arc::new(PresenceBroadcaster::new(registry.clone(), gateway.clone()));
    gateway.add_close_listener(Arc::new(DisconnectCleanup::new(
        registry.clone(),
        intents.clone(),
        broadcaster.clone(),
    )));
    Fixture {
        gateway,
        registry,
        intents,
        broadcaster,
    }
}

fn drain(receiver: &mut Outbound) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(message) = receiver.try_recv() {
        out.push(message);
    }
    out
}

fn snapshot_device_ids(message: &ServerMessage) -> Vec<String> {
    match message {
        ServerMessage::PresenceSnapshot { records } => {
            records.iter().map(|record| record.device_id.clone()).collect()
        }
        other => panic!("expected snapshot, got {}", other.kind()),
    }
}

fn register_device(fx: &Fixture, device_id: &str) -> (ConnectionId, Outbound) {
    let (conn, receiver) = fx.gateway.accept().expect("accept");
    fx.gateway
        .assign_role(&conn, Role::Device(device_id.to_string()))
        .expect("role");
    fx.registry
        .register(device_id, &conn, Vec::new())
        .expect("register");
    (conn, receiver)
}

#[tokio::test]
async fn subscribe_sends_ack_then_exactly_one_snapshot() {
    let fx = fixture(DisconnectPolicy::Delete);
    register_device(&fx, "pi_ab12");
    let (observer, mut receiver) = fx.gateway.accept().expect("accept");

    fx.broadcaster.subscribe(&observer).expect("subscribe");

    let messages = drain(&mut receiver);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].kind(), "subscribed");
    assert_eq!(snapshot_device_ids(&messages[1]), vec!["pi_ab12".to_string()]);
    assert_eq!(fx.gateway.role(&observer).expect("role"), Role::Observer);
}

#[tokio::test]
async fn device_connection_cannot_subscribe() {
    let fx = fixture(DisconnectPolicy::Delete);
    let (conn, mut receiver) = register_device(&fx, "pi_ab12");

    let err = fx.broadcaster.subscribe(&conn).expect_err("conflict");

    assert!(matches!(err, GatewayError::RoleConflict { .. }));
    assert!(drain(&mut receiver).is_empty());
    assert!(fx.gateway.observers().is_empty());
}

#[tokio::test]
async fn broadcast_reaches_every_observer_in_registration_order() {
    let fx = fixture(DisconnectPolicy::Delete);
    let (first, mut first_rx) = fx.gateway.accept().expect("accept");
    let (second, mut second_rx) = fx.gateway.accept().expect("accept");
    fx.broadcaster.subscribe(&first).expect("subscribe");
    fx.broadcaster.subscribe(&second).expect("subscribe");
    drain(&mut first_rx);
    drain(&mut second_rx);

    register_device(&fx, "lobby");
    register_device(&fx, "cafe");
    let delivered = fx.broadcaster.broadcast("test");

    assert_eq!(delivered, 2);
    for receiver in [&mut first_rx, &mut second_rx] {
        let messages = drain(receiver);
        assert_eq!(messages.len(), 1);
        assert_eq!(
            snapshot_device_ids(&messages[0]),
            vec!["lobby".to_string(), "cafe".to_string()]
        );
    }
}

#[tokio::test]
async fn presence_request_answers_only_the_requester() {
    let fx = fixture(DisconnectPolicy::Delete);
    let (observer, mut observer_rx) = fx.gateway.accept().expect("accept");
    fx.broadcaster.subscribe(&observer).expect("subscribe");
    drain(&mut observer_rx);
    let (plain, mut plain_rx) = fx.gateway.accept().expect("accept");

    fx.broadcaster.send_snapshot_to(&plain).expect("snapshot");

    assert_eq!(drain(&mut plain_rx).len(), 1);
    assert!(drain(&mut observer_rx).is_empty());
    assert_eq!(fx.gateway.role(&plain).expect("role"), Role::Unassigned);
}

#[tokio::test]
async fn device_close_removes_record_clears_intent_and_broadcasts() {
    let fx = fixture(DisconnectPolicy::Delete);
    let (observer, mut observer_rx) = fx.gateway.accept().expect("accept");
    fx.broadcaster.subscribe(&observer).expect("subscribe");
    let (conn, _device_rx) = register_device(&fx, "pi_ab12");
    fx.intents.set(domain::PlaybackIntent {
        device_id: "pi_ab12".to_string(),
        asset_id: "v1".to_string(),
        kind: domain::CommandKind::Play,
        locator: None,
        issued_at_ms: 0,
    });
    drain(&mut observer_rx);

    fx.gateway.close(&conn).expect("close");

    assert!(fx.registry.get("pi_ab12").is_none());
    assert!(fx.intents.get("pi_ab12").is_none());
    let messages = drain(&mut observer_rx);
    assert_eq!(messages.len(), 1);
    assert!(snapshot_device_ids(&messages[0]).is_empty());
}

#[tokio::test]
async fn retained_device_stays_in_snapshot_as_disconnected() {
    let fx = fixture(DisconnectPolicy::RetainOffline);
    let (conn, _device_rx) = register_device(&fx, "pi_ab12");

    fx.gateway.close(&conn).expect("close");

    let view = fx.registry.get("pi_ab12").expect("retained");
    assert!(!view.is_connected());
}

#[tokio::test]
async fn superseded_connection_close_does_not_broadcast() {
    let fx = fixture(DisconnectPolicy::Delete);
    let (old_conn, _old_rx) = register_device(&fx, "pi_ab12");
    let (new_conn, _new_rx) = register_device(&fx, "pi_ab12");
    let (observer, mut observer_rx) = fx.gateway.accept().expect("accept");
    fx.broadcaster.subscribe(&observer).expect("subscribe");
    drain(&mut observer_rx);

    fx.gateway.close(&old_conn).expect("close");

    assert!(drain(&mut observer_rx).is_empty());
    assert_eq!(fx.registry.resolve("pi_ab12").expect("resolve"), new_conn);
}

#[tokio::test]
async fn observer_close_does_not_touch_registry() {
    let fx = fixture(DisconnectPolicy::Delete);
    register_device(&fx, "pi_ab12");
    let (observer, _observer_rx) = fx.gateway.accept().expect("accept");
    fx.broadcaster.subscribe(&observer).expect("subscribe");

    fx.gateway.close(&observer).expect("close");

    assert_eq!(fx.registry.len(), 1);
    assert!(fx.gateway.observers().is_empty());
}

#[tokio::test]
async fn full_observer_queue_still_receives_latest_snapshot() {
    let fx = fixture_with_buffer(DisconnectPolicy::Delete, 2);
    let (panel, mut panel_rx) = fx.gateway.accept().expect("accept");
    fx.broadcaster.subscribe(&panel).expect("subscribe");

    let _device = register_device(&fx, "pi_ab12");
    assert_eq!(fx.broadcaster.broadcast("device_registered"), 1);

    let messages = drain(&mut panel_rx);
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].kind(), "subscribed");
    assert!(snapshot_device_ids(&messages[1]).is_empty());
    let latest = messages.last().expect("latest snapshot");
    assert_eq!(snapshot_device_ids(latest), vec!["pi_ab12".to_string()]);
    assert_eq!(fx.registry.len(), 1);
}

#[tokio::test]
async fn parked_snapshot_is_replaced_by_newer_one() {
    let fx = fixture_with_buffer(DisconnectPolicy::Delete, 2);
    let (panel, mut panel_rx) = fx.gateway.accept().expect("accept");
    fx.broadcaster.subscribe(&panel).expect("subscribe");

    let _first = register_device(&fx, "pi_ab12");
    fx.broadcaster.broadcast("device_registered");
    let _second = register_device(&fx, "pi_cd34");
    fx.broadcaster.broadcast("device_registered");

    let messages = drain(&mut panel_rx);
    assert_eq!(messages.len(), 3);
    assert_eq!(
        snapshot_device_ids(&messages[2]),
        vec!["pi_ab12".to_string(), "pi_cd34".to_string()]
    );
}

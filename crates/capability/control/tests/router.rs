use api_contract::{CommandDto, ServerMessage};
use async_trait::async_trait;
use domain::{CommandKind, ConnectionId, PlaybackCommand, Role};
use signage_control::{
    CommandDispatcher, CommandRequest, CommandRouter, ControlError, GatewayDispatcher,
    NoopDispatcher,
};
use signage_gateway::{ConnectionGateway, GatewayConfig, Outbound};
use signage_presence::PresenceBroadcaster;
use signage_registry::{DeviceRegistry, PlaybackIntents};
use std::sync::Arc;

struct Fixture {
    gateway: Arc<ConnectionGateway>,
    registry: Arc<DeviceRegistry>,
    intents: Arc<PlaybackIntents>,
    broadcaster: Arc<PresenceBroadcaster>,
}

impl Fixture {
    fn new() -> Self {
        let gateway = Arc::new(ConnectionGateway::new(GatewayConfig::default()));
        let registry = Arc::new(DeviceRegistry::default());
        let intents = Arc::new(PlaybackIntents::new());
        let broadcaster = Arc::new(PresenceBroadcaster::new(registry.clone(), gateway.clone()));
        Self {
            gateway,
            registry,
            intents,
            broadcaster,
        }
    }

    fn router(&self, dispatcher: Arc<dyn CommandDispatcher>) -> CommandRouter {
        CommandRouter::new(
            self.registry.clone(),
            self.intents.clone(),
            self.broadcaster.clone(),
            dispatcher,
        )
    }

    fn gateway_router(&self) -> CommandRouter {
        self.router(Arc::new(GatewayDispatcher::new(self.gateway.clone())))
    }

    fn device(&self, device_id: &str, stored: &[&str]) -> (ConnectionId, Outbound) {
        let (conn, receiver) = self.gateway.accept().expect("accept");
        self.gateway
            .assign_role(&conn, Role::Device(device_id.to_string()))
            .expect("role");
        self.registry
            .register(
                device_id,
                &conn,
                stored.iter().map(|id| id.to_string()).collect(),
            )
            .expect("register");
        (conn, receiver)
    }
}

struct FailingDispatcher;

#[async_trait]
impl CommandDispatcher for FailingDispatcher {
    async fn dispatch(
        &self,
        _target: &ConnectionId,
        _command: &PlaybackCommand,
    ) -> Result<(), ControlError> {
        Err(ControlError::Dispatch("queue full".to_string()))
    }
}

fn request(device_id: &str, command: PlaybackCommand) -> CommandRequest {
    CommandRequest {
        issuer: ConnectionId::from("observer-1"),
        device_id: device_id.to_string(),
        command,
        locator: None,
    }
}

#[tokio::test]
async fn play_reaches_device_and_sets_intent() {
    let fx = Fixture::new();
    let (conn, mut receiver) = fx.device("pi_ab12", &["v1"]);
    let router = fx.gateway_router();

    let mut req = request(
        "pi_ab12",
        PlaybackCommand::Play {
            asset_id: "v1".to_string(),
        },
    );
    req.locator = Some("http://localhost:3000/api/assets/v1/file".to_string());
    let routed = router.route_command(req).await.expect("routed");

    assert_eq!(routed.connection_id, conn);
    assert_eq!(routed.kind, CommandKind::Play);
    let delivered = receiver.try_recv().expect("delivered");
    assert_eq!(
        delivered,
        ServerMessage::Command {
            command: CommandDto::Play {
                asset_id: "v1".to_string()
            }
        }
    );
    let intent = fx.intents.get("pi_ab12").expect("intent");
    assert_eq!(intent.asset_id, "v1");
    assert_eq!(intent.kind, CommandKind::Play);
    assert_eq!(
        intent.locator.as_deref(),
        Some("http://localhost:3000/api/assets/v1/file")
    );
}

#[tokio::test]
async fn stop_clears_intent() {
    let fx = Fixture::new();
    let (_conn, _receiver) = fx.device("pi_ab12", &["v1"]);
    let router = fx.gateway_router();
    router
        .route_command(request(
            "pi_ab12",
            PlaybackCommand::Play {
                asset_id: "v1".to_string(),
            },
        ))
        .await
        .expect("play");

    router
        .route_command(request("pi_ab12", PlaybackCommand::Stop))
        .await
        .expect("stop");

    assert!(fx.intents.get("pi_ab12").is_none());
}

#[tokio::test]
async fn play_then_stop_arrive_in_order() {
    let fx = Fixture::new();
    let (_conn, mut receiver) = fx.device("pi_ab12", &[]);
    let router = fx.gateway_router();

    router
        .route_command(request(
            "pi_ab12",
            PlaybackCommand::Play {
                asset_id: "v1".to_string(),
            },
        ))
        .await
        .expect("play");
    router
        .route_command(request("pi_ab12", PlaybackCommand::Stop))
        .await
        .expect("stop");

    let first = receiver.try_recv().expect("first");
    let second = receiver.try_recv().expect("second");
    assert!(matches!(
        first,
        ServerMessage::Command {
            command: CommandDto::Play { .. }
        }
    ));
    assert_eq!(
        second,
        ServerMessage::Command {
            command: CommandDto::Stop
        }
    );
}

#[tokio::test]
async fn unregistered_device_is_unreachable() {
    let fx = Fixture::new();
    let (_conn, mut receiver) = fx.device("pi_ab12", &[]);
    let router = fx.gateway_router();

    let err = router
        .route_command(request(
            "ghost",
            PlaybackCommand::Play {
                asset_id: "v1".to_string(),
            },
        ))
        .await
        .expect_err("unreachable");

    assert!(matches!(err, ControlError::TargetUnreachable(ref id) if id == "ghost"));
    assert!(receiver.try_recv().is_err());
    assert!(fx.intents.get("ghost").is_none());
}

#[tokio::test]
async fn failed_send_is_unreachable_and_leaves_intent_untouched() {
    let fx = Fixture::new();
    let (_conn, _receiver) = fx.device("pi_ab12", &[]);
    let router = fx.router(Arc::new(FailingDispatcher));

    let err = router
        .route_command(request(
            "pi_ab12",
            PlaybackCommand::Play {
                asset_id: "v1".to_string(),
            },
        ))
        .await
        .expect_err("unreachable");

    assert!(matches!(err, ControlError::TargetUnreachable(_)));
    assert!(fx.intents.get("pi_ab12").is_none());
}

#[tokio::test]
async fn closed_connection_degrades_to_unreachable() {
    let fx = Fixture::new();
    let (_conn, receiver) = fx.device("pi_ab12", &[]);
    drop(receiver);
    let router = fx.gateway_router();

    let err = router
        .route_command(request("pi_ab12", PlaybackCommand::Stop))
        .await
        .expect_err("unreachable");

    assert!(matches!(err, ControlError::TargetUnreachable(_)));
}

#[tokio::test]
async fn delete_asset_updates_stored_list_and_notifies_observers() {
    let fx = Fixture::new();
    let (_conn, _receiver) = fx.device("pi_ab12", &["v1", "v2"]);
    let (observer, mut observer_rx) = fx.gateway.accept().expect("accept");
    fx.broadcaster.subscribe(&observer).expect("subscribe");
    while observer_rx.try_recv().is_ok() {}
    let router = fx.router(Arc::new(NoopDispatcher));

    router
        .route_command(request(
            "pi_ab12",
            PlaybackCommand::DeleteAsset {
                asset_id: "v1".to_string(),
            },
        ))
        .await
        .expect("routed");

    let view = fx.registry.get("pi_ab12").expect("view");
    assert_eq!(view.stored_asset_ids, vec!["v2".to_string()]);
    match observer_rx.try_recv().expect("snapshot") {
        ServerMessage::PresenceSnapshot { records } => {
            assert_eq!(records[0].stored_asset_ids, vec!["v2".to_string()]);
        }
        other => panic!("unexpected {}", other.kind()),
    }
}

#[tokio::test]
async fn fetch_asset_carries_locator_to_device() {
    let fx = Fixture::new();
    let (_conn, mut receiver) = fx.device("pi_ab12", &[]);
    let router = fx.gateway_router();

    router
        .route_command(request(
            "pi_ab12",
            PlaybackCommand::FetchAsset {
                asset_id: "v9".to_string(),
                source_locator: "https://cdn.example/v9.mp4".to_string(),
            },
        ))
        .await
        .expect("routed");

    assert_eq!(
        receiver.try_recv().expect("delivered"),
        ServerMessage::Command {
            command: CommandDto::FetchAsset {
                asset_id: "v9".to_string(),
                source_locator: Some("https://cdn.example/v9.mp4".to_string()),
            }
        }
    );
    assert!(fx.intents.get("pi_ab12").is_none());
}

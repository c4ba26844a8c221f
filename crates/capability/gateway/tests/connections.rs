use api_contract::ServerMessage;
use domain::{ConnectionId, Role};
use signage_gateway::{
    CloseListener, ConnectionGateway, ConnectionInfo, GatewayConfig, GatewayError,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingListener {
    closed: Mutex<Vec<ConnectionInfo>>,
}

impl CloseListener for RecordingListener {
    fn on_close(&self, info: &ConnectionInfo) {
        self.closed.lock().expect("lock").push(info.clone());
    }
}

fn welcome(id: &ConnectionId) -> ServerMessage {
    ServerMessage::Welcome {
        connection_id: id.to_string(),
    }
}

#[test]
fn accept_allocates_distinct_ids() {
    let gateway = ConnectionGateway::new(GatewayConfig::default());
    let (first, _rx1) = gateway.accept().expect("accept");
    let (second, _rx2) = gateway.accept().expect("accept");
    assert_ne!(first, second);
    assert_eq!(gateway.len(), 2);
    assert_eq!(gateway.role(&first).expect("role"), Role::Unassigned);
}

#[test]
fn conflicting_role_is_rejected_without_mutation() {
    let gateway = ConnectionGateway::new(GatewayConfig::default());
    let (id, _rx) = gateway.accept().expect("accept");
    gateway
        .assign_role(&id, Role::Device("pi_ab12".to_string()))
        .expect("device");

    let err = gateway.assign_role(&id, Role::Observer).expect_err("conflict");
    assert!(matches!(err, GatewayError::RoleConflict { .. }));
    assert_eq!(gateway.role(&id).expect("role"), Role::Device("pi_ab12".to_string()));
    assert!(gateway.observers().is_empty());

    let err = gateway
        .assign_role(&id, Role::Device("pi_other".to_string()))
        .expect_err("identity conflict");
    assert!(matches!(err, GatewayError::RoleConflict { .. }));
}

#[test]
fn repeating_same_role_is_idempotent() {
    let gateway = ConnectionGateway::new(GatewayConfig::default());
    let (id, _rx) = gateway.accept().expect("accept");
    gateway.assign_role(&id, Role::Observer).expect("observer");
    gateway.assign_role(&id, Role::Observer).expect("again");
    assert_eq!(gateway.observers(), vec![id]);
}

#[tokio::test]
async fn send_preserves_per_connection_order() {
    let gateway = ConnectionGateway::new(GatewayConfig::default());
    let (id, mut rx) = gateway.accept().expect("accept");
    gateway.send(&id, welcome(&id)).expect("send");
    gateway
        .send(
            &id,
            ServerMessage::Subscribed {
                connection_id: id.to_string(),
            },
        )
        .expect("send");
    assert_eq!(rx.recv().await.expect("first").kind(), "welcome");
    assert_eq!(rx.recv().await.expect("second").kind(), "subscribed");
}

#[test]
fn close_notifies_listeners_exactly_once() {
    let gateway = ConnectionGateway::new(GatewayConfig::default());
    let listener = Arc::new(RecordingListener::default());
    gateway.add_close_listener(listener.clone());
    let (id, _rx) = gateway.accept().expect("accept");
    gateway.assign_role(&id, Role::Observer).expect("observer");

    let info = gateway.close(&id).expect("closed");
    assert_eq!(info.role, Role::Observer);
    assert!(gateway.close(&id).is_none());

    let closed = listener.closed.lock().expect("lock");
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, id);
    assert!(gateway.observers().is_empty());
}

#[test]
fn closed_connection_resolves_not_found() {
    let gateway = ConnectionGateway::new(GatewayConfig::default());
    let (id, _rx) = gateway.accept().expect("accept");
    gateway.close(&id);
    assert!(matches!(gateway.resolve(&id), Err(GatewayError::NotFound(_))));
    assert!(matches!(
        gateway.send(&id, welcome(&id)),
        Err(GatewayError::NotFound(_))
    ));
    assert!(gateway.is_empty());
}

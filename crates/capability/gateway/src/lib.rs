//! # 连接网关
//!
//! 为每个新建的长连接分配临时 ID，记录一次性声明的角色，
//! 提供尽力而为的本地发送，并在连接关闭时同步通知监听方。
//!
//! ```text
//! accept() ──► ConnectionId + Outbound（由传输层写回 socket）
//!                  │
//!   send(id, msg) ─┴─► mpsc::Sender::try_send（队列满或连接已关闭即丢弃）
//!   send_snapshot ─────► 入队；队列满时暂存到该连接的最新快照槽，队列排空后补发
//!
//! close(id) ──► 从表中移除（仅一次）──► CloseListener::on_close（同步）
//! ```
//!
//! 每个连接一个有界 FIFO 队列，保证同一连接内的投递顺序；
//! 跨连接不保证顺序。快照是全量状态，只保留最新一份，不会因队列满而丢失。

mod error;
mod outbound;

pub use error::GatewayError;
pub use outbound::Outbound;

use api_contract::ServerMessage;
use domain::{ConnectionId, Role, now_epoch_ms};
use outbound::SnapshotSlot;
use signage_telemetry::{
    record_connection_accepted, record_connection_closed, record_outbound_dropped,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 网关参数。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 每个连接的出站队列容量。
    pub outbound_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 64,
        }
    }
}

/// 连接元数据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub role: Role,
    pub created_at_ms: i64,
}

/// 已解析的存活连接句柄。
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub info: ConnectionInfo,
    sender: mpsc::Sender<ServerMessage>,
}

impl ConnectionHandle {
    /// 尽力而为的本地发送，不等待对端确认。
    pub fn try_send(&self, message: ServerMessage) -> Result<(), GatewayError> {
        push(&self.info.id, &self.sender, message)
    }
}

/// 连接关闭监听方。
///
/// `on_close` 在 `ConnectionGateway::close` 返回前同步调用，
/// 每个连接生命周期恰好一次。实现不得阻塞。
pub trait CloseListener: Send + Sync {
    fn on_close(&self, info: &ConnectionInfo);
}

struct ConnectionEntry {
    role: Role,
    created_at_ms: i64,
    sender: mpsc::Sender<ServerMessage>,
    snapshot: Arc<SnapshotSlot>,
}

#[derive(Default)]
struct Connections {
    entries: HashMap<ConnectionId, ConnectionEntry>,
    observers: HashSet<ConnectionId>,
}

/// 连接网关。
pub struct ConnectionGateway {
    connections: RwLock<Connections>,
    listeners: RwLock<Vec<Arc<dyn CloseListener>>>,
    config: GatewayConfig,
}

impl ConnectionGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            connections: RwLock::new(Connections::default()),
            listeners: RwLock::new(Vec::new()),
            config,
        }
    }

    /// 注册关闭监听方（按注册顺序调用）。
    pub fn add_close_listener(&self, listener: Arc<dyn CloseListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    /// 为新打开的通道分配连接 ID，返回其出站队列的接收端。
    pub fn accept(&self) -> Result<(ConnectionId, Outbound), GatewayError> {
        let id = ConnectionId::new(uuid::Uuid::new_v4().to_string());
        let (sender, receiver) = mpsc::channel(self.config.outbound_buffer.max(1));
        let snapshot = Arc::new(SnapshotSlot::default());
        let created_at_ms = now_epoch_ms();
        let mut connections = self
            .connections
            .write()
            .map_err(|_| GatewayError::LockPoisoned)?;
        connections.entries.insert(
            id.clone(),
            ConnectionEntry {
                role: Role::Unassigned,
                created_at_ms,
                sender,
                snapshot: snapshot.clone(),
            },
        );
        record_connection_accepted();
        info!(
            target: "signage.gateway",
            connection_id = %id,
            connections = connections.entries.len(),
            "connection_accepted"
        );
        Ok((id, Outbound::new(receiver, snapshot)))
    }

    /// 声明角色，只能声明一次。
    ///
    /// 重复声明相同角色（设备角色需 deviceId 也相同）视为幂等；
    /// 冲突时返回 `RoleConflict`，不修改任何状态。
    pub fn assign_role(&self, id: &ConnectionId, role: Role) -> Result<(), GatewayError> {
        let mut connections = self
            .connections
            .write()
            .map_err(|_| GatewayError::LockPoisoned)?;
        let entry = connections
            .entries
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
        match &entry.role {
            Role::Unassigned => {}
            current if *current == role => return Ok(()),
            current => {
                warn!(
                    target: "signage.gateway",
                    connection_id = %id,
                    current = current.label(),
                    requested = role.label(),
                    "role_conflict"
                );
                return Err(GatewayError::RoleConflict {
                    id: id.clone(),
                    current: current.label(),
                    requested: role.label(),
                });
            }
        }
        debug!(
            target: "signage.gateway",
            connection_id = %id,
            role = role.label(),
            "role_assigned"
        );
        let is_observer = role.is_observer();
        entry.role = role;
        if is_observer {
            connections.observers.insert(id.clone());
        }
        Ok(())
    }

    /// 查询连接当前角色。
    pub fn role(&self, id: &ConnectionId) -> Result<Role, GatewayError> {
        self.resolve(id).map(|handle| handle.info.role)
    }

    /// 解析存活连接。
    pub fn resolve(&self, id: &ConnectionId) -> Result<ConnectionHandle, GatewayError> {
        let connections = self
            .connections
            .read()
            .map_err(|_| GatewayError::LockPoisoned)?;
        let entry = connections
            .entries
            .get(id)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
        Ok(ConnectionHandle {
            info: ConnectionInfo {
                id: id.clone(),
                role: entry.role.clone(),
                created_at_ms: entry.created_at_ms,
            },
            sender: entry.sender.clone(),
        })
    }

    /// 尽力而为发送：仅反映本地入队是否成功，不代表对端已收到。
    pub fn send(&self, id: &ConnectionId, message: ServerMessage) -> Result<(), GatewayError> {
        let connections = self
            .connections
            .read()
            .map_err(|_| GatewayError::LockPoisoned)?;
        let entry = connections
            .entries
            .get(id)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
        push(id, &entry.sender, message)
    }

    /// 投递快照。
    ///
    /// 队列满时不丢弃，而是覆盖该连接的最新快照槽，待队列排空后由 `Outbound` 补发；
    /// 槽位非空期间的新快照同样只覆盖槽位，保证快照不会倒退。
    pub fn send_snapshot(
        &self,
        id: &ConnectionId,
        message: ServerMessage,
    ) -> Result<(), GatewayError> {
        let connections = self
            .connections
            .read()
            .map_err(|_| GatewayError::LockPoisoned)?;
        let entry = connections
            .entries
            .get(id)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
        if entry.sender.is_closed() {
            return Err(GatewayError::NotFound(id.clone()));
        }
        let mut latest = entry.snapshot.lock();
        if latest.is_some() {
            *latest = Some(message);
            return Ok(());
        }
        match entry.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(message)) => {
                *latest = Some(message);
                drop(latest);
                entry.snapshot.notify();
                debug!(
                    target: "signage.gateway",
                    connection_id = %id,
                    "snapshot_deferred"
                );
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(GatewayError::NotFound(id.clone())),
        }
    }

    /// 当前处于观察者角色的连接。
    pub fn observers(&self) -> Vec<ConnectionId> {
        self.connections
            .read()
            .map(|connections| connections.observers.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .map(|connections| connections.entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 关闭连接。
    ///
    /// 仅第一次调用生效并返回连接信息；监听方在返回前同步收到通知，
    /// 此后该连接 ID 的 `resolve`/`send` 一律为 `NotFound`。
    pub fn close(&self, id: &ConnectionId) -> Option<ConnectionInfo> {
        let removed = {
            let mut connections = self.connections.write().ok()?;
            let entry = connections.entries.remove(id)?;
            connections.observers.remove(id);
            entry
        };
        let info = ConnectionInfo {
            id: id.clone(),
            role: removed.role,
            created_at_ms: removed.created_at_ms,
        };
        record_connection_closed();
        info!(
            target: "signage.gateway",
            connection_id = %id,
            role = info.role.label(),
            device_id = ?info.role.device_id(),
            "connection_closed"
        );
        let listeners = self
            .listeners
            .read()
            .map(|listeners| listeners.clone())
            .unwrap_or_default();
        for listener in listeners {
            listener.on_close(&info);
        }
        Some(info)
    }
}

fn push(
    id: &ConnectionId,
    sender: &mpsc::Sender<ServerMessage>,
    message: ServerMessage,
) -> Result<(), GatewayError> {
    let kind = message.kind();
    match sender.try_send(message) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(_)) => {
            record_outbound_dropped();
            warn!(
                target: "signage.gateway",
                connection_id = %id,
                message = kind,
                "outbound_queue_full"
            );
            Err(GatewayError::QueueFull(id.clone()))
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!(
                target: "signage.gateway",
                connection_id = %id,
                message = kind,
                "outbound_channel_closed"
            );
            Err(GatewayError::NotFound(id.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DeviceStatus, DeviceView};

    fn snapshot(device_ids: &[&str]) -> ServerMessage {
        let views: Vec<DeviceView> = device_ids
            .iter()
            .map(|device_id| DeviceView {
                device_id: device_id.to_string(),
                connection_id: None,
                status: DeviceStatus::Online,
                current_asset_id: None,
                stored_asset_ids: Vec::new(),
                last_seen_ms: 0,
            })
            .collect();
        ServerMessage::snapshot(&views)
    }

    fn snapshot_len(message: &ServerMessage) -> usize {
        match message {
            ServerMessage::PresenceSnapshot { records } => records.len(),
            other => panic!("unexpected message {}", other.kind()),
        }
    }

    #[test]
    fn send_after_receiver_dropped_is_not_found() {
        let gateway = ConnectionGateway::new(GatewayConfig::default());
        let (id, receiver) = gateway.accept().expect("accept");
        drop(receiver);
        let err = gateway
            .send(&id, ServerMessage::Welcome {
                connection_id: id.to_string(),
            })
            .expect_err("closed");
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let gateway = ConnectionGateway::new(GatewayConfig { outbound_buffer: 1 });
        let (id, _receiver) = gateway.accept().expect("accept");
        let message = ServerMessage::Subscribed {
            connection_id: id.to_string(),
        };
        gateway.send(&id, message.clone()).expect("first");
        let err = gateway.send(&id, message).expect_err("full");
        assert!(matches!(err, GatewayError::QueueFull(_)));
    }

    #[test]
    fn full_queue_parks_latest_snapshot_until_drained() {
        let gateway = ConnectionGateway::new(GatewayConfig { outbound_buffer: 1 });
        let (id, mut outbound) = gateway.accept().expect("accept");
        gateway.send_snapshot(&id, snapshot(&[])).expect("queued");
        gateway.send_snapshot(&id, snapshot(&["a"])).expect("parked");
        gateway.send_snapshot(&id, snapshot(&["a", "b"])).expect("replaced");

        assert_eq!(snapshot_len(&outbound.try_recv().expect("queued")), 0);
        assert_eq!(snapshot_len(&outbound.try_recv().expect("latest")), 2);
        assert!(outbound.try_recv().is_err());
    }

    #[test]
    fn snapshot_to_closed_receiver_is_not_found() {
        let gateway = ConnectionGateway::new(GatewayConfig::default());
        let (id, outbound) = gateway.accept().expect("accept");
        drop(outbound);
        let err = gateway.send_snapshot(&id, snapshot(&[])).expect_err("closed");
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn recv_wakes_for_parked_snapshot() {
        let gateway = Arc::new(ConnectionGateway::new(GatewayConfig { outbound_buffer: 1 }));
        let (id, mut outbound) = gateway.accept().expect("accept");
        gateway.send_snapshot(&id, snapshot(&[])).expect("queued");
        gateway.send_snapshot(&id, snapshot(&["a"])).expect("parked");

        assert_eq!(snapshot_len(&outbound.recv().await.expect("queued")), 0);
        assert_eq!(snapshot_len(&outbound.recv().await.expect("parked")), 1);

        let sender = gateway.clone();
        let target = id.clone();
        let waiter = tokio::spawn(async move { outbound.recv().await });
        tokio::task::yield_now().await;
        sender.send_snapshot(&target, snapshot(&["a", "b"])).expect("queued");
        let message = waiter.await.expect("join").expect("message");
        assert_eq!(snapshot_len(&message), 2);
    }
}

//! # 在线快照广播
//!
//! 每次注册表变更后计算全量快照并投递给所有观察者。
//! 每条消息都是完整状态而非增量，因此跨观察者的重复或乱序无害；
//! 快照计算与投递在同一把锁内完成，保证单个观察者收到的快照不会倒退。
//! 观察者出站队列满时快照暂存在网关的最新快照槽中，不会丢失最后一次变更。

use api_contract::ServerMessage;
use domain::{ConnectionId, Role};
use signage_gateway::{CloseListener, ConnectionGateway, ConnectionInfo, GatewayError};
use signage_registry::{DeviceRegistry, DisconnectOutcome, PlaybackIntents};
use signage_telemetry::record_snapshot_broadcast;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// 快照广播器。
pub struct PresenceBroadcaster {
    registry: Arc<DeviceRegistry>,
    gateway: Arc<ConnectionGateway>,
    emit: Mutex<()>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<DeviceRegistry>, gateway: Arc<ConnectionGateway>) -> Self {
        Self {
            registry,
            gateway,
            emit: Mutex::new(()),
        }
    }

    /// 向所有观察者投递最新快照，返回本地发送成功的数量。
    pub fn broadcast(&self, reason: &'static str) -> usize {
        let _emit = self.emit.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let views = self.registry.snapshot();
        let message = ServerMessage::snapshot(&views);
        let observers = self.gateway.observers();
        let mut delivered = 0usize;
        for observer in &observers {
            match self.gateway.send_snapshot(observer, message.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => debug!(
                    target: "signage.presence",
                    connection_id = %observer,
                    error = %err,
                    "snapshot_delivery_skipped"
                ),
            }
        }
        record_snapshot_broadcast();
        debug!(
            target: "signage.presence",
            reason = reason,
            devices = views.len(),
            observers = observers.len(),
            delivered = delivered,
            "snapshot_broadcast"
        );
        delivered
    }

    /// 将连接声明为观察者，并只向它发送一次当前快照。
    ///
    /// 声明与首个快照在广播锁内完成：之后的广播一定来自之后的变更，
    /// 不会重放订阅前的中间状态。
    pub fn subscribe(&self, connection_id: &ConnectionId) -> Result<(), GatewayError> {
        let _emit = self.emit.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.gateway.assign_role(connection_id, Role::Observer)?;
        self.gateway.send(
            connection_id,
            ServerMessage::Subscribed {
                connection_id: connection_id.to_string(),
            },
        )?;
        let views = self.registry.snapshot();
        self.gateway
            .send_snapshot(connection_id, ServerMessage::snapshot(&views))?;
        info!(
            target: "signage.presence",
            connection_id = %connection_id,
            devices = views.len(),
            "observer_subscribed"
        );
        Ok(())
    }

    /// 仅向请求方发送当前快照。
    pub fn send_snapshot_to(&self, connection_id: &ConnectionId) -> Result<(), GatewayError> {
        let _emit = self.emit.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let views = self.registry.snapshot();
        self.gateway
            .send_snapshot(connection_id, ServerMessage::snapshot(&views))
    }
}

/// 连接关闭时的清理：注册表断开、清除播放意图、广播快照。
pub struct DisconnectCleanup {
    registry: Arc<DeviceRegistry>,
    intents: Arc<PlaybackIntents>,
    broadcaster: Arc<PresenceBroadcaster>,
}

impl DisconnectCleanup {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        intents: Arc<PlaybackIntents>,
        broadcaster: Arc<PresenceBroadcaster>,
    ) -> Self {
        Self {
            registry,
            intents,
            broadcaster,
        }
    }
}

impl CloseListener for DisconnectCleanup {
    fn on_close(&self, info: &ConnectionInfo) {
        if !matches!(info.role, Role::Device(_)) {
            return;
        }
        match self.registry.on_disconnect(&info.id) {
            Ok(DisconnectOutcome::Stale) => {}
            Ok(outcome) => {
                if let Some(device_id) = outcome.device_id() {
                    self.intents.clear(device_id);
                }
                self.broadcaster.broadcast("device_disconnected");
            }
            Err(err) => warn!(
                target: "signage.presence",
                connection_id = %info.id,
                error = %err,
                "disconnect_cleanup_failed"
            ),
        }
    }
}

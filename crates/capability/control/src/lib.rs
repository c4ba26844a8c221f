use api_contract::{CommandDto, ServerMessage};
use async_trait::async_trait;
use domain::{CommandKind, ConnectionId, PlaybackCommand, PlaybackIntent, now_epoch_ms};
use signage_gateway::ConnectionGateway;
use signage_presence::PresenceBroadcaster;
use signage_registry::{DeviceRegistry, PlaybackIntents, RegistryError};
use signage_telemetry::{record_command_routed, record_command_unreachable};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 指令路由请求。
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub issuer: ConnectionId,
    pub device_id: String,
    pub command: PlaybackCommand,
    /// play 意图附带的可直接拉取地址（轻量客户端轮询使用）。
    pub locator: Option<String>,
}

/// 已成功入队的指令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedCommand {
    pub device_id: String,
    pub connection_id: ConnectionId,
    pub kind: CommandKind,
}

/// 控制链路错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("target unreachable: {0}")]
    TargetUnreachable(String),
    #[error("dispatch error: {0}")]
    Dispatch(String),
    #[error("registry error: {0}")]
    Registry(String),
}

/// 指令下发器抽象。
///
/// 只负责本地入队，不等待设备确认，也不重试。
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        target: &ConnectionId,
        command: &PlaybackCommand,
    ) -> Result<(), ControlError>;
}

/// 空下发器（用于占位）。
#[derive(Debug, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl CommandDispatcher for NoopDispatcher {
    async fn dispatch(
        &self,
        _target: &ConnectionId,
        _command: &PlaybackCommand,
    ) -> Result<(), ControlError> {
        Ok(())
    }
}

/// 经由连接网关下发。
#[derive(Clone)]
pub struct GatewayDispatcher {
    gateway: Arc<ConnectionGateway>,
}

impl GatewayDispatcher {
    pub fn new(gateway: Arc<ConnectionGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl CommandDispatcher for GatewayDispatcher {
    async fn dispatch(
        &self,
        target: &ConnectionId,
        command: &PlaybackCommand,
    ) -> Result<(), ControlError> {
        let message = ServerMessage::Command {
            command: CommandDto::from(command),
        };
        self.gateway
            .send(target, message)
            .map_err(|err| ControlError::Dispatch(err.to_string()))
    }
}

/// 指令路由：解析目标设备 -> 下发 -> 乐观更新播放意图。
#[derive(Clone)]
pub struct CommandRouter {
    registry: Arc<DeviceRegistry>,
    intents: Arc<PlaybackIntents>,
    broadcaster: Arc<PresenceBroadcaster>,
    dispatcher: Arc<dyn CommandDispatcher>,
}

impl CommandRouter {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        intents: Arc<PlaybackIntents>,
        broadcaster: Arc<PresenceBroadcaster>,
        dispatcher: Arc<dyn CommandDispatcher>,
    ) -> Self {
        Self {
            registry,
            intents,
            broadcaster,
            dispatcher,
        }
    }

    /// 路由一条指令。
    ///
    /// 目标未注册或本地发送失败均返回 `TargetUnreachable`，由调用方通知发起方；
    /// 不排队、不重试。
    pub async fn route_command(
        &self,
        request: CommandRequest,
    ) -> Result<RoutedCommand, ControlError> {
        let kind = request.command.kind();
        let connection_id = match self.registry.resolve(&request.device_id) {
            Ok(connection_id) => connection_id,
            Err(RegistryError::NotFound(_)) => {
                return Err(self.unreachable(&request, "not_registered"));
            }
            Err(err) => return Err(ControlError::Registry(err.to_string())),
        };

        if let Err(err) = self
            .dispatcher
            .dispatch(&connection_id, &request.command)
            .await
        {
            debug!(
                target: "signage.control",
                device_id = %request.device_id,
                connection_id = %connection_id,
                error = %err,
                "command_dispatch_failed"
            );
            return Err(self.unreachable(&request, "send_failed"));
        }
        record_command_routed();
        info!(
            target: "signage.control",
            issuer = %request.issuer,
            device_id = %request.device_id,
            connection_id = %connection_id,
            kind = kind.as_str(),
            asset_id = ?request.command.asset_id(),
            "command_routed"
        );

        self.apply_side_effects(&request)?;
        Ok(RoutedCommand {
            device_id: request.device_id,
            connection_id,
            kind,
        })
    }

    fn apply_side_effects(&self, request: &CommandRequest) -> Result<(), ControlError> {
        match &request.command {
            PlaybackCommand::Play { asset_id } => {
                self.intents.set(PlaybackIntent {
                    device_id: request.device_id.clone(),
                    asset_id: asset_id.clone(),
                    kind: CommandKind::Play,
                    locator: request.locator.clone(),
                    issued_at_ms: now_epoch_ms(),
                });
            }
            PlaybackCommand::Stop => {
                self.intents.clear(&request.device_id);
            }
            PlaybackCommand::DeleteAsset { asset_id } => {
                let removed = self
                    .registry
                    .remove_stored_asset(&request.device_id, asset_id)
                    .map_err(|err| ControlError::Registry(err.to_string()))?;
                if removed {
                    self.broadcaster.broadcast("asset_deleted");
                }
            }
            PlaybackCommand::FetchAsset { .. } => {}
        }
        Ok(())
    }

    fn unreachable(&self, request: &CommandRequest, reason: &'static str) -> ControlError {
        record_command_unreachable();
        warn!(
            target: "signage.control",
            issuer = %request.issuer,
            device_id = %request.device_id,
            kind = request.command.kind().as_str(),
            reason = reason,
            "command_target_unreachable"
        );
        ControlError::TargetUnreachable(request.device_id.clone())
    }
}

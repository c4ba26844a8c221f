//! # 协调中枢
//!
//! 装配网关、注册表、广播、路由与中转，并对上行消息做显式分发。
//!
//! ```text
//! 传输层 ──text──► Hub::handle_text ──decode──► Hub::handle(match ClientMessage)
//!                                   │                 ├─ register / reports ──► DeviceRegistry ──► broadcast
//!                                   │                 ├─ observerSubscribe ───► PresenceBroadcaster
//!                                   │                 ├─ command ─────────────► CommandRouter
//!                                   │                 └─ signalRelay ─────────► SignalingRelay
//!                                   └─ 解析失败 ──► error(MALFORMED_MESSAGE) 仅回给发送方
//! ```

mod dispatch;
mod error;

pub use error::HubError;

use api_contract::ServerMessage;
use domain::{CommandKind, ConnectionId, PlaybackIntent, now_epoch_ms};
use signage_assets::{AssetStore, asset_locator};
use signage_control::{CommandRouter, GatewayDispatcher};
use signage_gateway::{ConnectionGateway, GatewayConfig, Outbound};
use signage_presence::{DisconnectCleanup, PresenceBroadcaster};
use signage_registry::{DeviceRegistry, DisconnectPolicy, PlaybackIntents};
use signage_signaling::SignalingRelay;
use std::sync::Arc;
use tracing::info;

/// 中枢参数。
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    /// 素材地址的外部基地址；未设置时按连接/请求来源推导。
    pub public_url: Option<String>,
    pub disconnect_policy: DisconnectPolicy,
    pub gateway: GatewayConfig,
}

/// 单个连接的上下文。
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub connection_id: ConnectionId,
    /// 升级请求推导出的基地址（`scheme://host`）。
    pub request_base_url: String,
}

/// 协调中枢。
pub struct Hub {
    gateway: Arc<ConnectionGateway>,
    registry: Arc<DeviceRegistry>,
    intents: Arc<PlaybackIntents>,
    broadcaster: Arc<PresenceBroadcaster>,
    router: CommandRouter,
    relay: SignalingRelay,
    assets: Arc<dyn AssetStore>,
    public_url: Option<String>,
}

impl Hub {
    pub fn new(config: HubConfig, assets: Arc<dyn AssetStore>) -> Self {
        let gateway = Arc::new(ConnectionGateway::new(config.gateway));
        let registry = Arc::new(DeviceRegistry::new(config.disconnect_policy));
        let intents = Arc::new(PlaybackIntents::new());
        let broadcaster = Arc::new(PresenceBroadcaster::new(registry.clone(), gateway.clone()));
        gateway.add_close_listener(Arc::new(DisconnectCleanup::new(
            registry.clone(),
            intents.clone(),
            broadcaster.clone(),
        )));
        let router = CommandRouter::new(
            registry.clone(),
            intents.clone(),
            broadcaster.clone(),
            Arc::new(GatewayDispatcher::new(gateway.clone())),
        );
        let relay = SignalingRelay::new(gateway.clone());
        info!(
            target: "signage.hub",
            policy = ?config.disconnect_policy,
            public_url = ?config.public_url,
            "hub_initialized"
        );
        Self {
            gateway,
            registry,
            intents,
            broadcaster,
            router,
            relay,
            assets,
            public_url: config.public_url,
        }
    }

    pub fn gateway(&self) -> &Arc<ConnectionGateway> {
        &self.gateway
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn intents(&self) -> &Arc<PlaybackIntents> {
        &self.intents
    }

    pub fn assets(&self) -> &Arc<dyn AssetStore> {
        &self.assets
    }

    /// 接入新连接并发送 `welcome`。
    pub fn connect(&self) -> Result<(ConnectionId, Outbound), HubError> {
        let (connection_id, receiver) = self.gateway.accept()?;
        self.gateway.send(
            &connection_id,
            ServerMessage::Welcome {
                connection_id: connection_id.to_string(),
            },
        )?;
        Ok((connection_id, receiver))
    }

    /// 连接关闭；清理由网关的关闭监听方同步完成。
    pub fn disconnect(&self, connection_id: &ConnectionId) {
        self.gateway.close(connection_id);
    }

    /// 素材地址基址：优先使用配置的外部地址。
    pub fn locator_base<'a>(&'a self, request_base_url: &'a str) -> &'a str {
        self.public_url.as_deref().unwrap_or(request_base_url)
    }

    /// 素材库中存在时返回其可拉取地址。
    pub async fn locator_for(
        &self,
        asset_id: &str,
        request_base_url: &str,
    ) -> Result<Option<String>, HubError> {
        if !self.assets.exists(asset_id).await? {
            return Ok(None);
        }
        Ok(Some(asset_locator(
            self.locator_base(request_base_url),
            asset_id,
        )))
    }

    /// 轻量客户端：直接设置播放意图（不经长连接下发）。
    pub async fn set_play_intent(
        &self,
        player_id: &str,
        asset_id: &str,
        request_base_url: &str,
    ) -> Result<PlaybackIntent, HubError> {
        let locator = self
            .locator_for(asset_id, request_base_url)
            .await?
            .ok_or_else(|| HubError::UnknownAsset(asset_id.to_string()))?;
        let intent = PlaybackIntent {
            device_id: player_id.to_string(),
            asset_id: asset_id.to_string(),
            kind: CommandKind::Play,
            locator: Some(locator),
            issued_at_ms: now_epoch_ms(),
        };
        self.intents.set(intent.clone());
        info!(
            target: "signage.hub",
            player_id = %player_id,
            asset_id = %asset_id,
            "play_intent_set"
        );
        Ok(intent)
    }

    /// 轻量客户端：清除播放意图，返回此前是否存在。
    pub fn clear_play_intent(&self, player_id: &str) -> bool {
        let cleared = self.intents.clear(player_id);
        info!(
            target: "signage.hub",
            player_id = %player_id,
            cleared = cleared,
            "play_intent_cleared"
        );
        cleared
    }

    /// 当前 play 意图（stop 等其他类型不对外暴露）。
    pub fn current_intent(&self, player_id: &str) -> Option<PlaybackIntent> {
        self.intents
            .get(player_id)
            .filter(|intent| intent.kind == CommandKind::Play)
    }
}

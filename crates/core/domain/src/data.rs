use crate::ConnectionId;

/// 设备上报的播放状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Playing,
    Paused,
    Stopped,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Playing => "playing",
            DeviceStatus::Paused => "paused",
            DeviceStatus::Stopped => "stopped",
        }
    }
}

/// 快照中的单个设备视图。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceView {
    pub device_id: String,
    pub connection_id: Option<ConnectionId>,
    pub status: DeviceStatus,
    pub current_asset_id: Option<String>,
    pub stored_asset_ids: Vec<String>,
    pub last_seen_ms: i64,
}

impl DeviceView {
    pub fn is_connected(&self) -> bool {
        self.connection_id.is_some()
    }
}

/// 控制台下发给设备的播放指令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackCommand {
    FetchAsset {
        asset_id: String,
        source_locator: String,
    },
    Play {
        asset_id: String,
    },
    Stop,
    DeleteAsset {
        asset_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    FetchAsset,
    Play,
    Stop,
    DeleteAsset,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::FetchAsset => "fetchAsset",
            CommandKind::Play => "play",
            CommandKind::Stop => "stop",
            CommandKind::DeleteAsset => "deleteAsset",
        }
    }
}

impl PlaybackCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            PlaybackCommand::FetchAsset { .. } => CommandKind::FetchAsset,
            PlaybackCommand::Play { .. } => CommandKind::Play,
            PlaybackCommand::Stop => CommandKind::Stop,
            PlaybackCommand::DeleteAsset { .. } => CommandKind::DeleteAsset,
        }
    }

    pub fn asset_id(&self) -> Option<&str> {
        match self {
            PlaybackCommand::FetchAsset { asset_id, .. }
            | PlaybackCommand::Play { asset_id }
            | PlaybackCommand::DeleteAsset { asset_id } => Some(asset_id),
            PlaybackCommand::Stop => None,
        }
    }
}

/// 每个设备最近一次的播放意图（乐观、后写覆盖、仅内存）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackIntent {
    pub device_id: String,
    pub asset_id: String,
    pub kind: CommandKind,
    /// 可直接拉流的地址（无长连接的轻量客户端轮询使用）。
    pub locator: Option<String>,
    pub issued_at_ms: i64,
}

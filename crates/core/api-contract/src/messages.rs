//! 长连接消息面：客户端上行与服务端下行的封闭标签联合。
//!
//! 每个 JSON 文本帧都是带 `type` 标签的对象，字段为 camelCase。
//! 未知类型、缺失必填字段、空 ID 一律按 `MalformedMessage` 处理。

use domain::{DeviceStatus, DeviceView, PlaybackCommand};
use serde::{Deserialize, Serialize};

/// 消息契约错误。
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// 下发给连接的错误码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RoleConflict,
    TargetUnreachable,
    MalformedMessage,
}

/// 设备上报的播放状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusDto {
    Online,
    Playing,
    Paused,
    Stopped,
}

impl From<StatusDto> for DeviceStatus {
    fn from(value: StatusDto) -> Self {
        match value {
            StatusDto::Online => DeviceStatus::Online,
            StatusDto::Playing => DeviceStatus::Playing,
            StatusDto::Paused => DeviceStatus::Paused,
            StatusDto::Stopped => DeviceStatus::Stopped,
        }
    }
}

impl From<DeviceStatus> for StatusDto {
    fn from(value: DeviceStatus) -> Self {
        match value {
            DeviceStatus::Online => StatusDto::Online,
            DeviceStatus::Playing => StatusDto::Playing,
            DeviceStatus::Paused => StatusDto::Paused,
            DeviceStatus::Stopped => StatusDto::Stopped,
        }
    }
}

/// 播放指令（以 `kind` 为标签）。
///
/// 上行时 `fetchAsset.sourceLocator` 可省略，由服务端按素材库推导；
/// 下行给设备时总是携带。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CommandDto {
    #[serde(rename_all = "camelCase")]
    FetchAsset {
        asset_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_locator: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Play { asset_id: String },
    Stop,
    #[serde(rename_all = "camelCase")]
    DeleteAsset { asset_id: String },
}

impl CommandDto {
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            CommandDto::FetchAsset { asset_id, .. }
            | CommandDto::Play { asset_id }
            | CommandDto::DeleteAsset { asset_id } => Some(asset_id),
            CommandDto::Stop => None,
        }
    }
}

impl From<&PlaybackCommand> for CommandDto {
    fn from(value: &PlaybackCommand) -> Self {
        match value {
            PlaybackCommand::FetchAsset {
                asset_id,
                source_locator,
            } => CommandDto::FetchAsset {
                asset_id: asset_id.clone(),
                source_locator: Some(source_locator.clone()),
            },
            PlaybackCommand::Play { asset_id } => CommandDto::Play {
                asset_id: asset_id.clone(),
            },
            PlaybackCommand::Stop => CommandDto::Stop,
            PlaybackCommand::DeleteAsset { asset_id } => CommandDto::DeleteAsset {
                asset_id: asset_id.clone(),
            },
        }
    }
}

/// 客户端（设备/控制台）上行消息。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Register {
        device_id: String,
        #[serde(default)]
        stored_asset_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    StatusReport {
        status: StatusDto,
        #[serde(default)]
        current_asset_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    StoredAssetsReport { asset_ids: Vec<String> },
    ObserverSubscribe,
    PresenceRequest,
    #[serde(rename_all = "camelCase")]
    Command {
        device_id: String,
        command: CommandDto,
    },
    #[serde(rename_all = "camelCase")]
    SignalRelay {
        to_connection_id: String,
        payload: serde_json::Value,
    },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Register { .. } => "register",
            ClientMessage::StatusReport { .. } => "statusReport",
            ClientMessage::StoredAssetsReport { .. } => "storedAssetsReport",
            ClientMessage::ObserverSubscribe => "observerSubscribe",
            ClientMessage::PresenceRequest => "presenceRequest",
            ClientMessage::Command { .. } => "command",
            ClientMessage::SignalRelay { .. } => "signalRelay",
        }
    }

    fn validate(self) -> Result<Self, ContractError> {
        match &self {
            ClientMessage::Register { device_id, .. } => require_non_empty(device_id, "deviceId")?,
            ClientMessage::Command { device_id, command } => {
                require_non_empty(device_id, "deviceId")?;
                if let Some(asset_id) = command.asset_id() {
                    require_non_empty(asset_id, "assetId")?;
                }
            }
            ClientMessage::SignalRelay {
                to_connection_id, ..
            } => require_non_empty(to_connection_id, "toConnectionId")?,
            _ => {}
        }
        Ok(self)
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ContractError> {
    if value.trim().is_empty() {
        return Err(ContractError::Malformed(format!("{} is required", field)));
    }
    Ok(())
}

/// 解析一帧上行文本。
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ContractError> {
    let message: ClientMessage =
        serde_json::from_str(text).map_err(|err| ContractError::Malformed(err.to_string()))?;
    message.validate()
}

/// 快照中的设备记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecordDto {
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    pub connected: bool,
    pub status: StatusDto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_asset_id: Option<String>,
    pub stored_asset_ids: Vec<String>,
    pub last_seen: i64,
}

impl From<&DeviceView> for DeviceRecordDto {
    fn from(view: &DeviceView) -> Self {
        Self {
            device_id: view.device_id.clone(),
            connection_id: view.connection_id.as_ref().map(|id| id.to_string()),
            connected: view.is_connected(),
            status: view.status.into(),
            current_asset_id: view.current_asset_id.clone(),
            stored_asset_ids: view.stored_asset_ids.clone(),
            last_seen: view.last_seen_ms,
        }
    }
}

/// 服务端下行消息。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Welcome { connection_id: String },
    #[serde(rename_all = "camelCase")]
    Registered {
        device_id: String,
        connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Subscribed { connection_id: String },
    PresenceSnapshot { records: Vec<DeviceRecordDto> },
    Command { command: CommandDto },
    #[serde(rename_all = "camelCase")]
    CommandAccepted { device_id: String, kind: String },
    #[serde(rename_all = "camelCase")]
    SignalReceived {
        from_connection_id: String,
        payload: serde_json::Value,
    },
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::Registered { .. } => "registered",
            ServerMessage::Subscribed { .. } => "subscribed",
            ServerMessage::PresenceSnapshot { .. } => "presenceSnapshot",
            ServerMessage::Command { .. } => "command",
            ServerMessage::CommandAccepted { .. } => "commandAccepted",
            ServerMessage::SignalReceived { .. } => "signalReceived",
            ServerMessage::Error { .. } => "error",
        }
    }

    pub fn snapshot(views: &[DeviceView]) -> Self {
        ServerMessage::PresenceSnapshot {
            records: views.iter().map(DeviceRecordDto::from).collect(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }

    /// 序列化为文本帧。
    pub fn encode(&self) -> Result<String, ContractError> {
        serde_json::to_string(self).map_err(|err| ContractError::Malformed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_malformed() {
        let err = decode_client_message(r#"{"type":"join-room","room":"admin"}"#)
            .expect_err("unknown type");
        assert!(matches!(err, ContractError::Malformed(_)));
    }

    #[test]
    fn blank_device_id_is_malformed() {
        assert!(decode_client_message(r#"{"type":"register","deviceId":"  "}"#).is_err());
    }

    #[test]
    fn register_defaults_stored_assets() {
        let message =
            decode_client_message(r#"{"type":"register","deviceId":"pi_ab12"}"#).expect("decode");
        assert_eq!(
            message,
            ClientMessage::Register {
                device_id: "pi_ab12".to_string(),
                stored_asset_ids: Vec::new(),
            }
        );
    }
}

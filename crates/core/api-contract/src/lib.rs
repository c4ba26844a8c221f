//! 稳定的消息契约、DTO 与 HTTP 响应封装。

pub mod messages;

pub use messages::*;

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 轻量客户端轮询当前播放内容的查询参数。
#[derive(Debug, Deserialize)]
pub struct CurrentMediaQuery {
    #[serde(alias = "playerId")]
    pub player_id: Option<String>,
}

/// 当前播放内容。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentMediaDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub asset_id: String,
    pub kind: String,
}

/// HTTP 设置播放意图请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignagePlayRequest {
    #[serde(alias = "player_id")]
    pub player_id: Option<String>,
    #[serde(alias = "videoId", alias = "video_id", alias = "asset_id")]
    pub asset_id: Option<String>,
}

/// HTTP 清除播放意图请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignageStopRequest {
    #[serde(alias = "player_id")]
    pub player_id: Option<String>,
}

/// HTTP 设置播放意图响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignagePlayResponse {
    pub url: Option<String>,
}

/// 素材返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDto {
    pub id: String,
    pub name: String,
    pub size: u64,
}

/// 托管设备返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDeviceDto {
    pub id: String,
    pub name: String,
    pub base_url: String,
}

/// 托管设备在线探测结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedProbeDto {
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// 向托管设备推送播放地址请求体。
#[derive(Debug, Deserialize)]
pub struct PlayUrlRequest {
    pub url: Option<String>,
}

/// 推送结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayUrlResponse {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_asset_id: Option<String>,
    pub activated: bool,
}

/// 进程计数器快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDto {
    pub connections_accepted: u64,
    pub connections_closed: u64,
    pub snapshots_broadcast: u64,
    pub commands_routed: u64,
    pub commands_unreachable: u64,
    pub signals_relayed: u64,
    pub signals_dropped: u64,
    pub malformed_messages: u64,
    pub outbound_dropped: u64,
}

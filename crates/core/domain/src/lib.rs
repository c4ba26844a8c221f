//! 协调核心共享的领域模型。

pub mod data;

pub use data::{CommandKind, DeviceStatus, DeviceView, PlaybackCommand, PlaybackIntent};

use std::fmt;

/// 连接标识：网关为每个新通道分配，仅在进程内有效。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 连接角色，声明后不可更换。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Unassigned,
    /// 设备角色携带其自报的 deviceId。
    Device(String),
    Observer,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Unassigned => "unassigned",
            Role::Device(_) => "device",
            Role::Observer => "observer",
        }
    }

    pub fn is_observer(&self) -> bool {
        matches!(self, Role::Observer)
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            Role::Device(device_id) => Some(device_id),
            _ => None,
        }
    }
}

/// 当前 Unix 毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}

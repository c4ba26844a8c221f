//! 网关错误类型定义

use domain::ConnectionId;

/// 连接网关错误
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 连接不存在或已关闭
    #[error("connection not found: {0}")]
    NotFound(ConnectionId),

    /// 角色已声明为其他值
    #[error("connection {id} already has role {current}, cannot become {requested}")]
    RoleConflict {
        id: ConnectionId,
        current: &'static str,
        requested: &'static str,
    },

    /// 出站队列已满，消息被丢弃
    #[error("outbound queue full: {0}")]
    QueueFull(ConnectionId),

    #[error("connection table lock poisoned")]
    LockPoisoned,
}

//! 注册表错误类型

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// deviceId 没有当前连接（未注册或已断开）
    #[error("device not reachable: {0}")]
    NotFound(String),

    #[error("registry lock poisoned")]
    LockPoisoned,
}

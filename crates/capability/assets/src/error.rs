/// 素材存储错误。
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("invalid asset id: {0}")]
    InvalidId(String),
    #[error("unsupported asset type: {0}")]
    UnsupportedType(String),
    #[error("asset io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset store lock poisoned")]
    LockPoisoned,
}

/// 托管设备代理错误。
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("unknown managed device: {0}")]
    UnknownDevice(String),
    #[error("managed device rejected request: {0}")]
    Rejected(String),
    #[error("http error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

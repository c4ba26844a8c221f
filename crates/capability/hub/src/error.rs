use signage_assets::AssetError;
use signage_gateway::GatewayError;

/// 中枢错误
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    /// 素材库中不存在该素材
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
}

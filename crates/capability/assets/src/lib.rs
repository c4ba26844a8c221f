//! 外部协作方边界：素材存储与第三方托管设备代理。
//!
//! 协调核心只依赖这里的 trait；字节级存储与设备管理系统都是可替换的实现。

mod directory;
mod error;
mod managed;
mod store;

pub use directory::{DirectoryAssetStore, SUPPORTED_EXTENSIONS};
pub use error::{AssetError, ProxyError};
pub use managed::{
    HttpManagedDeviceProxy, ManagedDevice, ManagedDeviceProxy, NoopManagedDeviceProxy,
    ProbeResult, PushOutcome,
};
pub use store::{Asset, AssetMeta, AssetStore, InMemoryAssetStore};

/// 素材对外可拉取地址：`{base}/api/assets/{id}/file`。
pub fn asset_locator(base_url: &str, asset_id: &str) -> String {
    format!("{}/api/assets/{}/file", base_url.trim_end_matches('/'), asset_id)
}

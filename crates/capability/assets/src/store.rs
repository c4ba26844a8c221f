//! 素材存储
//!
//! 按 ID 存取素材字节；上传不在此处。

use crate::error::AssetError;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMeta {
    pub id: String,
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub meta: AssetMeta,
    pub bytes: Vec<u8>,
}

#[async_trait::async_trait]
pub trait AssetStore: Send + Sync {
    async fn put(&self, id: &str, name: &str, bytes: Vec<u8>) -> Result<AssetMeta, AssetError>;
    async fn get(&self, id: &str) -> Result<Option<Asset>, AssetError>;
    async fn exists(&self, id: &str) -> Result<bool, AssetError>;
    /// 返回是否确实删除了一项。
    async fn delete(&self, id: &str) -> Result<bool, AssetError>;
    async fn list(&self) -> Result<Vec<AssetMeta>, AssetError>;
}

/// 素材内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
#[derive(Default)]
pub struct InMemoryAssetStore {
    assets: RwLock<HashMap<String, Asset>>,
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 素材 ID 会拼入 URL 路径，只允许常见文件名字符。
pub(crate) fn validate_id(id: &str) -> Result<(), AssetError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        && !id.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(AssetError::InvalidId(id.to_string()))
    }
}

#[async_trait::async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn put(&self, id: &str, name: &str, bytes: Vec<u8>) -> Result<AssetMeta, AssetError> {
        validate_id(id)?;
        let meta = AssetMeta {
            id: id.to_string(),
            name: name.to_string(),
            size: bytes.len() as u64,
        };
        let mut assets = self.assets.write().map_err(|_| AssetError::LockPoisoned)?;
        assets.insert(
            id.to_string(),
            Asset {
                meta: meta.clone(),
                bytes,
            },
        );
        Ok(meta)
    }

    async fn get(&self, id: &str) -> Result<Option<Asset>, AssetError> {
        let assets = self.assets.read().map_err(|_| AssetError::LockPoisoned)?;
        Ok(assets.get(id).cloned())
    }

    async fn exists(&self, id: &str) -> Result<bool, AssetError> {
        let assets = self.assets.read().map_err(|_| AssetError::LockPoisoned)?;
        Ok(assets.contains_key(id))
    }

    async fn delete(&self, id: &str) -> Result<bool, AssetError> {
        let mut assets = self.assets.write().map_err(|_| AssetError::LockPoisoned)?;
        Ok(assets.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<AssetMeta>, AssetError> {
        let assets = self.assets.read().map_err(|_| AssetError::LockPoisoned)?;
        let mut items: Vec<AssetMeta> = assets.values().map(|asset| asset.meta.clone()).collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }
}

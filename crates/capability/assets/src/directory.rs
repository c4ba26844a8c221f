//! 目录素材存储
//!
//! 启动时扫描素材目录建立索引：每个受支持扩展名的普通文件是一项素材，
//! 文件名去掉扩展名即素材 ID。之后的写入与删除同时落盘并更新索引。

use crate::error::AssetError;
use crate::store::{Asset, AssetMeta, AssetStore, validate_id};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

/// 受支持的素材扩展名（小写，不含点）。
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["mp4", "webm", "ogg", "mov", "mkv"];

#[derive(Debug, Clone)]
struct IndexedAsset {
    meta: AssetMeta,
    path: PathBuf,
}

/// 基于本地目录的素材存储。
pub struct DirectoryAssetStore {
    root: PathBuf,
    index: RwLock<HashMap<String, IndexedAsset>>,
}

fn supported_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(ext)
}

impl DirectoryAssetStore {
    /// 打开（必要时创建）素材目录并扫描已有文件。
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, AssetError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let mut index = HashMap::new();
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let path = entry.path();
            if supported_extension(&path).is_none() {
                continue;
            }
            let (Some(id), Some(name)) = (
                path.file_stem().and_then(|stem| stem.to_str()),
                path.file_name().and_then(|name| name.to_str()),
            ) else {
                continue;
            };
            if validate_id(id).is_err() {
                warn!(
                    target: "signage.assets",
                    file = %path.display(),
                    "asset_file_skipped"
                );
                continue;
            }
            // 同一 ID 多个扩展名时保留先扫描到的
            index.entry(id.to_string()).or_insert_with(|| IndexedAsset {
                meta: AssetMeta {
                    id: id.to_string(),
                    name: name.to_string(),
                    size: metadata.len(),
                },
                path: path.clone(),
            });
        }

        info!(
            target: "signage.assets",
            dir = %root.display(),
            assets = index.len(),
            "asset_dir_scanned"
        );
        Ok(Self {
            root,
            index: RwLock::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lookup(&self, id: &str) -> Result<Option<IndexedAsset>, AssetError> {
        let index = self.index.read().map_err(|_| AssetError::LockPoisoned)?;
        Ok(index.get(id).cloned())
    }
}

#[async_trait::async_trait]
impl AssetStore for DirectoryAssetStore {
    async fn put(&self, id: &str, name: &str, bytes: Vec<u8>) -> Result<AssetMeta, AssetError> {
        validate_id(id)?;
        let ext = match Path::new(name).extension() {
            None => "mp4".to_string(),
            Some(_) => supported_extension(Path::new(name))
                .ok_or_else(|| AssetError::UnsupportedType(name.to_string()))?,
        };
        let path = self.root.join(format!("{}.{}", id, ext));
        tokio::fs::write(&path, &bytes).await?;

        let meta = AssetMeta {
            id: id.to_string(),
            name: name.to_string(),
            size: bytes.len() as u64,
        };
        let replaced = {
            let mut index = self.index.write().map_err(|_| AssetError::LockPoisoned)?;
            index.insert(
                id.to_string(),
                IndexedAsset {
                    meta: meta.clone(),
                    path: path.clone(),
                },
            )
        };
        if let Some(old) = replaced.filter(|old| old.path != path) {
            remove_file_if_present(&old.path).await?;
        }
        Ok(meta)
    }

    async fn get(&self, id: &str) -> Result<Option<Asset>, AssetError> {
        let Some(indexed) = self.lookup(id)? else {
            return Ok(None);
        };
        match tokio::fs::read(&indexed.path).await {
            Ok(bytes) => Ok(Some(Asset {
                meta: indexed.meta,
                bytes,
            })),
            // 文件被外部删除时按不存在处理
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool, AssetError> {
        Ok(self.lookup(id)?.is_some())
    }

    async fn delete(&self, id: &str) -> Result<bool, AssetError> {
        let removed = {
            let mut index = self.index.write().map_err(|_| AssetError::LockPoisoned)?;
            index.remove(id)
        };
        match removed {
            Some(indexed) => {
                remove_file_if_present(&indexed.path).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<AssetMeta>, AssetError> {
        let index = self.index.read().map_err(|_| AssetError::LockPoisoned)?;
        let mut items: Vec<AssetMeta> = index.values().map(|item| item.meta.clone()).collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }
}

async fn remove_file_if_present(path: &Path) -> Result<(), AssetError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

//! # 设备注册表
//!
//! "当前谁可达"的唯一事实来源：以设备自报的 `deviceId` 为主键，
//! 连接 ID 只是可变的次要属性。
//!
//! - 最新一次注册胜出：`register` 无条件覆盖连接 ID，不驱逐旧连接
//! - 上报只对当前连接生效：来自已被取代连接的上报记 warn 后忽略
//! - 断开只清理自己：旧连接的断开不会覆盖更新的注册（`DisconnectOutcome::Stale`）
//!
//! 所有读写经由同一把 `RwLock` 串行化，每次调用 O(1)（快照除外）。

mod error;
mod intent;

pub use error::RegistryError;
pub use intent::PlaybackIntents;

use domain::{ConnectionId, DeviceStatus, DeviceView, now_epoch_ms};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// 设备断开后的记录处理策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectPolicy {
    /// 删除记录。
    #[default]
    Delete,
    /// 保留记录，连接置空。
    RetainOffline,
}

/// 注册结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    /// 同一 deviceId 再次注册；`superseded` 为被取代但未被关闭的旧连接。
    Reconnected { superseded: Option<ConnectionId> },
}

/// 上报结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Applied { device_id: String },
    /// 该连接不是任何设备的当前连接（与断开竞争或已被取代）。
    NotCurrent,
}

impl ReportOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ReportOutcome::Applied { .. })
    }
}

/// 断开结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Cleared { device_id: String },
    Removed { device_id: String },
    /// 连接不是任何设备的当前连接，忽略。
    Stale,
}

impl DisconnectOutcome {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            DisconnectOutcome::Cleared { device_id } | DisconnectOutcome::Removed { device_id } => {
                Some(device_id)
            }
            DisconnectOutcome::Stale => None,
        }
    }
}

#[derive(Debug, Clone)]
struct DeviceRecord {
    device_id: String,
    connection_id: Option<ConnectionId>,
    status: DeviceStatus,
    current_asset_id: Option<String>,
    stored_asset_ids: BTreeSet<String>,
    last_seen_ms: i64,
    /// 首次注册序号，决定快照顺序。
    seq: u64,
}

impl DeviceRecord {
    fn view(&self) -> DeviceView {
        DeviceView {
            device_id: self.device_id.clone(),
            connection_id: self.connection_id.clone(),
            status: self.status,
            current_asset_id: self.current_asset_id.clone(),
            stored_asset_ids: self.stored_asset_ids.iter().cloned().collect(),
            last_seen_ms: self.last_seen_ms,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    records: HashMap<String, DeviceRecord>,
    /// 当前连接 -> deviceId；被取代的连接不在其中。
    current: HashMap<ConnectionId, String>,
    next_seq: u64,
}

/// 设备注册表。
pub struct DeviceRegistry {
    state: RwLock<RegistryState>,
    policy: DisconnectPolicy,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(DisconnectPolicy::default())
    }
}

impl DeviceRegistry {
    pub fn new(policy: DisconnectPolicy) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            policy,
        }
    }

    pub fn policy(&self) -> DisconnectPolicy {
        self.policy
    }

    /// 注册或更新设备，连接 ID 无条件覆盖（最新注册胜出）。
    pub fn register(
        &self,
        device_id: &str,
        connection_id: &ConnectionId,
        stored_asset_ids: Vec<String>,
    ) -> Result<RegisterOutcome, RegistryError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RegistryError::LockPoisoned)?;
        let now = now_epoch_ms();
        let stored: BTreeSet<String> = stored_asset_ids.into_iter().collect();

        let outcome = match state.records.get_mut(device_id) {
            Some(record) => {
                let previous = record.connection_id.replace(connection_id.clone());
                record.status = DeviceStatus::Online;
                record.current_asset_id = None;
                record.stored_asset_ids = stored;
                record.last_seen_ms = now;
                let superseded = previous.filter(|previous| previous != connection_id);
                if let Some(previous) = &superseded {
                    state.current.remove(previous);
                    warn!(
                        target: "signage.registry",
                        device_id = %device_id,
                        previous_connection_id = %previous,
                        connection_id = %connection_id,
                        "device_connection_superseded"
                    );
                }
                RegisterOutcome::Reconnected { superseded }
            }
            None => {
                let seq = state.next_seq;
                state.next_seq += 1;
                state.records.insert(
                    device_id.to_string(),
                    DeviceRecord {
                        device_id: device_id.to_string(),
                        connection_id: Some(connection_id.clone()),
                        status: DeviceStatus::Online,
                        current_asset_id: None,
                        stored_asset_ids: stored,
                        last_seen_ms: now,
                        seq,
                    },
                );
                RegisterOutcome::Created
            }
        };
        state
            .current
            .insert(connection_id.clone(), device_id.to_string());
        info!(
            target: "signage.registry",
            device_id = %device_id,
            connection_id = %connection_id,
            devices = state.records.len(),
            outcome = ?outcome,
            "device_registered"
        );
        Ok(outcome)
    }

    /// 状态上报；连接不是当前连接时记 warn 并忽略。
    pub fn report_status(
        &self,
        connection_id: &ConnectionId,
        status: DeviceStatus,
        current_asset_id: Option<String>,
    ) -> Result<ReportOutcome, RegistryError> {
        self.apply_report(connection_id, "status_report", |record| {
            record.status = status;
            record.current_asset_id = current_asset_id;
        })
    }

    /// 本地素材全量上报（整体替换，不是增量）。
    pub fn report_stored_assets(
        &self,
        connection_id: &ConnectionId,
        asset_ids: Vec<String>,
    ) -> Result<ReportOutcome, RegistryError> {
        self.apply_report(connection_id, "stored_assets_report", |record| {
            record.stored_asset_ids = asset_ids.into_iter().collect();
        })
    }

    fn apply_report(
        &self,
        connection_id: &ConnectionId,
        report: &'static str,
        apply: impl FnOnce(&mut DeviceRecord),
    ) -> Result<ReportOutcome, RegistryError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RegistryError::LockPoisoned)?;
        let Some(device_id) = state.current.get(connection_id).cloned() else {
            warn!(
                target: "signage.registry",
                connection_id = %connection_id,
                report = report,
                "report_from_non_current_connection"
            );
            return Ok(ReportOutcome::NotCurrent);
        };
        let Some(record) = state.records.get_mut(&device_id) else {
            return Ok(ReportOutcome::NotCurrent);
        };
        apply(record);
        record.last_seen_ms = now_epoch_ms();
        debug!(
            target: "signage.registry",
            device_id = %device_id,
            connection_id = %connection_id,
            report = report,
            status = record.status.as_str(),
            "device_report_applied"
        );
        Ok(ReportOutcome::Applied { device_id })
    }

    /// 连接断开；仅当它仍是设备的当前连接时才清理。
    pub fn on_disconnect(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<DisconnectOutcome, RegistryError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RegistryError::LockPoisoned)?;
        let Some(device_id) = state.current.remove(connection_id) else {
            debug!(
                target: "signage.registry",
                connection_id = %connection_id,
                "stale_disconnect_ignored"
            );
            return Ok(DisconnectOutcome::Stale);
        };
        let outcome = match self.policy {
            DisconnectPolicy::Delete => {
                state.records.remove(&device_id);
                DisconnectOutcome::Removed {
                    device_id: device_id.clone(),
                }
            }
            DisconnectPolicy::RetainOffline => {
                if let Some(record) = state.records.get_mut(&device_id) {
                    record.connection_id = None;
                    record.last_seen_ms = now_epoch_ms();
                }
                DisconnectOutcome::Cleared {
                    device_id: device_id.clone(),
                }
            }
        };
        info!(
            target: "signage.registry",
            device_id = %device_id,
            connection_id = %connection_id,
            outcome = ?outcome,
            "device_disconnected"
        );
        Ok(outcome)
    }

    /// deviceId -> 当前连接。
    pub fn resolve(&self, device_id: &str) -> Result<ConnectionId, RegistryError> {
        let state = self
            .state
            .read()
            .map_err(|_| RegistryError::LockPoisoned)?;
        state
            .records
            .get(device_id)
            .and_then(|record| record.connection_id.clone())
            .ok_or_else(|| RegistryError::NotFound(device_id.to_string()))
    }

    /// 推测性地从设备素材列表中移除一项（设备尚未确认删除）。
    ///
    /// 返回是否发生变化。
    pub fn remove_stored_asset(
        &self,
        device_id: &str,
        asset_id: &str,
    ) -> Result<bool, RegistryError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RegistryError::LockPoisoned)?;
        let removed = state
            .records
            .get_mut(device_id)
            .map(|record| record.stored_asset_ids.remove(asset_id))
            .unwrap_or(false);
        Ok(removed)
    }

    pub fn get(&self, device_id: &str) -> Option<DeviceView> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.records.get(device_id).map(DeviceRecord::view))
    }

    /// 全量快照，按首次注册顺序排列；无变更时多次调用结果一致。
    pub fn snapshot(&self) -> Vec<DeviceView> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        let mut records: Vec<&DeviceRecord> = state.records.values().collect();
        records.sort_by_key(|record| record.seq);
        records.into_iter().map(DeviceRecord::view).collect()
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|state| state.records.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reregistration_on_same_connection_supersedes_nothing() {
        let registry = DeviceRegistry::default();
        let conn = ConnectionId::from("c1");
        registry.register("d1", &conn, Vec::new()).expect("register");
        let outcome = registry
            .register("d1", &conn, vec!["v1".to_string()])
            .expect("register");
        assert_eq!(outcome, RegisterOutcome::Reconnected { superseded: None });
        assert_eq!(registry.resolve("d1").expect("resolve"), conn);
    }

    #[test]
    fn stored_assets_are_deduplicated() {
        let registry = DeviceRegistry::default();
        let conn = ConnectionId::from("c1");
        registry
            .register("d1", &conn, vec!["b".to_string(), "a".to_string(), "b".to_string()])
            .expect("register");
        let view = registry.get("d1").expect("view");
        assert_eq!(view.stored_asset_ids, vec!["a".to_string(), "b".to_string()]);
    }
}

//! 播放意图：每个设备最近一次的 play 指令。
//!
//! 乐观写入、后写覆盖、仅在内存中保存；stop 或设备断开时清除。

use domain::PlaybackIntent;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct PlaybackIntents {
    intents: RwLock<HashMap<String, PlaybackIntent>>,
}

impl PlaybackIntents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, intent: PlaybackIntent) {
        if let Ok(mut map) = self.intents.write() {
            debug!(
                target: "signage.registry",
                device_id = %intent.device_id,
                asset_id = %intent.asset_id,
                kind = intent.kind.as_str(),
                "playback_intent_set"
            );
            map.insert(intent.device_id.clone(), intent);
        }
    }

    /// 清除意图，返回是否存在。
    pub fn clear(&self, device_id: &str) -> bool {
        self.intents
            .write()
            .map(|mut map| map.remove(device_id).is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, device_id: &str) -> Option<PlaybackIntent> {
        self.intents
            .read()
            .ok()
            .and_then(|map| map.get(device_id).cloned())
    }
}

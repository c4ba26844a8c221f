//! 第三方托管设备代理
//!
//! 托管设备不持有长连接，也不进入设备注册表；
//! 代理只做两件事：在线探测、推送一个播放地址。

use crate::error::ProxyError;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{info, warn};

/// 托管设备。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedDevice {
    pub id: String,
    pub name: String,
    /// 设备 HTTP API 基地址（不含末尾 `/`）。
    pub base_url: String,
}

impl ManagedDevice {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        let id = id.into();
        let base_url: String = base_url.into();
        Self {
            name: id.clone(),
            id,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// 在线探测结果；网络错误视为离线而非错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub online: bool,
    pub status: Option<u16>,
}

/// 推送结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub remote_asset_id: Option<String>,
    pub activated: bool,
}

#[async_trait::async_trait]
pub trait ManagedDeviceProxy: Send + Sync {
    fn list(&self) -> Vec<ManagedDevice>;
    async fn probe(&self, id: &str) -> Result<ProbeResult, ProxyError>;
    async fn push_locator(&self, id: &str, locator: &str) -> Result<PushOutcome, ProxyError>;
}

/// 空代理（未配置托管设备时使用）。
#[derive(Debug, Default)]
pub struct NoopManagedDeviceProxy;

#[async_trait::async_trait]
impl ManagedDeviceProxy for NoopManagedDeviceProxy {
    fn list(&self) -> Vec<ManagedDevice> {
        Vec::new()
    }

    async fn probe(&self, id: &str) -> Result<ProbeResult, ProxyError> {
        Err(ProxyError::UnknownDevice(id.to_string()))
    }

    async fn push_locator(&self, id: &str, _locator: &str) -> Result<PushOutcome, ProxyError> {
        Err(ProxyError::UnknownDevice(id.to_string()))
    }
}

/// 经 HTTP API 访问托管设备。
pub struct HttpManagedDeviceProxy {
    client: reqwest::Client,
    devices: Vec<ManagedDevice>,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl HttpManagedDeviceProxy {
    pub fn new(
        devices: Vec<ManagedDevice>,
        request_timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            devices,
            request_timeout,
            probe_timeout,
        })
    }

    fn device(&self, id: &str) -> Result<&ManagedDevice, ProxyError> {
        self.devices
            .iter()
            .find(|device| device.id == id)
            .ok_or_else(|| ProxyError::UnknownDevice(id.to_string()))
    }

    async fn post_asset(
        &self,
        device: &ManagedDevice,
        body: Value,
    ) -> Result<reqwest::Response, ProxyError> {
        let response = self
            .client
            .post(format!("{}/api/assets/", device.base_url))
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(response)
    }

    async fn activate(&self, device: &ManagedDevice, remote_id: &str) -> bool {
        let result = self
            .client
            .post(format!("{}/api/assets/{}/activate/", device.base_url, remote_id))
            .timeout(self.probe_timeout)
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                warn!(
                    target: "signage.assets",
                    managed_device_id = %device.id,
                    remote_asset_id = %remote_id,
                    error = %err,
                    "managed_activate_failed"
                );
                false
            }
        }
    }
}

/// 新版 API 返回 `id`，旧版返回 `asset_id`；可能是字符串或数字。
fn remote_asset_id(body: &Value) -> Option<String> {
    let value = body.get("id").or_else(|| body.get("asset_id"))?;
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn truncate_detail(text: &str) -> String {
    text.chars().take(200).collect()
}

#[async_trait::async_trait]
impl ManagedDeviceProxy for HttpManagedDeviceProxy {
    fn list(&self) -> Vec<ManagedDevice> {
        self.devices.clone()
    }

    async fn probe(&self, id: &str) -> Result<ProbeResult, ProxyError> {
        let device = self.device(id)?;
        let result = self
            .client
            .get(format!("{}/api/docs/", device.base_url))
            .timeout(self.probe_timeout)
            .send()
            .await;
        let probe = match result {
            Ok(response) => ProbeResult {
                online: response.status().is_success(),
                status: Some(response.status().as_u16()),
            },
            Err(err) => {
                info!(
                    target: "signage.assets",
                    managed_device_id = %id,
                    error = %err,
                    "managed_probe_unreachable"
                );
                ProbeResult {
                    online: false,
                    status: None,
                }
            }
        };
        Ok(probe)
    }

    async fn push_locator(&self, id: &str, locator: &str) -> Result<PushOutcome, ProxyError> {
        let device = self.device(id)?;
        let first = self
            .post_asset(device, json!({ "url": locator, "asset_type": "webpage" }))
            .await;
        let first_detail = match first {
            Ok(response) if response.status().is_success() => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                let remote_asset_id = remote_asset_id(&body);
                let activated = match &remote_asset_id {
                    Some(remote_id) => self.activate(device, remote_id).await,
                    None => false,
                };
                info!(
                    target: "signage.assets",
                    managed_device_id = %id,
                    locator = %locator,
                    remote_asset_id = ?remote_asset_id,
                    activated = activated,
                    "managed_locator_pushed"
                );
                return Ok(PushOutcome {
                    remote_asset_id,
                    activated,
                });
            }
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                format!("{} {}", status.as_u16(), truncate_detail(&text))
            }
            Err(err) => err.to_string(),
        };

        // 旧版 API 只接受 source_url
        warn!(
            target: "signage.assets",
            managed_device_id = %id,
            detail = %first_detail,
            "managed_push_retry_source_url"
        );
        let response = self
            .post_asset(device, json!({ "source_url": locator }))
            .await?;
        if response.status().is_success() {
            return Ok(PushOutcome {
                remote_asset_id: None,
                activated: false,
            });
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(ProxyError::Rejected(format!(
            "{} {}",
            status.as_u16(),
            truncate_detail(&text)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_id_accepts_string_or_number() {
        assert_eq!(remote_asset_id(&json!({ "id": "abc" })).as_deref(), Some("abc"));
        assert_eq!(remote_asset_id(&json!({ "asset_id": 42 })).as_deref(), Some("42"));
        assert_eq!(remote_asset_id(&json!({ "id": "" })), None);
        assert_eq!(remote_asset_id(&json!({})), None);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let device = ManagedDevice::new("lobby", "http://10.0.0.5/");
        assert_eq!(device.base_url, "http://10.0.0.5");
        assert_eq!(device.name, "lobby");
    }
}

//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 托管设备（由第三方设备管理系统维护，经 HTTP 代理访问）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedDeviceEntry {
    pub id: String,
    pub base_url: String,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// 素材目录（启动时扫描，不存在则创建）。
    pub assets_dir: String,
    /// 生成素材地址使用的外部基地址（已去掉末尾 `/`）。
    pub public_url: Option<String>,
    /// 每个连接的出站队列容量。
    pub outbound_buffer: usize,
    /// 设备断开后保留记录（连接置空）还是删除。
    pub retain_offline_devices: bool,
    pub managed_devices: Vec<ManagedDeviceEntry>,
    pub managed_timeout_ms: u64,
    pub probe_timeout_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr =
            env::var("SIGNAGE_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let assets_dir =
            read_optional("SIGNAGE_ASSETS_DIR").unwrap_or_else(|| "uploads".to_string());
        let public_url = read_optional("SIGNAGE_PUBLIC_URL")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());
        let outbound_buffer = read_usize_with_default("SIGNAGE_OUTBOUND_BUFFER", 64)?;
        if outbound_buffer == 0 {
            return Err(ConfigError::Invalid(
                "SIGNAGE_OUTBOUND_BUFFER".to_string(),
                "0".to_string(),
            ));
        }
        let retain_offline_devices =
            read_bool_with_default("SIGNAGE_RETAIN_OFFLINE_DEVICES", false)?;
        let managed_devices = match read_optional("SIGNAGE_MANAGED_DEVICES") {
            Some(value) => parse_managed_devices(&value)?,
            None => Vec::new(),
        };
        let managed_timeout_ms = read_u64_with_default("SIGNAGE_MANAGED_TIMEOUT_MS", 15_000)?;
        let probe_timeout_ms = read_u64_with_default("SIGNAGE_PROBE_TIMEOUT_MS", 5_000)?;

        Ok(Self {
            http_addr,
            assets_dir,
            public_url,
            outbound_buffer,
            retain_offline_devices,
            managed_devices,
            managed_timeout_ms,
            probe_timeout_ms,
        })
    }
}

/// 解析 `id=baseUrl,id=baseUrl` 形式的托管设备列表。
pub fn parse_managed_devices(value: &str) -> Result<Vec<ManagedDeviceEntry>, ConfigError> {
    let mut devices = Vec::new();
    for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let Some((id, base_url)) = item.split_once('=') else {
            return Err(ConfigError::Invalid(
                "SIGNAGE_MANAGED_DEVICES".to_string(),
                item.to_string(),
            ));
        };
        let id = id.trim();
        let base_url = base_url.trim().trim_end_matches('/');
        if id.is_empty() || base_url.is_empty() {
            return Err(ConfigError::Invalid(
                "SIGNAGE_MANAGED_DEVICES".to_string(),
                item.to_string(),
            ));
        }
        devices.push(ManagedDeviceEntry {
            id: id.to_string(),
            base_url: base_url.to_string(),
        });
    }
    Ok(devices)
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> Result<bool, ConfigError> {
    match read_optional(key) {
        Some(value) => parse_bool(key, &value),
        None => Ok(default),
    }
}

/// 解析布尔开关，只接受 `true/false/1/0/on/off`（不区分大小写）。
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(key.to_string(), value.to_string())),
    }
}

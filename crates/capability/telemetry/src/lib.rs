//! 追踪、请求 ID 与进程计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub connections_accepted: u64,
    pub connections_closed: u64,
    pub snapshots_broadcast: u64,
    pub commands_routed: u64,
    pub commands_unreachable: u64,
    pub signals_relayed: u64,
    pub signals_dropped: u64,
    pub malformed_messages: u64,
    pub outbound_dropped: u64,
}

/// 进程级计数器。
pub struct TelemetryMetrics {
    connections_accepted: AtomicU64,
    connections_closed: AtomicU64,
    snapshots_broadcast: AtomicU64,
    commands_routed: AtomicU64,
    commands_unreachable: AtomicU64,
    signals_relayed: AtomicU64,
    signals_dropped: AtomicU64,
    malformed_messages: AtomicU64,
    outbound_dropped: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            connections_accepted: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            snapshots_broadcast: AtomicU64::new(0),
            commands_routed: AtomicU64::new(0),
            commands_unreachable: AtomicU64::new(0),
            signals_relayed: AtomicU64::new(0),
            signals_dropped: AtomicU64::new(0),
            malformed_messages: AtomicU64::new(0),
            outbound_dropped: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            snapshots_broadcast: self.snapshots_broadcast.load(Ordering::Relaxed),
            commands_routed: self.commands_routed.load(Ordering::Relaxed),
            commands_unreachable: self.commands_unreachable.load(Ordering::Relaxed),
            signals_relayed: self.signals_relayed.load(Ordering::Relaxed),
            signals_dropped: self.signals_dropped.load(Ordering::Relaxed),
            malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
            outbound_dropped: self.outbound_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录新建连接次数。
pub fn record_connection_accepted() {
    metrics()
        .connections_accepted
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录关闭连接次数。
pub fn record_connection_closed() {
    metrics().connections_closed.fetch_add(1, Ordering::Relaxed);
}

/// 记录快照广播次数（每次注册表变更一次，与观察者数量无关）。
pub fn record_snapshot_broadcast() {
    metrics()
        .snapshots_broadcast
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录命令成功转发次数（仅本地发送成功）。
pub fn record_command_routed() {
    metrics().commands_routed.fetch_add(1, Ordering::Relaxed);
}

/// 记录命令目标不可达次数。
pub fn record_command_unreachable() {
    metrics()
        .commands_unreachable
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_signal_relayed() {
    metrics().signals_relayed.fetch_add(1, Ordering::Relaxed);
}

pub fn record_signal_dropped() {
    metrics().signals_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录非法消息丢弃次数。
pub fn record_malformed_message() {
    metrics()
        .malformed_messages
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录出站队列已满导致的丢弃次数。
pub fn record_outbound_dropped() {
    metrics().outbound_dropped.fetch_add(1, Ordering::Relaxed);
}

//! 运维只读接口
//!
//! - GET /health
//! - GET /api/metrics
//! - GET /api/presence

use crate::AppState;
use crate::utils::response::ok;
use api_contract::{DeviceRecordDto, MetricsDto};
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use signage_telemetry::metrics;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    ok(MetricsDto {
        connections_accepted: snapshot.connections_accepted,
        connections_closed: snapshot.connections_closed,
        snapshots_broadcast: snapshot.snapshots_broadcast,
        commands_routed: snapshot.commands_routed,
        commands_unreachable: snapshot.commands_unreachable,
        signals_relayed: snapshot.signals_relayed,
        signals_dropped: snapshot.signals_dropped,
        malformed_messages: snapshot.malformed_messages,
        outbound_dropped: snapshot.outbound_dropped,
    })
}

/// 当前设备快照（与推送给观察者的内容一致）。
pub async fn get_presence(State(state): State<AppState>) -> Response {
    let records: Vec<DeviceRecordDto> = state
        .hub
        .registry()
        .snapshot()
        .iter()
        .map(DeviceRecordDto::from)
        .collect();
    ok(records)
}

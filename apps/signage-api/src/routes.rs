//! 路由定义
//!
//! - 健康检查与运维：/health, /api/metrics, /api/presence
//! - 长连接：/ws
//! - 轻量客户端轮询：/api/signage/*
//! - 素材：/api/assets/*
//! - 托管设备：/api/managed-devices/*

use super::AppState;
use super::handlers::*;
use super::ws::ws_handler;
use axum::{
    Router,
    routing::{get, post},
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/api/metrics", get(get_metrics))
        .route("/api/presence", get(get_presence))
        .route("/api/signage/current", get(get_current_media))
        .route("/api/signage/play", post(post_play))
        .route("/api/signage/stop", post(post_stop))
        .route("/api/assets", get(list_assets))
        .route("/api/assets/:asset_id", axum::routing::delete(delete_asset))
        .route("/api/assets/:asset_id/file", get(get_asset_file))
        .route("/api/managed-devices", get(list_managed_devices))
        .route("/api/managed-devices/:device_id/status", get(get_managed_status))
        .route("/api/managed-devices/:device_id/play-url", post(post_play_url))
}

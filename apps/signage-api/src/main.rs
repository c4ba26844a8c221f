//! 数字标牌协调服务：WebSocket 长连接 + 轻量 HTTP 接口与请求追踪 ID。

mod handlers;
mod routes;
mod utils;
mod ws;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use signage_assets::{
    DirectoryAssetStore, HttpManagedDeviceProxy, ManagedDevice, ManagedDeviceProxy,
    NoopManagedDeviceProxy,
};
use signage_config::AppConfig;
use signage_gateway::GatewayConfig;
use signage_hub::{Hub, HubConfig};
use signage_registry::DisconnectPolicy;
use signage_telemetry::{init_tracing, new_request_ids};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info};

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub managed: Arc<dyn ManagedDeviceProxy>,
    /// 请求头中没有 Host 时使用的基地址。
    pub fallback_base_url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 扫描素材目录建立素材库
    let assets = DirectoryAssetStore::open(&config.assets_dir).await?;

    let policy = if config.retain_offline_devices {
        DisconnectPolicy::RetainOffline
    } else {
        DisconnectPolicy::Delete
    };
    let hub = Arc::new(Hub::new(
        HubConfig {
            public_url: config.public_url.clone(),
            disconnect_policy: policy,
            gateway: GatewayConfig {
                outbound_buffer: config.outbound_buffer,
            },
        },
        Arc::new(assets),
    ));

    // 未配置托管设备时使用空代理
    let managed: Arc<dyn ManagedDeviceProxy> = if config.managed_devices.is_empty() {
        Arc::new(NoopManagedDeviceProxy)
    } else {
        let devices = config
            .managed_devices
            .iter()
            .map(|entry| ManagedDevice::new(entry.id.clone(), entry.base_url.clone()))
            .collect();
        Arc::new(HttpManagedDeviceProxy::new(
            devices,
            Duration::from_millis(config.managed_timeout_ms),
            Duration::from_millis(config.probe_timeout_ms),
        )?)
    };

    let state = AppState {
        hub,
        managed,
        fallback_base_url: fallback_base_url(&config.http_addr),
    };

    let app = routes::create_router()
        .with_state(state)
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(
        target: "signage.api",
        addr = %config.http_addr,
        assets_dir = %config.assets_dir,
        managed_devices = config.managed_devices.len(),
        "http_listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/// `0.0.0.0:3000` -> `http://localhost:3000`
fn fallback_base_url(http_addr: &str) -> String {
    let port = http_addr
        .rsplit(':')
        .next()
        .filter(|port| !port.is_empty())
        .unwrap_or("3000");
    format!("http://localhost:{}", port)
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    // 生成 request_id 与 trace_id，并注入请求扩展与日志
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    AppState {
        hub: Arc::new(Hub::new(
            HubConfig::default(),
            Arc::new(signage_assets::InMemoryAssetStore::new()),
        )),
        managed: Arc::new(NoopManagedDeviceProxy),
        fallback_base_url: "http://localhost:3000".to_string(),
    }
}

#[cfg(test)]
pub(crate) async fn body_json(response: Response) -> serde_json::Value {
    use http_body_util::BodyExt;
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json")
}

//! 素材接口
//!
//! - GET /api/assets
//! - GET /api/assets/{id}/file
//! - DELETE /api/assets/{id}

use crate::AppState;
use crate::utils::response::{internal_error, not_found_error, ok};
use api_contract::AssetDto;
use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::info;

pub async fn list_assets(State(state): State<AppState>) -> Response {
    match state.hub.assets().list().await {
        Ok(items) => ok(items
            .into_iter()
            .map(|meta| AssetDto {
                id: meta.id,
                name: meta.name,
                size: meta.size,
            })
            .collect::<Vec<_>>()),
        Err(err) => internal_error(err),
    }
}

fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "ogg" => "video/ogg",
        "mkv" => "video/x-matroska",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

pub async fn get_asset_file(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Response {
    match state.hub.assets().get(&asset_id).await {
        Ok(Some(asset)) => {
            let content_type = content_type_for(&asset.meta.name);
            let mut response = (StatusCode::OK, asset.bytes).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            response
        }
        Ok(None) => not_found_error(format!("asset {} not found", asset_id)),
        Err(err) => internal_error(err),
    }
}

pub async fn delete_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Response {
    match state.hub.assets().delete(&asset_id).await {
        Ok(true) => {
            info!(target: "signage.api", asset_id = %asset_id, "asset_deleted");
            ok(serde_json::json!({ "deleted": asset_id }))
        }
        Ok(false) => not_found_error(format!("asset {} not found", asset_id)),
        Err(err) => internal_error(err),
    }
}

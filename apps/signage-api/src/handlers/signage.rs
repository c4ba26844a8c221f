//! 轻量客户端播放意图接口
//!
//! 无法保持长连接的播放端轮询当前播放内容：
//! - GET /api/signage/current?player_id=X
//! - POST /api/signage/play
//! - POST /api/signage/stop
//!
//! `current` 直接返回裸 JSON（不包 ApiResponse），便于播放端脚本解析。

use crate::AppState;
use crate::utils::request_base_url;
use crate::utils::response::{bad_request_error, internal_error, not_found_error, ok};
use api_contract::{
    CurrentMediaDto, CurrentMediaQuery, SignagePlayRequest, SignagePlayResponse,
    SignageStopRequest,
};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use signage_hub::HubError;

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// 查询当前播放内容；没有 play 意图或素材已从库中删除时返回 204。
pub async fn get_current_media(
    State(state): State<AppState>,
    Query(query): Query<CurrentMediaQuery>,
) -> Response {
    let Some(player_id) = required(query.player_id) else {
        return bad_request_error("player_id is required");
    };
    let Some(intent) = state.hub.current_intent(&player_id) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    match state.hub.assets().exists(&intent.asset_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(CurrentMediaDto {
                url: intent.locator,
                asset_id: intent.asset_id,
                kind: intent.kind.as_str().to_string(),
            }),
        )
            .into_response(),
        Ok(false) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => internal_error(err),
    }
}

pub async fn post_play(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SignagePlayRequest>,
) -> Response {
    let (Some(player_id), Some(asset_id)) = (required(req.player_id), required(req.asset_id))
    else {
        return bad_request_error("playerId and assetId are required");
    };
    let base_url = request_base_url(&headers, &state.fallback_base_url);
    match state
        .hub
        .set_play_intent(&player_id, &asset_id, &base_url)
        .await
    {
        Ok(intent) => ok(SignagePlayResponse {
            url: intent.locator,
        }),
        Err(HubError::UnknownAsset(asset_id)) => {
            not_found_error(format!("asset {} not found", asset_id))
        }
        Err(err) => internal_error(err),
    }
}

pub async fn post_stop(
    State(state): State<AppState>,
    Json(req): Json<SignageStopRequest>,
) -> Response {
    let Some(player_id) = required(req.player_id) else {
        return bad_request_error("playerId is required");
    };
    let cleared = state.hub.clear_play_intent(&player_id);
    ok(serde_json::json!({ "cleared": cleared }))
}

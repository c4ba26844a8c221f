pub mod response;

use axum::http::{HeaderMap, header};

/// 由请求头推导外部可访问的基地址（`scheme://host`）。
///
/// 优先 `x-forwarded-proto`/`x-forwarded-host`，其次 `Host`，都没有时使用 `fallback`。
pub fn request_base_url(headers: &HeaderMap, fallback: &str) -> String {
    let forwarded = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let host = forwarded("x-forwarded-host").or_else(|| {
        headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    });
    match host {
        Some(host) => {
            let scheme = forwarded("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
            format!("{}://{}", scheme, host)
        }
        None => fallback.to_string(),
    }
}

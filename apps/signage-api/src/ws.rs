//! WebSocket 传输层
//!
//! 每个连接：出站队列由独立任务写回 socket，入站帧在当前任务中逐帧交给中枢，
//! 因此同一连接的上行消息按到达顺序处理。任一方向结束即关闭连接。

use crate::AppState;
use crate::utils::request_base_url;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use signage_hub::ConnectionContext;
use tracing::{Instrument, debug, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let base_url = request_base_url(&headers, &state.fallback_base_url);
    ws.on_upgrade(move |socket| handle_socket(socket, state, base_url))
}

async fn handle_socket(socket: WebSocket, state: AppState, request_base_url: String) {
    let (connection_id, mut outbound) = match state.hub.connect() {
        Ok(accepted) => accepted,
        Err(err) => {
            warn!(target: "signage.api", error = %err, "ws_accept_failed");
            return;
        }
    };
    let span = tracing::info_span!("connection", connection_id = %connection_id);
    let ctx = ConnectionContext {
        connection_id: connection_id.clone(),
        request_base_url,
    };

    async move {
        let (mut sink, mut stream) = socket.split();

        let mut send_task = tokio::spawn(
            async move {
                while let Some(message) = outbound.recv().await {
                    let text = match message.encode() {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(target: "signage.api", error = %err, "ws_encode_failed");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            }
            .in_current_span(),
        );

        let receive = async {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => state.hub.handle_text(&ctx, &text).await,
                    Ok(Message::Binary(_)) => state
                        .hub
                        .reject_malformed(&ctx.connection_id, "binary frames are not supported"),
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Ping(_) | Message::Pong(_)) => {}
                    Err(err) => {
                        debug!(target: "signage.api", error = %err, "ws_receive_error");
                        break;
                    }
                }
            }
        };

        info!(target: "signage.api", "ws_connected");
        tokio::select! {
            _ = receive => {}
            _ = &mut send_task => {}
        }
        state.hub.disconnect(&ctx.connection_id);
        send_task.abort();
        info!(target: "signage.api", "ws_disconnected");
    }
    .instrument(span)
    .await
}

//! # 信令中转
//!
//! 按连接 ID 在任意两个端点之间原样转发不透明的协商载荷。
//! 中转层不解析载荷，也不区分 offer/answer/candidate；
//! 目标不存在或发送失败时静默丢弃，不向发送方回报错误。
//!
//! 端点侧的协商进度与超时回退见 [`Negotiation`]。

mod error;
mod negotiation;

pub use error::RelayError;
pub use negotiation::{Fallback, Negotiation, NegotiationRole, NegotiationState};

use api_contract::ServerMessage;
use domain::ConnectionId;
use signage_gateway::ConnectionGateway;
use signage_telemetry::{record_signal_dropped, record_signal_relayed};
use std::sync::Arc;
use tracing::debug;

/// 中转结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// 已进入目标连接的出站队列。
    Delivered,
    /// 目标不可达，已丢弃。
    Dropped,
}

/// 信令中转。
#[derive(Clone)]
pub struct SignalingRelay {
    gateway: Arc<ConnectionGateway>,
}

impl SignalingRelay {
    pub fn new(gateway: Arc<ConnectionGateway>) -> Self {
        Self { gateway }
    }

    pub fn relay(
        &self,
        from: &ConnectionId,
        to: &ConnectionId,
        payload: serde_json::Value,
    ) -> RelayOutcome {
        let message = ServerMessage::SignalReceived {
            from_connection_id: from.to_string(),
            payload,
        };
        match self.gateway.send(to, message) {
            Ok(()) => {
                record_signal_relayed();
                debug!(
                    target: "signage.signaling",
                    from = %from,
                    to = %to,
                    "signal_relayed"
                );
                RelayOutcome::Delivered
            }
            Err(err) => {
                record_signal_dropped();
                debug!(
                    target: "signage.signaling",
                    from = %from,
                    to = %to,
                    error = %err,
                    "signal_dropped"
                );
                RelayOutcome::Dropped
            }
        }
    }
}

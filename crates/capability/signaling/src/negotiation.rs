//! 端点侧协商状态机。
//!
//! ```text
//! Idle ──local──► Offering ──remote──► Negotiating ──connected──► Connected
//!   │                 │                     ▲
//!   └─────remote──────┼─────────────────────┘
//!                     └──超时──► Closed（返回 Fallback::DirectUrl）
//! ```
//!
//! 任意非 Closed 状态都可 `close()`。非法迁移不修改状态。

use crate::RelayError;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    Offering,
    Negotiating,
    Connected,
    Closed,
}

/// 发起方先发出首个载荷；应答方先收到首个载荷。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    Initiator,
    Responder,
}

/// 协商失败时的替代投递方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// 直接按素材地址播放。
    DirectUrl,
}

#[derive(Debug, Clone)]
pub struct Negotiation {
    state: NegotiationState,
    role: Option<NegotiationRole>,
    answer_timeout: Duration,
    offered_at: Option<Instant>,
}

impl Negotiation {
    pub fn new(answer_timeout: Duration) -> Self {
        Self {
            state: NegotiationState::Idle,
            role: None,
            answer_timeout,
            offered_at: None,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// 首个载荷的方向决定角色；Idle 时为 `None`。
    pub fn role(&self) -> Option<NegotiationRole> {
        self.role
    }

    /// 本端发出一个载荷。
    pub fn local_payload(&mut self, now: Instant) -> Result<NegotiationState, RelayError> {
        match self.state {
            NegotiationState::Idle => {
                self.role = Some(NegotiationRole::Initiator);
                self.offered_at = Some(now);
                self.state = NegotiationState::Offering;
            }
            NegotiationState::Offering
            | NegotiationState::Negotiating
            | NegotiationState::Connected => {}
            NegotiationState::Closed => return Err(self.invalid("local_payload")),
        }
        Ok(self.state)
    }

    /// 收到对端的一个载荷。
    pub fn remote_payload(&mut self) -> Result<NegotiationState, RelayError> {
        match self.state {
            NegotiationState::Idle => {
                self.role = Some(NegotiationRole::Responder);
                self.state = NegotiationState::Negotiating;
            }
            NegotiationState::Offering => self.state = NegotiationState::Negotiating,
            NegotiationState::Negotiating | NegotiationState::Connected => {}
            NegotiationState::Closed => return Err(self.invalid("remote_payload")),
        }
        Ok(self.state)
    }

    /// 本地链路建立。
    pub fn connected(&mut self) -> Result<NegotiationState, RelayError> {
        match self.state {
            NegotiationState::Negotiating => self.state = NegotiationState::Connected,
            NegotiationState::Connected => {}
            _ => return Err(self.invalid("connected")),
        }
        Ok(self.state)
    }

    pub fn close(&mut self) -> NegotiationState {
        self.state = NegotiationState::Closed;
        self.state
    }

    /// 发起方在 Offering 停留超过应答超时后回退，只触发一次。
    pub fn check_timeout(&mut self, now: Instant) -> Option<Fallback> {
        if self.state != NegotiationState::Offering {
            return None;
        }
        let offered_at = self.offered_at?;
        if now.saturating_duration_since(offered_at) < self.answer_timeout {
            return None;
        }
        self.state = NegotiationState::Closed;
        Some(Fallback::DirectUrl)
    }

    fn invalid(&self, event: &'static str) -> RelayError {
        RelayError::InvalidTransition {
            from: self.state,
            event,
        }
    }
}

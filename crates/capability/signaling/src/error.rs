use crate::NegotiationState;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid transition from {from:?} on {event}")]
    InvalidTransition {
        from: NegotiationState,
        event: &'static str,
    },
}

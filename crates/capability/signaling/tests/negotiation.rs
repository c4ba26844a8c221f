use signage_signaling::{Fallback, Negotiation, NegotiationRole, NegotiationState, RelayError};
use std::time::{Duration, Instant};

#[test]
fn initiator_walks_through_every_state() {
    let start = Instant::now();
    let mut negotiation = Negotiation::new(Duration::from_secs(5));
    assert_eq!(negotiation.state(), NegotiationState::Idle);

    assert_eq!(
        negotiation.local_payload(start).expect("offer"),
        NegotiationState::Offering
    );
    assert_eq!(negotiation.role(), Some(NegotiationRole::Initiator));
    assert_eq!(
        negotiation.local_payload(start).expect("candidate"),
        NegotiationState::Offering
    );
    assert_eq!(
        negotiation.remote_payload().expect("answer"),
        NegotiationState::Negotiating
    );
    assert_eq!(
        negotiation.connected().expect("connected"),
        NegotiationState::Connected
    );
    assert_eq!(negotiation.close(), NegotiationState::Closed);
}

#[test]
fn missing_answer_falls_back_to_direct_url_once() {
    let start = Instant::now();
    let mut negotiation = Negotiation::new(Duration::from_secs(5));
    negotiation.local_payload(start).expect("offer");

    assert_eq!(negotiation.check_timeout(start + Duration::from_secs(4)), None);
    assert_eq!(
        negotiation.check_timeout(start + Duration::from_secs(5)),
        Some(Fallback::DirectUrl)
    );
    assert_eq!(negotiation.state(), NegotiationState::Closed);
    assert_eq!(negotiation.check_timeout(start + Duration::from_secs(6)), None);
}

#[test]
fn answer_in_time_disarms_fallback() {
    let start = Instant::now();
    let mut negotiation = Negotiation::new(Duration::from_secs(5));
    negotiation.local_payload(start).expect("offer");
    negotiation.remote_payload().expect("answer");

    assert_eq!(negotiation.check_timeout(start + Duration::from_secs(30)), None);
    assert_eq!(negotiation.state(), NegotiationState::Negotiating);
}

#[test]
fn connected_without_answer_is_rejected_without_mutation() {
    let start = Instant::now();
    let mut negotiation = Negotiation::new(Duration::from_secs(5));
    negotiation.local_payload(start).expect("offer");

    let err = negotiation.connected().expect_err("invalid");

    assert!(matches!(
        err,
        RelayError::InvalidTransition {
            from: NegotiationState::Offering,
            event: "connected"
        }
    ));
    assert_eq!(negotiation.state(), NegotiationState::Offering);
}

#[test]
fn closed_rejects_further_payloads() {
    let mut negotiation = Negotiation::new(Duration::from_secs(5));
    negotiation.close();

    assert!(negotiation.local_payload(Instant::now()).is_err());
    assert!(negotiation.remote_payload().is_err());
    assert_eq!(negotiation.state(), NegotiationState::Closed);
}

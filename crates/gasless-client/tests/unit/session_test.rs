//! Session definitions and local state transitions

use alloy_primitives::Address;
use gasless_client::{ClientState, SessionManager, participant_order};
use gasless_core::Error;
use std::time::Duration;

#[test]
fn test_definition_independent_of_proposer() {
    let manager = SessionManager::new("NitroRPC/0.2", Duration::from_secs(1));
    let a: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
    let b: Address = "0x00000000000000000000000000000000000000bb".parse().unwrap();

    let from_a = manager.definition(a, b, 42);
    let from_b = manager.definition(b, a, 42);
    assert_eq!(from_a, from_b);
    assert_eq!(from_a.participants, participant_order(a, b).to_vec());
    assert_eq!(from_a.participants[0], a);
}

#[test]
fn test_fresh_state_is_unauthenticated() {
    let mut state = ClientState::new();
    assert!(!state.is_authenticated());
    assert!(state.session().is_none());
    assert!(!state.session_active());
    assert!(matches!(state.require_auth(1, 0), Err(Error::NotAuthenticated)));
    assert!(state.close_session().is_none());
}

#[test]
fn test_disconnect_on_fresh_state_is_noop() {
    let mut state = ClientState::new();
    state.on_disconnect(1);
    state.observe_epoch(2);
    assert_eq!(state.auth_phase().name(), "idle");
}

use bedconsole_core::{update, AppState, Msg};

#[test]
fn update_is_noop() {
    let state = AppState::new();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn fresh_state_is_settled_and_clean() {
    let mut state = AppState::new();
    assert!(state.is_settled());
    assert!(!state.consume_dirty());
    assert!(state.view().jobs.is_empty());
}

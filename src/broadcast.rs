use crate::state::AppState;

/// Spawn a background task that starts the round after `after_round` once
/// the result has been on screen for the configured delay
pub fn spawn_next_round(state: AppState, after_round: u32) {
    let delay = state.next_round_delay();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        tracing::debug!("Next-round timer fired for round {}", after_round);
        state.advance_after(after_round).await;
    });
}

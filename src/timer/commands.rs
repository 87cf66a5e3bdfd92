use crate::{
    timer::{minutes_from_input, IntervalController, IntervalSnapshot, Phase},
    AppState,
};

fn controller_from_state(state: &AppState) -> IntervalController {
    state.timer.clone()
}

pub async fn get_timer_state(state: &AppState) -> Result<IntervalSnapshot, String> {
    Ok(controller_from_state(state).snapshot().await)
}

pub async fn start_timer(state: &AppState) -> Result<IntervalSnapshot, String> {
    Ok(controller_from_state(state).start().await)
}

pub async fn pause_timer(state: &AppState) -> Result<IntervalSnapshot, String> {
    Ok(controller_from_state(state).pause().await)
}

pub async fn reset_timer(state: &AppState) -> Result<IntervalSnapshot, String> {
    Ok(controller_from_state(state).reset().await)
}

/// Takes the raw user entry; junk falls back to the phase default.
pub async fn set_phase_length(
    state: &AppState,
    phase: Phase,
    minutes: &str,
) -> Result<IntervalSnapshot, String> {
    let minutes = minutes_from_input(phase, minutes);
    Ok(controller_from_state(state)
        .set_phase_length(phase, minutes)
        .await)
}

pub async fn switch_phase(state: &AppState, phase: Phase) -> Result<IntervalSnapshot, String> {
    Ok(controller_from_state(state).switch_phase(phase).await)
}

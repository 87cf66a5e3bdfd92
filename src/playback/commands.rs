use crate::{
    catalog::Track,
    playback::{coordinator::ChannelStatus, Category},
    AppState,
};

pub async fn play_track(state: &AppState, category: Category) -> Result<ChannelStatus, String> {
    let mut playback = state.playback.lock().await;
    if !playback.play(category) {
        return Err(format!(
            "{} source unavailable, try again",
            category.as_str()
        ));
    }
    Ok(playback.status(category))
}

pub async fn pause_track(state: &AppState, category: Category) -> Result<ChannelStatus, String> {
    let mut playback = state.playback.lock().await;
    playback.pause(category);
    Ok(playback.status(category))
}

pub async fn stop_track(state: &AppState, category: Category) -> Result<ChannelStatus, String> {
    let mut playback = state.playback.lock().await;
    playback.stop(category);
    Ok(playback.status(category))
}

pub async fn next_track(state: &AppState, category: Category) -> Result<ChannelStatus, String> {
    let mut playback = state.playback.lock().await;
    playback.advance(category);
    Ok(playback.status(category))
}

/// `position` counts from 1 the way the track list is printed.
pub async fn select_track(
    state: &AppState,
    category: Category,
    position: usize,
) -> Result<ChannelStatus, String> {
    if position == 0 {
        return Err("track numbers start at 1".into());
    }
    let mut playback = state.playback.lock().await;
    playback.select_track(category, position - 1);
    Ok(playback.status(category))
}

pub async fn toggle_mute(state: &AppState, category: Category) -> Result<ChannelStatus, String> {
    let mut playback = state.playback.lock().await;
    playback.toggle_mute(category);
    Ok(playback.status(category))
}

pub async fn now_playing(state: &AppState, category: Category) -> Result<ChannelStatus, String> {
    Ok(state.playback.lock().await.status(category))
}

pub async fn list_tracks(state: &AppState, category: Category) -> Result<Vec<Track>, String> {
    Ok(state
        .playback
        .lock()
        .await
        .catalog(category)
        .tracks()
        .to_vec())
}

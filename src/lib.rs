pub mod audio;
pub mod catalog;
pub mod console;
pub mod db;
pub mod playback;
pub mod quotes;
pub mod settings;
pub mod timer;
mod utils;

use std::{
    fs,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use audio::{
    noise::NoiseColor, track::TrackEngineHandle, AudioEngineHandle, NoiseOutput, NoiseSession,
    NoiseSynthesizer,
};
use catalog::{initial_speech_catalog, CatalogController, CatalogResolver, CatalogState, HttpMetadataSource};
use db::{keys, store::SharedStore, Database};
use log::{debug, info, warn};
use playback::{AudioSink, Category, PlaybackCoordinator};
use quotes::{Quote, QuoteDeck};
use settings::SettingsStore;
use timer::{IntervalController, IntervalEvent};
use tokio::sync::{broadcast::error::RecvError, mpsc, Mutex as AsyncMutex};

pub struct AppState {
    pub(crate) timer: IntervalController,
    pub(crate) noise: Arc<Mutex<NoiseSynthesizer<Box<dyn NoiseOutput>>>>,
    pub(crate) playback: Arc<AsyncMutex<PlaybackCoordinator>>,
    pub(crate) catalog: AsyncMutex<CatalogController<HttpMetadataSource>>,
    pub(crate) quotes: Mutex<QuoteDeck>,
    pub(crate) settings: SettingsStore,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        settings: SettingsStore,
        noise_output: Box<dyn NoiseOutput>,
        music_sink: Box<dyn AudioSink>,
        speech_sink: Box<dyn AudioSink>,
    ) -> Self {
        let timer = IntervalController::new(
            store.clone(),
            Duration::from_millis(settings.tick_interval_ms()),
        );

        let catalog_settings = settings.catalog();
        let speech = initial_speech_catalog(&*store, &catalog_settings.catalog_id);
        let playback = Arc::new(AsyncMutex::new(PlaybackCoordinator::new(
            store.clone(),
            CatalogState::music(),
            speech,
            music_sink,
            speech_sink,
        )));

        let resolver = CatalogResolver::new(
            HttpMetadataSource::new(catalog_settings.base_url.clone()),
            catalog_settings.base_url,
            catalog_settings.catalog_id,
        );
        let catalog = CatalogController::new(resolver, playback.clone(), store.clone());

        Self {
            timer,
            noise: Arc::new(Mutex::new(NoiseSynthesizer::new(noise_output))),
            playback,
            catalog: AsyncMutex::new(catalog),
            quotes: Mutex::new(QuoteDeck::new(store)),
            settings,
        }
    }
}

/// Opening the output device blocks, so it runs off the runtime thread.
pub async fn start_noise(state: &AppState, color: NoiseColor) -> Result<NoiseSession, String> {
    let noise = state.noise.clone();
    tokio::task::spawn_blocking(move || {
        let mut noise = noise.lock().map_err(|e| e.to_string())?;
        noise.start(color).map_err(|e| e.to_string())?;
        Ok(noise.session())
    })
    .await
    .map_err(|e| format!("noise task failed: {e}"))?
}

pub fn stop_noise(state: &AppState) -> Result<NoiseSession, String> {
    let mut noise = state.noise.lock().map_err(|e| e.to_string())?;
    noise.stop().map_err(|e| e.to_string())?;
    Ok(noise.session())
}

pub fn current_quote(state: &AppState) -> Result<Quote, String> {
    let quotes = state.quotes.lock().map_err(|e| e.to_string())?;
    Ok(quotes.current())
}

pub fn next_quote(state: &AppState) -> Result<Quote, String> {
    let mut quotes = state.quotes.lock().map_err(|e| e.to_string())?;
    Ok(quotes.next())
}

/// Returns `false` when a refresh is already running.
pub async fn refresh_catalog(state: &AppState) -> Result<bool, String> {
    Ok(state.catalog.lock().await.refresh())
}

pub fn run() -> Result<()> {
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // RUST_LOG, when set, overrides the default level
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    info!("FocusFlow starting up...");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?
        .block_on(serve())
}

async fn serve() -> Result<()> {
    let data_dir = settings::data_dir()?;
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let settings_store = SettingsStore::new(data_dir.join("settings.json"))?;
    let store: SharedStore = Arc::new(Database::new(data_dir.join("focusflow.sqlite3"))?);

    if let Err(err) = keys::prune_legacy_keys(&*store) {
        warn!("Legacy key cleanup failed: {err:#}");
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let music_sink = TrackEngineHandle::spawn(Category::Music, event_tx.clone())?;
    let speech_sink = TrackEngineHandle::spawn(Category::Speech, event_tx)?;

    let state = AppState::new(
        store,
        settings_store,
        Box::new(AudioEngineHandle::new()),
        Box::new(music_sink),
        Box::new(speech_sink),
    );
    debug!("Settings loaded from {}", state.settings.path().display());

    state.timer.resume_if_running().await;
    state.catalog.lock().await.refresh();

    let playback = state.playback.clone();
    let event_pump = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            playback.lock().await.handle_event(event);
        }
    });

    let mut phases = state.timer.subscribe();
    let phase_log = tokio::spawn(async move {
        loop {
            match phases.recv().await {
                Ok(IntervalEvent::PhaseChanged { from, to }) => {
                    info!("Phase {} -> {}", from.as_str(), to.as_str());
                }
                Ok(IntervalEvent::StateChanged(_)) => {}
                Err(RecvError::Lagged(skipped)) => debug!("Phase log skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome = console::run_console(&state).await;

    state.catalog.lock().await.shutdown().await;
    state.timer.shutdown().await;
    if let Err(err) = stop_noise(&state) {
        warn!("Failed to stop noise on exit: {err}");
    }
    event_pump.abort();
    phase_log.abort();

    info!("FocusFlow shut down");
    outcome
}

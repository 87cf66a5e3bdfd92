use std::io::Cursor;
use std::sync::{
    mpsc::{self, Receiver, RecvTimeoutError, Sender},
    Arc,
};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tokio::sync::mpsc::UnboundedSender;

use crate::playback::{AudioSink, Category, PlaybackError, PlaybackEvent};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// How often the engine thread checks whether the current track ran out.
const END_POLL_INTERVAL: Duration = Duration::from_millis(250);

enum TrackCommand {
    Load(String),
    Play,
    Pause,
    Seek(Duration),
    SetMuted(bool),
}

/// Plays remote tracks for one category on a dedicated thread. Tracks are
/// fetched lazily on the first `play` after a `load`.
pub struct TrackEngineHandle {
    tx: Sender<TrackCommand>,
}

impl TrackEngineHandle {
    pub fn spawn(category: Category, events: UnboundedSender<PlaybackEvent>) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<TrackCommand>();

        thread::Builder::new()
            .name(format!("{}-engine", category.as_str()))
            .spawn(move || TrackPlayer::new(category, events).run(rx))
            .context("failed to spawn track engine thread")?;

        Ok(Self { tx })
    }

    fn send(&self, command: TrackCommand) -> Result<(), PlaybackError> {
        self.tx
            .send(command)
            .map_err(|e| PlaybackError::SourceUnavailable(format!("track engine stopped: {e}")))
    }
}

impl AudioSink for TrackEngineHandle {
    fn load(&mut self, url: &str) -> Result<(), PlaybackError> {
        self.send(TrackCommand::Load(url.to_string()))
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        self.send(TrackCommand::Play)
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.send(TrackCommand::Pause)
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<(), PlaybackError> {
        let position = Duration::try_from_secs_f64(seconds.max(0.0))
            .map_err(|e| PlaybackError::SourceUnavailable(format!("invalid position: {e}")))?;
        self.send(TrackCommand::Seek(position))
    }

    fn set_muted(&mut self, muted: bool) -> Result<(), PlaybackError> {
        self.send(TrackCommand::SetMuted(muted))
    }
}

struct TrackPlayer {
    category: Category,
    events: UnboundedSender<PlaybackEvent>,
    client: Option<reqwest::blocking::Client>,
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    url: Option<String>,
    bytes: Option<Arc<[u8]>>,
    muted: bool,
    playing: bool,
}

impl TrackPlayer {
    fn new(category: Category, events: UnboundedSender<PlaybackEvent>) -> Self {
        Self {
            category,
            events,
            client: None,
            output: None,
            sink: None,
            url: None,
            bytes: None,
            muted: false,
            playing: false,
        }
    }

    fn run(mut self, rx: Receiver<TrackCommand>) {
        loop {
            match rx.recv_timeout(END_POLL_INTERVAL) {
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => self.poll_ended(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.drop_sink();
        log_info!("{} engine shutting down", self.category.as_str());
    }

    fn handle(&mut self, command: TrackCommand) {
        match command {
            TrackCommand::Load(url) => {
                self.drop_sink();
                self.bytes = None;
                self.url = Some(url);
            }
            TrackCommand::Play => {
                if let Err(err) = self.play() {
                    self.playing = false;
                    log_warn!("{} playback unavailable: {err:#}", self.category.as_str());
                    let _ = self.events.send(PlaybackEvent::SourceUnavailable(
                        self.category,
                        format!("{err:#}"),
                    ));
                }
            }
            TrackCommand::Pause => {
                self.playing = false;
                if let Some(sink) = &self.sink {
                    sink.pause();
                }
            }
            TrackCommand::Seek(position) => self.seek(position),
            TrackCommand::SetMuted(muted) => {
                self.muted = muted;
                if let Some(sink) = &self.sink {
                    sink.set_volume(self.volume());
                }
            }
        }
    }

    fn volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            1.0
        }
    }

    fn play(&mut self) -> Result<()> {
        if self.sink.is_none() {
            self.build_sink()?;
        }
        if let Some(sink) = &self.sink {
            sink.play();
            self.playing = true;
        }
        Ok(())
    }

    fn seek(&mut self, position: Duration) {
        let Some(sink) = &self.sink else {
            return;
        };
        if sink.try_seek(position).is_ok() {
            return;
        }
        if !position.is_zero() {
            log_warn!("{} track does not support seeking", self.category.as_str());
            return;
        }

        // Decoders without seek support get rewound by decoding afresh.
        let resume = self.playing;
        self.drop_sink();
        match self.build_sink() {
            Ok(()) if resume => {
                if let Some(sink) = &self.sink {
                    sink.play();
                    self.playing = true;
                }
            }
            Ok(()) => {}
            Err(err) => log_error!("{} rewind failed: {err:#}", self.category.as_str()),
        }
    }

    /// Creates a paused sink holding the current track.
    fn build_sink(&mut self) -> Result<()> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| anyhow!("no track loaded"))?;

        let bytes = match self.bytes.clone() {
            Some(bytes) => bytes,
            None => {
                let fetched = self.fetch(&url)?;
                self.bytes = Some(fetched.clone());
                fetched
            }
        };

        let decoder =
            Decoder::new(Cursor::new(bytes)).with_context(|| format!("failed to decode {url}"))?;

        if self.output.is_none() {
            let output = OutputStream::try_default()
                .map_err(|e| anyhow!("Failed to create audio output stream: {e}"))?;
            self.output = Some(output);
        }
        let handle = match &self.output {
            Some((_, handle)) => handle,
            None => return Err(anyhow!("audio output unavailable")),
        };

        let sink = Sink::try_new(handle).map_err(|e| anyhow!("Failed to create audio sink: {e}"))?;
        sink.pause();
        sink.set_volume(self.volume());
        sink.append(decoder);
        self.sink = Some(sink);
        Ok(())
    }

    fn fetch(&mut self, url: &str) -> Result<Arc<[u8]>> {
        let client = self.client.get_or_insert_with(reqwest::blocking::Client::new);
        log_info!("Fetching {} track {url}", self.category.as_str());
        let response = client
            .get(url)
            .send()
            .with_context(|| format!("request for {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} returned an error status"))?;
        let body = response
            .bytes()
            .with_context(|| format!("failed to read {url}"))?;
        Ok(Arc::from(body.as_ref()))
    }

    fn poll_ended(&mut self) {
        let finished = self.playing && self.sink.as_ref().is_some_and(|sink| sink.empty());
        if !finished {
            return;
        }
        self.playing = false;
        self.drop_sink();
        let _ = self.events.send(PlaybackEvent::Ended(self.category));
    }

    fn drop_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.playing = false;
    }
}

pub mod commands;
pub mod coordinator;

pub use coordinator::PlaybackCoordinator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::keys;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Music,
    Speech,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Music => "music",
            Category::Speech => "speech",
        }
    }

    pub fn parse(value: &str) -> Option<Category> {
        match value.trim().to_ascii_lowercase().as_str() {
            "music" => Some(Category::Music),
            "speech" | "speeches" => Some(Category::Speech),
            _ => None,
        }
    }

    pub(crate) fn index_key(&self) -> &'static str {
        match self {
            Category::Music => keys::MUSIC_TRACK,
            Category::Speech => keys::SPEECH_INDEX,
        }
    }

    pub(crate) fn muted_key(&self) -> &'static str {
        match self {
            Category::Music => keys::MUSIC_MUTED,
            Category::Speech => keys::SPEECH_MUTED,
        }
    }
}

/// Notifications raised by audio sinks outside the command path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The loaded track played to its end.
    Ended(Category),
    /// The loaded track could not be fetched or decoded.
    SourceUnavailable(Category, String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("playback source unavailable: {0}")]
    SourceUnavailable(String),
}

/// One "now playing" slot. Implementations report natural track completion
/// through [`PlaybackEvent::Ended`].
pub trait AudioSink: Send {
    fn load(&mut self, url: &str) -> Result<(), PlaybackError>;
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self) -> Result<(), PlaybackError>;
    fn set_current_time(&mut self, seconds: f64) -> Result<(), PlaybackError>;
    fn set_muted(&mut self, muted: bool) -> Result<(), PlaybackError>;
}

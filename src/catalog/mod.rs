pub mod controller;
pub mod resolver;

pub use controller::CatalogController;
pub use resolver::{CatalogError, CatalogResolver, HttpMetadataSource, MetadataSource};

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::{
    db::{keys, store, KvStore},
    settings::{DEFAULT_CATALOG_BASE_URL, DEFAULT_CATALOG_ID},
};

/// Characters left alone by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const AUDIO_EXTENSION: &str = ".mp3";

const MUSIC: &[(&str, &str)] = &[
    (
        "Lo-fi Stream (sample)",
        "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3",
    ),
    (
        "Piano Ambient (sample)",
        "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-2.mp3",
    ),
];

const FALLBACK_SPEECH_FILES: &[&str] = &[
    "DO IT FOR YOU - Motivational Speech.mp3",
    "DO IT FOR YOU - Powerful Motivational Speech.mp3",
    "DO IT FOR YOU (Best Motivational Speeches EVER!)-1.mp3",
    "DO IT FOR YOU (Best Motivational Speeches EVER!).mp3",
    "DO IT FOR YOU (Best Self Discipline Motivational Speech).mp3",
    "DO NOT FEAR _ Believe in Yourself - Inspirational & Motivational Speech.mp3",
    "DO NOT FEAR _ Believe in Yourself - Inspirational & Motivational Video.mp3",
    "DON'T WASTE ANOTHER YEAR _ Best Motivational Speech.mp3",
    "DON'T WASTE ANOTHER YEAR!!! - Best Motivational Speech.mp3",
    "DON'T WASTE YOUR LIFE _ Morning Motivation _ Motivational Speech 2022.mp3",
    "WATCH THIS EVERYDAY AND CHANGE YOUR LIFE - Best Motivational Speech 2021.mp3",
    "WHEN IT HURTS - Best Motivational Speech 2020.mp3",
    "WHEN LIFE BREAKS YOU (Best Self Discipline Motivational Speech).mp3",
    "WINNERS NEVER GIVE UP - Best Motivational Speech.mp3",
    "YOU VS YOU __ Best Self Discipline Motivational Speech.mp3",
    "YOU WILL GET THROUGH THIS - Powerful Motivational Speech 2020.mp3",
    "You Will NEVER BE LAZY Again _ Best Motivational Speech 2022.mp3",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub url: String,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

pub fn is_audio_file(name: &str) -> bool {
    name.to_lowercase().ends_with(AUDIO_EXTENSION)
}

/// Human-readable title: underscores become spaces and a trailing `.mp3`
/// (any case) is dropped.
pub fn display_title(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let cut = spaced.len().saturating_sub(AUDIO_EXTENSION.len());
    match spaced.get(cut..) {
        Some(tail) if tail.eq_ignore_ascii_case(AUDIO_EXTENSION) => spaced[..cut].to_string(),
        _ => spaced,
    }
}

pub fn download_url(base_url: &str, catalog_id: &str, file_name: &str) -> String {
    format!(
        "{}/download/{}/{}",
        base_url.trim_end_matches('/'),
        utf8_percent_encode(catalog_id, URI_COMPONENT),
        utf8_percent_encode(file_name, URI_COMPONENT)
    )
}

pub fn metadata_url(base_url: &str, catalog_id: &str) -> String {
    format!(
        "{}/metadata/{}",
        base_url.trim_end_matches('/'),
        utf8_percent_encode(catalog_id, URI_COMPONENT)
    )
}

pub fn music_tracks() -> Vec<Track> {
    MUSIC
        .iter()
        .map(|(title, url)| Track::new(*title, *url))
        .collect()
}

/// The bundled, always-available speech list.
pub fn fallback_speech_tracks() -> Vec<Track> {
    FALLBACK_SPEECH_FILES
        .iter()
        .map(|name| {
            Track::new(
                display_title(name),
                download_url(DEFAULT_CATALOG_BASE_URL, DEFAULT_CATALOG_ID, name),
            )
        })
        .collect()
}

/// Ordered, never-empty track list plus the selected position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogState {
    tracks: Vec<Track>,
    selected_index: usize,
}

impl CatalogState {
    /// `None` for an empty list.
    pub fn new(tracks: Vec<Track>) -> Option<Self> {
        if tracks.is_empty() {
            return None;
        }
        Some(Self {
            tracks,
            selected_index: 0,
        })
    }

    pub fn music() -> Self {
        Self {
            tracks: music_tracks(),
            selected_index: 0,
        }
    }

    pub fn fallback() -> Self {
        Self {
            tracks: fallback_speech_tracks(),
            selected_index: 0,
        }
    }

    pub fn with_selection(mut self, index: usize) -> Self {
        self.select(index);
        self
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn selected(&self) -> &Track {
        &self.tracks[self.selected_index]
    }

    /// Selects `index` modulo the list length and returns the stored index.
    pub fn select(&mut self, index: usize) -> usize {
        self.selected_index = index % self.tracks.len();
        self.selected_index
    }

    pub fn advance(&mut self) -> usize {
        self.select(self.selected_index + 1)
    }

    /// Swaps in a new list, keeping the selection in range. Empty lists are
    /// refused and leave the current catalog untouched.
    pub fn replace(&mut self, tracks: Vec<Track>) -> bool {
        if tracks.is_empty() {
            return false;
        }
        self.selected_index %= tracks.len();
        self.tracks = tracks;
        true
    }
}

/// Last successful remote resolution, kept so a restart can start from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub catalog_id: String,
    pub fetched_at: DateTime<Utc>,
    pub tracks: Vec<Track>,
}

pub fn save_snapshot(kv: &dyn KvStore, catalog_id: &str, tracks: &[Track]) {
    let snapshot = CatalogSnapshot {
        catalog_id: catalog_id.to_string(),
        fetched_at: Utc::now(),
        tracks: tracks.to_vec(),
    };
    store::save(kv, keys::SPEECH_CATALOG, &snapshot);
}

/// Speech catalog to start with: the stored snapshot for `catalog_id` when
/// there is one, otherwise the bundled list.
pub fn initial_speech_catalog(kv: &dyn KvStore, catalog_id: &str) -> CatalogState {
    store::load::<CatalogSnapshot>(kv, keys::SPEECH_CATALOG)
        .filter(|snapshot| snapshot.catalog_id == catalog_id)
        .and_then(|snapshot| CatalogState::new(snapshot.tracks))
        .unwrap_or_else(CatalogState::fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track::new(format!("t{i}"), format!("https://example.test/{i}.mp3")))
            .collect()
    }

    #[test]
    fn fallback_has_seventeen_clean_titles() {
        let fallback = fallback_speech_tracks();
        assert_eq!(fallback.len(), 17);
        for track in &fallback {
            assert!(!track.title.contains('_'), "{}", track.title);
            assert!(!track.title.to_lowercase().ends_with(".mp3"), "{}", track.title);
            assert!(track
                .url
                .starts_with("https://archive.org/download/motivational-speech/"));
        }
        assert_eq!(fallback[0].title, "DO IT FOR YOU - Motivational Speech");
    }

    #[test]
    fn titles_strip_extension_and_underscores() {
        assert_eq!(display_title("Morning_Routine.MP3"), "Morning Routine");
        assert_eq!(display_title("a_b_c.mp3"), "a b c");
        assert_eq!(display_title("no extension"), "no extension");
        assert_eq!(display_title("mp3"), "mp3");
        assert_eq!(display_title("ünïcode_talk.mp3"), "ünïcode talk");
    }

    #[test]
    fn urls_encode_like_uri_components() {
        assert_eq!(
            download_url("https://archive.org/", "motivational-speech", "DON'T WASTE _ It & (Now)!.mp3"),
            "https://archive.org/download/motivational-speech/DON'T%20WASTE%20_%20It%20%26%20(Now)!.mp3"
        );
        assert_eq!(
            metadata_url("https://archive.org", "motivational-speech"),
            "https://archive.org/metadata/motivational-speech"
        );
    }

    #[test]
    fn audio_extension_check_ignores_case() {
        assert!(is_audio_file("talk.MP3"));
        assert!(is_audio_file("talk.mp3"));
        assert!(!is_audio_file("talk.mp3.txt"));
        assert!(!is_audio_file("cover.jpg"));
    }

    #[test]
    fn empty_catalog_is_refused() {
        assert!(CatalogState::new(Vec::new()).is_none());

        let mut state = CatalogState::new(tracks(3)).unwrap();
        assert!(!state.replace(Vec::new()));
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn selection_wraps_on_advance_and_select() {
        let mut state = CatalogState::new(tracks(3)).unwrap();
        assert_eq!(state.advance(), 1);
        assert_eq!(state.advance(), 2);
        assert_eq!(state.advance(), 0);
        assert_eq!(state.select(7), 1);
        assert_eq!(state.selected().title, "t1");
    }

    #[test]
    fn replacement_keeps_selection_in_range() {
        let mut state = CatalogState::new(tracks(17)).unwrap().with_selection(16);
        let sizes = [3, 40, 1, 5, 17, 2, 9];

        for size in sizes {
            let previous = state.selected_index();
            assert!(state.replace(tracks(size)));
            assert_eq!(state.selected_index(), previous % size);
            assert!(state.selected_index() < state.len());
        }
    }

    #[test]
    fn initial_catalog_prefers_matching_snapshot() {
        let store = MemoryStore::new();
        assert_eq!(initial_speech_catalog(&store, "motivational-speech").len(), 17);

        save_snapshot(&store, "motivational-speech", &tracks(4));
        assert_eq!(initial_speech_catalog(&store, "motivational-speech").len(), 4);
        assert_eq!(initial_speech_catalog(&store, "other-id").len(), 17);

        store.set(keys::SPEECH_CATALOG, "{ broken").unwrap();
        assert_eq!(initial_speech_catalog(&store, "motivational-speech").len(), 17);
    }
}

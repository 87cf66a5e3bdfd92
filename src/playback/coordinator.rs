use log::{info, warn};
use serde::Serialize;

use super::{AudioSink, Category, PlaybackEvent};
use crate::{
    catalog::{CatalogState, Track},
    db::{store, store::SharedStore, KvStore},
};

struct Channel {
    category: Category,
    catalog: CatalogState,
    muted: bool,
    playing: bool,
    sink: Box<dyn AudioSink>,
}

impl Channel {
    /// Points the sink at the selected track. Loading always drops whatever
    /// was playing.
    fn reload(&mut self) {
        self.playing = false;
        let url = self.catalog.selected().url.clone();
        if let Err(err) = self.sink.load(&url) {
            warn!("{} load failed: {err}", self.category.as_str());
        }
    }

    fn rewind(&mut self) {
        self.playing = false;
        if let Err(err) = self.sink.pause() {
            warn!("{} pause failed: {err}", self.category.as_str());
        }
        if let Err(err) = self.sink.set_current_time(0.0) {
            warn!("{} seek failed: {err}", self.category.as_str());
        }
    }

    fn play(&mut self) -> bool {
        match self.sink.play() {
            Ok(()) => {
                self.playing = true;
                true
            }
            Err(err) => {
                warn!("{} play failed: {err}", self.category.as_str());
                self.playing = false;
                false
            }
        }
    }

    fn persist_selection(&self, kv: &dyn KvStore) {
        store::save(kv, self.category.index_key(), &self.catalog.selected_index());
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub category: Category,
    pub title: String,
    pub index: usize,
    pub total: usize,
    pub muted: bool,
    pub playing: bool,
}

/// Music and speech "now playing" slots. The two never share state.
pub struct PlaybackCoordinator {
    music: Channel,
    speech: Channel,
    store: SharedStore,
}

impl PlaybackCoordinator {
    pub fn new(
        store: SharedStore,
        music: CatalogState,
        speech: CatalogState,
        music_sink: Box<dyn AudioSink>,
        speech_sink: Box<dyn AudioSink>,
    ) -> Self {
        let music = Self::restore_channel(&*store, Category::Music, music, music_sink);
        let speech = Self::restore_channel(&*store, Category::Speech, speech, speech_sink);
        Self {
            music,
            speech,
            store,
        }
    }

    fn restore_channel(
        kv: &dyn KvStore,
        category: Category,
        catalog: CatalogState,
        sink: Box<dyn AudioSink>,
    ) -> Channel {
        let index = store::load::<usize>(kv, category.index_key()).unwrap_or(0);
        let muted = store::load::<bool>(kv, category.muted_key()).unwrap_or(false);

        let mut channel = Channel {
            category,
            catalog: catalog.with_selection(index),
            muted,
            playing: false,
            sink,
        };
        if let Err(err) = channel.sink.set_muted(muted) {
            warn!("{} mute failed: {err}", category.as_str());
        }
        channel.reload();
        channel.persist_selection(kv);
        channel
    }

    fn channel(&self, category: Category) -> &Channel {
        match category {
            Category::Music => &self.music,
            Category::Speech => &self.speech,
        }
    }

    fn parts(&mut self, category: Category) -> (&mut Channel, &dyn KvStore) {
        let channel = match category {
            Category::Music => &mut self.music,
            Category::Speech => &mut self.speech,
        };
        (channel, &*self.store)
    }

    /// Returns `false` when the sink refused; the caller may retry.
    pub fn play(&mut self, category: Category) -> bool {
        self.parts(category).0.play()
    }

    pub fn pause(&mut self, category: Category) {
        let (channel, _) = self.parts(category);
        channel.playing = false;
        if let Err(err) = channel.sink.pause() {
            warn!("{} pause failed: {err}", category.as_str());
        }
    }

    pub fn stop(&mut self, category: Category) {
        self.parts(category).0.rewind();
    }

    /// Manual skip: rewinds, moves to the next track and loads it without
    /// starting playback.
    pub fn advance(&mut self, category: Category) -> &Track {
        let (channel, kv) = self.parts(category);
        channel.rewind();
        channel.catalog.advance();
        channel.persist_selection(kv);
        channel.reload();
        channel.catalog.selected()
    }

    /// Natural end of track: moves on and keeps playing. An end reported
    /// after the channel stopped playing is stale and ignored.
    pub fn handle_ended(&mut self, category: Category) -> bool {
        let (channel, kv) = self.parts(category);
        if !channel.playing {
            return false;
        }
        channel.catalog.advance();
        channel.persist_selection(kv);
        channel.reload();
        info!(
            "{} auto-advanced to '{}'",
            category.as_str(),
            channel.catalog.selected().title
        );
        channel.play()
    }

    pub fn select_track(&mut self, category: Category, index: usize) -> &Track {
        let (channel, kv) = self.parts(category);
        channel.catalog.select(index);
        channel.persist_selection(kv);
        channel.reload();
        channel.catalog.selected()
    }

    pub fn toggle_mute(&mut self, category: Category) -> bool {
        let (channel, kv) = self.parts(category);
        channel.muted = !channel.muted;
        if let Err(err) = channel.sink.set_muted(channel.muted) {
            warn!("{} mute failed: {err}", category.as_str());
        }
        store::save(kv, category.muted_key(), &channel.muted);
        channel.muted
    }

    /// Installs a refreshed catalog. Empty lists are ignored.
    pub fn replace_catalog(&mut self, category: Category, tracks: Vec<Track>) -> bool {
        let (channel, kv) = self.parts(category);
        if !channel.catalog.replace(tracks) {
            return false;
        }
        channel.persist_selection(kv);
        channel.reload();
        info!(
            "{} catalog replaced ({} tracks)",
            category.as_str(),
            channel.catalog.len()
        );
        true
    }

    pub fn handle_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Ended(category) => {
                self.handle_ended(category);
            }
            PlaybackEvent::SourceUnavailable(category, reason) => {
                warn!("{} source unavailable: {reason}", category.as_str());
                self.parts(category).0.playing = false;
            }
        }
    }

    pub fn now_playing(&self, category: Category) -> &Track {
        self.channel(category).catalog.selected()
    }

    pub fn catalog(&self, category: Category) -> &CatalogState {
        &self.channel(category).catalog
    }

    pub fn is_muted(&self, category: Category) -> bool {
        self.channel(category).muted
    }

    pub fn is_playing(&self, category: Category) -> bool {
        self.channel(category).playing
    }

    pub fn status(&self, category: Category) -> ChannelStatus {
        let channel = self.channel(category);
        ChannelStatus {
            category,
            title: channel.catalog.selected().title.clone(),
            index: channel.catalog.selected_index(),
            total: channel.catalog.len(),
            muted: channel.muted,
            playing: channel.playing,
        }
    }
}

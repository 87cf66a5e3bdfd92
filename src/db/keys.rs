//! Store keys shared across components.

use anyhow::Result;
use log::info;

use super::store::KvStore;

pub const MODE: &str = "ff.mode";
pub const FOCUS_MINUTES: &str = "ff.work";
pub const BREAK_MINUTES: &str = "ff.break";
pub const SECONDS: &str = "ff.seconds";
pub const RUNNING: &str = "ff.running";
pub const MUSIC_TRACK: &str = "ff.track";
pub const MUSIC_MUTED: &str = "ff.muted";
pub const SPEECH_INDEX: &str = "ff.speech.idx";
pub const SPEECH_MUTED: &str = "ff.speech.muted";
pub const SPEECH_CATALOG: &str = "ff.speech.catalog";
pub const QUOTE: &str = "ff.quote";
pub const CLEANED_ONCE: &str = "ff.cleanedOnce";

const KNOWN_KEYS: &[&str] = &[
    MODE,
    FOCUS_MINUTES,
    BREAK_MINUTES,
    SECONDS,
    RUNNING,
    MUSIC_TRACK,
    MUSIC_MUTED,
    SPEECH_INDEX,
    SPEECH_MUTED,
    SPEECH_CATALOG,
    QUOTE,
    CLEANED_ONCE,
];

/// Keys written by collaborators sharing the store (theme, tasks, notes).
/// They are not ours to read, but cleanup must leave them alone.
const FOREIGN_KEYS: &[&str] = &[
    "ff.dark",
    "ff.tasks",
    "ff.notesV2",
    "ff.activeNote",
    "ff.tracks",
    "ff.streak",
];

/// One-time removal of keys left behind by older builds. Anything that is
/// not a known key, or that mentions `cfa`, goes. Returns the number of keys
/// removed; later calls return 0.
pub fn prune_legacy_keys(store: &dyn KvStore) -> Result<usize> {
    if store.get(CLEANED_ONCE).as_deref() == Some("1") {
        return Ok(0);
    }

    let stale: Vec<String> = store
        .keys()?
        .into_iter()
        .filter(|key| {
            let lower = key.to_lowercase();
            lower.contains("cfa")
                || !(KNOWN_KEYS.contains(&key.as_str()) || FOREIGN_KEYS.contains(&key.as_str()))
        })
        .collect();

    for key in &stale {
        store.remove(key)?;
    }
    store.set(CLEANED_ONCE, "1")?;

    if !stale.is_empty() {
        info!("Pruned {} legacy store keys", stale.len());
    }
    Ok(stale.len())
}

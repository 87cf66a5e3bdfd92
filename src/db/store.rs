use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use anyhow::Result;
use log::{error, warn};
use serde::{de::DeserializeOwned, Serialize};

/// String-keyed persistence used to survive restarts.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

pub type SharedStore = Arc<dyn KvStore>;

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Ok(mut guard) = self.data.write() {
            guard.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if let Ok(mut guard) = self.data.write() {
            guard.remove(key);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .data
            .read()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// Reads a JSON value. Unparseable values are logged and treated as absent.
pub fn load<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Ignoring corrupt value for {key}: {err}");
            None
        }
    }
}

/// Writes a JSON value. Failures are logged; persistence never interrupts
/// the caller.
pub fn save<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) {
    let serialized = match serde_json::to_string(value) {
        Ok(serialized) => serialized,
        Err(err) => {
            error!("Failed to serialize {key}: {err}");
            return;
        }
    };
    if let Err(err) = store.set(key, &serialized) {
        error!("Failed to persist {key}: {err:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_round_trips_json() {
        let store = MemoryStore::new();
        save(&store, "ff.track", &3usize);
        assert_eq!(load::<usize>(&store, "ff.track"), Some(3));
    }

    #[test]
    fn corrupt_values_are_absent() {
        let store = MemoryStore::new();
        store.set("ff.seconds", "not-json{").unwrap();
        assert_eq!(load::<u32>(&store, "ff.seconds"), None);

        store.set("ff.running", "\"yes\"").unwrap();
        assert_eq!(load::<bool>(&store, "ff.running"), None);
    }

    #[test]
    fn missing_key_is_absent() {
        let store = MemoryStore::new();
        assert_eq!(load::<bool>(&store, "ff.muted"), None);
    }
}

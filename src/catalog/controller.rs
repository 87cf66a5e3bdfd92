use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{save_snapshot, CatalogResolver, MetadataSource};
use crate::{
    db::store::SharedStore,
    playback::{Category, PlaybackCoordinator},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Runs at most one remote catalog resolution at a time and hands
/// successful results to the speech channel.
pub struct CatalogController<S: MetadataSource> {
    resolver: Arc<CatalogResolver<S>>,
    playback: Arc<Mutex<PlaybackCoordinator>>,
    store: SharedStore,
    handle: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl<S: MetadataSource> CatalogController<S> {
    pub fn new(
        resolver: CatalogResolver<S>,
        playback: Arc<Mutex<PlaybackCoordinator>>,
        store: SharedStore,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            playback,
            store,
            handle: None,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Starts a resolution unless one is already running or the controller
    /// has been shut down. Returns whether a request was started.
    pub fn refresh(&mut self) -> bool {
        if self.cancel_token.is_cancelled() || self.is_in_flight() {
            return false;
        }

        let resolver = self.resolver.clone();
        let playback = self.playback.clone();
        let store = self.store.clone();
        let token = self.cancel_token.clone();

        let handle = tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => {
                    log_info!("catalog refresh cancelled");
                    return;
                }
                result = resolver.fetch_remote() => result,
            };

            match outcome {
                Ok(tracks) => {
                    let mut coordinator = playback.lock().await;
                    if token.is_cancelled() {
                        return;
                    }
                    save_snapshot(&*store, resolver.catalog_id(), &tracks);
                    let count = tracks.len();
                    coordinator.replace_catalog(Category::Speech, tracks);
                    log_info!(
                        "Resolved {} speech tracks from catalog {}",
                        count,
                        resolver.catalog_id()
                    );
                }
                Err(err) => {
                    log_warn!("Using fallback speech list ({err})");
                }
            }
        });

        self.handle = Some(handle);
        true
    }

    /// Waits for the in-flight resolution, if any.
    pub async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Cancels the in-flight resolution. A cancelled request never touches
    /// the catalog, and no further refreshes start.
    pub async fn shutdown(&mut self) {
        self.cancel_token.cancel();
        self.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{
            resolver::{
                tests::{mixed_listing, FakeSource},
                CatalogError, MetadataDocument,
            },
            CatalogSnapshot,
        },
        db::{keys, store, KvStore, MemoryStore},
        playback::coordinator::tests::{coordinator_with, CallLog},
    };
    use std::time::Duration;

    struct SlowSource;

    impl MetadataSource for SlowSource {
        async fn fetch_metadata(&self, _catalog_id: &str) -> Result<MetadataDocument, CatalogError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(serde_json::from_value(mixed_listing()).unwrap())
        }
    }

    fn controller<S: MetadataSource>(
        source: S,
    ) -> (CatalogController<S>, Arc<Mutex<PlaybackCoordinator>>, SharedStore) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let calls = CallLog::default();
        let playback = Arc::new(Mutex::new(coordinator_with(store.clone(), &calls)));
        let resolver = CatalogResolver::new(source, "https://archive.org", "motivational-speech");
        (
            CatalogController::new(resolver, playback.clone(), store.clone()),
            playback,
            store,
        )
    }

    #[tokio::test]
    async fn successful_refresh_replaces_speech_catalog() {
        let (mut ctrl, playback, store) = controller(FakeSource::Document(mixed_listing()));
        playback.lock().await.select_track(Category::Speech, 7);

        assert!(ctrl.refresh());
        ctrl.wait().await;

        let coordinator = playback.lock().await;
        assert_eq!(coordinator.catalog(Category::Speech).len(), 3);
        assert_eq!(coordinator.catalog(Category::Speech).selected_index(), 7 % 3);
        assert_eq!(coordinator.catalog(Category::Music).len(), 2);

        let snapshot: CatalogSnapshot = store::load(&*store, keys::SPEECH_CATALOG).unwrap();
        assert_eq!(snapshot.catalog_id, "motivational-speech");
        assert_eq!(snapshot.tracks.len(), 3);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_fallback() {
        let (mut ctrl, playback, store) = controller(FakeSource::Fails(500));
        assert!(ctrl.refresh());
        ctrl.wait().await;

        assert_eq!(playback.lock().await.catalog(Category::Speech).len(), 17);
        assert!(store.get(keys::SPEECH_CATALOG).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_not_duplicated_while_in_flight() {
        let (mut ctrl, _playback, _store) = controller(SlowSource);
        assert!(ctrl.refresh());
        tokio::task::yield_now().await;

        assert!(ctrl.is_in_flight());
        assert!(!ctrl.refresh());

        ctrl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_without_touching_catalog() {
        let (mut ctrl, playback, store) = controller(SlowSource);
        assert!(ctrl.refresh());
        tokio::task::yield_now().await;

        ctrl.shutdown().await;
        assert!(!ctrl.is_in_flight());
        assert!(!ctrl.refresh());

        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(playback.lock().await.catalog(Category::Speech).len(), 17);
        assert!(store.get(keys::SPEECH_CATALOG).is_none());
    }
}

use std::{sync::Arc, time::Duration};

use log::{debug, info};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::db::{
    keys,
    store::{self, SharedStore},
};

use super::{IntervalClock, IntervalConfig, IntervalState, Phase};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct IntervalSnapshot {
    pub state: IntervalState,
    pub config: IntervalConfig,
    pub remaining: String,
}

impl IntervalSnapshot {
    fn of(clock: &IntervalClock) -> Self {
        Self {
            state: clock.state(),
            config: clock.config(),
            remaining: clock.remaining_display(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IntervalEvent {
    StateChanged(IntervalSnapshot),
    PhaseChanged { from: Phase, to: Phase },
}

/// Drives an [`IntervalClock`] once per tick interval while it runs and
/// persists it after every change.
#[derive(Clone)]
pub struct IntervalController {
    clock: Arc<Mutex<IntervalClock>>,
    store: SharedStore,
    events: broadcast::Sender<IntervalEvent>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl IntervalController {
    pub fn new(store: SharedStore, tick_interval: Duration) -> Self {
        let clock = load_clock(&store);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            clock: Arc::new(Mutex::new(clock)),
            store,
            events,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IntervalEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> IntervalSnapshot {
        IntervalSnapshot::of(&*self.clock.lock().await)
    }

    /// Picks up a countdown that was running when the previous process exited.
    pub async fn resume_if_running(&self) {
        if self.clock.lock().await.is_running() {
            info!("Resuming running interval clock");
            self.spawn_ticker().await;
        }
    }

    pub async fn start(&self) -> IntervalSnapshot {
        let started = {
            let mut clock = self.clock.lock().await;
            let started = clock.start();
            save_clock(&self.store, &clock);
            started
        };

        if started {
            self.spawn_ticker().await;
        }
        self.emit_state_changed().await
    }

    pub async fn pause(&self) -> IntervalSnapshot {
        let paused = {
            let mut clock = self.clock.lock().await;
            let paused = clock.pause();
            save_clock(&self.store, &clock);
            paused
        };

        if paused {
            self.cancel_ticker().await;
        }
        self.emit_state_changed().await
    }

    pub async fn reset(&self) -> IntervalSnapshot {
        {
            let mut clock = self.clock.lock().await;
            clock.reset();
            save_clock(&self.store, &clock);
        }
        self.cancel_ticker().await;
        self.emit_state_changed().await
    }

    pub async fn set_phase_length(&self, phase: Phase, minutes: u32) -> IntervalSnapshot {
        {
            let mut clock = self.clock.lock().await;
            clock.set_phase_length(phase, minutes);
            save_clock(&self.store, &clock);
        }
        self.emit_state_changed().await
    }

    pub async fn switch_phase(&self, phase: Phase) -> IntervalSnapshot {
        let from = {
            let mut clock = self.clock.lock().await;
            let from = clock.phase();
            if !clock.switch_phase(phase) {
                return IntervalSnapshot::of(&clock);
            }
            save_clock(&self.store, &clock);
            from
        };

        let _ = self.events.send(IntervalEvent::PhaseChanged { from, to: phase });
        self.emit_state_changed().await
    }

    /// Advances a running clock by one second. Returns the new phase when the
    /// tick completed a cycle.
    pub async fn tick(&self) -> Option<Phase> {
        let (transition, snapshot) = {
            let mut clock = self.clock.lock().await;
            if !clock.is_running() {
                return None;
            }
            let from = clock.phase();
            let transition = clock.tick().map(|to| (from, to));
            save_clock(&self.store, &clock);
            (transition, IntervalSnapshot::of(&clock))
        };

        if let Some((from, to)) = transition {
            let _ = self.events.send(IntervalEvent::PhaseChanged { from, to });
        }
        let _ = self.events.send(IntervalEvent::StateChanged(snapshot));
        transition.map(|(_, to)| to)
    }

    /// Stops the ticker and writes the final clock state.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
        let clock = self.clock.lock().await;
        save_clock(&self.store, &clock);
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;

                if !controller.clock.lock().await.is_running() {
                    debug!("Interval ticker exiting: clock stopped");
                    break;
                }
                if let Some(phase) = controller.tick().await {
                    info!("Interval phase changed to {}", phase.as_str());
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn emit_state_changed(&self) -> IntervalSnapshot {
        let snapshot = self.snapshot().await;
        let _ = self.events.send(IntervalEvent::StateChanged(snapshot.clone()));
        snapshot
    }
}

fn load_clock(store: &SharedStore) -> IntervalClock {
    let defaults = IntervalConfig::default();
    let config = IntervalConfig {
        focus_minutes: store::load(&**store, keys::FOCUS_MINUTES).unwrap_or(defaults.focus_minutes),
        break_minutes: store::load(&**store, keys::BREAK_MINUTES).unwrap_or(defaults.break_minutes),
    };

    IntervalClock::restore(
        config,
        store::load(&**store, keys::MODE),
        store::load(&**store, keys::SECONDS),
        store::load(&**store, keys::RUNNING),
    )
}

fn save_clock(store: &SharedStore, clock: &IntervalClock) {
    let config = clock.config();
    let state = clock.state();
    store::save(&**store, keys::FOCUS_MINUTES, &config.focus_minutes);
    store::save(&**store, keys::BREAK_MINUTES, &config.break_minutes);
    store::save(&**store, keys::MODE, &state.phase);
    store::save(&**store, keys::SECONDS, &state.remaining_seconds);
    store::save(&**store, keys::RUNNING, &state.running);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{KvStore, MemoryStore};

    fn memory_store() -> SharedStore {
        Arc::new(MemoryStore::new())
    }

    // Long enough that the background ticker never fires during a test.
    const IDLE_TICK: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn fresh_store_starts_with_default_focus() {
        let ctrl = IntervalController::new(memory_store(), IDLE_TICK);
        let snapshot = ctrl.snapshot().await;

        assert_eq!(snapshot.state.phase, Phase::Focus);
        assert_eq!(snapshot.state.remaining_seconds, 25 * 60);
        assert!(!snapshot.state.running);
        assert_eq!(snapshot.remaining, "25:00");
    }

    #[tokio::test]
    async fn full_focus_cycle_transitions_once() {
        let ctrl = IntervalController::new(memory_store(), IDLE_TICK);
        ctrl.start().await;

        let mut transitions = Vec::new();
        for _ in 0..1500 {
            if let Some(phase) = ctrl.tick().await {
                transitions.push(phase);
            }
        }
        ctrl.shutdown().await;

        assert_eq!(transitions, vec![Phase::Break]);
        let snapshot = ctrl.snapshot().await;
        assert_eq!(snapshot.state.phase, Phase::Break);
        assert_eq!(snapshot.state.remaining_seconds, 5 * 60);
        assert!(snapshot.state.running);
    }

    #[tokio::test]
    async fn state_survives_restart() {
        let store = memory_store();
        {
            let ctrl = IntervalController::new(store.clone(), IDLE_TICK);
            ctrl.set_phase_length(Phase::Focus, 30).await;
            ctrl.start().await;
            for _ in 0..10 {
                ctrl.tick().await;
            }
            ctrl.pause().await;
            ctrl.shutdown().await;
        }

        let restored = IntervalController::new(store.clone(), IDLE_TICK).snapshot().await;
        assert_eq!(restored.config.focus_minutes, 30);
        assert_eq!(restored.state.remaining_seconds, 30 * 60 - 10);
        assert!(!restored.state.running);
        assert_eq!(store.get(keys::MODE).as_deref(), Some("\"focus\""));
    }

    #[tokio::test]
    async fn corrupt_values_fall_back_to_defaults() {
        let store = memory_store();
        store.set(keys::FOCUS_MINUTES, "not json").unwrap();
        store.set(keys::MODE, "\"lunch\"").unwrap();
        store.set(keys::SECONDS, "99999").unwrap();

        let snapshot = IntervalController::new(store, IDLE_TICK).snapshot().await;
        assert_eq!(snapshot.config.focus_minutes, 25);
        assert_eq!(snapshot.state.phase, Phase::Focus);
        assert_eq!(snapshot.state.remaining_seconds, 25 * 60);
    }

    #[tokio::test]
    async fn switch_phase_keeps_running_and_announces_change() {
        let ctrl = IntervalController::new(memory_store(), IDLE_TICK);
        let mut events = ctrl.subscribe();
        ctrl.start().await;

        let snapshot = ctrl.switch_phase(Phase::Break).await;
        assert!(snapshot.state.running);
        assert_eq!(snapshot.state.remaining_seconds, 5 * 60);

        let mut saw_change = false;
        while let Ok(event) = events.try_recv() {
            if event == (IntervalEvent::PhaseChanged { from: Phase::Focus, to: Phase::Break }) {
                saw_change = true;
            }
        }
        assert!(saw_change);

        let unchanged = ctrl.switch_phase(Phase::Break).await;
        assert_eq!(unchanged, snapshot);
        ctrl.shutdown().await;
    }

    #[tokio::test]
    async fn tick_on_paused_clock_is_ignored() {
        let ctrl = IntervalController::new(memory_store(), IDLE_TICK);
        assert_eq!(ctrl.tick().await, None);
        assert_eq!(ctrl.snapshot().await.state.remaining_seconds, 25 * 60);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_counts_down_while_running() {
        let ctrl = IntervalController::new(memory_store(), Duration::from_secs(1));
        ctrl.start().await;

        time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ctrl.snapshot().await.state.remaining_seconds, 25 * 60 - 3);

        ctrl.pause().await;
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ctrl.snapshot().await.state.remaining_seconds, 25 * 60 - 3);

        ctrl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn running_clock_resumes_after_restart() {
        let store = memory_store();
        store::save(&*store, keys::RUNNING, &true);
        store::save(&*store, keys::SECONDS, &120u32);

        let ctrl = IntervalController::new(store, Duration::from_secs(1));
        ctrl.resume_if_running().await;
        time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(ctrl.snapshot().await.state.remaining_seconds, 118);
        ctrl.shutdown().await;
    }
}

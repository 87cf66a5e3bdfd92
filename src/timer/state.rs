use serde::{Deserialize, Serialize};

pub const DEFAULT_FOCUS_MINUTES: u32 = 25;
pub const DEFAULT_BREAK_MINUTES: u32 = 5;

const FOCUS_MINUTES_RANGE: (u32, u32) = (5, 120);
const BREAK_MINUTES_RANGE: (u32, u32) = (1, 60);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Focus,
    Break,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Focus
    }
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Focus => "focus",
            Phase::Break => "break",
        }
    }

    pub fn other(&self) -> Phase {
        match self {
            Phase::Focus => Phase::Break,
            Phase::Break => Phase::Focus,
        }
    }

    pub fn parse(value: &str) -> Option<Phase> {
        match value.trim().to_ascii_lowercase().as_str() {
            "focus" | "work" => Some(Phase::Focus),
            "break" => Some(Phase::Break),
            _ => None,
        }
    }
}

/// Minutes per phase. Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IntervalConfig {
    pub focus_minutes: u32,
    pub break_minutes: u32,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            focus_minutes: DEFAULT_FOCUS_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
        }
    }
}

impl IntervalConfig {
    pub fn clamped(focus_minutes: u32, break_minutes: u32) -> Self {
        Self {
            focus_minutes: clamp_minutes(Phase::Focus, focus_minutes),
            break_minutes: clamp_minutes(Phase::Break, break_minutes),
        }
    }

    pub fn minutes(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Focus => self.focus_minutes,
            Phase::Break => self.break_minutes,
        }
    }

    pub fn seconds(&self, phase: Phase) -> u32 {
        self.minutes(phase) * 60
    }
}

pub fn clamp_minutes(phase: Phase, minutes: u32) -> u32 {
    let (min, max) = match phase {
        Phase::Focus => FOCUS_MINUTES_RANGE,
        Phase::Break => BREAK_MINUTES_RANGE,
    };
    minutes.clamp(min, max)
}

/// Turns raw user input into a phase length. Blank, non-numeric and zero
/// entries fall back to the phase default before clamping.
pub fn minutes_from_input(phase: Phase, raw: &str) -> u32 {
    let default = match phase {
        Phase::Focus => DEFAULT_FOCUS_MINUTES,
        Phase::Break => DEFAULT_BREAK_MINUTES,
    };
    let parsed = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value != 0.0)
        .map(|value| value.max(0.0).min(u32::MAX as f64) as u32)
        .unwrap_or(default);
    clamp_minutes(phase, parsed)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IntervalState {
    pub phase: Phase,
    pub remaining_seconds: u32,
    pub running: bool,
}

/// Focus/break countdown.
///
/// `remaining_seconds` always stays within `[0, length(phase) * 60]`.
/// Pausing freezes the countdown; only `reset`, `switch_phase`, an idle
/// length change or a completed cycle reload it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IntervalClock {
    config: IntervalConfig,
    state: IntervalState,
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::new(IntervalConfig::default())
    }
}

impl IntervalClock {
    pub fn new(config: IntervalConfig) -> Self {
        let config = IntervalConfig::clamped(config.focus_minutes, config.break_minutes);
        Self {
            state: IntervalState {
                phase: Phase::Focus,
                remaining_seconds: config.seconds(Phase::Focus),
                running: false,
            },
            config,
        }
    }

    /// Rebuilds a clock from persisted parts. Missing pieces take defaults and
    /// the remaining time is pulled back into range for the restored phase.
    pub fn restore(
        config: IntervalConfig,
        phase: Option<Phase>,
        remaining_seconds: Option<u32>,
        running: Option<bool>,
    ) -> Self {
        let config = IntervalConfig::clamped(config.focus_minutes, config.break_minutes);
        let phase = phase.unwrap_or_default();
        let full = config.seconds(phase);
        Self {
            config,
            state: IntervalState {
                phase,
                remaining_seconds: remaining_seconds.map_or(full, |secs| secs.min(full)),
                running: running.unwrap_or(false),
            },
        }
    }

    pub fn config(&self) -> IntervalConfig {
        self.config
    }

    pub fn state(&self) -> IntervalState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.state.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn set_phase_length(&mut self, phase: Phase, minutes: u32) {
        let minutes = clamp_minutes(phase, minutes);
        match phase {
            Phase::Focus => self.config.focus_minutes = minutes,
            Phase::Break => self.config.break_minutes = minutes,
        }

        if self.state.phase != phase {
            return;
        }

        let full = self.config.seconds(phase);
        if self.state.running {
            // The elapsing cycle keeps its count, but never beyond the new length.
            self.state.remaining_seconds = self.state.remaining_seconds.min(full);
        } else {
            self.state.remaining_seconds = full;
        }
    }

    /// Returns `true` when the clock was not already running.
    pub fn start(&mut self) -> bool {
        let changed = !self.state.running;
        self.state.running = true;
        changed
    }

    /// Returns `true` when the clock was running.
    pub fn pause(&mut self) -> bool {
        let changed = self.state.running;
        self.state.running = false;
        changed
    }

    pub fn reset(&mut self) {
        self.state.running = false;
        self.state.remaining_seconds = self.config.seconds(self.state.phase);
    }

    pub fn switch_phase(&mut self, phase: Phase) -> bool {
        if self.state.phase == phase {
            return false;
        }
        self.state.phase = phase;
        self.state.remaining_seconds = self.config.seconds(phase);
        true
    }

    /// Advances the countdown by one second. Returns the new phase when the
    /// tick completed a cycle.
    pub fn tick(&mut self) -> Option<Phase> {
        if !self.state.running {
            return None;
        }

        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
        if self.state.remaining_seconds > 0 {
            return None;
        }

        let next = self.state.phase.other();
        self.state.phase = next;
        self.state.remaining_seconds = self.config.seconds(next);
        Some(next)
    }

    pub fn remaining_display(&self) -> String {
        let secs = self.state.remaining_seconds;
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_clock(focus: u32, brk: u32) -> IntervalClock {
        let mut clock = IntervalClock::new(IntervalConfig::clamped(focus, brk));
        clock.start();
        clock
    }

    #[test]
    fn idle_clock_reflects_configured_length() {
        for focus in [5, 25, 47, 120] {
            for brk in [1, 5, 33, 60] {
                let mut clock = IntervalClock::new(IntervalConfig::clamped(focus, brk));
                assert_eq!(clock.remaining_seconds(), focus * 60);

                clock.switch_phase(Phase::Break);
                assert_eq!(clock.remaining_seconds(), brk * 60);
            }
        }
    }

    #[test]
    fn config_is_clamped_to_bounds() {
        let config = IntervalConfig::clamped(1, 500);
        assert_eq!(config.focus_minutes, 5);
        assert_eq!(config.break_minutes, 60);

        let config = IntervalConfig::clamped(999, 0);
        assert_eq!(config.focus_minutes, 120);
        assert_eq!(config.break_minutes, 1);
    }

    #[test]
    fn user_input_falls_back_to_defaults() {
        assert_eq!(minutes_from_input(Phase::Focus, "abc"), 25);
        assert_eq!(minutes_from_input(Phase::Focus, ""), 25);
        assert_eq!(minutes_from_input(Phase::Focus, "0"), 25);
        assert_eq!(minutes_from_input(Phase::Break, "nope"), 5);
        assert_eq!(minutes_from_input(Phase::Focus, "3"), 5);
        assert_eq!(minutes_from_input(Phase::Focus, "-10"), 5);
        assert_eq!(minutes_from_input(Phase::Break, "90"), 60);
        assert_eq!(minutes_from_input(Phase::Focus, " 50 "), 50);
    }

    #[test]
    fn start_and_pause_never_reset_the_countdown() {
        let mut clock = running_clock(25, 5);
        for _ in 0..10 {
            clock.tick();
        }
        assert_eq!(clock.remaining_seconds(), 1490);

        assert!(clock.pause());
        assert!(!clock.pause());
        assert_eq!(clock.remaining_seconds(), 1490);

        assert!(clock.start());
        assert!(!clock.start());
        assert_eq!(clock.remaining_seconds(), 1490);
    }

    #[test]
    fn tick_on_paused_clock_is_ignored() {
        let mut clock = IntervalClock::default();
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.remaining_seconds(), 25 * 60);
    }

    #[test]
    fn reset_stops_and_reloads_current_phase() {
        let mut clock = running_clock(30, 10);
        clock.switch_phase(Phase::Break);
        clock.tick();
        clock.tick();

        clock.reset();
        assert!(!clock.is_running());
        assert_eq!(clock.phase(), Phase::Break);
        assert_eq!(clock.remaining_seconds(), 600);
    }

    #[test]
    fn ticking_through_a_cycle_transitions_exactly_once() {
        let mut clock = running_clock(5, 3);
        let remaining = clock.remaining_seconds();

        let transitions: Vec<Phase> = (0..remaining).filter_map(|_| clock.tick()).collect();

        assert_eq!(transitions, vec![Phase::Break]);
        assert_eq!(clock.phase(), Phase::Break);
        assert_eq!(clock.remaining_seconds(), 180);
        assert!(clock.is_running());
    }

    #[test]
    fn transition_happens_on_the_tick_that_reaches_zero() {
        let mut clock = IntervalClock::restore(
            IntervalConfig::default(),
            Some(Phase::Break),
            Some(1),
            Some(true),
        );

        assert_eq!(clock.tick(), Some(Phase::Focus));
        assert_eq!(clock.remaining_seconds(), 25 * 60);
    }

    #[test]
    fn full_focus_session_flips_to_break() {
        let mut clock = running_clock(25, 5);
        let mut flips = 0;
        for _ in 0..1500 {
            if clock.tick().is_some() {
                flips += 1;
            }
        }

        assert_eq!(flips, 1);
        assert_eq!(clock.phase(), Phase::Break);
        assert_eq!(clock.remaining_seconds(), 5 * 60);
    }

    #[test]
    fn idle_length_change_resets_current_phase_only() {
        let mut clock = IntervalClock::default();
        clock.set_phase_length(Phase::Focus, 40);
        assert_eq!(clock.remaining_seconds(), 2400);

        clock.set_phase_length(Phase::Break, 15);
        assert_eq!(clock.phase(), Phase::Focus);
        assert_eq!(clock.remaining_seconds(), 2400);
        assert_eq!(clock.config().break_minutes, 15);
    }

    #[test]
    fn running_length_change_leaves_cycle_alone() {
        let mut clock = running_clock(25, 5);
        clock.tick();
        clock.set_phase_length(Phase::Focus, 50);
        assert_eq!(clock.remaining_seconds(), 1499);

        // The new length applies once the cycle comes back around.
        clock.reset();
        assert_eq!(clock.remaining_seconds(), 3000);
    }

    #[test]
    fn running_length_change_keeps_remaining_in_range() {
        let mut clock = running_clock(60, 5);
        clock.set_phase_length(Phase::Focus, 10);
        assert_eq!(clock.remaining_seconds(), 600);
    }

    #[test]
    fn paused_mid_cycle_length_change_reloads() {
        let mut clock = running_clock(25, 5);
        clock.tick();
        clock.pause();
        clock.set_phase_length(Phase::Focus, 30);
        assert_eq!(clock.remaining_seconds(), 1800);
    }

    #[test]
    fn switch_phase_reloads_and_keeps_running_flag() {
        let mut clock = running_clock(25, 5);
        clock.tick();

        assert!(clock.switch_phase(Phase::Break));
        assert!(clock.is_running());
        assert_eq!(clock.remaining_seconds(), 300);

        assert!(!clock.switch_phase(Phase::Break));
    }

    #[test]
    fn restore_clamps_stale_remaining_time() {
        let clock = IntervalClock::restore(
            IntervalConfig::clamped(25, 5),
            Some(Phase::Break),
            Some(10_000),
            None,
        );
        assert_eq!(clock.remaining_seconds(), 300);
        assert!(!clock.is_running());

        let clock = IntervalClock::restore(IntervalConfig::default(), None, None, None);
        assert_eq!(clock.phase(), Phase::Focus);
        assert_eq!(clock.remaining_seconds(), 1500);
    }

    #[test]
    fn display_is_zero_padded() {
        let mut clock = running_clock(5, 1);
        assert_eq!(clock.remaining_display(), "05:00");
        clock.tick();
        assert_eq!(clock.remaining_display(), "04:59");
    }
}

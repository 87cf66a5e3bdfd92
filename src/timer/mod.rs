pub mod commands;
pub mod controller;
pub mod state;

pub use controller::{IntervalController, IntervalEvent, IntervalSnapshot};
pub use state::{
    clamp_minutes, minutes_from_input, IntervalClock, IntervalConfig, IntervalState, Phase,
};

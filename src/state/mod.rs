//! State machine module for tap-vs-hold detection
//!
//! Provides an explicit state machine with three states:
//! - Idle: the watched modifier is up
//! - Armed: the modifier is down and a quick release will be a tap
//! - Canceled: the modifier is down but another key was pressed meanwhile

mod clock;
mod machine;

pub use clock::{Clock, MonotonicClock};
pub use machine::{TapHoldDisambiguator, TapRule};

#[cfg(test)]
pub use clock::ClockError;
#[cfg(test)]
pub use machine::ModifierState;

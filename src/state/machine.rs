//! Tap-hold state machine for the watched modifier key
//!
//! A single `ModifierState` covers every physical keyboard: a press on one
//! device and a release on another count as one tap. The transition itself
//! is the pure function [`step`]; [`TapHoldDisambiguator`] owns the state
//! and logs what `step` decided.

use std::time::Duration;

use tracing::{debug, warn};

use crate::events::{KeyTransition, KeyValue, RawKeyEvent};

use super::clock::{Clock, ClockError};

/// Which key is watched, what replaces a tap of it, and how short a tap is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapRule {
    pub modifier: u16,
    pub substitute: u16,
    pub timeout: Duration,
}

/// Process-wide state of the watched modifier.
///
/// The press timestamp only exists while the modifier is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModifierState {
    /// Modifier is up
    #[default]
    Idle,
    /// Modifier is down and a release may still count as a tap
    Armed { pressed_at: Duration },
    /// Modifier is down but another key was pressed meanwhile
    Canceled { pressed_at: Duration },
}

impl ModifierState {
    /// Instant the modifier was last pressed, if it is still held
    #[cfg(test)]
    pub fn pressed_at(&self) -> Option<Duration> {
        match self {
            Self::Idle => None,
            Self::Armed { pressed_at } | Self::Canceled { pressed_at } => Some(*pressed_at),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Armed { .. } => "Armed",
            Self::Canceled { .. } => "Canceled",
        }
    }
}

impl std::fmt::Display for ModifierState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which edge of the modifier could not be timed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedEdge {
    Press,
    Release,
}

impl std::fmt::Display for TimedEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimedEdge::Press => write!(f, "press"),
            TimedEdge::Release => write!(f, "release"),
        }
    }
}

/// Time could not be measured; the event resolved to `Idle` with no output
#[derive(Debug, thiserror::Error)]
#[error("failed to read the time of the modifier {edge}")]
pub struct TimingError {
    pub edge: TimedEdge,
    #[source]
    pub source: ClockError,
}

/// Result of feeding one event to the state machine
#[derive(Debug)]
pub struct Step {
    pub next: ModifierState,
    /// Transitions to inject, in order
    pub emit: Vec<KeyTransition>,
    pub timing_error: Option<TimingError>,
}

impl Step {
    fn to(next: ModifierState) -> Self {
        Self {
            next,
            emit: Vec::new(),
            timing_error: None,
        }
    }

    fn tap(substitute: u16) -> Self {
        Self {
            next: ModifierState::Idle,
            emit: KeyTransition::tap(substitute),
            timing_error: None,
        }
    }

    fn untimed(edge: TimedEdge, source: ClockError) -> Self {
        Self {
            next: ModifierState::Idle,
            emit: Vec::new(),
            timing_error: Some(TimingError { edge, source }),
        }
    }
}

/// Compute the next state and emissions for `event`.
///
/// The clock is only read on a modifier press and on a modifier release
/// while `Armed`.
pub fn step(state: ModifierState, event: &RawKeyEvent, rule: &TapRule, clock: &impl Clock) -> Step {
    if !event.is_key() {
        return Step::to(state);
    }

    if event.code != rule.modifier {
        // Only a fresh press of another key turns the hold into a chord.
        return match (state, event.value) {
            (ModifierState::Armed { pressed_at }, KeyValue::Pressed) => {
                Step::to(ModifierState::Canceled { pressed_at })
            }
            _ => Step::to(state),
        };
    }

    match event.value {
        KeyValue::Pressed => match clock.now() {
            Ok(now) => Step::to(ModifierState::Armed { pressed_at: now }),
            Err(e) => Step::untimed(TimedEdge::Press, e),
        },
        KeyValue::Released => match state {
            ModifierState::Idle | ModifierState::Canceled { .. } => Step::to(ModifierState::Idle),
            ModifierState::Armed { pressed_at } => {
                let elapsed = clock
                    .now()
                    .and_then(|now| now.checked_sub(pressed_at).ok_or(ClockError::WentBackwards));
                match elapsed {
                    Ok(elapsed) if elapsed < rule.timeout => Step::tap(rule.substitute),
                    Ok(_) => Step::to(ModifierState::Idle),
                    Err(e) => Step::untimed(TimedEdge::Release, e),
                }
            }
        },
        KeyValue::Repeat | KeyValue::Unknown(_) => Step::to(state),
    }
}

/// Owns the modifier state for the lifetime of the event loop
pub struct TapHoldDisambiguator<C> {
    state: ModifierState,
    rule: TapRule,
    clock: C,
}

impl<C: Clock> TapHoldDisambiguator<C> {
    pub fn new(rule: TapRule, clock: C) -> Self {
        Self {
            state: ModifierState::Idle,
            rule,
            clock,
        }
    }

    /// Get the current state
    #[cfg(test)]
    pub fn state(&self) -> ModifierState {
        self.state
    }

    /// Feed one raw event, returning the transitions to inject
    pub fn handle(&mut self, event: &RawKeyEvent) -> Vec<KeyTransition> {
        let Step {
            next,
            emit,
            timing_error,
        } = step(self.state, event, &self.rule, &self.clock);

        if let Some(e) = timing_error {
            warn!(error = %e, cause = %e.source, code = event.code, "modifier event not timed, no substitute sent");
        }

        if next.name() != self.state.name() {
            debug!(from = %self.state, to = %next, code = event.code, "modifier state transition");
        }
        if !emit.is_empty() {
            debug!(substitute = self.rule.substitute, "modifier tapped");
        }

        self.state = next;
        emit
    }
}

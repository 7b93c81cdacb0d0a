//! Events module for key records flowing through the engine
//!
//! `RawKeyEvent` is what a physical keyboard hands us; `KeyTransition` is
//! what the tap-hold state machine asks the virtual keyboard to emit.

use std::time::Duration;

/// Linux `EV_KEY` event type
pub const EV_KEY: u16 = evdev::EventType::KEY.0;

/// Highest key code the kernel accepts (`KEY_MAX`). Code 0 is `KEY_RESERVED`.
pub const KEY_CODE_MAX: u16 = 0x2ff;

/// Event class of a raw record; only `Key` participates in tap detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    Key,
    Other(u16),
}

impl EventClass {
    pub fn from_raw(event_type: u16) -> Self {
        if event_type == EV_KEY {
            Self::Key
        } else {
            Self::Other(event_type)
        }
    }

    #[cfg(test)]
    pub fn as_raw(self) -> u16 {
        match self {
            Self::Key => EV_KEY,
            Self::Other(event_type) => event_type,
        }
    }
}

/// Value carried by an `EV_KEY` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValue {
    Released,
    Pressed,
    /// Autorepeat while held
    Repeat,
    Unknown(i32),
}

impl KeyValue {
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => Self::Released,
            1 => Self::Pressed,
            2 => Self::Repeat,
            other => Self::Unknown(other),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::Released => 0,
            Self::Pressed => 1,
            Self::Repeat => 2,
            Self::Unknown(value) => value,
        }
    }
}

/// One record read from a physical keyboard. Consumed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// Kernel timestamp of the record (wall clock, informational only)
    pub timestamp: Duration,
    pub class: EventClass,
    pub code: u16,
    pub value: KeyValue,
}

impl RawKeyEvent {
    /// Build a key-class record with a zero timestamp
    #[cfg(test)]
    pub fn key(code: u16, value: KeyValue) -> Self {
        Self {
            timestamp: Duration::ZERO,
            class: EventClass::Key,
            code,
            value,
        }
    }

    pub fn is_key(&self) -> bool {
        self.class == EventClass::Key
    }
}

/// A single synthetic key transition to inject into the virtual keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub code: u16,
    pub value: KeyValue,
}

impl KeyTransition {
    pub fn press(code: u16) -> Self {
        Self {
            code,
            value: KeyValue::Pressed,
        }
    }

    pub fn release(code: u16) -> Self {
        Self {
            code,
            value: KeyValue::Released,
        }
    }

    /// Press followed by release of `code`
    pub fn tap(code: u16) -> Vec<Self> {
        vec![Self::press(code), Self::release(code)]
    }
}

impl std::fmt::Display for KeyTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value {
            KeyValue::Pressed => write!(f, "KEY {} DOWN", self.code),
            KeyValue::Released => write!(f, "KEY {} UP", self.code),
            KeyValue::Repeat => write!(f, "KEY {} REPEAT", self.code),
            KeyValue::Unknown(value) => write!(f, "KEY {} ({})", self.code, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_class_from_raw() {
        assert_eq!(EventClass::from_raw(1), EventClass::Key);
        assert_eq!(EventClass::from_raw(0), EventClass::Other(0));
        assert_eq!(EventClass::Other(4).as_raw(), 4);
    }

    #[test]
    fn test_key_value_from_raw() {
        assert_eq!(KeyValue::from_raw(0), KeyValue::Released);
        assert_eq!(KeyValue::from_raw(1), KeyValue::Pressed);
        assert_eq!(KeyValue::from_raw(2), KeyValue::Repeat);
        assert_eq!(KeyValue::from_raw(7), KeyValue::Unknown(7));
    }

    #[test]
    fn test_tap_is_press_then_release() {
        let tap = KeyTransition::tap(1);
        assert_eq!(tap, vec![KeyTransition::press(1), KeyTransition::release(1)]);
    }

    #[test]
    fn test_transition_display() {
        assert_eq!(KeyTransition::press(1).to_string(), "KEY 1 DOWN");
        assert_eq!(KeyTransition::release(58).to_string(), "KEY 58 UP");
    }
}

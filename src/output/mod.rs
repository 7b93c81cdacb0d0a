//! Output module for synthetic key events
//!
//! Everything the engine emits goes through a `KeySink`. The real sink is a
//! uinput keyboard; tests record into memory.

mod uinput;

pub use uinput::{VirtualKeyboard, VIRTUAL_DEVICE_NAME};

use crate::events::KeyTransition;

/// Errors creating or writing to the virtual keyboard
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("key code {0} cannot be declared on a virtual keyboard")]
    UnsupportedCode(u16),

    #[error("failed to open uinput")]
    Open(#[source] std::io::Error),

    #[error("failed to declare key capabilities")]
    Capabilities(#[source] std::io::Error),

    #[error("failed to create virtual keyboard")]
    Create(#[source] std::io::Error),

    #[error("failed to inject {transition}")]
    Inject {
        transition: KeyTransition,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for synthetic key transitions.
///
/// `inject` must not return before the transition is followed by a
/// synchronization barrier.
pub trait KeySink {
    fn inject(&mut self, transition: KeyTransition) -> Result<(), OutputError>;
}

/// Inject `transitions` in order, abandoning the rest after the first failure
pub fn inject_all<S: KeySink + ?Sized>(
    sink: &mut S,
    transitions: &[KeyTransition],
) -> Result<(), OutputError> {
    for transition in transitions {
        sink.inject(*transition)?;
    }
    Ok(())
}

/// In-memory sink for tests. Each recorded transition stands for
/// transition plus barrier.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub injected: Vec<KeyTransition>,
    /// Fail the nth inject call (0-based)
    pub fail_on: Option<usize>,
    calls: usize,
}

#[cfg(test)]
impl RecordingSink {
    /// Sink whose `call`th inject fails (0-based)
    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::default()
        }
    }

    /// Number of inject calls seen, including failed ones
    pub fn calls(&self) -> usize {
        self.calls
    }
}

#[cfg(test)]
impl KeySink for RecordingSink {
    fn inject(&mut self, transition: KeyTransition) -> Result<(), OutputError> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on == Some(call) {
            return Err(OutputError::Inject {
                transition,
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "uinput gone"),
            });
        }
        self.injected.push(transition);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_all_in_order() {
        let mut sink = RecordingSink::default();
        inject_all(&mut sink, &KeyTransition::tap(1)).unwrap();
        assert_eq!(sink.injected, KeyTransition::tap(1));
    }

    #[test]
    fn test_failed_press_abandons_release() {
        let mut sink = RecordingSink::failing_on(0);
        let err = inject_all(&mut sink, &KeyTransition::tap(1)).unwrap_err();
        assert!(matches!(err, OutputError::Inject { .. }));
        assert!(sink.injected.is_empty());
        assert_eq!(sink.calls(), 1);
    }

    #[test]
    fn test_inject_error_names_transition() {
        let mut sink = RecordingSink::failing_on(1);
        let err = inject_all(&mut sink, &KeyTransition::tap(1)).unwrap_err();
        assert_eq!(err.to_string(), "failed to inject KEY 1 UP");
        assert_eq!(sink.injected, vec![KeyTransition::press(1)]);
    }

    #[test]
    fn test_virtual_keyboard_rejects_out_of_range_codes() {
        for (codes, bad) in [([58, 5000], 5000), ([0, 1], 0)] {
            let err = VirtualKeyboard::create("tapmod test", &codes).err().unwrap();
            assert!(matches!(err, OutputError::UnsupportedCode(code) if code == bad));
        }
    }
}

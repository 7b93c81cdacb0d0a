//! uinput-backed virtual keyboard

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId, Key};
use tracing::{debug, info};

use crate::events::{KeyTransition, KEY_CODE_MAX};

use super::{KeySink, OutputError};

/// Name the virtual keyboard registers under
pub const VIRTUAL_DEVICE_NAME: &str = "tapmod virtual keyboard";

/// Synthetic keyboard that can emit only the declared key codes
pub struct VirtualKeyboard {
    device: VirtualDevice,
}

impl VirtualKeyboard {
    /// Declare `codes` over `EV_KEY` and create the device
    pub fn create(name: &str, codes: &[u16]) -> Result<Self, OutputError> {
        let mut keys = AttributeSet::<Key>::new();
        for &code in codes {
            if code == 0 || code > KEY_CODE_MAX {
                return Err(OutputError::UnsupportedCode(code));
            }
            keys.insert(Key::new(code));
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(OutputError::Open)?
            .name(name)
            .input_id(InputId::new(BusType::BUS_USB, 0x0001, 0x0001, 1))
            .with_keys(&keys)
            .map_err(OutputError::Capabilities)?
            .build()
            .map_err(OutputError::Create)?;

        info!(device = name, ?codes, "virtual keyboard created");
        Ok(Self { device })
    }
}

impl KeySink for VirtualKeyboard {
    fn inject(&mut self, transition: KeyTransition) -> Result<(), OutputError> {
        let event = InputEvent::new(EventType::KEY, transition.code, transition.value.as_raw());
        // emit() terminates every batch with SYN_REPORT, so one transition
        // per call is one discrete frame for consumers.
        self.device
            .emit(&[event])
            .map_err(|source| OutputError::Inject { transition, source })?;
        debug!(%transition, "injected");
        Ok(())
    }
}

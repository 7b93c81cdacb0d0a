//! Command line parsing and the resulting configuration

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use evdev::Key;

use crate::events::KEY_CODE_MAX;
use crate::state::TapRule;

/// Turn a short tap of a modifier key into another key.
///
/// Reads every keyboard, and when the modifier (Caps Lock by default) is
/// pressed and released quickly with no other key in between, sends the
/// substitute key (Escape by default) through a virtual keyboard.
#[derive(Debug, Parser)]
#[command(name = "tapmod", version)]
pub struct Cli {
    /// Release the modifier within this many milliseconds to send the substitute key
    #[arg(short = 't', long = "timeout", value_name = "TIMEOUT_MS", default_value_t = 200)]
    pub timeout_ms: u64,

    /// Maximum number of keyboards to read from
    #[arg(
        long,
        value_name = "N",
        default_value_t = 16,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_devices: u32,

    /// Linux key code of the watched modifier
    #[arg(
        long,
        value_name = "CODE",
        default_value_t = Key::KEY_CAPSLOCK.code(),
        value_parser = clap::value_parser!(u16).range(1..=i64::from(KEY_CODE_MAX))
    )]
    pub modifier_code: u16,

    /// Linux key code sent for a tap
    #[arg(
        long,
        value_name = "CODE",
        default_value_t = Key::KEY_ESC.code(),
        value_parser = clap::value_parser!(u16).range(1..=i64::from(KEY_CODE_MAX))
    )]
    pub substitute_code: u16,
}

/// Daemon configuration, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub timeout: Duration,
    pub max_devices: usize,
    pub modifier_code: u16,
    pub substitute_code: u16,
}

impl Config {
    /// Validate parsed arguments
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.modifier_code == cli.substitute_code {
            bail!(
                "modifier and substitute key codes must differ (both are {})",
                cli.modifier_code
            );
        }

        Ok(Self {
            timeout: Duration::from_millis(cli.timeout_ms),
            max_devices: cli.max_devices as usize,
            modifier_code: cli.modifier_code,
            substitute_code: cli.substitute_code,
        })
    }

    pub fn tap_rule(&self) -> TapRule {
        TapRule {
            modifier: self.modifier_code,
            substitute: self.substitute_code,
            timeout: self.timeout,
        }
    }

    /// Codes the virtual keyboard declares
    pub fn output_codes(&self) -> [u16; 2] {
        [self.modifier_code, self.substitute_code]
    }
}

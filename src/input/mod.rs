//! Input module for physical keyboards
//!
//! Finds keyboard nodes under `/dev/input` and reads raw kernel records
//! from them. Devices are not grabbed, so the OS keeps delivering the
//! original keys; this side only observes.

mod discovery;
mod source;

pub use discovery::discover_keyboards;
pub use source::KeyboardSource;

#[cfg(test)]
pub use source::encode;

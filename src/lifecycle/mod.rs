//! Process lifecycle: shutdown signals

mod shutdown;

pub use shutdown::ShutdownSignal;

//! Engine module: the event loop that drives tap detection
//!
//! Data flows one way: keyboards, then the state machine, then the
//! virtual keyboard. Only this loop's thread touches the modifier state.

mod event_loop;

pub use event_loop::EventLoop;

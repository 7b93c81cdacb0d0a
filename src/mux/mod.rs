//! Multiplexer module: wait on many keyboards at once

mod epoll;

pub use epoll::{Multiplexer, MuxError, Readiness, Token, Wake};

//! The single-threaded loop: wait, read one record per ready keyboard,
//! run it through the state machine, inject what comes out.

use std::fs::File;
use std::io::Read;
use std::os::fd::AsFd;

use tracing::{debug, info, warn};

use crate::events::RawKeyEvent;
use crate::input::KeyboardSource;
use crate::mux::{Multiplexer, MuxError, Readiness, Token, Wake};
use crate::output::{self, KeySink};
use crate::state::{Clock, TapHoldDisambiguator};

/// Errors that stop the event loop
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to register keyboard {path}")]
    Register {
        path: std::path::PathBuf,
        #[source]
        source: MuxError,
    },

    #[error(transparent)]
    Multiplexer(#[from] MuxError),
}

/// Owns every keyboard handle, the state machine and the output sink.
///
/// Sources are indexed by their multiplexer token; a disconnected keyboard
/// leaves a `None` slot behind.
pub struct EventLoop<S, C, R = File> {
    mux: Multiplexer,
    sources: Vec<Option<KeyboardSource<R>>>,
    machine: TapHoldDisambiguator<C>,
    sink: S,
}

impl<S, C, R> EventLoop<S, C, R>
where
    S: KeySink,
    C: Clock,
    R: Read + AsFd,
{
    /// Register every source with the multiplexer
    pub fn new(
        mut mux: Multiplexer,
        sources: Vec<KeyboardSource<R>>,
        machine: TapHoldDisambiguator<C>,
        sink: S,
    ) -> Result<Self, EngineError> {
        for (token, source) in sources.iter().enumerate() {
            mux.register(source.fd(), token)
                .map_err(|source_err| EngineError::Register {
                    path: source.path().to_owned(),
                    source: source_err,
                })?;
        }

        Ok(Self {
            mux,
            sources: sources.into_iter().map(Some).collect(),
            machine,
            sink,
        })
    }

    /// Number of keyboards still attached
    pub fn active_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.is_some()).count()
    }

    #[cfg(test)]
    pub fn machine(&self) -> &TapHoldDisambiguator<C> {
        &self.machine
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until the multiplexer's waker fires
    pub fn run(&mut self) -> Result<(), EngineError> {
        info!(keyboards = self.active_sources(), "event loop running");
        while self.turn()? {}
        info!("event loop stopped");
        Ok(())
    }

    /// One wait plus servicing of every ready keyboard.
    ///
    /// Returns `false` once shutdown was requested.
    pub fn turn(&mut self) -> Result<bool, EngineError> {
        match self.mux.wait()? {
            Wake::Shutdown => Ok(false),
            Wake::Ready(ready) => {
                for readiness in ready {
                    self.service(readiness);
                }
                Ok(true)
            }
        }
    }

    fn service(&mut self, readiness: Readiness) {
        if readiness.hangup {
            self.disconnect(readiness.token);
            return;
        }
        if !readiness.readable {
            return;
        }

        let Some(source) = self.sources.get_mut(readiness.token).and_then(Option::as_mut) else {
            return;
        };
        match source.read_event() {
            Ok(event) => self.dispatch(&event),
            Err(e) => {
                warn!(path = ?source.path(), error = %e, "error reading event from keyboard");
            }
        }
    }

    fn dispatch(&mut self, event: &RawKeyEvent) {
        let transitions = self.machine.handle(event);
        if transitions.is_empty() {
            return;
        }
        if let Err(e) = output::inject_all(&mut self.sink, &transitions) {
            warn!(error = %e, "abandoning the rest of the substitute key sequence");
        }
    }

    fn disconnect(&mut self, token: Token) {
        let Some(source) = self.sources.get_mut(token).and_then(Option::take) else {
            return;
        };
        if let Err(e) = self.mux.deregister(source.fd(), token) {
            warn!(error = %e, "error removing keyboard from the readiness set");
        }
        warn!(path = ?source.path(), remaining = self.active_sources(), "keyboard disconnected");
        debug!(token, "keyboard handle closed");
    }
}

//! Readiness multiplexing over keyboard handles with `epoll(7)`
//!
//! An `eventfd` is registered next to the keyboards so another thread can
//! interrupt a blocked `wait`.

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use tracing::debug;

/// Identifies a registered handle; assigned by the caller
pub type Token = usize;

const WAKER_TOKEN: u64 = u64::MAX;

/// Errors from the multiplexer
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("failed to create epoll instance")]
    Create(#[source] io::Error),

    #[error("failed to create wakeup eventfd")]
    Waker(#[source] io::Error),

    #[error("handle capacity of {capacity} reached")]
    CapacityExceeded { capacity: usize },

    #[error("failed to register handle {token}")]
    Register {
        token: Token,
        #[source]
        source: io::Error,
    },

    #[error("failed to deregister handle {token}")]
    Deregister {
        token: Token,
        #[source]
        source: io::Error,
    },

    #[error("epoll wait failed")]
    Wait(#[source] io::Error),
}

/// Readiness of one registered handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub token: Token,
    pub readable: bool,
    /// Hang-up or error condition on the handle
    pub hangup: bool,
}

/// Outcome of a wait
#[derive(Debug, PartialEq, Eq)]
pub enum Wake {
    /// Non-empty, sorted by token
    Ready(Vec<Readiness>),
    Shutdown,
}

/// Interrupts a blocked [`Multiplexer::wait`] from any thread
#[derive(Debug, Clone)]
pub struct Waker {
    fd: Arc<OwnedFd>,
}

impl Waker {
    fn new() -> Result<Self, MuxError> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
        if fd < 0 {
            return Err(MuxError::Waker(io::Error::last_os_error()));
        }
        Ok(Self {
            fd: Arc::new(unsafe { OwnedFd::from_raw_fd(fd) }),
        })
    }

    pub fn wake(&self) -> io::Result<()> {
        let one: u64 = 1;
        let rc = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                (&one as *const u64).cast(),
                std::mem::size_of::<u64>(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Reset the counter, returning how many wakes were pending
    fn drain(&self) -> io::Result<u64> {
        let mut counter: u64 = 0;
        let rc = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                (&mut counter as *mut u64).cast(),
                std::mem::size_of::<u64>(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(counter)
    }
}

/// Bounded readiness set over keyboard handles
pub struct Multiplexer {
    epoll: OwnedFd,
    waker: Waker,
    capacity: usize,
    registered: Vec<Token>,
    events: Vec<libc::epoll_event>,
}

impl Multiplexer {
    pub fn new(capacity: usize) -> Result<Self, MuxError> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(MuxError::Create(io::Error::last_os_error()));
        }
        let epoll = unsafe { OwnedFd::from_raw_fd(fd) };
        let waker = Waker::new()?;

        let mut mux = Self {
            epoll,
            waker,
            capacity,
            registered: Vec::with_capacity(capacity),
            events: vec![libc::epoll_event { events: 0, u64: 0 }; capacity + 1],
        };
        let waker_fd = mux.waker.fd.as_raw_fd();
        mux.ctl_add(waker_fd, WAKER_TOKEN).map_err(MuxError::Waker)?;
        Ok(mux)
    }

    /// Handle for interrupting `wait`
    pub fn waker(&self) -> Waker {
        self.waker.clone()
    }

    #[cfg(test)]
    pub fn handle_count(&self) -> usize {
        self.registered.len()
    }

    /// Add a handle to the readiness set
    pub fn register(&mut self, fd: BorrowedFd<'_>, token: Token) -> Result<(), MuxError> {
        if self.registered.len() >= self.capacity {
            return Err(MuxError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.ctl_add(fd.as_raw_fd(), token as u64)
            .map_err(|source| MuxError::Register { token, source })?;
        self.registered.push(token);
        debug!(token, "handle registered");
        Ok(())
    }

    /// Remove a handle from the readiness set
    pub fn deregister(&mut self, fd: BorrowedFd<'_>, token: Token) -> Result<(), MuxError> {
        self.registered.retain(|t| *t != token);
        let rc = unsafe {
            libc::epoll_ctl(
                self.epoll.as_raw_fd(),
                libc::EPOLL_CTL_DEL,
                fd.as_raw_fd(),
                std::ptr::null_mut(),
            )
        };
        if rc < 0 {
            return Err(MuxError::Deregister {
                token,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    /// Block until a registered handle is ready or the waker fires.
    ///
    /// No timeout. `EINTR` is retried.
    pub fn wait(&mut self) -> Result<Wake, MuxError> {
        loop {
            let n = unsafe {
                libc::epoll_wait(
                    self.epoll.as_raw_fd(),
                    self.events.as_mut_ptr(),
                    self.events.len() as libc::c_int,
                    -1,
                )
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(MuxError::Wait(err));
            }

            let mut ready = Vec::with_capacity(n as usize);
            let mut shutdown = false;
            for event in &self.events[..n as usize] {
                let flags = event.events;
                let token = event.u64;
                if token == WAKER_TOKEN {
                    shutdown = true;
                    continue;
                }
                ready.push(Readiness {
                    token: token as Token,
                    readable: flags & libc::EPOLLIN as u32 != 0,
                    hangup: flags & (libc::EPOLLHUP | libc::EPOLLERR) as u32 != 0,
                });
            }

            if shutdown {
                if let Err(error) = self.waker.drain() {
                    debug!(%error, "failed to drain wakeup eventfd");
                }
                return Ok(Wake::Shutdown);
            }
            if ready.is_empty() {
                continue;
            }
            ready.sort_by_key(|r| r.token);
            return Ok(Wake::Ready(ready));
        }
    }

    fn ctl_add(&mut self, fd: RawFd, data: u64) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: data,
        };
        let rc = unsafe {
            libc::epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event)
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

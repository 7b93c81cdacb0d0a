//! Raw `input_event` reader for one physical keyboard node

use std::fs::File;
use std::io::{self, Read};
use std::mem;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::events::{EventClass, KeyValue, RawKeyEvent};

/// Size of one kernel `struct input_event` record
pub const RAW_EVENT_SIZE: usize = mem::size_of::<libc::input_event>();

/// Errors reading a record from a keyboard
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("short read: got {got} bytes of a kernel input record")]
    ShortRead { got: usize },

    #[error("read failed")]
    Io(#[from] io::Error),
}

/// A readable keyboard handle yielding one record per read
pub struct KeyboardSource<R = File> {
    path: PathBuf,
    reader: R,
}

impl KeyboardSource<File> {
    /// Open a device node read-only
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self::new(path, file))
    }
}

impl<R: Read + AsFd> KeyboardSource<R> {
    pub fn new(path: impl Into<PathBuf>, reader: R) -> Self {
        Self {
            path: path.into(),
            reader,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fd(&self) -> BorrowedFd<'_> {
        self.reader.as_fd()
    }

    /// Read exactly one record
    pub fn read_event(&mut self) -> Result<RawKeyEvent, SourceError> {
        let mut buf = [0u8; RAW_EVENT_SIZE];
        let got = self.reader.read(&mut buf)?;
        if got != RAW_EVENT_SIZE {
            return Err(SourceError::ShortRead { got });
        }
        Ok(decode(&buf))
    }
}

/// Decode a kernel record into a `RawKeyEvent`
pub fn decode(buf: &[u8; RAW_EVENT_SIZE]) -> RawKeyEvent {
    // SAFETY: input_event is plain data and the buffer is exactly its size.
    let raw: libc::input_event = unsafe { std::ptr::read_unaligned(buf.as_ptr().cast()) };

    let secs = u64::try_from(raw.time.tv_sec).unwrap_or(0);
    let micros = u32::try_from(raw.time.tv_usec).unwrap_or(0);

    RawKeyEvent {
        timestamp: Duration::new(secs, 0) + Duration::from_micros(u64::from(micros)),
        class: EventClass::from_raw(raw.type_),
        code: raw.code,
        value: KeyValue::from_raw(raw.value),
    }
}

/// Encode a record the way the kernel lays it out
#[cfg(test)]
pub fn encode(event: &RawKeyEvent) -> [u8; RAW_EVENT_SIZE] {
    let raw = libc::input_event {
        time: libc::timeval {
            tv_sec: event.timestamp.as_secs() as libc::time_t,
            tv_usec: event.timestamp.subsec_micros() as libc::suseconds_t,
        },
        type_: event.class.as_raw(),
        code: event.code,
        value: event.value.as_raw(),
    };
    let mut buf = [0u8; RAW_EVENT_SIZE];
    // SAFETY: same layout argument as `decode`.
    unsafe { std::ptr::write_unaligned(buf.as_mut_ptr().cast(), raw) };
    buf
}

//! Monotonic time source used to measure how long the modifier was held

use std::io;
use std::time::Duration;

/// Errors reading the time source
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("monotonic clock unavailable")]
    Unavailable(#[source] io::Error),

    #[error("clock reading went backwards")]
    WentBackwards,

    #[error("clock returned an out-of-range time ({secs}s {nanos}ns)")]
    OutOfRange {
        secs: libc::time_t,
        nanos: libc::c_long,
    },
}

/// A source of monotonic instants, expressed as time since an arbitrary origin
pub trait Clock {
    fn now(&self) -> Result<Duration, ClockError>;
}

/// `CLOCK_MONOTONIC` via `clock_gettime(2)`
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Result<Duration, ClockError> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        if rc < 0 {
            return Err(ClockError::Unavailable(io::Error::last_os_error()));
        }

        duration_from_timespec(&ts)
    }
}

fn duration_from_timespec(ts: &libc::timespec) -> Result<Duration, ClockError> {
    let out_of_range = || ClockError::OutOfRange {
        secs: ts.tv_sec,
        nanos: ts.tv_nsec,
    };
    let secs = u64::try_from(ts.tv_sec).map_err(|_| out_of_range())?;
    let nanos = u32::try_from(ts.tv_nsec)
        .ok()
        .filter(|n| *n < 1_000_000_000)
        .ok_or_else(out_of_range)?;
    Ok(Duration::new(secs, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock;
        let first = clock.now().unwrap();
        let second = clock.now().unwrap();
        assert!(second >= first);
    }

    #[test]
    fn test_negative_timespec_is_out_of_range() {
        let ts = libc::timespec {
            tv_sec: -1,
            tv_nsec: 0,
        };
        let err = duration_from_timespec(&ts).unwrap_err();
        assert!(matches!(err, ClockError::OutOfRange { secs: -1, nanos: 0 }));

        let ts = libc::timespec {
            tv_sec: 5,
            tv_nsec: -3,
        };
        assert!(matches!(
            duration_from_timespec(&ts),
            Err(ClockError::OutOfRange { secs: 5, nanos: -3 })
        ));
    }

    #[test]
    fn test_nanoseconds_past_one_second_are_out_of_range() {
        let ts = libc::timespec {
            tv_sec: 1,
            tv_nsec: 1_000_000_000,
        };
        assert!(matches!(
            duration_from_timespec(&ts),
            Err(ClockError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_timespec_converts_to_duration() {
        let ts = libc::timespec {
            tv_sec: 12,
            tv_nsec: 345_000_000,
        };
        assert_eq!(duration_from_timespec(&ts).unwrap(), Duration::from_millis(12_345));
    }
}

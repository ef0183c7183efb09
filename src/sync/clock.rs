//! Clock sources for slot stamps and condvar deadlines

use nix::time::{clock_gettime, ClockId};

/// Current time on the raw monotonic clock, in microseconds.
///
/// Slot timestamps and request/response stamps all come from this clock, so
/// comparisons between them are immune to wall-clock adjustments.
pub fn monotonic_now_us() -> u64 {
    // CLOCK_MONOTONIC_RAW cannot fail once the process is running
    let ts = clock_gettime(ClockId::CLOCK_MONOTONIC_RAW).unwrap_or_else(|_| {
        clock_gettime(ClockId::CLOCK_MONOTONIC).expect("monotonic clock unavailable")
    });
    (ts.tv_sec() as u64) * 1_000_000 + (ts.tv_nsec() as u64) / 1_000
}

/// Absolute realtime deadline `timeout_us` from now, for
/// `pthread_cond_timedwait` (whose default clock is `CLOCK_REALTIME`).
pub fn realtime_deadline_after_us(timeout_us: u64) -> libc::timespec {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts);
    }
    ts.tv_sec += (timeout_us / 1_000_000) as libc::time_t;
    ts.tv_nsec += ((timeout_us % 1_000_000) * 1_000) as libc::c_long;
    if ts.tv_nsec >= 1_000_000_000 {
        ts.tv_nsec -= 1_000_000_000;
        ts.tv_sec += 1;
    }
    ts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let a = monotonic_now_us();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = monotonic_now_us();
        assert!(b > a);
    }

    #[test]
    fn test_deadline_nanoseconds_normalized() {
        let ts = realtime_deadline_after_us(999_999);
        assert!(ts.tv_nsec < 1_000_000_000);
    }
}

//! Wall clock access, including setting the system time.

use crate::error::ClockError;

pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> i64;

    /// Set the system wall clock. Needs elevated privileges.
    fn set_system_time(&self, unix_seconds: i64) -> Result<(), ClockError>;
}

/// The host's real-time clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[cfg(target_os = "linux")]
    fn set_system_time(&self, unix_seconds: i64) -> Result<(), ClockError> {
        use nix::sys::time::TimeSpec;
        use nix::time::{clock_settime, ClockId};

        let secs = u64::try_from(unix_seconds).map_err(|_| ClockError::OutOfRange(unix_seconds))?;
        let spec = TimeSpec::from_duration(std::time::Duration::from_secs(secs));
        clock_settime(ClockId::CLOCK_REALTIME, spec).map_err(|errno| ClockError::Os(errno.to_string()))?;
        tracing::debug!(unix_seconds, "system clock set");
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn set_system_time(&self, _unix_seconds: i64) -> Result<(), ClockError> {
        Err(ClockError::Unsupported)
    }
}

/// Push the clock `offset_secs` past its current reading. Returns the new time.
pub fn advance<C: Clock + ?Sized>(clock: &C, offset_secs: i64) -> Result<i64, ClockError> {
    let forged = clock
        .now()
        .checked_add(offset_secs)
        .ok_or(ClockError::OutOfRange(offset_secs))?;
    clock.set_system_time(forged)?;
    Ok(forged)
}

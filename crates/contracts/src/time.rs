//! Time model: nanosecond counts since a monotonic reference.
//!
//! All timing math in the workspace runs on `Time`, a signed 64-bit
//! nanosecond count. Floating-point milliseconds are only used inside the
//! linear model where regression math needs them.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A point in time or a duration, counted in nanoseconds.
///
/// `Time` is deliberately ambiguous between "instant" and "duration"; the
/// reference point is whatever clock produced the value. Arithmetic is
/// saturating so that sentinel-adjacent math cannot wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Time(i64);

impl Time {
    /// Distinguished "no value" sentinel.
    pub const ERROR: Time = Time(i64::MIN);

    /// Zero nanoseconds.
    pub const ZERO: Time = Time(0);

    /// Construct from raw nanoseconds.
    pub const fn from_nanos(nanos: i64) -> Self {
        Time(nanos)
    }

    /// Construct from whole microseconds.
    pub const fn from_micros(micros: i64) -> Self {
        Time(micros.saturating_mul(1_000))
    }

    /// Construct from whole milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Time(millis.saturating_mul(1_000_000))
    }

    /// Construct from whole seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Time(secs.saturating_mul(1_000_000_000))
    }

    /// Construct from fractional milliseconds.
    pub fn from_millis_f64(millis: f64) -> Self {
        if !millis.is_finite() {
            return Time::ERROR;
        }
        Time((millis * 1_000_000.0).round() as i64)
    }

    /// Construct from fractional seconds.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() {
            return Time::ERROR;
        }
        Time((secs * 1_000_000_000.0).round() as i64)
    }

    /// Raw nanosecond count.
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Whole microseconds (truncated).
    pub const fn as_micros(self) -> i64 {
        self.0 / 1_000
    }

    /// Whole milliseconds (truncated).
    pub const fn as_millis(self) -> i64 {
        self.0 / 1_000_000
    }

    /// Whole seconds (truncated).
    pub const fn as_secs(self) -> i64 {
        self.0 / 1_000_000_000
    }

    /// Fractional milliseconds, the unit used by the linear model.
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Fractional seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Whether this value is the error sentinel.
    pub const fn is_error(self) -> bool {
        self.0 == i64::MIN
    }

    /// Absolute value; the sentinel stays the sentinel.
    pub fn abs(self) -> Self {
        if self.is_error() {
            self
        } else {
            Time(self.0.abs())
        }
    }

    /// The larger of two times.
    pub fn max(self, other: Time) -> Time {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    /// The smaller of two times.
    pub fn min(self, other: Time) -> Time {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Convert to `std::time::Duration`, clamping negatives to zero.
    pub fn to_duration(self) -> std::time::Duration {
        std::time::Duration::from_nanos(self.0.max(0) as u64)
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        Time(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        *self = *self + rhs;
    }
}

impl Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Time {
        Time(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Time) {
        *self = *self - rhs;
    }
}

impl Mul<i64> for Time {
    type Output = Time;

    fn mul(self, rhs: i64) -> Time {
        Time(self.0.saturating_mul(rhs))
    }
}

impl Div<i64> for Time {
    type Output = Time;

    fn div(self, rhs: i64) -> Time {
        Time(self.0 / rhs)
    }
}

impl Neg for Time {
    type Output = Time;

    fn neg(self) -> Time {
        Time(self.0.saturating_neg())
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            write!(f, "Time::ERROR")
        } else {
            write!(f, "{:.3}ms", self.as_millis_f64())
        }
    }
}

/// Clock abstraction shared by every timing component.
///
/// Replaces a process-wide clock singleton: components receive a
/// `SharedClock` through their configuration and never reach for globals.
pub trait Clock: Send + Sync {
    /// Nanoseconds since the clock's reference point.
    fn nanos(&self) -> i64;

    /// Move the reference point to "now".
    fn reset_start(&self);

    /// Human-readable clock name for diagnostics.
    fn name(&self) -> &str;

    /// Whether the underlying time source is monotonic.
    fn is_monotonic(&self) -> bool;

    /// Current time as a `Time`.
    fn now(&self) -> Time {
        Time::from_nanos(self.nanos())
    }
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// Monotonic clock anchored to a `std::time::Instant`.
pub struct MonotonicClock {
    start: Mutex<Instant>,
}

impl MonotonicClock {
    /// Create a clock anchored at the moment of construction.
    pub fn new() -> Self {
        Self {
            start: Mutex::new(Instant::now()),
        }
    }

    /// Convenience: a shared monotonic clock.
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn nanos(&self) -> i64 {
        self.start.lock().elapsed().as_nanos() as i64
    }

    fn reset_start(&self) {
        *self.start.lock() = Instant::now();
    }

    fn name(&self) -> &str {
        "monotonic_steady"
    }

    fn is_monotonic(&self) -> bool {
        true
    }
}

/// Manually advanced clock for deterministic tests.
///
/// `advance` moves time forward; `set_nanos` jumps to an absolute value.
pub struct ManualClock {
    nanos: std::sync::atomic::AtomicI64,
}

impl ManualClock {
    /// Create a manual clock starting at zero.
    pub fn new() -> Self {
        Self {
            nanos: std::sync::atomic::AtomicI64::new(0),
        }
    }

    /// Convenience: a shared manual clock plus a second handle for the test.
    pub fn shared() -> Arc<ManualClock> {
        Arc::new(Self::new())
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, by: Time) {
        self.nanos
            .fetch_add(by.as_nanos(), std::sync::atomic::Ordering::SeqCst);
    }

    /// Jump to an absolute nanosecond value.
    pub fn set_nanos(&self, nanos: i64) {
        self.nanos.store(nanos, std::sync::atomic::Ordering::SeqCst);
    }

    /// Current time, callable without `Clock` in scope.
    pub fn now(&self) -> Time {
        Time::from_nanos(self.nanos.load(std::sync::atomic::Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn nanos(&self) -> i64 {
        self.nanos.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn reset_start(&self) {
        self.nanos.store(0, std::sync::atomic::Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "manual_ticks"
    }

    fn is_monotonic(&self) -> bool {
        // Only if the test never calls set_nanos backwards.
        false
    }
}

// Millisecond timestamps and the interrupt-driven tick clock
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use core::cell::Cell;
use core::fmt;
use core::ops::Add;

use critical_section::Mutex;

/// A timestamp in milliseconds since the clock started.
///
/// The counter is 32 bits wide and wraps after about 49.7 days. Differences between timestamps are
/// taken with wrapping subtraction, so intervals stay correct across the wrap as long as they are
/// shorter than the full counter range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Millis(pub u32);

impl Millis {
    /// The clock's value at startup.
    pub const ZERO: Millis = Millis(0);

    /// Returns the number of milliseconds from `earlier` to `self`, modulo the counter width.
    #[must_use]
    pub fn wrapping_since(self, earlier: Millis) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Returns true if at least `interval_ms` milliseconds have passed since `earlier`.
    #[must_use]
    pub fn has_elapsed(self, earlier: Millis, interval_ms: u32) -> bool {
        self.wrapping_since(earlier) >= interval_ms
    }

    /// Returns the raw millisecond count.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Add<u32> for Millis {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        Millis(self.0.wrapping_add(rhs))
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A source of monotonic millisecond timestamps.
///
/// The control loop only ever asks for the current time; how the count is kept is up to the
/// implementation.
pub trait MonotonicClock {
    /// Returns the current time. Must not block.
    fn now(&self) -> Millis;
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for &C {
    fn now(&self) -> Millis {
        (**self).now()
    }
}

/// A millisecond counter advanced by a periodic timer interrupt.
///
/// Place it in a `static`, call [`TickClock::tick`] from the 1 kHz timer interrupt and hand a
/// `&'static TickClock` to the control loop. The counter itself is private: the only ways to touch
/// it are `tick` and `now`, both of which run inside a critical section so that a 32-bit value is
/// never observed half-updated on targets whose native word is narrower.
///
/// ```
/// use pid_loop::time::{Millis, MonotonicClock, TickClock};
///
/// static CLOCK: TickClock = TickClock::new();
///
/// // In the timer interrupt handler
/// CLOCK.tick();
/// CLOCK.tick();
///
/// assert_eq!(CLOCK.now(), Millis(2));
/// ```
pub struct TickClock {
    ticks: Mutex<Cell<u32>>,
}

impl TickClock {
    /// Creates a clock reading zero.
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a clock reading `ms`. Useful to exercise the counter wraparound.
    pub const fn starting_at(ms: u32) -> Self {
        Self {
            ticks: Mutex::new(Cell::new(ms)),
        }
    }

    /// Advances the counter by one millisecond. Call this from the timer interrupt.
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let ticks = self.ticks.borrow(cs);
            ticks.set(ticks.get().wrapping_add(1));
        });
    }

    /// Takes a snapshot of the counter with interrupts masked for the duration of the read.
    pub fn now(&self) -> Millis {
        Millis(critical_section::with(|cs| self.ticks.borrow(cs).get()))
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for TickClock {
    fn now(&self) -> Millis {
        TickClock::now(self)
    }
}

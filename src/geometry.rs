//! One-dimensional spans and manufacturing-grid arithmetic.

use layout21::raw::Int;
use serde::{Deserialize, Serialize};

/// A closed 1-D interval on the layout grid.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    start: Int,
    stop: Int,
}

impl Span {
    /// Creates a new [`Span`], sorting the endpoints.
    pub fn new(start: Int, stop: Int) -> Self {
        if start <= stop {
            Self { start, stop }
        } else {
            Self { start: stop, stop: start }
        }
    }

    /// A zero-length span at `point`.
    pub fn from_point(point: Int) -> Self {
        Self { start: point, stop: point }
    }

    pub fn with_start_and_length(start: Int, length: Int) -> Self {
        Self::new(start, start + length)
    }

    pub fn with_stop_and_length(stop: Int, length: Int) -> Self {
        Self::new(stop - length, stop)
    }

    #[inline]
    pub fn start(&self) -> Int {
        self.start
    }

    #[inline]
    pub fn stop(&self) -> Int {
        self.stop
    }

    #[inline]
    pub fn length(&self) -> Int {
        self.stop - self.start
    }

    /// Midpoint, rounded towards the start.
    pub fn center(&self) -> Int {
        (self.start + self.stop).div_euclid(2)
    }

    pub fn shift(&self, delta: Int) -> Self {
        Self {
            start: self.start + delta,
            stop: self.stop + delta,
        }
    }

    /// Grows the span by `amount` on both sides.
    pub fn expand_all(&self, amount: Int) -> Self {
        Self::new(self.start - amount, self.stop + amount)
    }

    pub fn union(&self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }

    pub fn contains(&self, point: Int) -> bool {
        self.start <= point && point <= self.stop
    }
}

/// Rounds `x` up to the nearest multiple of `multiple`.
pub fn round_up_to(x: Int, multiple: Int) -> Int {
    debug_assert!(multiple > 0);
    -((-x).div_euclid(multiple)) * multiple
}

/// Rounds `x` down to the nearest multiple of `multiple`.
pub fn round_down_to(x: Int, multiple: Int) -> Int {
    debug_assert!(multiple > 0);
    x.div_euclid(multiple) * multiple
}

/// Ceiling division for nonnegative pitches.
pub fn div_ceil(a: Int, b: Int) -> Int {
    debug_assert!(b > 0);
    -((-a).div_euclid(b))
}

pub fn gcd(mut a: Int, mut b: Int) -> Int {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs()
}

pub fn lcm(a: Int, b: Int) -> Int {
    if a == 0 || b == 0 {
        return 0;
    }
    (a / gcd(a, b) * b).abs()
}

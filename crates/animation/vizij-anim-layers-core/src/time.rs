//! Frame numbers, frame ranges and rates.

use serde::{Deserialize, Serialize};

/// Integer frame in tick resolution.
pub type FrameNumber = i32;

/// Inclusive range of frames. `None` on either side means unbounded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    #[serde(default)]
    pub lower: Option<FrameNumber>,
    #[serde(default)]
    pub upper: Option<FrameNumber>,
}

impl FrameRange {
    pub const fn all() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    pub fn new(lower: FrameNumber, upper: FrameNumber) -> Self {
        Self {
            lower: Some(lower.min(upper)),
            upper: Some(lower.max(upper)),
        }
    }

    #[inline]
    pub fn contains(&self, frame: FrameNumber) -> bool {
        self.lower.map_or(true, |lo| frame >= lo) && self.upper.map_or(true, |hi| frame <= hi)
    }

    pub fn is_bounded(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }

    /// Smallest range covering both.
    pub fn hull(&self, other: &FrameRange) -> FrameRange {
        let lower = match (self.lower, other.lower) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
        let upper = match (self.upper, other.upper) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        FrameRange { lower, upper }
    }

    /// Grows the range to include `frame`.
    pub fn include(&mut self, frame: FrameNumber) {
        if let Some(lo) = self.lower.as_mut() {
            *lo = (*lo).min(frame);
        }
        if let Some(hi) = self.upper.as_mut() {
            *hi = (*hi).max(frame);
        }
    }
}

/// Rational rate in frames per second.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn as_fps(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }

    /// Number of `tick` frames that make up one frame at this rate, at least 1.
    pub fn ticks_per_frame(&self, tick: FrameRate) -> FrameNumber {
        let fps = self.as_fps();
        if fps <= 0.0 {
            return 1;
        }
        let ticks = (tick.as_fps() / fps).round();
        if ticks < 1.0 {
            1
        } else {
            ticks as FrameNumber
        }
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::new(24, 1)
    }
}

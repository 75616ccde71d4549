//! Key interpolation modes and the curve math behind them.
//!
//! Cubic keys carry arrive/leave tangents in value-per-frame units; the auto
//! modes recompute them in `KeyedChannel::auto_set_tangents`.

pub mod functions;

use serde::{Deserialize, Serialize};

/// Interpolation used when a new key is created.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyInterpolation {
    Constant,
    Linear,
    /// Cubic with Catmull-Rom style tangents.
    Auto,
    /// Cubic with tangents flattened at local extrema to avoid overshoot.
    #[default]
    SmartAuto,
    /// Cubic with tangents left as authored.
    User,
}

impl KeyInterpolation {
    #[inline]
    pub fn is_cubic(self) -> bool {
        matches!(
            self,
            KeyInterpolation::Auto | KeyInterpolation::SmartAuto | KeyInterpolation::User
        )
    }

    #[inline]
    pub fn recomputes_tangents(self) -> bool {
        matches!(self, KeyInterpolation::Auto | KeyInterpolation::SmartAuto)
    }
}

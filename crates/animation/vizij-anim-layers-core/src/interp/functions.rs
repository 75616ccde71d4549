//! Interpolation helpers:
//! - lerp (linear segments)
//! - cubic hermite (cubic segments, tangents in value per frame)
//! - auto/smart-auto tangent computation

/// Linear interpolation of scalars.
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Normalized position of `x` in `[x0, x1]`, 0 when the span is degenerate.
#[inline]
pub fn inverse_lerp(x0: f64, x1: f64, x: f64) -> f64 {
    let span = x1 - x0;
    if span.abs() <= f64::EPSILON {
        0.0
    } else {
        (x - x0) / span
    }
}

/// Cubic hermite between `(v0, m0)` and `(v1, m1)` over a segment `dt` frames long.
#[inline]
pub fn hermite(v0: f64, m0: f64, v1: f64, m1: f64, dt: f64, s: f64) -> f64 {
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * v0 + h10 * dt * m0 + h01 * v1 + h11 * dt * m1
}

/// Central-difference slope through the neighbours of a key.
#[inline]
pub fn auto_tangent(prev: (f64, f64), next: (f64, f64)) -> f64 {
    let dt = next.0 - prev.0;
    if dt.abs() <= f64::EPSILON {
        0.0
    } else {
        (next.1 - prev.1) / dt
    }
}

/// Like [`auto_tangent`] but flat at local extrema and clamped so the segment
/// on either side cannot overshoot its end values.
pub fn smart_auto_tangent(prev: (f64, f64), cur: (f64, f64), next: (f64, f64)) -> f64 {
    let rising_in = cur.1 - prev.1;
    let rising_out = next.1 - cur.1;
    if rising_in * rising_out <= 0.0 {
        return 0.0;
    }
    let m = auto_tangent(prev, next);
    // A hermite segment stays monotonic while |m| <= 3 * secant slope.
    let left = 3.0 * rising_in / (cur.0 - prev.0).max(f64::EPSILON);
    let right = 3.0 * rising_out / (next.0 - cur.0).max(f64::EPSILON);
    let limit = left.abs().min(right.abs());
    m.clamp(-limit, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hermite_hits_endpoints() {
        assert_eq!(hermite(1.0, 0.3, 5.0, -2.0, 10.0, 0.0), 1.0);
        assert!((hermite(1.0, 0.3, 5.0, -2.0, 10.0, 1.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn hermite_with_secant_tangents_is_linear() {
        let v = hermite(0.0, 1.0, 10.0, 1.0, 10.0, 0.25);
        assert!((v - 2.5).abs() < 1e-12);
    }

    #[test]
    fn smart_auto_is_flat_at_extremum() {
        assert_eq!(smart_auto_tangent((0.0, 0.0), (5.0, 4.0), (10.0, 0.0)), 0.0);
        let m = smart_auto_tangent((0.0, 0.0), (5.0, 5.0), (10.0, 10.0));
        assert!((m - 1.0).abs() < 1e-12);
    }
}

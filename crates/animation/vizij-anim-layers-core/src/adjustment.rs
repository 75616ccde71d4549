//! Adjustment blending: reshape a sparse pose layer along the motion of the
//! base layer.
//!
//! For every pair of consecutive keys on a layer channel, the base channel is
//! sampled once per display frame across the pair. The layer's change over the
//! pair is then spread over those frames in proportion to how much the base
//! moved on each of them, and written back as layer keys.

use crate::channel::{Channel, ChannelValue, KeyedChannel};
use crate::error::{LayerError, Result};
use crate::interp::KeyInterpolation;
use crate::time::FrameNumber;

const CHANGE_EPSILON: f64 = 1e-8;

/// Two consecutive keys on a layer channel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KeyInterval {
    pub start_frame: FrameNumber,
    pub start_value: f64,
    pub end_frame: FrameNumber,
    pub end_value: f64,
}

pub fn key_intervals<V: ChannelValue>(channel: &KeyedChannel<V>) -> Vec<KeyInterval> {
    channel
        .keys()
        .windows(2)
        .map(|pair| KeyInterval {
            start_frame: pair[0].time,
            start_value: pair[0].value.to_f64(),
            end_frame: pair[1].time,
            end_value: pair[1].value.to_f64(),
        })
        .collect()
}

/// Samples `channel` every `interval` frames from `start`, always ending with
/// a sample at `end`.
pub fn sample_over_range<C: Channel>(
    channel: &C,
    start: FrameNumber,
    end: FrameNumber,
    interval: FrameNumber,
) -> Vec<(FrameNumber, f64)> {
    let step = interval.max(1);
    let mut samples = Vec::new();
    let mut t = start;
    while t < end {
        samples.push((t, channel.sample(t)));
        t = t.saturating_add(step);
    }
    samples.push((end, channel.sample(end)));
    samples
}

/// Share of the total movement covered by each step, in percent.
///
/// Entry `i` is stamped with the time at the end of step `i`. Steps are
/// signed so they point along the net direction of the samples. Returns
/// `None` when the samples do not move.
pub fn percentage_of_change(samples: &[(FrameNumber, f64)]) -> Option<Vec<(FrameNumber, f64)>> {
    let deltas: Vec<(FrameNumber, f64)> = samples
        .windows(2)
        .map(|w| (w[1].0, w[1].1 - w[0].1))
        .collect();
    let total: f64 = deltas.iter().map(|(_, d)| d.abs()).sum();
    if total <= CHANGE_EPSILON {
        return None;
    }
    let net: f64 = deltas.iter().map(|(_, d)| d).sum();
    let direction = if net < 0.0 { -1.0 } else { 1.0 };
    Some(
        deltas
            .into_iter()
            .map(|(t, d)| (t, 100.0 * d * direction / total))
            .collect(),
    )
}

/// Adjustment-blends one layer channel against its base channel.
/// Returns the number of keys written.
pub fn adjustment_blend_channel<B: Channel, V: ChannelValue>(
    base: &B,
    layer: &mut KeyedChannel<V>,
    interval: FrameNumber,
    interp: KeyInterpolation,
) -> usize {
    let mut written = 0;
    for span in key_intervals(layer) {
        let samples = sample_over_range(base, span.start_frame, span.end_frame, interval);
        let Some(percentages) = percentage_of_change(&samples) else {
            continue;
        };
        let layer_change = (span.end_value - span.start_value).abs();
        let rising = span.end_value > span.start_value;
        let mut previous = span.start_value;
        for (time, pct) in percentages {
            if time >= span.end_frame {
                break;
            }
            let delta = layer_change / 100.0 * pct;
            let value = if rising {
                previous + delta
            } else {
                previous - delta
            };
            layer.set_key_at(time, V::from_f64(value), interp);
            previous = value;
            written += 1;
        }
    }
    if written > 0 {
        layer.auto_set_tangents();
    }
    written
}

/// Runs [`adjustment_blend_channel`] pairwise over two channel lists.
pub fn adjustment_blend_sections<V: ChannelValue>(
    base: &[KeyedChannel<V>],
    layer: &mut [KeyedChannel<V>],
    interval: FrameNumber,
    interp: KeyInterpolation,
) -> Result<usize> {
    if base.len() != layer.len() {
        log::warn!(
            "adjustment blend skipped: base has {} channels, layer has {}",
            base.len(),
            layer.len()
        );
        return Err(LayerError::ChannelCountMismatch {
            base: base.len(),
            top: layer.len(),
        });
    }
    Ok(base
        .iter()
        .zip(layer.iter_mut())
        .map(|(b, l)| adjustment_blend_channel(b, l, interval, interp))
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DoubleChannel;

    #[test]
    fn samples_include_both_ends() {
        let ch = DoubleChannel::from_keys(&[(0, 0.0), (10, 10.0)], KeyInterpolation::Linear);
        let s = sample_over_range(&ch, 0, 10, 4);
        assert_eq!(s, vec![(0, 0.0), (4, 4.0), (8, 8.0), (10, 10.0)]);
    }

    #[test]
    fn percentages_sum_to_hundred_for_monotonic_motion() {
        let p = percentage_of_change(&[(0, 10.0), (1, 7.0), (2, 6.0), (3, 2.0)]).unwrap();
        let sum: f64 = p.iter().map(|(_, v)| v).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert!(p.iter().all(|(_, v)| *v > 0.0));
        assert_eq!(p[0].0, 1);
    }

    #[test]
    fn flat_motion_has_no_percentages() {
        assert!(percentage_of_change(&[(0, 1.0), (1, 1.0), (2, 1.0)]).is_none());
    }
}

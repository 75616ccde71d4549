//! Keyframe channels.
//!
//! [`Channel`] is the seam the merge and adjustment code is written against;
//! [`KeyedChannel`] is the in-memory curve sections store, instantiated for
//! `f32` (rig and weight channels) and `f64` (transform channels).

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ids::KeyHandle;
use crate::interp::functions::{auto_tangent, hermite, inverse_lerp, lerp, smart_auto_tangent};
use crate::interp::KeyInterpolation;
use crate::time::{FrameNumber, FrameRange};

/// Numeric storage of a channel.
pub trait ChannelValue:
    Copy + Debug + Default + PartialEq + Serialize + DeserializeOwned + 'static
{
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
}

impl ChannelValue for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl ChannelValue for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
}

/// Keyframe container operations used by the layer engine.
pub trait Channel {
    type Value: ChannelValue;

    /// Value at `time`; `None` when the channel has neither keys nor a default.
    fn evaluate(&self, time: FrameNumber) -> Option<Self::Value>;
    /// Key times and handles inside `range`, in time order.
    fn keys_in_range(&self, range: FrameRange) -> Vec<(FrameNumber, KeyHandle)>;
    /// Adds a key, replacing the value of an existing key at the same time.
    fn add_key(
        &mut self,
        time: FrameNumber,
        value: Self::Value,
        interp: KeyInterpolation,
    ) -> KeyHandle;
    /// Returns false when the handle is unknown.
    fn assign_value(&mut self, handle: KeyHandle, value: Self::Value) -> bool;
    fn delete_keys(&mut self, handles: &[KeyHandle]);
    fn set_default(&mut self, value: Self::Value);
    fn default_value(&self) -> Option<Self::Value>;
    fn num_keys(&self) -> usize;
    fn auto_set_tangents(&mut self);

    fn key_at(&self, time: FrameNumber) -> Option<KeyHandle> {
        self.keys_in_range(FrameRange::new(time, time))
            .first()
            .map(|(_, h)| *h)
    }

    /// Assigns the key at `time` or adds one.
    fn set_key_at(&mut self, time: FrameNumber, value: Self::Value, interp: KeyInterpolation) {
        match self.key_at(time) {
            Some(handle) => {
                self.assign_value(handle, value);
            }
            None => {
                self.add_key(time, value, interp);
            }
        }
    }

    /// Evaluated value as `f64`, zero when the channel is empty.
    fn sample(&self, time: FrameNumber) -> f64 {
        self.evaluate(time).map(ChannelValue::to_f64).unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Key<V> {
    pub handle: KeyHandle,
    pub time: FrameNumber,
    pub value: V,
    pub interp: KeyInterpolation,
    pub arrive_tangent: f64,
    pub leave_tangent: f64,
}

/// Sorted keyframe curve with an optional default value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "ChannelData<V>", into = "ChannelData<V>")]
#[serde(bound(serialize = "V: ChannelValue", deserialize = "V: ChannelValue"))]
pub struct KeyedChannel<V: ChannelValue> {
    keys: Vec<Key<V>>,
    default: Option<V>,
    next_handle: u32,
}

pub type FloatChannel = KeyedChannel<f32>;
pub type DoubleChannel = KeyedChannel<f64>;

impl<V: ChannelValue> Default for KeyedChannel<V> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            default: None,
            next_handle: 0,
        }
    }
}

impl<V: ChannelValue> KeyedChannel<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(value: V) -> Self {
        Self {
            default: Some(value),
            ..Self::default()
        }
    }

    /// Builds a channel from `(time, value)` pairs sharing one interpolation.
    pub fn from_keys(keys: &[(FrameNumber, V)], interp: KeyInterpolation) -> Self {
        let mut channel = Self::new();
        for (time, value) in keys {
            channel.add_key(*time, *value, interp);
        }
        channel.auto_set_tangents();
        channel
    }

    pub fn keys(&self) -> &[Key<V>] {
        &self.keys
    }

    pub fn key_times(&self) -> Vec<FrameNumber> {
        self.keys.iter().map(|k| k.time).collect()
    }

    /// First and last key time.
    pub fn key_extent(&self) -> Option<(FrameNumber, FrameNumber)> {
        match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time)),
            _ => None,
        }
    }

    pub fn clear_default(&mut self) {
        self.default = None;
    }

    fn alloc_handle(&mut self) -> KeyHandle {
        let handle = KeyHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        handle
    }

    fn segment_value(&self, bounds: &ChannelKeyBounds, time: FrameNumber) -> f64 {
        let k0 = &self.keys[bounds.previous_index];
        let k1 = &self.keys[bounds.next_index];
        let s = inverse_lerp(k0.time as f64, k1.time as f64, time as f64);
        match k0.interp {
            KeyInterpolation::Constant => bounds.previous_value,
            KeyInterpolation::Linear => lerp(bounds.previous_value, bounds.next_value, s),
            _ => hermite(
                bounds.previous_value,
                k0.leave_tangent,
                bounds.next_value,
                k1.arrive_tangent,
                (k1.time - k0.time) as f64,
                s,
            ),
        }
    }

    /// Removes interior keys inside `range` whose removal changes the curve by
    /// at most `tolerance` at that key. Returns the number of keys removed.
    pub fn reduce_keys(&mut self, range: FrameRange, tolerance: f64) -> usize {
        let mut removed = 0;
        let mut i = 1;
        while i + 1 < self.keys.len() {
            let key = &self.keys[i];
            if !range.contains(key.time) {
                i += 1;
                continue;
            }
            let (time, original) = (key.time, key.value.to_f64());
            let mut candidate = self.clone();
            candidate.keys.remove(i);
            candidate.auto_set_tangents();
            if (candidate.sample(time) - original).abs() <= tolerance {
                *self = candidate;
                removed += 1;
            } else {
                i += 1;
            }
        }
        removed
    }

    /// Spread between the smallest and largest key value.
    pub fn value_span(&self) -> f64 {
        let mut iter = self.keys.iter().map(|k| k.value.to_f64());
        let Some(first) = iter.next() else {
            return 0.0;
        };
        let (lo, hi) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        hi - lo
    }
}

impl<V: ChannelValue> Channel for KeyedChannel<V> {
    type Value = V;

    fn evaluate(&self, time: FrameNumber) -> Option<V> {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return self.default,
        };
        if time <= first.time {
            return Some(first.value);
        }
        if time >= last.time {
            return Some(last.value);
        }
        let bounds = ChannelKeyBounds::at(self, time);
        if !bounds.valid {
            return Some(self.keys[bounds.previous_index].value);
        }
        Some(V::from_f64(self.segment_value(&bounds, time)))
    }

    fn keys_in_range(&self, range: FrameRange) -> Vec<(FrameNumber, KeyHandle)> {
        self.keys
            .iter()
            .filter(|k| range.contains(k.time))
            .map(|k| (k.time, k.handle))
            .collect()
    }

    fn add_key(&mut self, time: FrameNumber, value: V, interp: KeyInterpolation) -> KeyHandle {
        match self.keys.binary_search_by_key(&time, |k| k.time) {
            Ok(idx) => {
                let key = &mut self.keys[idx];
                key.value = value;
                key.interp = interp;
                key.handle
            }
            Err(idx) => {
                let handle = self.alloc_handle();
                self.keys.insert(
                    idx,
                    Key {
                        handle,
                        time,
                        value,
                        interp,
                        arrive_tangent: 0.0,
                        leave_tangent: 0.0,
                    },
                );
                handle
            }
        }
    }

    fn assign_value(&mut self, handle: KeyHandle, value: V) -> bool {
        match self.keys.iter_mut().find(|k| k.handle == handle) {
            Some(key) => {
                key.value = value;
                true
            }
            None => false,
        }
    }

    fn delete_keys(&mut self, handles: &[KeyHandle]) {
        self.keys.retain(|k| !handles.contains(&k.handle));
    }

    fn set_default(&mut self, value: V) {
        self.default = Some(value);
    }

    fn default_value(&self) -> Option<V> {
        self.default
    }

    fn num_keys(&self) -> usize {
        self.keys.len()
    }

    fn auto_set_tangents(&mut self) {
        let len = self.keys.len();
        for i in 0..len {
            let interp = self.keys[i].interp;
            if !interp.recomputes_tangents() {
                continue;
            }
            let m = if i == 0 || i + 1 == len {
                0.0
            } else {
                let point = |k: &Key<V>| (k.time as f64, k.value.to_f64());
                let prev = point(&self.keys[i - 1]);
                let cur = point(&self.keys[i]);
                let next = point(&self.keys[i + 1]);
                match interp {
                    KeyInterpolation::Auto => auto_tangent(prev, next),
                    _ => smart_auto_tangent(prev, cur, next),
                }
            };
            let key = &mut self.keys[i];
            key.arrive_tangent = m;
            key.leave_tangent = m;
        }
    }
}

/// The keys bracketing a query time on one channel.
///
/// `valid` requires two distinct bounding keys; outside the key extent or on
/// a channel with fewer than two keys the bounds are invalid.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ChannelKeyBounds {
    pub previous_index: usize,
    pub next_index: usize,
    pub previous_frame: FrameNumber,
    pub next_frame: FrameNumber,
    pub previous_value: f64,
    pub next_value: f64,
    pub valid: bool,
}

impl ChannelKeyBounds {
    pub fn at<V: ChannelValue>(channel: &KeyedChannel<V>, time: FrameNumber) -> Self {
        let keys = channel.keys();
        // Index of the first key strictly after `time`.
        let after = keys.partition_point(|k| k.time <= time);
        if after == 0 || after >= keys.len() {
            let mut bounds = Self::default();
            if let Some(idx) = after.checked_sub(1) {
                bounds.previous_index = idx;
                bounds.previous_frame = keys[idx].time;
                bounds.previous_value = keys[idx].value.to_f64();
            }
            return bounds;
        }
        let prev = &keys[after - 1];
        let next = &keys[after];
        Self {
            previous_index: after - 1,
            next_index: after,
            previous_frame: prev.time,
            next_frame: next.time,
            previous_value: prev.value.to_f64(),
            next_value: next.value.to_f64(),
            valid: true,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(bound(serialize = "V: ChannelValue", deserialize = "V: ChannelValue"))]
struct KeyData<V> {
    time: FrameNumber,
    value: V,
    #[serde(default)]
    interp: KeyInterpolation,
    #[serde(default)]
    arrive_tangent: f64,
    #[serde(default)]
    leave_tangent: f64,
}

#[derive(Serialize, Deserialize)]
#[serde(bound(serialize = "V: ChannelValue", deserialize = "V: ChannelValue"))]
struct ChannelData<V> {
    #[serde(default)]
    keys: Vec<KeyData<V>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<V>,
}

impl<V: ChannelValue> From<ChannelData<V>> for KeyedChannel<V> {
    fn from(data: ChannelData<V>) -> Self {
        let mut channel = KeyedChannel {
            default: data.default,
            ..KeyedChannel::default()
        };
        for k in data.keys {
            let handle = channel.add_key(k.time, k.value, k.interp);
            if let Some(key) = channel.keys.iter_mut().find(|key| key.handle == handle) {
                key.arrive_tangent = k.arrive_tangent;
                key.leave_tangent = k.leave_tangent;
            }
        }
        channel.auto_set_tangents();
        channel
    }
}

impl<V: ChannelValue> From<KeyedChannel<V>> for ChannelData<V> {
    fn from(channel: KeyedChannel<V>) -> Self {
        ChannelData {
            keys: channel
                .keys
                .into_iter()
                .map(|k| KeyData {
                    time: k.time,
                    value: k.value,
                    interp: k.interp,
                    arrive_tangent: k.arrive_tangent,
                    leave_tangent: k.leave_tangent,
                })
                .collect(),
            default: channel.default,
        }
    }
}

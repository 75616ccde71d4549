//! Host-owned sections: typed channel storage plus blend metadata.

use std::ops::{BitOr, BitOrAssign};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelValue, DoubleChannel, FloatChannel, KeyedChannel};
use crate::mapping::ChannelLayout;
use crate::time::{FrameNumber, FrameRange};

/// How a section combines with the sections below it on the same track.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendType {
    Absolute,
    Additive,
    Override,
}

/// Transform component mask, also used for property channel sets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelBits(pub u32);

impl ChannelBits {
    pub const NONE: ChannelBits = ChannelBits(0);
    pub const TRANSLATION_X: ChannelBits = ChannelBits(1 << 0);
    pub const TRANSLATION_Y: ChannelBits = ChannelBits(1 << 1);
    pub const TRANSLATION_Z: ChannelBits = ChannelBits(1 << 2);
    pub const ROTATION_X: ChannelBits = ChannelBits(1 << 3);
    pub const ROTATION_Y: ChannelBits = ChannelBits(1 << 4);
    pub const ROTATION_Z: ChannelBits = ChannelBits(1 << 5);
    pub const SCALE_X: ChannelBits = ChannelBits(1 << 6);
    pub const SCALE_Y: ChannelBits = ChannelBits(1 << 7);
    pub const SCALE_Z: ChannelBits = ChannelBits(1 << 8);
    pub const WEIGHT: ChannelBits = ChannelBits(1 << 9);
    pub const ALL_TRANSFORM: ChannelBits = ChannelBits(0x1FF);
    pub const ALL: ChannelBits = ChannelBits(0x3FF);

    #[inline]
    pub const fn contains(self, other: ChannelBits) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(self, other: ChannelBits) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn remove(&mut self, other: ChannelBits) {
        self.0 &= !other.0;
    }
}

impl BitOr for ChannelBits {
    type Output = ChannelBits;
    fn bitor(self, rhs: ChannelBits) -> ChannelBits {
        ChannelBits(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChannelBits {
    fn bitor_assign(&mut self, rhs: ChannelBits) {
        self.0 |= rhs.0;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    /// Nine double channels: translation, rotation, scale.
    Transform,
    /// Float channels laid out per control by a [`ChannelLayout`].
    ControlRig,
    /// Plain property channels.
    Property,
}

/// Channel storage of a section; every channel in one section shares a type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SectionChannels {
    Float(Vec<FloatChannel>),
    Double(Vec<DoubleChannel>),
}

impl SectionChannels {
    pub fn len(&self) -> usize {
        match self {
            SectionChannels::Float(c) => c.len(),
            SectionChannels::Double(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn same_storage(&self, other: &SectionChannels) -> bool {
        matches!(
            (self, other),
            (SectionChannels::Float(_), SectionChannels::Float(_))
                | (SectionChannels::Double(_), SectionChannels::Double(_))
        )
    }

    pub fn sample(&self, index: usize, time: FrameNumber) -> Option<f64> {
        match self {
            SectionChannels::Float(c) => c.get(index).map(|ch| ch.sample(time)),
            SectionChannels::Double(c) => c.get(index).map(|ch| ch.sample(time)),
        }
    }

    /// Like [`SectionChannels::sample`] but `None` for a channel with
    /// neither keys nor a default.
    pub fn evaluate(&self, index: usize, time: FrameNumber) -> Option<f64> {
        match self {
            SectionChannels::Float(c) => c.get(index)?.evaluate(time).map(ChannelValue::to_f64),
            SectionChannels::Double(c) => c.get(index)?.evaluate(time).map(ChannelValue::to_f64),
        }
    }

    pub fn key_times(&self, index: usize) -> Vec<FrameNumber> {
        match self {
            SectionChannels::Float(c) => c.get(index).map(|ch| ch.key_times()),
            SectionChannels::Double(c) => c.get(index).map(|ch| ch.key_times()),
        }
        .unwrap_or_default()
    }

    pub fn set_default(&mut self, index: usize, value: f64) {
        match self {
            SectionChannels::Float(c) => {
                if let Some(ch) = c.get_mut(index) {
                    ch.set_default(value as f32);
                }
            }
            SectionChannels::Double(c) => {
                if let Some(ch) = c.get_mut(index) {
                    ch.set_default(value);
                }
            }
        }
    }
}

/// Projects the typed channel list out of [`SectionChannels`] so algorithms
/// can be written once per channel value type.
pub trait SectionChannelKind: ChannelValue {
    fn select(channels: &SectionChannels) -> Option<&Vec<KeyedChannel<Self>>>;
    fn select_mut(channels: &mut SectionChannels) -> Option<&mut Vec<KeyedChannel<Self>>>;
}

impl SectionChannelKind for f32 {
    fn select(channels: &SectionChannels) -> Option<&Vec<FloatChannel>> {
        match channels {
            SectionChannels::Float(c) => Some(c),
            SectionChannels::Double(_) => None,
        }
    }
    fn select_mut(channels: &mut SectionChannels) -> Option<&mut Vec<FloatChannel>> {
        match channels {
            SectionChannels::Float(c) => Some(c),
            SectionChannels::Double(_) => None,
        }
    }
}

impl SectionChannelKind for f64 {
    fn select(channels: &SectionChannels) -> Option<&Vec<DoubleChannel>> {
        match channels {
            SectionChannels::Double(c) => Some(c),
            SectionChannels::Float(_) => None,
        }
    }
    fn select_mut(channels: &mut SectionChannels) -> Option<&mut Vec<DoubleChannel>> {
        match channels {
            SectionChannels::Double(c) => Some(c),
            SectionChannels::Float(_) => None,
        }
    }
}

/// A block of keyed channels on a track row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub channels: SectionChannels,
    /// Time-varying weight. Sections without one always weigh 1.0.
    #[serde(default)]
    pub weight: Option<FloatChannel>,
    #[serde(default)]
    pub blend_type: Option<BlendType>,
    pub active: bool,
    pub locked: bool,
    pub range: FrameRange,
    pub row_index: i32,
    pub overlap_priority: i32,
    /// Transform components and weight this section contributes.
    pub mask: ChannelBits,
    /// Rig control layout; empty for non-rig sections.
    #[serde(default)]
    pub layout: ChannelLayout,
    /// Explicit per-control enable flags. Controls not listed are enabled.
    #[serde(default)]
    pub control_mask: HashMap<String, bool>,
}

impl Section {
    pub fn new(kind: SectionKind, channels: SectionChannels) -> Self {
        let weight = match kind {
            SectionKind::Property => None,
            SectionKind::Transform | SectionKind::ControlRig => Some(FloatChannel::new()),
        };
        Self {
            kind,
            channels,
            weight,
            blend_type: None,
            active: true,
            locked: false,
            range: FrameRange::all(),
            row_index: 0,
            overlap_priority: 0,
            mask: ChannelBits::ALL_TRANSFORM,
            layout: ChannelLayout::default(),
            control_mask: HashMap::new(),
        }
    }

    /// Nine double channels for translation, rotation and scale.
    pub fn transform() -> Self {
        let channels = (0..9).map(|_| DoubleChannel::new()).collect();
        Self::new(SectionKind::Transform, SectionChannels::Double(channels))
    }

    pub fn control_rig(layout: ChannelLayout) -> Self {
        let channels = (0..layout.total_channels)
            .map(|_| FloatChannel::new())
            .collect();
        let mut section = Self::new(SectionKind::ControlRig, SectionChannels::Float(channels));
        section.layout = layout;
        section
    }

    pub fn is_control_rig(&self) -> bool {
        self.kind == SectionKind::ControlRig
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Section weight at `time`; 1.0 when the section has no weight curve or
    /// the curve is empty.
    pub fn weight_at(&self, time: FrameNumber) -> f64 {
        self.weight
            .as_ref()
            .and_then(|w| w.evaluate(time))
            .map(ChannelValue::to_f64)
            .unwrap_or(1.0)
    }

    pub fn sample(&self, index: usize, time: FrameNumber) -> Option<f64> {
        self.channels.sample(index, time)
    }

    pub fn control_enabled(&self, name: &str) -> bool {
        self.control_mask.get(name).copied().unwrap_or(true)
    }

    pub fn set_control_enabled(&mut self, name: &str, enabled: bool) {
        self.control_mask.insert(name.to_string(), enabled);
    }

    /// Sets every control in the layout to `enabled`.
    pub fn fill_control_mask(&mut self, enabled: bool) {
        self.control_mask = self
            .layout
            .controls
            .keys()
            .map(|name| (name.clone(), enabled))
            .collect();
    }

    pub fn enabled_controls(&self) -> Vec<String> {
        self.layout
            .controls
            .keys()
            .filter(|name| self.control_enabled(name))
            .cloned()
            .collect()
    }

    /// Widens the section range so it contains `time`.
    pub fn expand_to_frame(&mut self, time: FrameNumber) {
        self.range.include(time);
    }
}

//! Control value kinds and their layout in a section's float channels.
//!
//! Each animatable control of a rig owns a contiguous block of channels; the
//! block size depends only on the control's value kind.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::section::ChannelBits;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKind {
    Bool,
    Integer,
    Float,
    ScaleFloat,
    Vector2D,
    Position,
    Scale,
    Rotator,
    TransformNoScale,
    Transform,
    EulerTransform,
    #[serde(other)]
    Unknown,
}

impl ControlKind {
    /// Number of float channels the kind occupies; zero for kinds that are
    /// not stored as float curves.
    pub const fn channel_count(self) -> usize {
        match self {
            ControlKind::Float | ControlKind::ScaleFloat => 1,
            ControlKind::Vector2D => 2,
            ControlKind::Position | ControlKind::Scale | ControlKind::Rotator => 3,
            ControlKind::TransformNoScale => 6,
            ControlKind::Transform | ControlKind::EulerTransform => 9,
            ControlKind::Bool | ControlKind::Integer | ControlKind::Unknown => 0,
        }
    }

    pub const fn is_transform_like(self) -> bool {
        matches!(
            self,
            ControlKind::Transform | ControlKind::TransformNoScale | ControlKind::EulerTransform
        )
    }
}

/// Inclusive channel index range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChannelRange {
    pub start: usize,
    pub end: usize,
}

impl ChannelRange {
    #[inline]
    pub fn single(index: usize) -> Self {
        Self {
            start: index,
            end: index,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Channels occupied by a control of `kind` whose block begins at `base`.
/// Kinds without float channels contribute nothing.
pub fn channel_range(kind: ControlKind, base: usize) -> Option<ChannelRange> {
    match kind.channel_count() {
        0 => None,
        n => Some(ChannelRange {
            start: base,
            end: base + n - 1,
        }),
    }
}

/// Where a control's block starts inside a section.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapInfo {
    pub channel_index: usize,
    pub kind: ControlKind,
}

impl ChannelMapInfo {
    pub fn range(&self) -> Option<ChannelRange> {
        channel_range(self.kind, self.channel_index)
    }
}

/// A rig control as seen by the layer engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigControl {
    pub name: String,
    pub kind: ControlKind,
    #[serde(default = "default_animatable")]
    pub animatable: bool,
}

fn default_animatable() -> bool {
    true
}

/// Per-section control name → channel block table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelLayout {
    pub controls: IndexMap<String, ChannelMapInfo>,
    pub total_channels: usize,
}

impl ChannelLayout {
    /// Packs the animatable controls back to back in declaration order.
    pub fn build(controls: &[RigControl]) -> Self {
        let mut layout = ChannelLayout::default();
        for control in controls.iter().filter(|c| c.animatable) {
            let info = ChannelMapInfo {
                channel_index: layout.total_channels,
                kind: control.kind,
            };
            layout.total_channels += control.kind.channel_count();
            layout.controls.insert(control.name.clone(), info);
        }
        layout
    }

    pub fn get(&self, name: &str) -> Option<&ChannelMapInfo> {
        self.controls.get(name)
    }

    /// Name of the control whose block contains channel `index`.
    pub fn control_at(&self, index: usize) -> Option<&str> {
        self.controls
            .iter()
            .find(|(_, info)| info.range().is_some_and(|r| r.indices().contains(&index)))
            .map(|(name, _)| name.as_str())
    }
}

/// Channel order inside a transform block.
const COMPONENTS: [ChannelBits; 9] = [
    ChannelBits::TRANSLATION_X,
    ChannelBits::TRANSLATION_Y,
    ChannelBits::TRANSLATION_Z,
    ChannelBits::ROTATION_X,
    ChannelBits::ROTATION_Y,
    ChannelBits::ROTATION_Z,
    ChannelBits::SCALE_X,
    ChannelBits::SCALE_Y,
    ChannelBits::SCALE_Z,
];

/// Single-channel ranges for each transform component enabled in both masks.
///
/// Non-transform kinds always yield their full range.
pub fn masked_component_ranges(
    kind: ControlKind,
    base: usize,
    base_mask: ChannelBits,
    top_mask: ChannelBits,
) -> Vec<ChannelRange> {
    let Some(full) = channel_range(kind, base) else {
        return Vec::new();
    };
    if !kind.is_transform_like() {
        return vec![full];
    }
    COMPONENTS
        .iter()
        .enumerate()
        .take(kind.channel_count())
        .filter(|(_, bit)| base_mask.contains(**bit) && top_mask.contains(**bit))
        .map(|(offset, _)| ChannelRange::single(base + offset))
        .collect()
}

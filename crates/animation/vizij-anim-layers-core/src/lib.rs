//! Vizij Anim Layers Core (engine-agnostic)
//!
//! An ordered stack of animation layers over a host sequence. Layers own
//! sections on the sequence's tracks; the Base layer at index 0 refers to the
//! first absolute section of every layered track. The crate merges layers
//! channel by channel (average, additive or override), duplicates and deletes
//! them, keys passthrough values and adjustment-blends sparse pose layers
//! against the base motion.
//!
//! The host editor is reached through [`SequencerHost`]; [`EditorSession`] is
//! an in-memory implementation used by tests and tools.

pub mod accumulate;
pub mod adjustment;
pub mod channel;
pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod host;
pub mod ids;
pub mod interp;
pub mod layer;
pub mod mapping;
pub mod merge;
pub mod section;
pub mod sequence;
pub mod stack;
pub mod time;

// Re-exports for consumers (adapters)
pub use accumulate::SectionStack;
pub use adjustment::{adjustment_blend_channel, adjustment_blend_sections};
pub use channel::{Channel, ChannelValue, DoubleChannel, FloatChannel, KeyedChannel};
pub use config::{BakingKeySettings, Config, MergeSettings};
pub use error::{LayerError, Result};
pub use events::LayerEvent;
pub use host::{Clock, DataChange, EditorSession, Selection, SequencerHost};
pub use ids::{KeyHandle, SectionId, TargetId, TrackId};
pub use interp::KeyInterpolation;
pub use layer::{
    AnimLayer, AnimLayerState, AnimLayerType, CheckState, LayerItem, PropertyChannelSet,
    PropertyKeyedStatus, SectionItem,
};
pub use mapping::{ChannelLayout, ChannelRange, ControlKind, RigControl};
pub use merge::{
    merge_channels, merge_section_pair, revert_weight_channel_to_one, ChannelMerge, MergeOutcome,
    MergePolicy,
};
pub use section::{BlendType, ChannelBits, Section, SectionChannels, SectionKind};
pub use sequence::{ChannelStorage, Rig, Sequence, TargetKind, TrackKind};
pub use stack::AnimLayers;
pub use time::{FrameNumber, FrameRange, FrameRate};

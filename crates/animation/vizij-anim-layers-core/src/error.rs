//! Error types for layer and merge operations.
//!
//! Public stack operations report success as `bool`/`Option` and log the
//! error; the internal helpers return [`Result`] so callers can use `?`.

use thiserror::Error;

use crate::ids::{SectionId, TrackId};

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum LayerError {
    #[error("section handle {0} no longer resolves")]
    StaleSection(SectionId),
    #[error("track {0:?} does not exist")]
    MissingTrack(TrackId),
    #[error("channel count mismatch: base has {base}, top has {top}")]
    ChannelCountMismatch { base: usize, top: usize },
    #[error("channel storage mismatch between base and top sections")]
    ChannelTypeMismatch,
    #[error("channel range {start}..={end} is out of bounds for {len} channels")]
    ChannelRangeOutOfBounds { start: usize, end: usize, len: usize },
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

pub type Result<T> = std::result::Result<T, LayerError>;

//! Configuration for layer naming and merge behavior.

use serde::{Deserialize, Serialize};

use crate::error::{LayerError, Result};
use crate::time::FrameNumber;

fn parse<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| LayerError::InvalidJson(e.to_string()))
}

/// Which frames a layer merge writes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BakingKeySettings {
    /// Only the frames the merged layer has keys on.
    #[default]
    KeysOnly,
    /// Every `frame_increment` display frames across the playback range.
    AllFrames,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    pub baking: BakingKeySettings,
    /// Display frames between baked keys.
    pub frame_increment: FrameNumber,
    /// Run key reduction on every merged section.
    pub reduce_keys: bool,
    /// Reduction tolerance, relative to each channel's value span.
    pub tolerance_percentage: f64,
}

impl MergeSettings {
    /// Parses settings from JSON; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        parse(text)
    }

    /// Bake step in ticks, `None` when only keys are merged.
    pub fn bake_step(&self, display_interval: FrameNumber) -> Option<FrameNumber> {
        match self.baking {
            BakingKeySettings::KeysOnly => None,
            BakingKeySettings::AllFrames => {
                Some(self.frame_increment.max(1).saturating_mul(display_interval.max(1)))
            }
        }
    }
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            baking: BakingKeySettings::KeysOnly,
            frame_increment: 1,
            reduce_keys: false,
            tolerance_percentage: 5.0,
        }
    }
}

/// Names given to layers the stack creates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_layer_name: String,
    /// New layers are named `"{prefix} {n}"`.
    pub layer_name_prefix: String,
    pub empty_layer_name_prefix: String,
    pub duplicate_suffix: String,
    pub merged_suffix: String,
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        parse(text)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_layer_name: "Base".to_string(),
            layer_name_prefix: "Anim Layer".to_string(),
            empty_layer_name_prefix: "Empty Layer".to_string(),
            duplicate_suffix: "_Duplicate".to_string(),
            merged_suffix: "_Merged".to_string(),
        }
    }
}

//! Host editing session seam.
//!
//! Layer operations need the focused sequence, the editor clock, the current
//! selection and a way to notify the host. Adapters implement
//! [`SequencerHost`]; [`EditorSession`] is the in-memory implementation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ids::{SectionId, TargetId};
use crate::interp::KeyInterpolation;
use crate::section::SectionChannels;
use crate::sequence::Sequence;
use crate::time::{FrameNumber, FrameRange, FrameRate};

/// Editor time and keying settings.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    /// Current time in ticks.
    pub local_time: FrameNumber,
    pub tick_resolution: FrameRate,
    pub display_rate: FrameRate,
    pub key_interpolation: KeyInterpolation,
    /// When set, keying a channel with no keys only changes its default.
    pub auto_set_track_defaults: bool,
}

impl Clock {
    /// One display frame expressed in ticks.
    pub fn display_interval(&self) -> FrameNumber {
        self.display_rate.ticks_per_frame(self.tick_resolution)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            local_time: 0,
            tick_resolution: FrameRate::new(24000, 1),
            display_rate: FrameRate::new(24, 1),
            key_interpolation: KeyInterpolation::default(),
            auto_set_track_defaults: false,
        }
    }
}

/// Kinds of change reported back to the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DataChange {
    StructureItemAdded,
    StructureItemRemoved,
    StructureItemsChanged,
    TrackValueChanged,
}

/// Selected rig controls and scene objects.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    controls: IndexMap<TargetId, Vec<String>>,
    objects: Vec<TargetId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.values().all(Vec::is_empty) && self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.controls.clear();
        self.objects.clear();
    }

    pub fn select_control(&mut self, rig: TargetId, control: &str, selected: bool) {
        let names = self.controls.entry(rig).or_default();
        let present = names.iter().any(|n| n == control);
        if selected && !present {
            names.push(control.to_string());
        } else if !selected && present {
            names.retain(|n| n != control);
        }
        if names.is_empty() {
            self.controls.shift_remove(&rig);
        }
    }

    pub fn select_object(&mut self, target: TargetId, selected: bool) {
        let present = self.objects.contains(&target);
        if selected && !present {
            self.objects.push(target);
        } else if !selected && present {
            self.objects.retain(|t| *t != target);
        }
    }

    pub fn is_control_selected(&self, rig: TargetId, control: &str) -> bool {
        self.controls
            .get(&rig)
            .is_some_and(|names| names.iter().any(|n| n == control))
    }

    pub fn is_object_selected(&self, target: TargetId) -> bool {
        self.objects.contains(&target)
    }

    /// Selected controls of one rig, in selection order.
    pub fn selected_controls(&self, rig: TargetId) -> &[String] {
        self.controls.get(&rig).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rigs(&self) -> impl Iterator<Item = (TargetId, &[String])> {
        self.controls.iter().map(|(t, n)| (*t, n.as_slice()))
    }

    pub fn objects(&self) -> &[TargetId] {
        &self.objects
    }
}

pub trait SequencerHost {
    /// `None` when no sequence is being edited.
    fn sequence(&self) -> Option<&Sequence>;
    fn sequence_mut(&mut self) -> Option<&mut Sequence>;
    fn clock(&self) -> Clock;
    fn selection(&self) -> &Selection;
    fn selection_mut(&mut self) -> &mut Selection;

    fn notify(&mut self, _change: DataChange) {}

    /// Removes redundant keys of a section's channels inside `range`.
    /// `tolerance_percentage` is relative to each channel's value span.
    fn reduce_keys(&mut self, section: SectionId, range: FrameRange, tolerance_percentage: f64) {
        let Some(section) = self.sequence_mut().and_then(|s| s.section_mut(section)) else {
            return;
        };
        let factor = tolerance_percentage.max(0.0) / 100.0;
        let removed: usize = match &mut section.channels {
            SectionChannels::Float(channels) => channels
                .iter_mut()
                .map(|ch| {
                    let tolerance = ch.value_span() * factor;
                    ch.reduce_keys(range, tolerance)
                })
                .sum(),
            SectionChannels::Double(channels) => channels
                .iter_mut()
                .map(|ch| {
                    let tolerance = ch.value_span() * factor;
                    ch.reduce_keys(range, tolerance)
                })
                .sum(),
        };
        if removed > 0 {
            log::debug!("key reduction removed {removed} keys");
        }
    }
}

/// In-memory editing session.
#[derive(Clone, Debug, Default)]
pub struct EditorSession {
    pub sequence: Option<Sequence>,
    pub clock: Clock,
    pub selection: Selection,
    /// Every change reported through [`SequencerHost::notify`], oldest first.
    pub notifications: Vec<DataChange>,
}

impl EditorSession {
    pub fn new(sequence: Sequence) -> Self {
        Self {
            sequence: Some(sequence),
            ..Self::default()
        }
    }

    /// Session with nothing to edit.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn set_time(&mut self, time: FrameNumber) {
        self.clock.local_time = time;
    }
}

impl SequencerHost for EditorSession {
    fn sequence(&self) -> Option<&Sequence> {
        self.sequence.as_ref()
    }

    fn sequence_mut(&mut self) -> Option<&mut Sequence> {
        self.sequence.as_mut()
    }

    fn clock(&self) -> Clock {
        self.clock
    }

    fn selection(&self) -> &Selection {
        &self.selection
    }

    fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    fn notify(&mut self, change: DataChange) {
        self.notifications.push(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_toggles_controls() {
        let mut sel = Selection::new();
        let rig = TargetId(4);
        assert!(sel.is_empty());
        sel.select_control(rig, "hand", true);
        sel.select_control(rig, "hand", true);
        assert_eq!(sel.selected_controls(rig), &["hand".to_string()]);
        sel.select_control(rig, "hand", false);
        assert!(sel.is_empty());
        assert_eq!(sel.rigs().count(), 0);
    }

    #[test]
    fn default_clock_interval_is_one_display_frame() {
        assert_eq!(Clock::default().display_interval(), 1000);
    }
}

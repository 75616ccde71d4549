//! Defaults stamped onto sections created for a layer.

use hashbrown::HashMap;

use crate::accumulate::SectionStack;
use crate::channel::Channel;
use crate::error::{LayerError, Result};
use crate::ids::{SectionId, TrackId};
use crate::layer::AnimLayerType;
use crate::section::Section;
use crate::sequence::Sequence;
use crate::time::{FrameNumber, FrameRange};

/// Places a freshly created section on its own row above every existing one
/// and attaches it to `track`.
///
/// The section gets an unbounded range, an overlap priority above its
/// siblings, the layer name as row label, the blend type of the layer and a
/// weight default of 1.0. Override sections additionally take their channel
/// defaults from the stack below them at `time`.
pub fn set_up_section_defaults(
    seq: &mut Sequence,
    time: FrameNumber,
    layer_name: &str,
    layer_type: AnimLayerType,
    track: TrackId,
    section: SectionId,
) -> Result<()> {
    if !seq.is_valid(section) {
        return Err(LayerError::StaleSection(section));
    }
    let siblings = seq
        .track(track)
        .ok_or(LayerError::MissingTrack(track))?
        .sections()
        .to_vec();

    let mut max_row = -1;
    let mut priority = 0;
    for id in siblings.iter().filter(|id| **id != section) {
        if let Some(s) = seq.section(*id) {
            max_row = max_row.max(s.row_index);
            priority = priority.max(s.overlap_priority + 1);
        }
    }
    let row = max_row + 1;

    let mut moved = HashMap::new();
    for id in siblings.iter().filter(|id| **id != section) {
        if let Some(s) = seq.section_mut(*id) {
            if s.row_index >= row {
                moved.insert(s.row_index, s.row_index + 1);
                s.row_index += 1;
            }
        }
    }

    if let Some(s) = seq.section_mut(section) {
        s.range = FrameRange::all();
        s.overlap_priority = priority;
        s.row_index = row;
    }
    seq.add_section(track, section);
    if let Some(t) = seq.track_mut(track) {
        t.on_row_indices_changed(&moved);
        t.set_row_display_name(row, layer_name);
    }

    if let Some(s) = seq.section_mut(section) {
        s.blend_type = Some(layer_type.blend_type());
        if let Some(weight) = s.weight.as_mut() {
            weight.set_default(1.0);
        }
    }
    if layer_type == AnimLayerType::Override {
        set_defaults_for_override(seq, section, time);
    }
    Ok(())
}

/// Sets every channel default of `section` to the value the sections below
/// it produce at `time`, so an unkeyed override leaves the pose unchanged.
pub fn set_defaults_for_override(seq: &mut Sequence, section: SectionId, time: FrameNumber) {
    let Some(track) = seq.owning_track(section) else {
        return;
    };
    let Some(target) = seq.section(section) else {
        return;
    };
    let track_sections = seq.track_sections(track);
    let stack = SectionStack::below(seq, &track_sections, section);
    let values: Vec<f64> = (0..target.channel_count())
        .map(|index| {
            let control = target.layout.control_at(index);
            stack.evaluate(seq, index, time, control)
        })
        .collect();
    if let Some(s) = seq.section_mut(section) {
        for (index, value) in values.into_iter().enumerate() {
            s.channels.set_default(index, value);
        }
    }
}

/// Restricts a rig section's control mask to exactly `names`.
pub fn set_up_control_rig_section(section: &mut Section, names: &[String]) {
    section.fill_control_mask(false);
    for name in names {
        section.set_control_enabled(name, true);
    }
}

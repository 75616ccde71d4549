//! A single animation layer and the section contributions it owns.
//!
//! Layer properties such as `active` or `keyed` are not stored as truth; they
//! are derived by scanning the sections the layer points at. When those
//! sections disagree the property reads as [`CheckState::Undetermined`], and
//! setting it writes the new value through to every section.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::defaults::{set_defaults_for_override, set_up_control_rig_section, set_up_section_defaults};
use crate::host::{Clock, Selection};
use crate::ids::{SectionId, TargetId, TrackId};
use crate::section::{BlendType, ChannelBits, Section};
use crate::sequence::{Sequence, TargetKind, TrackKind};
use crate::time::FrameNumber;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimLayerType {
    Base,
    Additive,
    Override,
}

impl AnimLayerType {
    pub fn blend_type(self) -> BlendType {
        match self {
            AnimLayerType::Base => BlendType::Absolute,
            AnimLayerType::Additive => BlendType::Additive,
            AnimLayerType::Override => BlendType::Override,
        }
    }

    pub fn from_blend_type(blend: BlendType) -> Self {
        match blend {
            BlendType::Absolute => AnimLayerType::Base,
            BlendType::Additive => AnimLayerType::Additive,
            BlendType::Override => AnimLayerType::Override,
        }
    }
}

/// Tri-state checkbox value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckState {
    Checked,
    Unchecked,
    Undetermined,
}

impl From<bool> for CheckState {
    fn from(value: bool) -> Self {
        if value {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        }
    }
}

impl CheckState {
    /// Folds `values` into one state; `None` when there is nothing to fold.
    pub fn fold(values: impl IntoIterator<Item = bool>) -> Option<CheckState> {
        values.into_iter().fold(None, |acc, value| {
            let next = CheckState::from(value);
            Some(match acc {
                None => next,
                Some(state) if state == next => state,
                Some(_) => CheckState::Undetermined,
            })
        })
    }
}

/// How the weight channels of a layer are keyed at one frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyKeyedStatus {
    NotKeyed,
    KeyedInOtherFrame,
    PartiallyKeyed,
    KeyedInFrame,
}

/// Snapshot of a layer for list views.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimLayerState {
    pub name: String,
    pub layer_type: AnimLayerType,
    pub weight: f64,
    pub active: CheckState,
    pub locked: CheckState,
    pub keyed: CheckState,
    pub selected: CheckState,
}

/// The properties of one target a section item animates, with the channel
/// mask of each.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyChannelSet {
    pub target: TargetId,
    pub names: IndexMap<String, ChannelBits>,
}

impl PropertyChannelSet {
    pub fn new(target: TargetId) -> Self {
        Self {
            target,
            names: IndexMap::new(),
        }
    }

    pub fn with_names(target: TargetId, names: &[String], bits: ChannelBits) -> Self {
        let mut set = Self::new(target);
        for name in names {
            set.names.insert(name.clone(), bits);
        }
        set
    }

    /// Unions the masks of `other` into this set. Sets for different targets
    /// are left alone.
    pub fn merge_with_another_selection(&mut self, other: &PropertyChannelSet) {
        if other.target != self.target {
            return;
        }
        for (name, bits) in &other.names {
            *self.names.entry(name.clone()).or_insert(ChannelBits::NONE) |= *bits;
        }
    }

    pub fn name_list(&self) -> Vec<String> {
        self.names.keys().cloned().collect()
    }
}

/// A weak section handle paired with what it animates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionItem {
    pub section: SectionId,
    pub channels: PropertyChannelSet,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerItem {
    pub section_items: Vec<SectionItem>,
}

impl LayerItem {
    /// The item whose section lives on the same track as `section`.
    pub fn find_matching_section_item(
        &self,
        seq: &Sequence,
        section: SectionId,
    ) -> Option<&SectionItem> {
        let track = seq.owning_track(section)?;
        self.section_items
            .iter()
            .find(|item| seq.owning_track(item.section) == Some(track))
    }

    pub fn find_matching_section_item_mut(
        &mut self,
        seq: &Sequence,
        section: SectionId,
    ) -> Option<&mut SectionItem> {
        let track = seq.owning_track(section)?;
        self.section_items
            .iter_mut()
            .find(|item| seq.owning_track(item.section) == Some(track))
    }

    pub fn item_on_track(&self, seq: &Sequence, track: TrackId) -> Option<&SectionItem> {
        self.section_items
            .iter()
            .find(|item| seq.owning_track(item.section) == Some(track))
    }
}

/// Something selected in the editor that a layer can take ownership of.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectedTarget {
    Rig {
        target: TargetId,
        track: TrackId,
        controls: Vec<String>,
    },
    Object {
        target: TargetId,
        track: TrackId,
    },
}

/// Resolves the selection to (target, track) pairs.
///
/// Rigs contribute their control-rig tracks when controls are selected; a
/// selected scene object contributes every track that supports blending.
/// A binding with selected rig controls never contributes its object tracks.
pub fn selected_targets(seq: &Sequence, selection: &Selection) -> Vec<SelectedTarget> {
    let mut out = Vec::new();
    for binding in seq.bindings() {
        let mut have_rig = false;
        if binding.kind == TargetKind::Rig {
            let controls = selection.selected_controls(binding.target);
            if !controls.is_empty() {
                for track in &binding.tracks {
                    if seq.track(*track).is_some_and(|t| t.is_control_rig()) {
                        have_rig = true;
                        out.push(SelectedTarget::Rig {
                            target: binding.target,
                            track: *track,
                            controls: controls.to_vec(),
                        });
                    }
                }
            }
        }
        if have_rig || !selection.is_object_selected(binding.target) {
            continue;
        }
        for track in &binding.tracks {
            let Some(t) = seq.track(*track) else {
                continue;
            };
            if t.supports_blending && !t.is_control_rig() {
                out.push(SelectedTarget::Object {
                    target: binding.target,
                    track: *track,
                });
            }
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimLayer {
    pub state: AnimLayerState,
    pub items: IndexMap<TargetId, LayerItem>,
    pub selected_in_list: bool,
}

impl AnimLayer {
    pub fn new(name: impl Into<String>, layer_type: AnimLayerType) -> Self {
        Self {
            state: AnimLayerState {
                name: name.into(),
                layer_type,
                weight: 1.0,
                active: CheckState::Checked,
                locked: CheckState::Unchecked,
                keyed: CheckState::Unchecked,
                selected: CheckState::Unchecked,
            },
            items: IndexMap::new(),
            selected_in_list: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn layer_type(&self) -> AnimLayerType {
        self.state.layer_type
    }

    pub fn is_base(&self) -> bool {
        self.state.layer_type == AnimLayerType::Base
    }

    pub fn is_empty(&self) -> bool {
        self.items.values().all(|item| item.section_items.is_empty())
    }

    pub fn section_items(&self) -> impl Iterator<Item = (TargetId, &SectionItem)> {
        self.items
            .iter()
            .flat_map(|(target, item)| item.section_items.iter().map(move |s| (*target, s)))
    }

    /// Handles of every section item that still resolves.
    pub fn sections(&self, seq: &Sequence) -> Vec<SectionId> {
        self.section_items()
            .map(|(_, item)| item.section)
            .filter(|id| seq.is_valid(*id))
            .collect()
    }

    fn resolved<'a>(&'a self, seq: &'a Sequence) -> impl Iterator<Item = &'a Section> + 'a {
        self.section_items()
            .filter_map(move |(_, item)| seq.section(item.section))
    }

    pub fn active(&self, seq: &Sequence) -> CheckState {
        CheckState::fold(self.resolved(seq).map(|s| s.active)).unwrap_or(self.state.active)
    }

    pub fn set_active(&mut self, seq: &mut Sequence, active: bool) {
        self.state.active = active.into();
        for id in self.sections(seq) {
            if let Some(s) = seq.section_mut(id) {
                s.active = active;
            }
        }
    }

    pub fn locked(&self, seq: &Sequence) -> CheckState {
        CheckState::fold(self.resolved(seq).map(|s| s.locked)).unwrap_or(self.state.locked)
    }

    pub fn set_locked(&mut self, seq: &mut Sequence, locked: bool) {
        self.state.locked = locked.into();
        for id in self.sections(seq) {
            if let Some(s) = seq.section_mut(id) {
                s.locked = locked;
            }
        }
    }

    /// Whether new keys land in this layer's sections.
    pub fn keyed(&self, seq: &Sequence) -> CheckState {
        let mut flags = Vec::new();
        for (_, item) in self.section_items() {
            if !seq.is_valid(item.section) {
                continue;
            }
            let Some(track) = seq.owning_track(item.section).and_then(|t| seq.track(t)) else {
                continue;
            };
            if track.is_control_rig() {
                for name in item.channels.names.keys() {
                    flags.push(track.section_to_key_for_control(name) == Some(item.section));
                }
            } else {
                let only = track.sections() == [item.section];
                flags.push(track.section_to_key() == Some(item.section) || only);
            }
        }
        CheckState::fold(flags).unwrap_or(if self.is_base() {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        })
    }

    /// Makes this layer's sections the ones that receive new keys.
    pub fn set_keyed(&mut self, seq: &mut Sequence) {
        self.state.keyed = CheckState::Checked;
        let items: Vec<SectionItem> = self.section_items().map(|(_, i)| i.clone()).collect();
        for item in items {
            let Some(track_id) = seq.owning_track(item.section) else {
                continue;
            };
            let Some(track) = seq.track_mut(track_id) else {
                continue;
            };
            if track.is_control_rig() {
                for name in item.channels.names.keys() {
                    track.set_section_to_key_for_control(name, item.section);
                }
            } else {
                track.set_section_to_key(Some(item.section));
            }
        }
    }

    /// Rig controls and scene objects this layer animates.
    pub fn layer_objects(&self, seq: &Sequence) -> (Vec<(TargetId, Vec<String>)>, Vec<TargetId>) {
        let mut rigs: Vec<(TargetId, Vec<String>)> = Vec::new();
        let mut objects = Vec::new();
        for (target, item) in &self.items {
            let Some(binding) = seq.binding(*target) else {
                continue;
            };
            match binding.kind {
                TargetKind::Rig => {
                    let mut names: Vec<String> = Vec::new();
                    for si in &item.section_items {
                        for name in si.channels.names.keys() {
                            if !names.contains(name) {
                                names.push(name.clone());
                            }
                        }
                    }
                    rigs.push((*target, names));
                }
                TargetKind::SceneObject => objects.push(*target),
            }
        }
        (rigs, objects)
    }

    pub fn selected(&self, seq: &Sequence, selection: &Selection) -> CheckState {
        let (rigs, objects) = self.layer_objects(seq);
        let flags = rigs
            .iter()
            .flat_map(|(rig, names)| {
                names
                    .iter()
                    .map(move |name| selection.is_control_selected(*rig, name))
            })
            .chain(objects.iter().map(|t| selection.is_object_selected(*t)));
        CheckState::fold(flags.collect::<Vec<_>>()).unwrap_or(CheckState::Unchecked)
    }

    pub fn set_selected(
        &mut self,
        seq: &Sequence,
        selection: &mut Selection,
        selected: bool,
        clear: bool,
    ) {
        let (rigs, objects) = self.layer_objects(seq);
        if rigs.is_empty() && objects.is_empty() {
            return;
        }
        self.state.selected = selected.into();
        if clear {
            selection.clear();
            if !selected {
                return;
            }
        }
        for target in objects {
            selection.select_object(target, selected);
        }
        for (rig, names) in rigs {
            for name in names {
                selection.select_control(rig, &name, selected);
            }
        }
    }

    /// Renames the layer and the track rows its sections sit on.
    pub fn set_name(&mut self, seq: &mut Sequence, name: &str) {
        self.state.name = name.to_string();
        for id in self.sections(seq) {
            let Some(row) = seq.section(id).map(|s| s.row_index) else {
                continue;
            };
            if let Some(track) = seq.owning_track(id).and_then(|t| seq.track_mut(t)) {
                track.set_row_display_name(row, name);
            }
        }
    }

    /// Weight of the first weighted section at `time`, else the stored weight.
    pub fn weight(&self, seq: &Sequence, time: FrameNumber) -> f64 {
        self.resolved(seq)
            .find(|s| s.weight.is_some())
            .map(|s| s.weight_at(time))
            .unwrap_or(self.state.weight)
    }

    /// Keys the weight channel of every section at the clock time.
    pub fn set_weight(&mut self, seq: &mut Sequence, clock: &Clock, weight: f64) {
        self.state.weight = weight;
        for id in self.sections(seq) {
            if let Some(section) = seq.section_mut(id) {
                set_float_weight_value(section, clock, weight as f32);
            }
        }
    }

    /// Adds a weight key holding the current value where none exists.
    pub fn key_weight(&mut self, seq: &mut Sequence, clock: &Clock) {
        let time = clock.local_time;
        for id in self.sections(seq) {
            let Some(section) = seq.section_mut(id) else {
                continue;
            };
            let current = section.weight_at(time) as f32;
            if let Some(weight) = section.weight.as_mut() {
                if weight.key_at(time).is_none() {
                    weight.add_key(time, current, clock.key_interpolation);
                    weight.auto_set_tangents();
                    section.expand_to_frame(time);
                }
            }
        }
    }

    pub fn weight_keyed_status(&self, seq: &Sequence, time: FrameNumber) -> PropertyKeyedStatus {
        let mut status = PropertyKeyedStatus::NotKeyed;
        let mut checked = 0;
        let mut keyed = 0;
        for section in self.resolved(seq) {
            let Some(weight) = section.weight.as_ref() else {
                continue;
            };
            checked += 1;
            let next = if weight.num_keys() == 0 {
                PropertyKeyedStatus::NotKeyed
            } else if weight.key_at(time).is_some() {
                keyed += 1;
                PropertyKeyedStatus::PartiallyKeyed
            } else {
                PropertyKeyedStatus::KeyedInOtherFrame
            };
            status = status.max(next);
        }
        if status == PropertyKeyedStatus::PartiallyKeyed && checked == keyed {
            PropertyKeyedStatus::KeyedInFrame
        } else {
            status
        }
    }

    /// Layer type as the sections report it; the stored type when they
    /// disagree or there are none.
    pub fn derived_type(&self, seq: &Sequence) -> AnimLayerType {
        if self.is_base() {
            return AnimLayerType::Base;
        }
        let mut blends = self.resolved(seq).filter_map(|s| s.blend_type);
        let Some(first) = blends.next() else {
            return self.state.layer_type;
        };
        if blends.all(|b| b == first) {
            AnimLayerType::from_blend_type(first)
        } else {
            self.state.layer_type
        }
    }

    /// Switches a non-base layer between Additive and Override. Returns false
    /// for the base layer or a request to become Base.
    pub fn set_type(&mut self, seq: &mut Sequence, time: FrameNumber, layer_type: AnimLayerType) -> bool {
        if self.is_base() || layer_type == AnimLayerType::Base {
            return false;
        }
        self.state.layer_type = layer_type;
        for id in self.sections(seq) {
            if let Some(s) = seq.section_mut(id) {
                s.blend_type = Some(layer_type.blend_type());
            }
            if layer_type == AnimLayerType::Override {
                set_defaults_for_override(seq, id, time);
            }
        }
        true
    }

    /// Current derived properties, without touching `state`.
    pub fn snapshot(&self, seq: &Sequence, selection: &Selection, time: FrameNumber) -> AnimLayerState {
        AnimLayerState {
            name: self.state.name.clone(),
            layer_type: self.derived_type(seq),
            weight: self.weight(seq, time),
            active: self.active(seq),
            locked: self.locked(seq),
            keyed: self.keyed(seq),
            selected: self.selected(seq, selection),
        }
    }

    /// Recomputes the derived properties into `state`.
    pub fn refresh_state(
        &mut self,
        seq: &Sequence,
        selection: &Selection,
        time: FrameNumber,
    ) -> &AnimLayerState {
        self.state = self.snapshot(seq, selection, time);
        &self.state
    }

    /// Removes the item for `target`, deleting its sections from their tracks
    /// unless a section is the first on its track.
    pub fn remove_item(&mut self, seq: &mut Sequence, target: TargetId) -> bool {
        let Some(item) = self.items.shift_remove(&target) else {
            return false;
        };
        for si in item.section_items {
            remove_layer_section(seq, si.section);
        }
        true
    }

    /// Removes one section item; drops the item when it was the last one.
    pub fn remove_section_item(
        &mut self,
        seq: &mut Sequence,
        target: TargetId,
        section: SectionId,
    ) -> bool {
        let Some(item) = self.items.get_mut(&target) else {
            return false;
        };
        let Some(pos) = item.section_items.iter().position(|s| s.section == section) else {
            return false;
        };
        item.section_items.remove(pos);
        if item.section_items.is_empty() {
            self.items.shift_remove(&target);
        }
        remove_layer_section(seq, section);
        true
    }

    /// Gives the selected targets sections on this layer.
    pub fn add_selection(
        &mut self,
        seq: &mut Sequence,
        time: FrameNumber,
        picks: &[SelectedTarget],
    ) -> bool {
        let mut added = false;
        for pick in picks {
            added |= match pick {
                SelectedTarget::Rig {
                    target,
                    track,
                    controls,
                } => self.add_rig_controls(seq, time, *target, *track, controls),
                SelectedTarget::Object { target, track } => {
                    self.add_object_track(seq, time, *target, *track)
                }
            };
        }
        added
    }

    fn add_rig_controls(
        &mut self,
        seq: &mut Sequence,
        time: FrameNumber,
        target: TargetId,
        track: TrackId,
        controls: &[String],
    ) -> bool {
        if let Some(item) = self.items.get_mut(&target) {
            let mut added = false;
            for si in &mut item.section_items {
                let Some(section) = seq.section_mut(si.section) else {
                    continue;
                };
                if !section.is_control_rig() {
                    continue;
                }
                for name in controls {
                    if !si.channels.names.contains_key(name) {
                        si.channels.names.insert(name.clone(), ChannelBits::ALL_TRANSFORM);
                    }
                }
                set_up_control_rig_section(section, &si.channels.name_list());
                added = true;
            }
            return added;
        }
        let Some(section) = seq.create_section(track) else {
            return false;
        };
        if let Some(s) = seq.section_mut(section) {
            s.mask = ChannelBits::ALL;
        }
        if set_up_section_defaults(seq, time, &self.state.name, self.state.layer_type, track, section)
            .is_err()
        {
            seq.remove_section(section);
            return false;
        }
        if let Some(s) = seq.section_mut(section) {
            set_up_control_rig_section(s, controls);
        }
        self.items.insert(
            target,
            LayerItem {
                section_items: vec![SectionItem {
                    section,
                    channels: PropertyChannelSet::with_names(
                        target,
                        controls,
                        ChannelBits::ALL_TRANSFORM,
                    ),
                }],
            },
        );
        true
    }

    fn add_object_track(
        &mut self,
        seq: &mut Sequence,
        time: FrameNumber,
        target: TargetId,
        track: TrackId,
    ) -> bool {
        if self
            .items
            .get(&target)
            .is_some_and(|item| item.item_on_track(seq, track).is_some())
        {
            return false;
        }
        let Some(section) = seq.create_section(track) else {
            return false;
        };
        if seq.track(track).is_some_and(|t| t.kind == TrackKind::Transform) {
            if let Some(s) = seq.section_mut(section) {
                s.mask = ChannelBits::ALL;
            }
        }
        if set_up_section_defaults(seq, time, &self.state.name, self.state.layer_type, track, section)
            .is_err()
        {
            seq.remove_section(section);
            return false;
        }
        self.items
            .entry(target)
            .or_default()
            .section_items
            .push(SectionItem {
                section,
                channels: PropertyChannelSet::new(target),
            });
        true
    }

    /// Takes the selected targets out of this layer. Rig controls are removed
    /// one by one; a rig item left without controls, or any selected object,
    /// is removed with its sections.
    pub fn remove_selection(&mut self, seq: &mut Sequence, picks: &[SelectedTarget]) -> bool {
        let mut removed = false;
        for pick in picks {
            match pick {
                SelectedTarget::Rig {
                    target, controls, ..
                } => {
                    let Some(item) = self.items.get_mut(target) else {
                        continue;
                    };
                    let mut emptied = false;
                    for si in &mut item.section_items {
                        let Some(section) = seq.section_mut(si.section) else {
                            continue;
                        };
                        if section.is_control_rig() {
                            for name in controls {
                                si.channels.names.shift_remove(name);
                            }
                            set_up_control_rig_section(section, &si.channels.name_list());
                            removed = true;
                        }
                        if si.channels.names.is_empty() {
                            emptied = true;
                            break;
                        }
                    }
                    if emptied {
                        removed |= self.remove_item(seq, *target);
                    }
                }
                SelectedTarget::Object { target, .. } => {
                    removed |= self.remove_item(seq, *target);
                }
            }
        }
        removed
    }

    /// Moves everything recorded for `old` over to `new`.
    pub fn rebind_target(&mut self, old: TargetId, new: TargetId) -> bool {
        let Some(mut item) = self.items.shift_remove(&old) else {
            return false;
        };
        for si in &mut item.section_items {
            si.channels.target = new;
        }
        match self.items.get_mut(&new) {
            Some(existing) => existing.section_items.extend(item.section_items),
            None => {
                self.items.insert(new, item);
            }
        }
        true
    }
}

/// Deletes a layer-owned section, keeping a track's first (base) section.
pub(crate) fn remove_layer_section(seq: &mut Sequence, section: SectionId) {
    let is_first = seq
        .owning_track(section)
        .and_then(|t| seq.track(t))
        .and_then(|t| t.position_of(section))
        == Some(0);
    if !is_first {
        seq.remove_section(section);
    }
}

/// Keys a section's weight the way interactive weight edits do.
///
/// An existing key at the clock time is reassigned. Otherwise a key is
/// added when the channel already has keys or auto-defaults are off, and the
/// section range grows to include it. With auto-defaults on the default
/// follows the value.
pub fn set_float_weight_value(section: &mut Section, clock: &Clock, value: f32) {
    let time = clock.local_time;
    let Some(weight) = section.weight.as_mut() else {
        return;
    };
    let mut expand = false;
    if let Some(handle) = weight.key_at(time) {
        weight.assign_value(handle, value);
    } else if weight.num_keys() > 0 || !clock.auto_set_track_defaults {
        weight.add_key(time, value, clock.key_interpolation);
        expand = true;
    }
    if clock.auto_set_track_defaults {
        weight.set_default(value);
    }
    weight.auto_set_tangents();
    if expand {
        section.expand_to_frame(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_detects_disagreement() {
        assert_eq!(CheckState::fold(Vec::new()), None);
        assert_eq!(CheckState::fold([true, true]), Some(CheckState::Checked));
        assert_eq!(CheckState::fold([false]), Some(CheckState::Unchecked));
        assert_eq!(CheckState::fold([true, false, true]), Some(CheckState::Undetermined));
    }

    #[test]
    fn channel_sets_merge_masks_per_name() {
        let t = TargetId(1);
        let mut a = PropertyChannelSet::with_names(t, &["hand".into()], ChannelBits::TRANSLATION_X);
        let mut b = PropertyChannelSet::with_names(t, &["hand".into(), "foot".into()], ChannelBits::SCALE_X);
        b.names.insert("hand".into(), ChannelBits::ROTATION_Y);
        a.merge_with_another_selection(&b);
        assert_eq!(
            a.names["hand"],
            ChannelBits::TRANSLATION_X | ChannelBits::ROTATION_Y
        );
        assert_eq!(a.names["foot"], ChannelBits::SCALE_X);

        let other = PropertyChannelSet::with_names(TargetId(2), &["x".into()], ChannelBits::ALL);
        a.merge_with_another_selection(&other);
        assert!(!a.names.contains_key("x"));
    }

    #[test]
    fn weight_keying_respects_auto_defaults() {
        let mut section = Section::transform();
        let mut clock = Clock {
            local_time: 10,
            auto_set_track_defaults: true,
            ..Clock::default()
        };
        set_float_weight_value(&mut section, &clock, 0.5);
        let w = section.weight.as_ref().unwrap();
        assert_eq!(w.num_keys(), 0);
        assert_eq!(w.default_value(), Some(0.5));

        clock.auto_set_track_defaults = false;
        set_float_weight_value(&mut section, &clock, 0.25);
        assert_eq!(section.weight.as_ref().unwrap().key_times(), vec![10]);
        clock.local_time = 20;
        set_float_weight_value(&mut section, &clock, 0.75);
        assert_eq!(section.weight_at(20), 0.75);
        assert_eq!(section.weight.as_ref().unwrap().num_keys(), 2);
    }
}

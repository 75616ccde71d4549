//! The ordered layer stack of one sequence.
//!
//! Index 0 is always the Base layer. It is created by [`AnimLayers::new`] and
//! can be neither deleted nor duplicated; its items are rebuilt from the other
//! layers by [`AnimLayers::set_up_base_layer_sections`]. Stack operations
//! that need an editing session report failure as `false`/`None` and never
//! panic.

use indexmap::IndexMap;

use crate::accumulate::SectionStack;
use crate::adjustment::adjustment_blend_sections;
use crate::channel::Channel;
use crate::config::{Config, MergeSettings};
use crate::defaults::{set_up_control_rig_section, set_up_section_defaults};
use crate::events::{Events, LayerEvent};
use crate::host::{DataChange, Selection, SequencerHost};
use crate::ids::{SectionId, TargetId, TrackId};
use crate::interp::KeyInterpolation;
use crate::layer::{
    remove_layer_section, selected_targets, AnimLayer, AnimLayerState, AnimLayerType,
    CheckState, LayerItem, SectionItem,
};
use crate::mapping::ChannelRange;
use crate::merge::{
    merge_channels, merge_section_pair, revert_weight_channel_to_one, write_samples, ChannelMerge,
    MergePolicy,
};
use crate::section::{BlendType, ChannelBits, Section, SectionChannels, SectionKind};
use crate::sequence::Sequence;
use crate::time::{FrameNumber, FrameRange};

#[derive(Clone, Debug)]
pub struct AnimLayers {
    pub config: Config,
    layers: Vec<AnimLayer>,
    events: Events,
}

impl Default for AnimLayers {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimLayers {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let mut base = AnimLayer::new(config.base_layer_name.clone(), AnimLayerType::Base);
        base.state.keyed = CheckState::Checked;
        Self {
            config,
            layers: vec![base],
            events: Events::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Never true; the Base layer always exists.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[AnimLayer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&AnimLayer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut AnimLayer> {
        self.layers.get_mut(index)
    }

    pub fn base_layer(&self) -> &AnimLayer {
        &self.layers[0]
    }

    /// Index of the first layer called `name`.
    pub fn anim_layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name() == name)
    }

    pub fn drain_events(&mut self) -> Vec<LayerEvent> {
        self.events.drain()
    }

    /// Rebuilds the Base layer's items from the other layers.
    ///
    /// For each track a non-base layer contributes to, the Base layer refers
    /// to the track's first section when that section is absolute and not
    /// the only one. Several layers on one track share a single Base item.
    pub fn set_up_base_layer_sections(&mut self, seq: &mut Sequence) {
        let contributions: Vec<(TargetId, SectionItem)> = self.layers[1..]
            .iter()
            .flat_map(|layer| layer.section_items().map(|(t, i)| (t, i.clone())))
            .collect();

        let mut items: IndexMap<TargetId, LayerItem> = IndexMap::new();
        for (target, item) in contributions {
            let Some(track) = seq.owning_track(item.section) else {
                continue;
            };
            let sections = seq.track_sections(track);
            if sections.len() < 2 {
                continue;
            }
            let first = sections[0];
            if seq.section(first).and_then(|s| s.blend_type) != Some(BlendType::Absolute) {
                continue;
            }
            let entry = items.entry(target).or_default();
            if let Some(existing) = entry.section_items.iter_mut().find(|s| s.section == first) {
                existing.channels.merge_with_another_selection(&item.channels);
                continue;
            }
            entry.section_items.push(SectionItem {
                section: first,
                channels: item.channels.clone(),
            });
            if let Some(section) = seq.section_mut(first) {
                if let Some(weight) = section.weight.as_mut() {
                    weight.set_default(1.0);
                }
                if section.kind != SectionKind::Property {
                    section.mask |= ChannelBits::WEIGHT;
                }
            }
        }

        let base = &mut self.layers[0];
        base.items = items;
        let name = base.name().to_string();
        base.set_name(seq, &name);
    }

    /// Creates a layer for the current selection and returns its index.
    ///
    /// With nothing selected a placeholder "Empty Layer N" is added. Returns
    /// `None` without a sequence or when no section could be created.
    pub fn add_anim_layer_from_selection(&mut self, host: &mut dyn SequencerHost) -> Option<usize> {
        let clock = host.clock();
        let selection = host.selection().clone();
        let index = self.layers.len();
        let seq = host.sequence_mut()?;
        let picks = selected_targets(seq, &selection);

        if picks.is_empty() {
            let name = format!("{} {index}", self.config.empty_layer_name_prefix);
            self.layers.push(AnimLayer::new(name.clone(), AnimLayerType::Additive));
            self.events.push(LayerEvent::LayerAdded { index, name });
            self.events.list_changed();
            return Some(index);
        }

        let name = format!("{} {index}", self.config.layer_name_prefix);
        let mut layer = AnimLayer::new(name.clone(), AnimLayerType::Additive);
        if !layer.add_selection(seq, clock.local_time, &picks) {
            log::warn!("anim layer not added: no section could be created for the selection");
            return None;
        }
        self.layers.push(layer);
        self.set_up_base_layer_sections(seq);
        self.layers[index].set_keyed(seq);
        log::debug!("added anim layer '{name}' at {index}");

        host.notify(DataChange::StructureItemAdded);
        self.events.push(LayerEvent::LayerAdded { index, name });
        self.events.list_changed();
        Some(index)
    }

    /// Adds the current selection to an existing non-base layer.
    pub fn add_selected_in_sequencer(&mut self, host: &mut dyn SequencerHost, index: usize) -> bool {
        if index == 0 || index >= self.layers.len() {
            return false;
        }
        let clock = host.clock();
        let selection = host.selection().clone();
        let Some(seq) = host.sequence_mut() else {
            return false;
        };
        let picks = selected_targets(seq, &selection);
        if picks.is_empty() {
            return false;
        }
        if self.layers[index].add_selection(seq, clock.local_time, &picks) {
            self.set_up_base_layer_sections(seq);
            self.layers[index].set_keyed(seq);
        }
        host.notify(DataChange::StructureItemAdded);
        true
    }

    /// Removes the current selection from a non-base layer, deleting the
    /// layer when nothing is left in it.
    pub fn remove_selected_in_sequencer(
        &mut self,
        host: &mut dyn SequencerHost,
        index: usize,
    ) -> bool {
        if index == 0 || index >= self.layers.len() {
            return false;
        }
        let selection = host.selection().clone();
        let Some(seq) = host.sequence_mut() else {
            return false;
        };
        let picks = selected_targets(seq, &selection);
        if picks.is_empty() {
            return false;
        }
        if self.layers[index].remove_selection(seq, &picks) {
            self.set_up_base_layer_sections(seq);
        }
        if self.layers[index].is_empty() {
            self.delete_anim_layer(host, index);
        }
        host.notify(DataChange::StructureItemRemoved);
        true
    }

    /// Deletes one section item from a non-base layer; an emptied layer is
    /// deleted with it.
    pub fn remove_section_item(
        &mut self,
        host: &mut dyn SequencerHost,
        index: usize,
        target: TargetId,
        section: SectionId,
    ) -> bool {
        if index == 0 {
            return false;
        }
        let Some(seq) = host.sequence_mut() else {
            return false;
        };
        let Some(layer) = self.layers.get_mut(index) else {
            return false;
        };
        if !layer.remove_section_item(seq, target, section) {
            return false;
        }
        if layer.is_empty() {
            self.delete_anim_layer(host, index);
        } else {
            host.notify(DataChange::StructureItemRemoved);
        }
        true
    }

    /// Deletes a non-base layer and its sections. A track's first section is
    /// never removed. The Base layer becomes the keyed layer again.
    pub fn delete_anim_layer(&mut self, host: &mut dyn SequencerHost, index: usize) -> bool {
        if index == 0 || index >= self.layers.len() {
            return false;
        }
        let Some(seq) = host.sequence_mut() else {
            return false;
        };
        self.remove_layer(seq, index);
        host.notify(DataChange::StructureItemRemoved);
        true
    }

    fn remove_layer(&mut self, seq: &mut Sequence, index: usize) {
        let layer = self.layers.remove(index);
        for (_, item) in layer.section_items() {
            remove_layer_section(seq, item.section);
        }
        self.layers[0].set_keyed(seq);
        log::debug!("deleted anim layer '{}' at {index}", layer.name());
        self.events.push(LayerEvent::LayerDeleted { index });
        self.events.list_changed();
    }

    /// Copies a non-base layer into a new Additive layer named
    /// `"{name}_Duplicate"`, returning its index.
    pub fn duplicate_anim_layer(
        &mut self,
        host: &mut dyn SequencerHost,
        index: usize,
    ) -> Option<usize> {
        if index == 0 || index >= self.layers.len() {
            return None;
        }
        if self.layers[index].is_empty() {
            log::error!("Can not duplicate empty layer");
            return None;
        }
        let clock = host.clock();
        let seq = host.sequence_mut()?;

        let name = format!("{}{}", self.layers[index].name(), self.config.duplicate_suffix);
        let mut copy = AnimLayer::new(name.clone(), AnimLayerType::Additive);
        let sources: Vec<(TargetId, SectionItem)> = self.layers[index]
            .section_items()
            .map(|(t, i)| (t, i.clone()))
            .collect();
        for (target, item) in sources {
            let Some(section) = duplicate_section(seq, &name, clock.local_time, &item) else {
                continue;
            };
            copy.items
                .entry(target)
                .or_default()
                .section_items
                .push(SectionItem {
                    section,
                    channels: item.channels.clone(),
                });
        }
        if copy.is_empty() {
            return None;
        }

        copy.state.weight = 1.0;
        copy.set_name(seq, &name);
        copy.set_keyed(seq);
        let new_index = self.layers.len();
        self.layers.push(copy);
        host.notify(DataChange::StructureItemAdded);
        self.events.push(LayerEvent::LayerAdded {
            index: new_index,
            name,
        });
        self.events.list_changed();
        Some(new_index)
    }

    /// Collapses the given layers into the lowest of them.
    ///
    /// Layers are merged pairwise from the highest index down. Sections
    /// sharing a track with the destination are merged channel by channel;
    /// the rest move over to the destination. Consumed layers are deleted.
    /// Returns false without a sequence or with fewer than two valid indices.
    pub fn merge_anim_layers(
        &mut self,
        host: &mut dyn SequencerHost,
        indices: &[usize],
        settings: &MergeSettings,
    ) -> bool {
        let mut sorted: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|i| *i < self.layers.len())
            .collect();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        if sorted.len() < 2 {
            return false;
        }
        let clock = host.clock();
        let Some(seq) = host.sequence_mut() else {
            return false;
        };
        let pass = MergePass {
            range: seq.playback_range,
            increment: settings.bake_step(clock.display_interval()),
            interpolation: clock.key_interpolation,
            time: clock.local_time,
        };

        let mut merged_sections = Vec::new();
        for pair in sorted.windows(2) {
            let (source, destination) = (pair[0], pair[1]);
            self.merge_layer_into(seq, source, destination, &pass, &mut merged_sections);
            let source_type = self.layers[source].derived_type(seq);
            let destination_type = self.layers[destination].derived_type(seq);
            if source_type == AnimLayerType::Override && destination_type == AnimLayerType::Additive {
                self.layers[destination].set_type(seq, pass.time, AnimLayerType::Override);
                // Merged keys already hold the composite.
                for id in self.layers[destination].sections(seq) {
                    if let Some(weight) = seq.section_mut(id).and_then(|s| s.weight.as_mut()) {
                        revert_weight_channel_to_one(weight, pass.range, pass.interpolation);
                    }
                }
            }
            self.remove_layer(seq, source);
        }

        let into = sorted[sorted.len() - 1];
        if into == 0 {
            self.set_up_base_layer_sections(seq);
        } else {
            let layer = &mut self.layers[into];
            if !layer.name().contains(self.config.merged_suffix.as_str()) {
                let name = format!("{}{}", layer.name(), self.config.merged_suffix);
                layer.set_name(seq, &name);
            }
        }

        if settings.reduce_keys {
            merged_sections.dedup();
            for section in merged_sections {
                host.reduce_keys(section, pass.range, settings.tolerance_percentage);
            }
        }
        let name = self.layers[into].name().to_string();
        log::debug!("merged {} layers into '{name}'", sorted.len());
        host.notify(DataChange::StructureItemAdded);
        self.events.push(LayerEvent::LayersMerged { into, name });
        self.events.list_changed();
        true
    }

    fn merge_layer_into(
        &mut self,
        seq: &mut Sequence,
        source: usize,
        destination: usize,
        pass: &MergePass,
        merged_sections: &mut Vec<SectionId>,
    ) {
        let items: Vec<(TargetId, SectionItem)> = self.layers[source]
            .section_items()
            .map(|(t, i)| (t, i.clone()))
            .collect();
        for (target, item) in items {
            if !seq.is_valid(item.section) {
                continue;
            }
            let matching = self.layers[destination]
                .items
                .get(&target)
                .and_then(|owner| owner.find_matching_section_item(seq, item.section))
                .map(|found| found.section)
                .filter(|section| seq.is_valid(*section));

            let Some(base) = matching else {
                self.move_section_item(seq, source, destination, target, &item);
                continue;
            };
            if seq.section(item.section).is_some_and(|s| s.active) {
                if let Err(err) = merge_section_pair(
                    seq,
                    base,
                    item.section,
                    pass.range,
                    pass.increment,
                    pass.interpolation,
                ) {
                    log::warn!("skipping section {} during layer merge: {err}", item.section);
                }
            }
            if destination != 0 && !item.channels.names.is_empty() {
                extend_rig_mask(seq, &mut self.layers[destination], target, base, &item);
            }
            merged_sections.push(base);
        }
    }

    /// Hands a section over to another layer without touching its keys.
    fn move_section_item(
        &mut self,
        seq: &mut Sequence,
        source: usize,
        destination: usize,
        target: TargetId,
        item: &SectionItem,
    ) {
        let row = seq.section(item.section).map(|s| s.row_index);
        let name = self.layers[destination].name().to_string();
        if let (Some(row), Some(track)) = (row, seq.owning_track(item.section)) {
            if let Some(track) = seq.track_mut(track) {
                track.set_row_display_name(row, &name);
            }
        }
        if let Some(owner) = self.layers[source].items.get_mut(&target) {
            owner.section_items.retain(|s| s.section != item.section);
        }
        self.layers[destination]
            .items
            .entry(target)
            .or_default()
            .section_items
            .push(item.clone());
    }

    /// Keys the current value of the layer's channels at the clock time.
    pub fn set_key(&mut self, host: &mut dyn SequencerHost, index: usize) -> bool {
        self.key_layer(host, index, false)
    }

    /// Keys the value that leaves the pose unchanged: the stack below for an
    /// Override layer, zero for an Additive layer and the current value for
    /// the Base layer.
    pub fn set_passthrough_key(&mut self, host: &mut dyn SequencerHost, index: usize) -> bool {
        self.key_layer(host, index, true)
    }

    fn key_layer(&mut self, host: &mut dyn SequencerHost, index: usize, passthrough: bool) -> bool {
        let clock = host.clock();
        let selection = host.selection().clone();
        let Some(layer) = self.layers.get(index) else {
            return false;
        };
        let Some(seq) = host.sequence_mut() else {
            return false;
        };
        if layer.locked(seq) == CheckState::Checked {
            log::debug!("layer '{}' is locked, not keying", layer.name());
            return false;
        }
        let time = clock.local_time;
        let layer_type = layer.derived_type(seq);
        let only_selected = layer.selected(seq, &selection) != CheckState::Unchecked;

        let mut keyed = 0;
        for (target, item) in layer.section_items() {
            let Some(section) = seq.section(item.section).filter(|s| !s.locked) else {
                continue;
            };
            let ranges = key_ranges(section, target, item, &selection, only_selected);
            if ranges.is_empty() {
                continue;
            }
            let below = seq
                .owning_track(item.section)
                .map(|t| SectionStack::below(seq, &seq.track_sections(t), item.section))
                .unwrap_or_default();

            let mut writes = Vec::new();
            for (control, channels) in &ranges {
                for i in channels.indices() {
                    let value = match (passthrough, layer_type) {
                        (true, AnimLayerType::Override) => {
                            Some(below.evaluate(seq, i, time, control.as_deref()))
                        }
                        (true, AnimLayerType::Additive) => Some(0.0),
                        _ => section.channels.evaluate(i, time),
                    };
                    if let Some(value) = value {
                        writes.push((i, vec![(time, value)]));
                    }
                }
            }
            keyed += write_section(seq, item.section, &writes, clock.key_interpolation);
        }
        if keyed > 0 {
            host.notify(DataChange::TrackValueChanged);
        }
        true
    }

    /// Reshapes a layer's keys along the motion of the matching Base
    /// sections.
    pub fn adjustment_blend_layers(&mut self, host: &mut dyn SequencerHost, index: usize) -> bool {
        if index == 0 || index >= self.layers.len() {
            return false;
        }
        let clock = host.clock();
        let Some(seq) = host.sequence_mut() else {
            return false;
        };
        let interval = clock.display_interval();
        for (target, item) in self.layers[index].section_items() {
            let base = self.layers[0]
                .items
                .get(&target)
                .and_then(|owner| owner.find_matching_section_item(seq, item.section))
                .and_then(|found| seq.section(found.section))
                .map(|s| s.channels.clone());
            let Some(base) = base else {
                continue;
            };
            let Some(layer_section) = seq.section_mut(item.section).filter(|s| s.active) else {
                continue;
            };
            let result = match (&base, &mut layer_section.channels) {
                (SectionChannels::Double(b), SectionChannels::Double(l)) => {
                    adjustment_blend_sections(b, l, interval, clock.key_interpolation)
                }
                (SectionChannels::Float(b), SectionChannels::Float(l)) => {
                    adjustment_blend_sections(b, l, interval, clock.key_interpolation)
                }
                _ => {
                    log::warn!("adjustment blend skipped: channel storage differs from base");
                    continue;
                }
            };
            if let Err(err) = result {
                log::warn!("adjustment blend of section {} failed: {err}", item.section);
            }
        }
        host.notify(DataChange::StructureItemsChanged);
        true
    }

    /// Current state of every layer, Base first.
    pub fn anim_layer_states(
        &self,
        seq: &Sequence,
        selection: &Selection,
        time: FrameNumber,
    ) -> Vec<AnimLayerState> {
        self.layers
            .iter()
            .map(|layer| layer.snapshot(seq, selection, time))
            .collect()
    }

    pub fn set_selected_in_list(&mut self, index: usize, selected: bool) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.selected_in_list = selected;
                true
            }
            None => false,
        }
    }

    /// Sections of the layers selected in the layer list.
    pub fn selected_layer_sections(&self, seq: &Sequence) -> Vec<SectionId> {
        self.layers
            .iter()
            .filter(|l| l.selected_in_list)
            .flat_map(|l| l.sections(seq))
            .collect()
    }

    pub fn is_track_on_selected_layer(&self, seq: &Sequence, track: TrackId) -> bool {
        self.selected_layer_sections(seq)
            .into_iter()
            .any(|s| seq.owning_track(s) == Some(track))
    }

    /// Points every layer's items for `old` at `new`.
    pub fn rebind_target(&mut self, old: TargetId, new: TargetId) -> bool {
        let mut changed = false;
        for layer in &mut self.layers {
            changed |= layer.rebind_target(old, new);
        }
        if changed {
            self.events.list_changed();
        }
        changed
    }
}

struct MergePass {
    range: FrameRange,
    increment: Option<FrameNumber>,
    interpolation: KeyInterpolation,
    time: FrameNumber,
}

/// Creates a section on the source's track and adds the source's keys to it.
fn duplicate_section(
    seq: &mut Sequence,
    layer_name: &str,
    time: FrameNumber,
    item: &SectionItem,
) -> Option<SectionId> {
    let (blend_type, kind) = seq
        .section(item.section)
        .map(|s| (s.blend_type, s.kind))?;
    let track = seq.owning_track(item.section)?;
    let section = seq.create_section(track)?;
    if let Some(s) = seq.section_mut(section) {
        if kind != SectionKind::Property {
            s.mask = ChannelBits::ALL;
        }
    }
    if let Err(err) = set_up_section_defaults(
        seq,
        time,
        layer_name,
        AnimLayerType::Additive,
        track,
        section,
    ) {
        log::warn!("duplicate of section {} skipped: {err}", item.section);
        seq.remove_section(section);
        return None;
    }
    let channel_count = match seq.section_mut(section) {
        Some(s) => {
            s.blend_type = blend_type;
            if kind == SectionKind::ControlRig {
                set_up_control_rig_section(s, &item.channels.name_list());
            }
            s.channel_count()
        }
        None => return None,
    };
    if channel_count > 0 {
        let req = ChannelMerge {
            base: section,
            top: item.section,
            channels: ChannelRange {
                start: 0,
                end: channel_count - 1,
            },
            range: FrameRange::all(),
            track_sections: &[],
            frame_increment: None,
            interpolation: KeyInterpolation::default(),
            policy: Some(MergePolicy::Add),
            control: None,
        };
        if let Err(err) = merge_channels(seq, &req) {
            log::warn!("keys of section {} not copied: {err}", item.section);
        }
    }
    Some(section)
}

/// Adds the rig controls of a merged item to the destination's mask.
fn extend_rig_mask(
    seq: &mut Sequence,
    destination: &mut AnimLayer,
    target: TargetId,
    base: SectionId,
    item: &SectionItem,
) {
    let Some(owner) = destination.items.get_mut(&target) else {
        return;
    };
    let Some(existing) = owner.section_items.iter_mut().find(|s| s.section == base) else {
        return;
    };
    let Some(section) = seq.section_mut(base).filter(|s| s.is_control_rig()) else {
        return;
    };
    for (name, bits) in &item.channels.names {
        existing.channels.names.entry(name.clone()).or_insert(*bits);
    }
    set_up_control_rig_section(section, &existing.channels.name_list());
}

/// Channel ranges of a section item to key, per rig control.
fn key_ranges(
    section: &Section,
    target: TargetId,
    item: &SectionItem,
    selection: &Selection,
    only_selected: bool,
) -> Vec<(Option<String>, ChannelRange)> {
    if section.is_control_rig() {
        return item
            .channels
            .names
            .keys()
            .filter(|name| !only_selected || selection.is_control_selected(target, name))
            .filter_map(|name| {
                let range = section.layout.get(name)?.range()?;
                Some((Some(name.clone()), range))
            })
            .collect();
    }
    if only_selected && !selection.is_object_selected(target) {
        return Vec::new();
    }
    match section.channel_count() {
        0 => Vec::new(),
        n => vec![(None, ChannelRange { start: 0, end: n - 1 })],
    }
}

fn write_section(
    seq: &mut Sequence,
    section: SectionId,
    writes: &[(usize, Vec<(FrameNumber, f64)>)],
    interp: KeyInterpolation,
) -> usize {
    let Some(section) = seq.section_mut(section) else {
        return 0;
    };
    if matches!(section.channels, SectionChannels::Float(_)) {
        write_samples::<f32>(&mut section.channels, writes, interp)
    } else {
        write_samples::<f64>(&mut section.channels, writes, interp)
    }
}

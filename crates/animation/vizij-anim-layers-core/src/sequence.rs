//! The edited sequence: bound targets, their tracks and the section table.
//!
//! Sections live in a generational slot table. Layers hold [`SectionId`]
//! handles and must re-resolve them on every access; a handle whose section
//! was removed resolves to `None`.

use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::channel::{DoubleChannel, FloatChannel};
use crate::ids::{IdAllocator, SectionId, TargetId, TrackId};
use crate::mapping::{ChannelLayout, RigControl};
use crate::section::{Section, SectionChannels, SectionKind};
use crate::time::FrameRange;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    /// A scene object or component with transform/property tracks.
    SceneObject,
    /// A procedural rig instance driven through control channels.
    Rig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rig {
    pub name: String,
    pub controls: Vec<RigControl>,
}

#[derive(Clone, Debug)]
pub struct Binding {
    pub target: TargetId,
    pub name: String,
    pub kind: TargetKind,
    pub tracks: Vec<TrackId>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStorage {
    Float,
    Double,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrackKind {
    Transform,
    ControlRig,
    Property {
        name: String,
        storage: ChannelStorage,
        channel_count: usize,
    },
}

#[derive(Clone, Debug)]
pub struct Track {
    pub id: TrackId,
    pub target: TargetId,
    pub kind: TrackKind,
    /// Property tracks may opt out of layered blending.
    pub supports_blending: bool,
    sections: Vec<SectionId>,
    row_names: HashMap<i32, String>,
    section_to_key: Option<SectionId>,
    section_to_key_per_control: HashMap<String, SectionId>,
}

impl Track {
    fn new(id: TrackId, target: TargetId, kind: TrackKind) -> Self {
        Self {
            id,
            target,
            kind,
            supports_blending: true,
            sections: Vec::new(),
            row_names: HashMap::new(),
            section_to_key: None,
            section_to_key_per_control: HashMap::new(),
        }
    }

    /// Sections in the order they were added. The first one is the base
    /// section of the track.
    pub fn sections(&self) -> &[SectionId] {
        &self.sections
    }

    pub fn is_control_rig(&self) -> bool {
        self.kind == TrackKind::ControlRig
    }

    pub fn position_of(&self, section: SectionId) -> Option<usize> {
        self.sections.iter().position(|s| *s == section)
    }

    pub fn row_display_name(&self, row: i32) -> Option<&str> {
        self.row_names.get(&row).map(String::as_str)
    }

    pub fn set_row_display_name(&mut self, row: i32, name: &str) {
        self.row_names.insert(row, name.to_string());
    }

    /// Moves row names after rows were renumbered (`old → new`).
    pub fn on_row_indices_changed(&mut self, moved: &HashMap<i32, i32>) {
        if moved.is_empty() {
            return;
        }
        let mut renamed = HashMap::with_capacity(self.row_names.len());
        for (row, name) in self.row_names.drain() {
            let row = moved.get(&row).copied().unwrap_or(row);
            renamed.insert(row, name);
        }
        self.row_names = renamed;
    }

    pub fn section_to_key(&self) -> Option<SectionId> {
        self.section_to_key
    }

    pub fn set_section_to_key(&mut self, section: Option<SectionId>) {
        self.section_to_key = section;
    }

    pub fn section_to_key_for_control(&self, control: &str) -> Option<SectionId> {
        self.section_to_key_per_control.get(control).copied()
    }

    pub fn set_section_to_key_for_control(&mut self, control: &str, section: SectionId) {
        self.section_to_key_per_control
            .insert(control.to_string(), section);
    }
}

#[derive(Clone, Debug)]
struct SectionSlot {
    generation: u32,
    owner: Option<TrackId>,
    section: Option<Section>,
}

#[derive(Clone, Debug, Default)]
pub struct Sequence {
    ids: IdAllocator,
    slots: Vec<SectionSlot>,
    free: Vec<u32>,
    tracks: IndexMap<TrackId, Track>,
    bindings: IndexMap<TargetId, Binding>,
    rigs: HashMap<TargetId, Rig>,
    pub playback_range: FrameRange,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playback_range(range: FrameRange) -> Self {
        Self {
            playback_range: range,
            ..Self::default()
        }
    }

    pub fn add_object(&mut self, name: &str) -> TargetId {
        let target = self.ids.alloc_target();
        self.bindings.insert(
            target,
            Binding {
                target,
                name: name.to_string(),
                kind: TargetKind::SceneObject,
                tracks: Vec::new(),
            },
        );
        target
    }

    pub fn add_rig(&mut self, rig: Rig) -> TargetId {
        let target = self.ids.alloc_target();
        self.bindings.insert(
            target,
            Binding {
                target,
                name: rig.name.clone(),
                kind: TargetKind::Rig,
                tracks: Vec::new(),
            },
        );
        self.rigs.insert(target, rig);
        target
    }

    pub fn binding(&self, target: TargetId) -> Option<&Binding> {
        self.bindings.get(&target)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.values()
    }

    pub fn rig(&self, target: TargetId) -> Option<&Rig> {
        self.rigs.get(&target)
    }

    fn add_track(&mut self, target: TargetId, kind: TrackKind) -> Option<TrackId> {
        let id = self.ids.alloc_track();
        let binding = self.bindings.get_mut(&target)?;
        binding.tracks.push(id);
        self.tracks.insert(id, Track::new(id, target, kind));
        Some(id)
    }

    pub fn add_transform_track(&mut self, target: TargetId) -> Option<TrackId> {
        match self.binding(target)?.kind {
            TargetKind::SceneObject => self.add_track(target, TrackKind::Transform),
            TargetKind::Rig => None,
        }
    }

    pub fn add_control_rig_track(&mut self, target: TargetId) -> Option<TrackId> {
        match self.binding(target)?.kind {
            TargetKind::Rig => self.add_track(target, TrackKind::ControlRig),
            TargetKind::SceneObject => None,
        }
    }

    pub fn add_property_track(
        &mut self,
        target: TargetId,
        name: &str,
        storage: ChannelStorage,
        channel_count: usize,
    ) -> Option<TrackId> {
        self.add_track(
            target,
            TrackKind::Property {
                name: name.to_string(),
                storage,
                channel_count,
            },
        )
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    pub fn tracks_for(&self, target: TargetId) -> Vec<TrackId> {
        self.binding(target)
            .map(|b| b.tracks.clone())
            .unwrap_or_default()
    }

    fn slot(&self, id: SectionId) -> Option<&SectionSlot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.section.is_some())
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.slot(id).and_then(|slot| slot.section.as_ref())
    }

    pub fn section_mut(&mut self, id: SectionId) -> Option<&mut Section> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.section.as_mut())
    }

    pub fn is_valid(&self, id: SectionId) -> bool {
        self.slot(id).is_some()
    }

    /// Track a section was created on.
    pub fn owning_track(&self, id: SectionId) -> Option<TrackId> {
        self.slot(id).and_then(|slot| slot.owner)
    }

    /// Sections of a track that still resolve.
    pub fn track_sections(&self, track: TrackId) -> Vec<SectionId> {
        self.track(track)
            .map(|t| {
                t.sections
                    .iter()
                    .copied()
                    .filter(|s| self.is_valid(*s))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stores a section in the table without attaching it to a track.
    pub fn insert_section(&mut self, owner: Option<TrackId>, section: Section) -> SectionId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.owner = owner;
                slot.section = Some(section);
                SectionId::new(index, slot.generation)
            }
            None => {
                self.slots.push(SectionSlot {
                    generation: 0,
                    owner,
                    section: Some(section),
                });
                SectionId::new((self.slots.len() - 1) as u32, 0)
            }
        }
    }

    /// Creates a detached section shaped for `track`.
    pub fn create_section(&mut self, track: TrackId) -> Option<SectionId> {
        let t = self.track(track)?;
        let section = match &t.kind {
            TrackKind::Transform => Section::transform(),
            TrackKind::ControlRig => {
                let rig = self.rigs.get(&t.target)?;
                Section::control_rig(ChannelLayout::build(&rig.controls))
            }
            TrackKind::Property {
                storage,
                channel_count,
                ..
            } => {
                let channels = match storage {
                    ChannelStorage::Float => {
                        SectionChannels::Float(vec![FloatChannel::new(); *channel_count])
                    }
                    ChannelStorage::Double => {
                        SectionChannels::Double(vec![DoubleChannel::new(); *channel_count])
                    }
                };
                Section::new(SectionKind::Property, channels)
            }
        };
        Some(self.insert_section(Some(track), section))
    }

    /// Attaches a section to the end of a track's section list.
    pub fn add_section(&mut self, track: TrackId, id: SectionId) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        let Some(t) = self.tracks.get_mut(&track) else {
            return false;
        };
        if !t.sections.contains(&id) {
            t.sections.push(id);
        }
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            slot.owner = Some(track);
        }
        true
    }

    /// Creates a section for `track` and appends it.
    pub fn create_and_add_section(&mut self, track: TrackId) -> Option<SectionId> {
        let id = self.create_section(track)?;
        self.add_section(track, id);
        Some(id)
    }

    /// Detaches the section from its track and frees its slot; every
    /// outstanding handle to it stops resolving.
    pub fn remove_section(&mut self, id: SectionId) -> bool {
        let Some(owner) = self.slot(id).map(|slot| slot.owner) else {
            return false;
        };
        if let Some(track) = owner.and_then(|t| self.tracks.get_mut(&t)) {
            track.sections.retain(|s| *s != id);
            if track.section_to_key == Some(id) {
                track.section_to_key = None;
            }
            track.section_to_key_per_control.retain(|_, s| *s != id);
        }
        let slot = &mut self.slots[id.index as usize];
        slot.section = None;
        slot.owner = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ControlKind;

    #[test]
    fn removed_sections_stop_resolving() {
        let mut seq = Sequence::new();
        let obj = seq.add_object("cube");
        let track = seq.add_transform_track(obj).unwrap();
        let a = seq.create_and_add_section(track).unwrap();
        assert!(seq.is_valid(a));
        assert!(seq.remove_section(a));
        assert!(seq.section(a).is_none());
        assert!(seq.track(track).unwrap().sections().is_empty());

        let b = seq.create_and_add_section(track).unwrap();
        assert_eq!(b.index, a.index);
        assert_ne!(b, a);
        assert!(seq.section(a).is_none());
        assert!(!seq.remove_section(a));
    }

    #[test]
    fn rig_sections_follow_rig_layout() {
        let mut seq = Sequence::new();
        let rig = seq.add_rig(Rig {
            name: "arm".into(),
            controls: vec![
                RigControl {
                    name: "ik".into(),
                    kind: ControlKind::Transform,
                    animatable: true,
                },
                RigControl {
                    name: "blend".into(),
                    kind: ControlKind::Float,
                    animatable: true,
                },
            ],
        });
        assert!(seq.add_transform_track(rig).is_none());
        let track = seq.add_control_rig_track(rig).unwrap();
        let section = seq.create_and_add_section(track).unwrap();
        let s = seq.section(section).unwrap();
        assert!(s.is_control_rig());
        assert_eq!(s.channel_count(), 10);
        assert_eq!(seq.owning_track(section), Some(track));
    }

    #[test]
    fn row_names_follow_renumbering() {
        let mut seq = Sequence::new();
        let obj = seq.add_object("cube");
        let id = seq.add_transform_track(obj).unwrap();
        let track = seq.track_mut(id).unwrap();
        track.set_row_display_name(1, "Layer");
        track.on_row_indices_changed(&HashMap::from_iter([(1, 2)]));
        assert_eq!(track.row_display_name(2), Some("Layer"));
        assert_eq!(track.row_display_name(1), None);
    }
}

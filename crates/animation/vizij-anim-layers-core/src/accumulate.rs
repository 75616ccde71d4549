//! Accumulation of section contributions into a composited channel value.
//!
//! Absolute sections form the backdrop as a weight-normalized average.
//! Additive and override sections are then applied in track order: additive
//! values add `value * weight`, override values blend toward `value` by
//! `weight`.

use crate::ids::SectionId;
use crate::interp::functions::lerp;
use crate::section::{BlendType, Section};
use crate::sequence::Sequence;
use crate::time::FrameNumber;

const WEIGHT_EPSILON: f64 = 1e-8;

/// Track sections split into the backdrop and the ordered layered sections.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectionStack {
    pub absolute: Vec<SectionId>,
    pub layered: Vec<SectionId>,
}

impl SectionStack {
    /// Splits resolvable sections by blend type. Sections without a blend type
    /// count as absolute.
    pub fn split(seq: &Sequence, sections: &[SectionId]) -> Self {
        let mut stack = SectionStack::default();
        for id in sections {
            let Some(section) = seq.section(*id) else {
                continue;
            };
            match section.blend_type {
                Some(BlendType::Additive) | Some(BlendType::Override) => stack.layered.push(*id),
                Some(BlendType::Absolute) | None => stack.absolute.push(*id),
            }
        }
        stack
    }

    /// The active sections of `track_sections` strictly before `section`.
    pub fn below(seq: &Sequence, track_sections: &[SectionId], section: SectionId) -> Self {
        let before: Vec<SectionId> = track_sections
            .iter()
            .copied()
            .take_while(|s| *s != section)
            .filter(|s| seq.section(*s).is_some_and(|sec| sec.active))
            .collect();
        Self::split(seq, &before)
    }

    /// Composited value of channel `index` at `time`.
    pub fn evaluate(
        &self,
        seq: &Sequence,
        index: usize,
        time: FrameNumber,
        control: Option<&str>,
    ) -> f64 {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for (section, value) in Self::contributions(seq, &self.absolute, index, time, control) {
            let w = section.weight_at(time);
            weighted_sum += value * w;
            total_weight += w;
        }
        let mut acc = if total_weight > WEIGHT_EPSILON {
            weighted_sum / total_weight
        } else {
            0.0
        };
        for (section, value) in Self::contributions(seq, &self.layered, index, time, control) {
            let w = section.weight_at(time);
            acc = match section.blend_type {
                Some(BlendType::Override) => lerp(acc, value, w),
                _ => acc + value * w,
            };
        }
        acc
    }

    fn contributions<'a>(
        seq: &'a Sequence,
        ids: &'a [SectionId],
        index: usize,
        time: FrameNumber,
        control: Option<&'a str>,
    ) -> impl Iterator<Item = (&'a Section, f64)> + 'a {
        ids.iter().filter_map(move |id| {
            let section = seq.section(*id)?;
            if !contributes(section, control) {
                return None;
            }
            Some((section, section.sample(index, time)?))
        })
    }
}

/// Whether a section takes part in evaluation of `control`.
pub fn contributes(section: &Section, control: Option<&str>) -> bool {
    section.active && control.map_or(true, |name| section.control_enabled(name))
}

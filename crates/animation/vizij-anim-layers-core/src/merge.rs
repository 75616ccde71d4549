//! Merging one section's channels into another.
//!
//! A merge picks one policy per call from the blend types of the two
//! sections, samples the top section either at its key times or at every
//! Nth frame, and writes the results into the base section's channels.
//! All values are computed from the pre-merge state before anything is
//! written, so a rejected merge never leaves the base half-edited.

use serde::{Deserialize, Serialize};

use crate::accumulate::{contributes, SectionStack};
use crate::channel::{Channel, ChannelValue};
use crate::error::{LayerError, Result};
use crate::ids::SectionId;
use crate::interp::KeyInterpolation;
use crate::mapping::{masked_component_ranges, ChannelRange, ControlKind};
use crate::section::{
    BlendType, ChannelBits, Section, SectionChannelKind, SectionChannels, SectionKind,
};
use crate::sequence::Sequence;
use crate::time::{FrameNumber, FrameRange};

const WEIGHT_TOLERANCE: f64 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Mean of the weighted absolute sections.
    Average,
    /// Base plus weighted top.
    Add,
    /// Base set to the composited stack value.
    Override,
}

impl MergePolicy {
    pub fn select(base: Option<BlendType>, top: Option<BlendType>) -> Self {
        if base == Some(BlendType::Override) || top == Some(BlendType::Override) {
            MergePolicy::Override
        } else if top == Some(BlendType::Absolute) {
            MergePolicy::Average
        } else {
            MergePolicy::Add
        }
    }
}

/// One channel-range merge of `top` into `base`.
#[derive(Clone, Debug)]
pub struct ChannelMerge<'a> {
    pub base: SectionId,
    pub top: SectionId,
    pub channels: ChannelRange,
    pub range: FrameRange,
    /// Sections of the track taking part, in track order.
    pub track_sections: &'a [SectionId],
    /// Bake every Nth frame instead of merging at the top's key times.
    pub frame_increment: Option<FrameNumber>,
    pub interpolation: KeyInterpolation,
    /// Forces a policy; selected from the blend types when `None`.
    pub policy: Option<MergePolicy>,
    /// Rig control the channels belong to, for per-control masking.
    pub control: Option<&'a str>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    pub policy: MergePolicy,
    pub keys_written: usize,
}

fn resolve(seq: &Sequence, id: SectionId) -> Result<&Section> {
    seq.section(id).ok_or_else(|| {
        log::warn!("merge skipped: {id} no longer resolves");
        LayerError::StaleSection(id)
    })
}

/// Structural checks shared by channel and section merges.
fn check_compatible(base: &Section, top: &Section) -> Result<()> {
    if !base.channels.same_storage(&top.channels) {
        log::warn!("merge aborted: base and top sections store different channel types");
        return Err(LayerError::ChannelTypeMismatch);
    }
    let (b, t) = (base.channel_count(), top.channel_count());
    if b != t {
        log::warn!("merge aborted: base has {b} channels, top has {t}");
        return Err(LayerError::ChannelCountMismatch { base: b, top: t });
    }
    Ok(())
}

/// Merges `req.channels` of the top section into the base section.
pub fn merge_channels(seq: &mut Sequence, req: &ChannelMerge<'_>) -> Result<MergeOutcome> {
    let base = resolve(seq, req.base)?;
    let top = resolve(seq, req.top)?;
    check_compatible(base, top)?;
    let len = base.channel_count();
    if req.channels.start > req.channels.end || req.channels.end >= len {
        log::warn!(
            "merge aborted: channels {}..={} out of bounds for {len}",
            req.channels.start,
            req.channels.end
        );
        return Err(LayerError::ChannelRangeOutOfBounds {
            start: req.channels.start,
            end: req.channels.end,
            len,
        });
    }
    let policy = req
        .policy
        .unwrap_or_else(|| MergePolicy::select(base.blend_type, top.blend_type));
    if req.base == req.top {
        return Ok(MergeOutcome {
            policy,
            keys_written: 0,
        });
    }

    let participants = participants(seq, req, policy);
    let mut writes = Vec::with_capacity(req.channels.len());
    for index in req.channels.indices() {
        let times = sample_times(base, top, index, req.range, req.frame_increment);
        let samples: Vec<(FrameNumber, f64)> = times
            .into_iter()
            .filter_map(|t| {
                merged_value(seq, policy, req, &participants, index, t).map(|v| (t, v))
            })
            .collect();
        writes.push((index, samples));
    }

    let interp = req.interpolation;
    let Some(base) = seq.section_mut(req.base) else {
        return Err(LayerError::StaleSection(req.base));
    };
    let keys_written = if matches!(base.channels, SectionChannels::Float(_)) {
        write_samples::<f32>(&mut base.channels, &writes, interp)
    } else {
        write_samples::<f64>(&mut base.channels, &writes, interp)
    };
    log::debug!(
        "merged {keys_written} keys ({policy:?}) from {} into {}",
        req.top,
        req.base
    );
    Ok(MergeOutcome {
        policy,
        keys_written,
    })
}

/// Sections evaluated by the Average and Override policies.
fn participants(seq: &Sequence, req: &ChannelMerge<'_>, policy: MergePolicy) -> SectionStack {
    let is_absolute = |id: &SectionId| {
        seq.section(*id)
            .is_some_and(|s| matches!(s.blend_type, Some(BlendType::Absolute) | None))
    };
    match policy {
        MergePolicy::Add => SectionStack::default(),
        MergePolicy::Average => {
            let mut ids: Vec<SectionId> = req
                .track_sections
                .iter()
                .copied()
                .filter(is_absolute)
                .collect();
            for id in [req.base, req.top] {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            SectionStack {
                absolute: ids,
                layered: Vec::new(),
            }
        }
        MergePolicy::Override => {
            // Backdrop is every absolute section up to the base; the layered
            // part is only the pair being merged.
            let base_pos = req.track_sections.iter().position(|s| *s == req.base);
            let top_pos = req.track_sections.iter().position(|s| *s == req.top);
            let mut ids: Vec<SectionId> = req
                .track_sections
                .iter()
                .enumerate()
                .filter(|(pos, id)| {
                    **id != req.top
                        && **id != req.base
                        && base_pos.map_or(true, |b| *pos < b)
                        && is_absolute(*id)
                })
                .map(|(_, id)| *id)
                .collect();
            let top_first = matches!((base_pos, top_pos), (Some(b), Some(t)) if t < b);
            if top_first {
                ids.extend([req.top, req.base]);
            } else {
                ids.extend([req.base, req.top]);
            }
            SectionStack::split(seq, &ids)
        }
    }
}

fn sample_times(
    base: &Section,
    top: &Section,
    index: usize,
    range: FrameRange,
    frame_increment: Option<FrameNumber>,
) -> Vec<FrameNumber> {
    let top_times = top.channels.key_times(index);
    let Some(step) = frame_increment else {
        return top_times.into_iter().filter(|t| range.contains(*t)).collect();
    };
    let mut extent: Option<(FrameNumber, FrameNumber)> = None;
    for t in top_times.iter().chain(base.channels.key_times(index).iter()) {
        extent = Some(match extent {
            Some((lo, hi)) => (lo.min(*t), hi.max(*t)),
            None => (*t, *t),
        });
    }
    let lower = range.lower.or(extent.map(|e| e.0));
    let upper = range.upper.or(extent.map(|e| e.1));
    let (Some(lower), Some(upper)) = (lower, upper) else {
        return Vec::new();
    };
    let step = step.max(1) as usize;
    (lower..=upper).step_by(step).collect()
}

fn merged_value(
    seq: &Sequence,
    policy: MergePolicy,
    req: &ChannelMerge<'_>,
    participants: &SectionStack,
    index: usize,
    time: FrameNumber,
) -> Option<f64> {
    match policy {
        MergePolicy::Add => {
            let base = seq.section(req.base)?;
            let top = seq.section(req.top)?;
            let base_value = base.sample(index, time)?;
            Some(base_value + top.sample(index, time)? * top.weight_at(time))
        }
        MergePolicy::Average => {
            let mut sum = 0.0;
            let mut count = 0usize;
            for id in &participants.absolute {
                let Some(section) = seq.section(*id) else {
                    continue;
                };
                if *id != req.base && !contributes(section, req.control) {
                    continue;
                }
                if let Some(v) = section.sample(index, time) {
                    sum += v * section.weight_at(time);
                    count += 1;
                }
            }
            (count > 0).then(|| sum / count as f64)
        }
        MergePolicy::Override => Some(participants.evaluate(seq, index, time, req.control)),
    }
}

pub(crate) fn write_samples<V: SectionChannelKind>(
    channels: &mut SectionChannels,
    writes: &[(usize, Vec<(FrameNumber, f64)>)],
    interp: KeyInterpolation,
) -> usize {
    let Some(channels) = V::select_mut(channels) else {
        return 0;
    };
    let mut written = 0;
    for (index, samples) in writes {
        if let Some(channel) = channels.get_mut(*index) {
            written += write_channel(channel, samples, interp);
        }
    }
    written
}

/// Assigns or adds a key per sample, then refreshes tangents.
pub fn write_channel<C: Channel>(
    channel: &mut C,
    samples: &[(FrameNumber, f64)],
    interp: KeyInterpolation,
) -> usize {
    for (time, value) in samples {
        channel.set_key_at(*time, C::Value::from_f64(*value), interp);
    }
    if !samples.is_empty() {
        channel.auto_set_tangents();
    }
    samples.len()
}

/// Puts a weight channel back to a constant 1.0 over `range`.
///
/// Keys inside the range are deleted. If keys remain outside it, 1.0 keys
/// are added at the finite range boundaries unless both already evaluate to
/// 1.0; otherwise the default becomes 1.0.
pub fn revert_weight_channel_to_one<C: Channel>(
    weight: &mut C,
    range: FrameRange,
    interp: KeyInterpolation,
) {
    let in_range: Vec<_> = weight
        .keys_in_range(range)
        .into_iter()
        .map(|(_, handle)| handle)
        .collect();
    weight.delete_keys(&in_range);
    if weight.num_keys() == 0 {
        weight.set_default(C::Value::from_f64(1.0));
        return;
    }
    let bounds: Vec<FrameNumber> = [range.lower, range.upper].into_iter().flatten().collect();
    let off = bounds
        .iter()
        .any(|t| (weight.sample(*t) - 1.0).abs() > WEIGHT_TOLERANCE);
    if off {
        for t in bounds {
            weight.add_key(t, C::Value::from_f64(1.0), interp);
        }
        weight.auto_set_tangents();
    }
}

/// Merges every matching channel of `top` into `base`, honoring rig control
/// masks and transform component masks, then normalizes the base weight when
/// the base ends up as an override section.
pub fn merge_section_pair(
    seq: &mut Sequence,
    base: SectionId,
    top: SectionId,
    range: FrameRange,
    frame_increment: Option<FrameNumber>,
    interpolation: KeyInterpolation,
) -> Result<MergeOutcome> {
    let base_section = resolve(seq, base)?;
    let top_section = resolve(seq, top)?;
    check_compatible(base_section, top_section)?;
    let policy = MergePolicy::select(base_section.blend_type, top_section.blend_type);
    if base == top {
        return Ok(MergeOutcome {
            policy,
            keys_written: 0,
        });
    }
    if base_section.kind != top_section.kind {
        log::warn!("merge aborted: section kinds differ");
        return Err(LayerError::ChannelTypeMismatch);
    }

    let track_sections = seq
        .owning_track(top)
        .map(|t| seq.track_sections(t))
        .unwrap_or_default();
    let plan = plan_ranges(seq, base_section, top_section, policy, &track_sections, base);

    let mut outcome = MergeOutcome {
        policy,
        keys_written: 0,
    };
    for (control, sections, channels) in &plan {
        let req = ChannelMerge {
            base,
            top,
            channels: *channels,
            range,
            track_sections: sections,
            frame_increment,
            interpolation,
            policy: Some(policy),
            control: control.as_deref(),
        };
        outcome.keys_written += merge_channels(seq, &req)?.keys_written;
    }

    if let Some(section) = seq.section_mut(base) {
        if section.blend_type == Some(BlendType::Override) {
            if let Some(weight) = section.weight.as_mut() {
                revert_weight_channel_to_one(weight, range, interpolation);
            }
        }
    }
    Ok(outcome)
}

type PlannedRange = (Option<String>, Vec<SectionId>, ChannelRange);

fn plan_ranges(
    seq: &Sequence,
    base: &Section,
    top: &Section,
    policy: MergePolicy,
    track_sections: &[SectionId],
    base_id: SectionId,
) -> Vec<PlannedRange> {
    let valid_for = |control: Option<&str>| -> Vec<SectionId> {
        track_sections
            .iter()
            .copied()
            .filter(|id| {
                seq.section(*id).is_some_and(|s| {
                    (s.active || *id == base_id)
                        && control.map_or(true, |name| s.control_enabled(name))
                })
            })
            .collect()
    };
    let partial = |kind: ControlKind, at: usize| -> Vec<ChannelRange> {
        if top.mask.contains(ChannelBits::ALL_TRANSFORM) {
            crate::mapping::channel_range(kind, at).into_iter().collect()
        } else {
            masked_component_ranges(kind, at, base.mask, top.mask)
        }
    };

    match top.kind {
        SectionKind::ControlRig => {
            let mut plan = Vec::new();
            for (name, info) in &top.layout.controls {
                let base_has = base.control_enabled(name);
                let top_has = top.control_enabled(name);
                let skip = if policy == MergePolicy::Override {
                    !base_has && !top_has
                } else {
                    !top_has
                };
                if skip {
                    continue;
                }
                let sections = valid_for(Some(name));
                for channels in partial(info.kind, info.channel_index) {
                    plan.push((Some(name.clone()), sections.clone(), channels));
                }
            }
            plan
        }
        SectionKind::Transform => {
            let sections = valid_for(None);
            partial(ControlKind::Transform, 0)
                .into_iter()
                .map(|channels| (None, sections.clone(), channels))
                .collect()
        }
        SectionKind::Property => match top.channel_count() {
            0 => Vec::new(),
            n => vec![(
                None,
                valid_for(None),
                ChannelRange {
                    start: 0,
                    end: n - 1,
                },
            )],
        },
    }
}

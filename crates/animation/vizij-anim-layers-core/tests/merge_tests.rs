use approx::assert_abs_diff_eq;
use vizij_anim_layers_core::{
    merge_channels, merge_section_pair, BlendType, Channel, ChannelBits, ChannelMerge,
    ChannelRange, ChannelStorage, FrameNumber, FrameRange, KeyInterpolation, LayerError,
    MergeOutcome, MergePolicy, Result, Rig, Section, SectionChannels, SectionId, Sequence, TrackId,
};

struct Scene {
    seq: Sequence,
    track: TrackId,
    base: SectionId,
}

fn scalar_scene() -> Scene {
    let mut seq = Sequence::new();
    let target = seq.add_object("cube");
    let track = seq
        .add_property_track(target, "opacity", ChannelStorage::Double, 1)
        .unwrap();
    let base = layered(&mut seq, track, BlendType::Absolute);
    Scene { seq, track, base }
}

fn layered(seq: &mut Sequence, track: TrackId, blend: BlendType) -> SectionId {
    let id = seq.create_and_add_section(track).unwrap();
    seq.section_mut(id).unwrap().blend_type = Some(blend);
    id
}

fn key(seq: &mut Sequence, section: SectionId, index: usize, keys: &[(FrameNumber, f64)]) {
    match &mut seq.section_mut(section).unwrap().channels {
        SectionChannels::Double(channels) => {
            for (t, v) in keys {
                channels[index].set_key_at(*t, *v, KeyInterpolation::Linear);
            }
        }
        SectionChannels::Float(channels) => {
            for (t, v) in keys {
                channels[index].set_key_at(*t, *v as f32, KeyInterpolation::Linear);
            }
        }
    }
}

fn value(seq: &Sequence, section: SectionId, index: usize, time: FrameNumber) -> f64 {
    seq.section(section).unwrap().sample(index, time).unwrap()
}

fn key_count(seq: &Sequence, section: SectionId, index: usize) -> usize {
    seq.section(section).unwrap().channels.key_times(index).len()
}

fn merge(seq: &mut Sequence, base: SectionId, top: SectionId) -> Result<MergeOutcome> {
    merge_section_pair(
        seq,
        base,
        top,
        FrameRange::all(),
        None,
        KeyInterpolation::Linear,
    )
}

#[test]
fn additive_sections_sum_into_the_lower_one() {
    let mut s = scalar_scene();
    let a = layered(&mut s.seq, s.track, BlendType::Additive);
    let b = layered(&mut s.seq, s.track, BlendType::Additive);
    key(&mut s.seq, a, 0, &[(0, 1.0)]);
    key(&mut s.seq, b, 0, &[(0, 2.0)]);

    let outcome = merge(&mut s.seq, a, b).unwrap();
    assert_eq!(outcome.policy, MergePolicy::Add);
    assert_eq!(outcome.keys_written, 1);
    assert_abs_diff_eq!(value(&s.seq, a, 0, 0), 3.0, epsilon = 1e-9);
    // The top section is only read.
    assert_abs_diff_eq!(value(&s.seq, b, 0, 0), 2.0, epsilon = 1e-9);
}

#[test]
fn override_section_replaces_base_values() {
    let mut s = scalar_scene();
    key(&mut s.seq, s.base, 0, &[(0, 1.0), (10, 9.0)]);
    let top = layered(&mut s.seq, s.track, BlendType::Override);
    key(&mut s.seq, top, 0, &[(0, 5.0), (10, 5.0)]);

    let outcome = merge(&mut s.seq, s.base, top).unwrap();
    assert_eq!(outcome.policy, MergePolicy::Override);
    for t in [0, 5, 10] {
        assert_abs_diff_eq!(value(&s.seq, s.base, 0, t), 5.0, epsilon = 1e-9);
    }
}

#[test]
fn absolute_sections_average() {
    let mut s = scalar_scene();
    key(&mut s.seq, s.base, 0, &[(0, 2.0)]);
    let top = layered(&mut s.seq, s.track, BlendType::Absolute);
    key(&mut s.seq, top, 0, &[(0, 4.0)]);

    let outcome = merge(&mut s.seq, s.base, top).unwrap();
    assert_eq!(outcome.policy, MergePolicy::Average);
    assert_abs_diff_eq!(value(&s.seq, s.base, 0, 0), 3.0, epsilon = 1e-9);
}

#[test]
fn merging_a_section_into_itself_changes_nothing() {
    let mut s = scalar_scene();
    let top = layered(&mut s.seq, s.track, BlendType::Override);
    key(&mut s.seq, top, 0, &[(0, 2.0), (10, 4.0)]);
    let before = s.seq.section(top).cloned();

    let outcome = merge(&mut s.seq, top, top).unwrap();
    assert_eq!(outcome.keys_written, 0);
    assert_eq!(s.seq.section(top).cloned(), before);
}

#[test]
fn channel_count_mismatch_aborts_without_writing() {
    let mut s = scalar_scene();
    key(&mut s.seq, s.base, 0, &[(0, 1.0)]);
    let other = s.seq.add_object("sphere");
    let wide = s
        .seq
        .add_property_track(other, "color", ChannelStorage::Double, 2)
        .unwrap();
    let top = layered(&mut s.seq, wide, BlendType::Additive);
    key(&mut s.seq, top, 0, &[(0, 7.0)]);
    let before = s.seq.section(s.base).cloned();

    let err = merge(&mut s.seq, s.base, top).unwrap_err();
    assert_eq!(err, LayerError::ChannelCountMismatch { base: 1, top: 2 });
    assert_eq!(s.seq.section(s.base).cloned(), before);
}

#[test]
fn storage_mismatch_aborts_channel_merge() {
    let mut s = scalar_scene();
    let other = s.seq.add_object("sphere");
    let floats = s
        .seq
        .add_property_track(other, "size", ChannelStorage::Float, 1)
        .unwrap();
    let top = layered(&mut s.seq, floats, BlendType::Additive);
    let req = ChannelMerge {
        base: s.base,
        top,
        channels: ChannelRange::single(0),
        range: FrameRange::all(),
        track_sections: &[],
        frame_increment: None,
        interpolation: KeyInterpolation::Linear,
        policy: None,
        control: None,
    };
    assert_eq!(
        merge_channels(&mut s.seq, &req).unwrap_err(),
        LayerError::ChannelTypeMismatch
    );
}

#[test]
fn stale_handles_are_rejected() {
    let mut s = scalar_scene();
    let top = layered(&mut s.seq, s.track, BlendType::Additive);
    assert!(s.seq.remove_section(top));
    assert_eq!(
        merge(&mut s.seq, s.base, top).unwrap_err(),
        LayerError::StaleSection(top)
    );
}

#[test]
fn additive_merges_are_linear() {
    let build = || {
        let mut s = scalar_scene();
        key(&mut s.seq, s.base, 0, &[(0, 1.0), (10, 3.0)]);
        s
    };

    let mut one_by_one = build();
    let a = layered(&mut one_by_one.seq, one_by_one.track, BlendType::Additive);
    let b = layered(&mut one_by_one.seq, one_by_one.track, BlendType::Additive);
    key(&mut one_by_one.seq, a, 0, &[(0, 0.5), (10, 1.0)]);
    key(&mut one_by_one.seq, b, 0, &[(0, 2.0), (10, -1.0)]);
    merge(&mut one_by_one.seq, one_by_one.base, a).unwrap();
    merge(&mut one_by_one.seq, one_by_one.base, b).unwrap();

    let mut summed = build();
    let c = layered(&mut summed.seq, summed.track, BlendType::Additive);
    key(&mut summed.seq, c, 0, &[(0, 2.5), (10, 0.0)]);
    merge(&mut summed.seq, summed.base, c).unwrap();

    for t in [0, 3, 5, 10] {
        assert_abs_diff_eq!(
            value(&one_by_one.seq, one_by_one.base, 0, t),
            value(&summed.seq, summed.base, 0, t),
            epsilon = 1e-9
        );
    }
}

#[test]
fn baking_samples_every_step_inside_the_range() {
    let mut s = scalar_scene();
    let top = layered(&mut s.seq, s.track, BlendType::Additive);
    key(&mut s.seq, top, 0, &[(0, 0.0), (4, 4.0)]);

    let outcome = merge_section_pair(
        &mut s.seq,
        s.base,
        top,
        FrameRange::new(0, 4),
        Some(2),
        KeyInterpolation::Linear,
    )
    .unwrap();
    assert_eq!(outcome.keys_written, 3);
    assert_eq!(
        s.seq.section(s.base).unwrap().channels.key_times(0),
        vec![0, 2, 4]
    );
    assert_abs_diff_eq!(value(&s.seq, s.base, 0, 2), 2.0, epsilon = 1e-9);
}

#[test]
fn keys_outside_the_merge_range_are_ignored() {
    let mut s = scalar_scene();
    let top = layered(&mut s.seq, s.track, BlendType::Additive);
    key(&mut s.seq, top, 0, &[(0, 1.0), (50, 2.0)]);

    merge_section_pair(
        &mut s.seq,
        s.base,
        top,
        FrameRange::new(0, 10),
        None,
        KeyInterpolation::Linear,
    )
    .unwrap();
    assert_eq!(s.seq.section(s.base).unwrap().channels.key_times(0), vec![0]);
}

fn transform_scene() -> Scene {
    let mut seq = Sequence::new();
    let target = seq.add_object("cube");
    let track = seq.add_transform_track(target).unwrap();
    let base = layered(&mut seq, track, BlendType::Absolute);
    Scene { seq, track, base }
}

#[test]
fn transform_merge_honors_component_masks() {
    let mut s = transform_scene();
    let top = layered(&mut s.seq, s.track, BlendType::Additive);
    s.seq.section_mut(top).unwrap().mask = ChannelBits::TRANSLATION_X;
    key(&mut s.seq, top, 0, &[(0, 2.0)]);
    key(&mut s.seq, top, 1, &[(0, 3.0)]);

    merge(&mut s.seq, s.base, top).unwrap();
    assert_abs_diff_eq!(value(&s.seq, s.base, 0, 0), 2.0, epsilon = 1e-9);
    assert_eq!(key_count(&s.seq, s.base, 1), 0);
}

#[test]
fn unmasked_top_merges_every_component() {
    let mut s = transform_scene();
    s.seq.section_mut(s.base).unwrap().mask =
        ChannelBits::TRANSLATION_X | ChannelBits::TRANSLATION_Y | ChannelBits::TRANSLATION_Z;
    let top = layered(&mut s.seq, s.track, BlendType::Additive);
    key(&mut s.seq, top, 0, &[(0, 1.0)]);
    key(&mut s.seq, top, 3, &[(0, 2.0)]);

    merge(&mut s.seq, s.base, top).unwrap();
    assert_abs_diff_eq!(value(&s.seq, s.base, 0, 0), 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(value(&s.seq, s.base, 3, 0), 2.0, epsilon = 1e-9);
}

#[test]
fn override_base_weight_returns_to_one() {
    let mut s = transform_scene();
    let base = layered(&mut s.seq, s.track, BlendType::Override);
    let top = layered(&mut s.seq, s.track, BlendType::Override);
    key(&mut s.seq, top, 0, &[(0, 4.0)]);
    {
        let weight = s.seq.section_mut(base).unwrap().weight.as_mut().unwrap();
        weight.set_key_at(0, 0.3, KeyInterpolation::Linear);
        weight.set_key_at(10, 0.6, KeyInterpolation::Linear);
    }

    merge_section_pair(
        &mut s.seq,
        base,
        top,
        FrameRange::new(0, 10),
        None,
        KeyInterpolation::Linear,
    )
    .unwrap();
    let section = s.seq.section(base).unwrap();
    assert_eq!(section.weight.as_ref().unwrap().num_keys(), 0);
    assert_abs_diff_eq!(section.weight_at(0), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(section.weight_at(10), 1.0, epsilon = 1e-6);
}

#[test]
fn override_base_weight_keeps_outside_keys_and_pins_bounds() {
    let mut s = transform_scene();
    let base = layered(&mut s.seq, s.track, BlendType::Override);
    let top = layered(&mut s.seq, s.track, BlendType::Override);
    key(&mut s.seq, top, 0, &[(0, 4.0)]);
    {
        let weight = s.seq.section_mut(base).unwrap().weight.as_mut().unwrap();
        weight.set_key_at(5, 0.3, KeyInterpolation::Linear);
        weight.set_key_at(20, 0.2, KeyInterpolation::Linear);
    }

    merge_section_pair(
        &mut s.seq,
        base,
        top,
        FrameRange::new(0, 10),
        None,
        KeyInterpolation::Linear,
    )
    .unwrap();
    let section = s.seq.section(base).unwrap();
    assert_abs_diff_eq!(section.weight_at(0), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(section.weight_at(10), 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(section.weight_at(20), 0.2, epsilon = 1e-6);
}

#[test]
fn rig_merge_only_touches_enabled_controls() {
    let rig: Rig = vizij_test_fixtures::rigs::load("arm").unwrap();
    let mut seq = Sequence::new();
    let target = seq.add_rig(rig);
    let track = seq.add_control_rig_track(target).unwrap();
    let base = layered(&mut seq, track, BlendType::Absolute);
    let top = layered(&mut seq, track, BlendType::Additive);
    {
        let section = seq.section_mut(top).unwrap();
        section.fill_control_mask(false);
        section.set_control_enabled("elbow", true);
    }
    let elbow = seq
        .section(top)
        .unwrap()
        .layout
        .get("elbow")
        .and_then(|info| info.range())
        .unwrap();
    for (offset, index) in elbow.indices().enumerate() {
        key(&mut seq, top, index, &[(0, offset as f64 + 1.0)]);
    }
    key(&mut seq, top, 0, &[(0, 100.0)]);

    merge(&mut seq, base, top).unwrap();
    for (offset, index) in elbow.indices().enumerate() {
        assert_abs_diff_eq!(value(&seq, base, index, 0), offset as f64 + 1.0, epsilon = 1e-6);
    }
    assert_eq!(key_count(&seq, base, 0), 0);
}

#[test]
fn rig_sections_span_the_fixture_layouts() {
    // Bool, integer and non-animatable controls own no channels.
    let expected = [("arm", 13), ("face", 6)];
    assert_eq!(vizij_test_fixtures::rigs::keys().len(), expected.len());
    for (name, channels) in expected {
        let rig: Rig = vizij_test_fixtures::rigs::load(name).unwrap();
        let mut seq = Sequence::new();
        let target = seq.add_rig(rig);
        let track = seq.add_control_rig_track(target).unwrap();
        let section = seq.create_and_add_section(track).unwrap();
        let section: &Section = seq.section(section).unwrap();
        assert_eq!(section.channel_count(), channels, "rig {name}");
    }
}

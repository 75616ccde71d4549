use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vizij_anim_layers_core::{
    adjustment_blend_sections, merge_section_pair, BlendType, Channel, ChannelLayout,
    ControlKind, FloatChannel, FrameRange, KeyInterpolation, Rig, RigControl, SectionChannels,
    SectionId, Sequence,
};

const FRAMES: i32 = 240;

fn rig() -> Rig {
    let controls = (0..16)
        .map(|i| RigControl {
            name: format!("bone_{i}"),
            kind: if i % 4 == 0 {
                ControlKind::Transform
            } else {
                ControlKind::Rotator
            },
            animatable: true,
        })
        .collect();
    Rig {
        name: "bench".into(),
        controls,
    }
}

fn keyed(seq: &mut Sequence, section: SectionId, phase: f64) {
    if let Some(SectionChannels::Float(channels)) =
        seq.section_mut(section).map(|s| &mut s.channels)
    {
        for (c, channel) in channels.iter_mut().enumerate() {
            for t in (0..=FRAMES).step_by(4) {
                let v = ((t as f64 * 0.05) + phase + c as f64).sin() as f32;
                channel.add_key(t, v, KeyInterpolation::SmartAuto);
            }
            channel.auto_set_tangents();
        }
    }
}

fn setup() -> (Sequence, SectionId, SectionId) {
    let mut seq = Sequence::with_playback_range(FrameRange::new(0, FRAMES));
    let target = seq.add_rig(rig());
    let track = seq.add_control_rig_track(target).expect("rig track");
    let base = seq.create_and_add_section(track).expect("base section");
    let top = seq.create_and_add_section(track).expect("top section");
    for (id, blend) in [(base, BlendType::Absolute), (top, BlendType::Additive)] {
        if let Some(s) = seq.section_mut(id) {
            s.blend_type = Some(blend);
        }
    }
    keyed(&mut seq, base, 0.0);
    keyed(&mut seq, top, 1.5);
    (seq, base, top)
}

fn bench_merge(c: &mut Criterion) {
    let (seq, base, top) = setup();
    c.bench_function("merge_section_pair_keys_only", |b| {
        b.iter(|| {
            let mut seq = seq.clone();
            let out = merge_section_pair(
                &mut seq,
                base,
                top,
                FrameRange::all(),
                None,
                KeyInterpolation::SmartAuto,
            );
            black_box(out.ok());
        })
    });
    c.bench_function("merge_section_pair_baked", |b| {
        b.iter(|| {
            let mut seq = seq.clone();
            let out = merge_section_pair(
                &mut seq,
                base,
                top,
                FrameRange::new(0, FRAMES),
                Some(1),
                KeyInterpolation::SmartAuto,
            );
            black_box(out.ok());
        })
    });
}

fn bench_adjustment(c: &mut Criterion) {
    let layout = ChannelLayout::build(&rig().controls);
    let base: Vec<FloatChannel> = (0..layout.total_channels)
        .map(|i| {
            let keys: Vec<(i32, f32)> = (0..=FRAMES)
                .step_by(2)
                .map(|t| (t, ((t as f32) * 0.03 + i as f32).cos()))
                .collect();
            FloatChannel::from_keys(&keys, KeyInterpolation::Linear)
        })
        .collect();
    let layer: Vec<FloatChannel> = (0..layout.total_channels)
        .map(|_| FloatChannel::from_keys(&[(0, 0.0), (FRAMES, 1.0)], KeyInterpolation::Linear))
        .collect();
    c.bench_function("adjustment_blend_sections", |b| {
        b.iter(|| {
            let mut layer = layer.clone();
            let written =
                adjustment_blend_sections(&base, &mut layer, 1, KeyInterpolation::SmartAuto);
            black_box(written.ok());
        })
    });
}

criterion_group!(benches, bench_merge, bench_adjustment);
criterion_main!(benches);

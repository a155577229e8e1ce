use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use pprof::criterion::{Output, PProfProfiler};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;

use trustcal_core::{Control, ControlHandle, Recommendation, Screen, TrialType, TrialView};
use trustcal_experiment::{StimulusConfig, StimulusGenerator};
use trustcal_render::{SkiaRenderer, ViewState};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 900;

fn trial_controls() -> [ControlHandle; 4] {
    [
        ControlHandle::new(Control::ShowZoom, true),
        ControlHandle::new(Control::ShowFull, false),
        ControlHandle::new(Control::Discard, true),
        ControlHandle::new(Control::Keep, true),
    ]
}

/// Synthesis of one scanned surface, including the bordered full view.
pub fn bench_stimulus(c: &mut Criterion) {
    let mut group = c.benchmark_group("stimulus");
    group.sample_size(60);

    let generator = StimulusGenerator::new(StimulusConfig::default());
    group.bench_function("generate_45pct", |b| {
        let mut rng = StdRng::seed_from_u64(45);
        b.iter(|| {
            let pattern = generator.generate(black_box(0.45), &mut rng);
            generator.full_view(&pattern)
        });
    });

    group.bench_function("crop_zoom", |b| {
        b.iter_batched(
            || generator.generate(0.45, &mut StdRng::seed_from_u64(7)),
            |pattern| pattern.crop_zoom(),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

/// Full trial screen redraws without text, so only rasterizing and blits are
/// measured.
pub fn bench_trial_screen(c: &mut Criterion) {
    let mut group = c.benchmark_group("trial_screen");
    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(2));

    let generator = StimulusGenerator::new(StimulusConfig::default());
    let pattern = generator.generate(0.35, &mut StdRng::seed_from_u64(35));
    let full = generator.full_view(&pattern);
    let zoom = pattern.crop_zoom();
    let controls = trial_controls();

    for (name, image, zoomed) in [("full", &full, false), ("zoom", &zoom, true)] {
        group.bench_function(name, |b| {
            let mut renderer = SkiaRenderer::new(WIDTH, HEIGHT, None).unwrap();
            let mut frame = vec![0u8; (WIDTH * HEIGHT * 4) as usize];
            let screen = Screen::Trial(TrialView {
                trial_type: TrialType::Experimental,
                number: 12,
                total: 36,
                image,
                zoomed,
                recommendation: Recommendation::Keep,
            });
            b.iter(|| {
                renderer.render(black_box(&screen), &controls, &ViewState::default());
                renderer.present(&mut frame).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)));
    targets = bench_stimulus, bench_trial_screen
}
criterion_main!(benches);

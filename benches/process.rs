//! Frame processing benchmarks
//!
//! Run with: cargo bench --bench process

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use framekit::{
    config::{DispatchMode, EngineConfig},
    effects::{EffectCatalog, EffectRegistry},
    params::RawParameters,
    pipeline::FrameProcessor,
    video::{FrameBuffer, FrameSource, PixelLayout, TestPattern},
};

const EFFECTS: &[&str] = &["brightness_contrast", "blur", "edge_detection", "vhs"];

fn registry() -> Arc<EffectRegistry> {
    let config = EngineConfig::default();
    let (registry, _) = EffectRegistry::init(config.registry, EffectCatalog::builtin()).unwrap();
    Arc::new(registry)
}

fn test_frame() -> FrameBuffer {
    TestPattern::new(640, 480, PixelLayout::Rgb8)
        .with_noise(8)
        .next_frame()
        .unwrap()
}

/// Raw transform cost with default parameters
fn bench_apply(c: &mut Criterion) {
    let registry = registry();
    let input = test_frame();

    let mut group = c.benchmark_group("apply");
    group.throughput(Throughput::Elements((640 * 480) as u64));

    for id in EFFECTS {
        let effect = registry.effect(id).unwrap();
        let params = registry.lookup(id).unwrap().defaults();
        let mut output = input.clone();

        group.bench_with_input(BenchmarkId::from_parameter(id), id, |b, _| {
            b.iter(|| {
                output.copy_from(&input);
                effect.apply(black_box(&input), &params, &mut output).unwrap();
            })
        });
    }

    group.finish();
}

/// Full processor path, with and without the output cache
fn bench_processor(c: &mut Criterion) {
    let registry = registry();
    let input = test_frame();

    let mut group = c.benchmark_group("processor");

    for (label, capacity) in [("uncached", 0), ("cached", 64)] {
        let mut config = EngineConfig::default();
        config.processor.dispatch = DispatchMode::Inline;
        config.processor.cache_capacity = capacity;

        let mut processor = FrameProcessor::new(registry.clone(), config.processor, config.performance);
        processor.select("blur", RawParameters::new()).unwrap();

        let mut sequence = 0u64;
        group.bench_function(label, |b| {
            b.iter(|| {
                sequence += 1;
                black_box(processor.process(input.clone().with_sequence(sequence)))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_apply, bench_processor);
criterion_main!(benches);

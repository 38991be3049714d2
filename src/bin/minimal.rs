// Minimal smoke run of the core engine without the async CLI

use std::sync::Arc;

use framekit::{
    config::{DispatchMode, EngineConfig},
    effects::{EffectCatalog, EffectRegistry},
    params::{ParamValue, RawParameters},
    pipeline::FrameProcessor,
    video::{FrameBuffer, PixelLayout},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎬 Testing framekit core functionality");

    // 1. Registry with the compiled-in effects
    println!("\n1. Building effect registry...");
    let config = EngineConfig::default();
    let (registry, report) = EffectRegistry::init(config.registry.clone(), EffectCatalog::builtin())?;
    println!("   Registered: {:?}", report.registered);
    println!("   Categories: {:?}", registry.categories());

    let vhs = registry.lookup("vhs").ok_or("vhs effect not registered")?;
    println!("   {} v{} with {} parameters", vhs.name, vhs.version, vhs.parameters.len());

    // 2. Processor running inline so the result is immediate
    println!("\n2. Selecting vhs with a custom mode...");
    let mut processor_config = config.processor.clone();
    processor_config.dispatch = DispatchMode::Inline;
    let mut processor = FrameProcessor::new(Arc::new(registry), processor_config, config.performance.clone());

    let mut raw = RawParameters::new();
    raw.insert("mode".to_string(), ParamValue::from("Custom"));
    raw.insert("scanline_intensity".to_string(), ParamValue::Float(0.9));
    raw.insert("noise_level".to_string(), ParamValue::Float(0.4));
    processor.select("vhs", raw)?;

    // 3. Process the same frame twice; the second run should hit the cache
    println!("\n3. Processing frames...");
    let frame = FrameBuffer::new_filled(200, 150, PixelLayout::Rgb8, [100, 150, 200]);
    let first = processor.process(frame.clone());
    println!("   First:  {:.2}ms, cache hit: {}, faulted: {}", first.elapsed_ms, first.cache_hit, first.faulted);

    let second = processor.process(frame.with_sequence(1));
    println!("   Second: {:.2}ms, cache hit: {}", second.elapsed_ms, second.cache_hit);

    // 4. Save the output
    println!("\n4. Saving output...");
    match first.output.save_png("minimal_test_output.png") {
        Ok(()) => println!("   ✅ Saved to minimal_test_output.png"),
        Err(e) => println!("   ⚠️  Could not save output: {}", e),
    }

    let stats = processor.stats();
    println!(
        "\n🎉 Done: {} frames, {} cache hits, {} faults",
        stats.frames, stats.cache_hits, stats.faults
    );
    Ok(())
}

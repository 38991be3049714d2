use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framekit::{
    config::{DispatchMode, EngineConfig},
    effects::{EffectCatalog, EffectRegistry},
    params::{ParamValue, ParameterStore, RawParameters},
    pipeline::FrameProcessor,
    video::{FrameSink, FrameSource, NullSink, PixelLayout, PngSequenceSink, TestPattern},
};

#[derive(Parser)]
#[command(
    name = "framekit",
    version,
    about = "Real-time video effects with adaptive quality",
    long_about = "framekit runs captured frames through pluggable effects, caching outputs and lowering quality when processing falls behind the target frame rate."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Extra directory to scan for effect manifests (repeatable)
    #[arg(short, long = "plugins", global = true)]
    plugins: Vec<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered effects and their parameters
    List {
        /// Only show effects in this category
        #[arg(long)]
        category: Option<String>,

        /// Only show effects matching this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Run a synthetic capture session through an effect
    Run {
        /// Effect id to apply
        #[arg(short, long)]
        effect: String,

        /// Parameter override as key=value (repeatable)
        #[arg(short = 'P', long = "param", value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,

        /// Saved parameter store to start from
        #[arg(long)]
        store: Option<PathBuf>,

        /// Number of frames to capture
        #[arg(short, long, default_value_t = 150)]
        frames: u64,

        #[arg(long, default_value_t = 640)]
        width: u32,

        #[arg(long, default_value_t = 480)]
        height: u32,

        /// Sensor noise amplitude of the test pattern
        #[arg(long, default_value_t = 0)]
        noise: u8,

        /// Directory for PNG output (frames are discarded if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write every n-th frame
        #[arg(long, default_value_t = 10)]
        every: u64,

        /// Override the configured dispatch mode
        #[arg(long, value_parser = parse_dispatch)]
        dispatch: Option<DispatchMode>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

/// Parse `key=value`; the value is read as TOML so numbers, booleans and
/// `[r, g, b]` colors keep their type, anything else is a string.
fn parse_param(text: &str) -> std::result::Result<(String, ParamValue), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", text))?;

    #[derive(serde::Deserialize)]
    struct Wrapper {
        v: ParamValue,
    }
    let value = toml::from_str::<Wrapper>(&format!("v = {}", value.trim()))
        .map(|w| w.v)
        .unwrap_or_else(|_| ParamValue::String(value.trim().to_string()));

    Ok((key.trim().to_string(), value))
}

fn parse_dispatch(text: &str) -> std::result::Result<DispatchMode, String> {
    match text {
        "inline" => Ok(DispatchMode::Inline),
        "blocking" => Ok(DispatchMode::Blocking),
        "latest_wins" | "latest-wins" => Ok(DispatchMode::LatestWins),
        other => Err(format!("unknown dispatch mode '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    info!("Starting framekit v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            EngineConfig::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            EngineConfig::default()
        }
    };
    config.registry.locations.extend(cli.plugins.iter().cloned());

    match cli.command {
        Command::InitConfig { path } => {
            EngineConfig::default().save_to_file(&path)?;
            println!("Default configuration written to {}", path.display());
            Ok(())
        }
        Command::List { category, search } => list_effects(&config, category, search),
        Command::Run {
            effect,
            params,
            store,
            frames,
            width,
            height,
            noise,
            output,
            every,
            dispatch,
        } => {
            if let Some(dispatch) = dispatch {
                config.processor.dispatch = dispatch;
            }

            let mut raw = match &store {
                Some(path) => ParameterStore::load(path)?.get(&effect),
                None => RawParameters::new(),
            };
            raw.extend(params);

            let session = Session {
                effect,
                raw,
                frames,
                width,
                height,
                noise,
                output,
                every,
            };
            run_session(config, session).await
        }
    }
}

fn build_registry(config: &EngineConfig) -> Result<EffectRegistry> {
    let (registry, report) = EffectRegistry::init(config.registry.clone(), EffectCatalog::builtin())
        .map_err(framekit::EngineError::from)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    for rejected in &report.rejected {
        warn!("{}", rejected);
    }
    Ok(registry)
}

fn list_effects(config: &EngineConfig, category: Option<String>, search: Option<String>) -> Result<()> {
    let registry = build_registry(config)?;

    let effects = match (&category, &search) {
        (Some(category), _) => registry.by_category(category),
        (None, Some(query)) => registry.search(query),
        (None, None) => registry.all(),
    };

    for descriptor in effects {
        println!("{} ({}) [{}] v{}", descriptor.name, descriptor.id, descriptor.category, descriptor.version);
        if !descriptor.description.is_empty() {
            println!("    {}", descriptor.description);
        }
        for (group, specs) in descriptor.grouped() {
            println!("    {}:", group);
            for spec in specs {
                let range = match (spec.min, spec.max) {
                    (Some(min), Some(max)) => format!(" {}..{}", min, max),
                    _ if !spec.options.is_empty() => format!(" {{{}}}", spec.options.join(", ")),
                    _ => String::new(),
                };
                let condition = spec
                    .dependency
                    .as_ref()
                    .map(|rule| format!(" (when {} {:?})", rule.on, rule.condition))
                    .unwrap_or_default();
                println!(
                    "      {:<22} {:<8} default {}{}{}",
                    spec.key,
                    spec.kind.name(),
                    spec.default,
                    range,
                    condition
                );
            }
        }
    }

    let stats = registry.stats();
    println!(
        "\n{} effects ({} built-in, {} discovered) in {} categories",
        stats.effects, stats.builtin, stats.discovered, stats.categories
    );
    Ok(())
}

struct Session {
    effect: String,
    raw: RawParameters,
    frames: u64,
    width: u32,
    height: u32,
    noise: u8,
    output: Option<PathBuf>,
    every: u64,
}

async fn run_session(config: EngineConfig, session: Session) -> Result<()> {
    let registry = Arc::new(build_registry(&config)?);
    let target_fps = config.performance.target_fps;

    let mut processor = FrameProcessor::new(registry, config.processor.clone(), config.performance.clone());
    processor
        .select(&session.effect, session.raw)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let mut source = TestPattern::new(session.width, session.height, PixelLayout::Rgb8)
        .with_limit(session.frames)
        .with_noise(session.noise);

    let mut sink: Box<dyn FrameSink> = match &session.output {
        Some(dir) => Box::new(
            PngSequenceSink::new(dir, session.every).with_context(|| format!("Cannot write to {}", dir.display()))?,
        ),
        None => Box::new(NullSink::default()),
    };

    info!(
        "Running '{}' on {}x{} frames at {} fps into {} sink",
        session.effect,
        session.width,
        session.height,
        target_fps,
        sink.name()
    );

    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / target_fps));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping capture");
                break;
            }
            _ = interval.tick() => {
                let Some(frame) = source.next_frame() else {
                    break;
                };

                let result = processor.process(frame);
                if let Some(change) = &result.tier_change {
                    info!("Quality tier now {} (avg {:.1}ms)", change.to, change.average_ms);
                }
                if result.faulted && result.unhealthy {
                    warn!("Effect '{}' keeps failing; frames pass through", session.effect);
                }
                sink.consume(&result.output)?;
            }
        }
    }

    let stats = processor.stats();
    let perf = processor.optimizer().snapshot();
    println!("Frames:         {}", stats.frames);
    println!("Cache hits:     {} ({:.0}%)", stats.cache_hits, stats.hit_rate() * 100.0);
    println!("Faults:         {} ({} timeouts)", stats.faults, stats.timeouts);
    println!("Dropped frames: {}", stats.dropped_frames);
    println!("Average apply:  {:.2}ms (budget {:.2}ms)", stats.average_apply_ms(), perf.budget_ms);
    println!("Quality tier:   {} ({} changes)", perf.tier, perf.tier_changes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_keeps_value_types() {
        assert_eq!(parse_param("radius=4").unwrap(), ("radius".to_string(), ParamValue::Integer(4)));
        assert_eq!(parse_param("intensity = 0.5").unwrap().1, ParamValue::Float(0.5));
        assert_eq!(parse_param("invert=true").unwrap().1, ParamValue::Bool(true));
        assert_eq!(parse_param("edge_color=[255, 0, 0]").unwrap().1, ParamValue::Color([255, 0, 0]));
    }

    #[test]
    fn test_parse_param_falls_back_to_string() {
        assert_eq!(parse_param("mode=Custom").unwrap().1, ParamValue::from("Custom"));
        assert_eq!(parse_param("kind=\"Box\"").unwrap().1, ParamValue::from("Box"));
        assert!(parse_param("radius").is_err());
    }

    #[test]
    fn test_parse_dispatch() {
        assert_eq!(parse_dispatch("latest-wins").unwrap(), DispatchMode::LatestWins);
        assert!(parse_dispatch("eventually").is_err());
    }
}

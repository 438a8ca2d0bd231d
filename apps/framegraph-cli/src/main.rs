mod config;
mod driver;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use framegraph_author::build_erosion_scene;
use framegraph_ecs::EntityId;
use framegraph_render::{GraphicsBackend, RecordingBackend, build_graph, sort};
use framegraph_render_wgpu::{WgpuBackend, WgpuConfig};
use framegraph_tools::{GraphInspector, StoreInspector};
use tracing_subscriber::EnvFilter;

use crate::config::{BackendKind, CliConfig};
use crate::driver::{FrameDriver, FrameOutcome};

#[derive(Parser)]
#[command(name = "framegraph", about = "Inspect and run the erosion pass graph")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Heightmap width, overrides the config file
    #[arg(long)]
    width: Option<u32>,

    /// Heightmap height, overrides the config file
    #[arg(long)]
    height: Option<u32>,

    /// Erosion RNG seed, overrides the config file
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Print the sorted pass order of the erosion scene
    Graph {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Dump the component store
    Inspect {
        /// Only show this entity's components
        #[arg(short, long)]
        entity: Option<u64>,
    },
    /// Run frames against a backend
    Run {
        #[arg(short, long)]
        frames: Option<u64>,
        #[arg(short, long, value_enum)]
        backend: Option<BackendKind>,
        /// Resize after this many frames
        #[arg(long)]
        resize_at: Option<u64>,
        /// Size to resize to, as WIDTHxHEIGHT (defaults to double)
        #[arg(long, value_parser = parse_size)]
        resize_to: Option<(u32, u32)>,
    },
}

fn parse_size(text: &str) -> Result<(u32, u32), String> {
    let (w, h) = text
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {text:?}"))?;
    let parse = |v: &str| v.trim().parse::<u32>().map_err(|e| format!("{v:?}: {e}"));
    Ok((parse(w)?, parse(h)?))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    match cli.command {
        Commands::Info => {
            println!("framegraph v{}", env!("CARGO_PKG_VERSION"));
            println!("ecs: {}", framegraph_ecs::crate_info());
            println!("render: {}", framegraph_render::crate_info());
            println!("render-wgpu: {}", framegraph_render_wgpu::crate_info());
            println!("author: {}", framegraph_author::crate_info());
            println!("tools: {}", framegraph_tools::crate_info());
        }
        Commands::Graph { json } => {
            let scene = build_erosion_scene(config.width, config.height)?;
            if json {
                let summary = GraphInspector::summarize(&scene.store)?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                let nodes = sort(build_graph(&scene.store))?;
                print!("{}", GraphInspector::describe(&nodes));
                let summary = GraphInspector::summarize(&scene.store)?;
                for dup in &summary.duplicate_producers {
                    println!("warning: {} is written by {:?}", dup.resource, dup.passes);
                }
            }
        }
        Commands::Inspect { entity } => {
            let scene = build_erosion_scene(config.width, config.height)?;
            match entity {
                Some(raw) => {
                    let id = EntityId(raw);
                    let found = StoreInspector::entity_components(&scene.store, id)?
                        .with_context(|| format!("entity {id} does not exist"))?;
                    println!("{}", serde_json::to_string_pretty(&found)?);
                }
                None => {
                    println!("{}", StoreInspector::summary(&scene.store));
                    println!("{}", serde_json::to_string_pretty(&scene.store.snapshot()?)?);
                }
            }
        }
        Commands::Run {
            frames,
            backend,
            resize_at,
            resize_to,
        } => {
            let frames = frames.unwrap_or(config.frames);
            let kind = backend.unwrap_or(config.backend);
            let resize = resize_at.map(|at| {
                let size = resize_to.unwrap_or((config.width * 2, config.height * 2));
                (at, size)
            });
            match kind {
                BackendKind::Recording => {
                    let driver = driver(&config, RecordingBackend::new())?;
                    let driver = run_frames(driver, frames, resize)?;
                    let backend = driver.backend();
                    println!(
                        "recorded {} calls, {} submissions",
                        backend.calls().len(),
                        backend.submissions().count()
                    );
                }
                BackendKind::Wgpu => {
                    let gpu = WgpuBackend::new(&WgpuConfig {
                        width: config.width,
                        height: config.height,
                        ..WgpuConfig::default()
                    })?;
                    println!("adapter: {}", gpu.adapter_name());
                    run_frames(driver(&config, gpu)?, frames, resize)?;
                }
            }
        }
    }

    Ok(())
}

fn driver<B: GraphicsBackend>(config: &CliConfig, backend: B) -> anyhow::Result<FrameDriver<B>> {
    let scene = build_erosion_scene(config.width, config.height)?;
    Ok(FrameDriver::new(
        scene,
        backend,
        config.graph.clone(),
        config.seed,
        config.max_consecutive_failures,
    ))
}

fn run_frames<B: GraphicsBackend>(
    mut driver: FrameDriver<B>,
    frames: u64,
    resize: Option<(u64, (u32, u32))>,
) -> anyhow::Result<FrameDriver<B>> {
    println!("Running {frames} frames on {}", driver.backend().name());
    for frame in 0..frames {
        if let Some((at, (width, height))) = resize
            && at == frame
        {
            driver.resize(width, height)?;
        }
        match driver.frame()? {
            FrameOutcome::Rendered(report) => {
                for skipped in &report.skipped {
                    tracing::warn!(frame, "{skipped}");
                }
                tracing::debug!(frame, dispatched = report.dispatched.len(), "frame done");
            }
            FrameOutcome::Failed(err) => println!("frame {frame}: {err}, retrying"),
        }
    }
    println!(
        "Done: rendered={} failed={} cache generation={}",
        driver.frames_rendered(),
        driver.frames_failed(),
        driver.graph().cache().generation()
    );
    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_argument_parses() {
        assert_eq!(parse_size("640x480"), Ok((640, 480)));
        assert!(parse_size("640").is_err());
        assert!(parse_size("ax2").is_err());
    }

    #[test]
    fn cli_accepts_run_flags() {
        let cli = Cli::try_parse_from([
            "framegraph",
            "--width",
            "64",
            "run",
            "--frames",
            "3",
            "--backend",
            "recording",
            "--resize-at",
            "1",
            "--resize-to",
            "32x32",
        ])
        .unwrap();
        assert_eq!(cli.width, Some(64));
        match cli.command {
            Commands::Run {
                frames,
                backend,
                resize_at,
                resize_to,
            } => {
                assert_eq!(frames, Some(3));
                assert_eq!(backend, Some(BackendKind::Recording));
                assert_eq!(resize_at, Some(1));
                assert_eq!(resize_to, Some((32, 32)));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn recording_run_completes() {
        let config = CliConfig {
            width: 16,
            height: 16,
            ..CliConfig::default()
        };
        let driver = driver(&config, RecordingBackend::new()).unwrap();
        let driver = run_frames(driver, 4, Some((2, (8, 8)))).unwrap();
        assert_eq!(driver.frames_rendered(), 4);
        assert_eq!(driver.scene().size, glam::UVec2::new(8, 8));
    }
}

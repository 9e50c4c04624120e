#![deny(clippy::all, clippy::pedantic)]
//! # tilemarch
//!
//! Renders a JSON scene description through the tiled ray-march pipeline and
//! writes the result as PNG. With `--watch` the scene file is reloaded and the
//! frame re-rendered every time it changes on disk.

mod watcher;

use anyhow::{Context, Result};
use clap::Parser;
use render::{FramePipeline, RenderConfig};
use scene::{SceneDescription, SdfObject};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "tilemarch", about = "Tiled SDF ray-march renderer")]
struct Args {
    /// Scene description (JSON)
    #[arg(long, short)]
    scene: PathBuf,
    /// Render configuration (JSON); defaults apply when omitted
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Color image output path
    #[arg(long, short, default_value = "frame.png")]
    output: PathBuf,
    /// Optional depth image output path
    #[arg(long)]
    depth_output: Option<PathBuf>,
    /// Number of frames to render before writing the last one
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    frames: u32,
    /// Keep running and re-render whenever the scene file changes
    #[arg(long)]
    watch: bool,
    /// Use the wgpu backend when available
    #[arg(long)]
    gpu: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RenderConfig::load(path)
            .with_context(|| format!("loading render config {}", path.display()))?,
        None => RenderConfig::default(),
    };
    let backend = compute::default_backend(args.gpu);
    let mut pipeline = FramePipeline::new(backend, config)?;

    let objects = load_scene(&args.scene)?;
    render_and_save(&mut pipeline, &objects, &args)?;

    if args.watch {
        watch(&mut pipeline, objects, &args)?;
    }
    Ok(())
}

fn load_scene(path: &Path) -> Result<Vec<SdfObject>> {
    let objects = SceneDescription::load(path)
        .and_then(SceneDescription::into_objects)
        .with_context(|| format!("loading scene {}", path.display()))?;
    tracing::info!("loaded {} objects from {}", objects.len(), path.display());
    Ok(objects)
}

/// Renders `args.frames` frames and writes the last one.
fn render_and_save(
    pipeline: &mut FramePipeline,
    objects: &[SdfObject],
    args: &Args,
) -> Result<()> {
    let camera = pipeline.config().camera();
    let mut last = None;
    for _ in 0..args.frames {
        let frame = pipeline.render(objects, &camera)?;
        tracing::info!(
            frame = frame.stats.frame_index,
            objects = frame.stats.object_count,
            dropped = frame.stats.dropped_objects,
            pairs = frame.stats.occupied_pairs,
            fell_back = frame.stats.fell_back,
            "rendered frame"
        );
        last = Some(frame);
    }
    let frame = last.context("no frames rendered")?;

    frame
        .image
        .save_color_png(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    if let Some(path) = &args.depth_output {
        frame
            .image
            .save_depth_png(path, camera.zfar)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Re-renders on every scene change until the watcher shuts down. A scene
/// that fails to load or render is logged and the previous one kept.
fn watch(pipeline: &mut FramePipeline, mut objects: Vec<SdfObject>, args: &Args) -> Result<()> {
    let scene_watcher = watcher::start(&args.scene)?;
    while let Some(path) = scene_watcher.wait_for_change() {
        match load_scene(&path) {
            Ok(reloaded) => objects = reloaded,
            Err(e) => {
                tracing::error!("{e:#}");
                continue;
            }
        }
        if let Err(e) = render_and_save(pipeline, &objects, args) {
            tracing::error!("{e:#}");
        }
    }
    tracing::info!("Scene watcher stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_apply() {
        let args = Args::try_parse_from(["tilemarch", "--scene", "s.json"]).unwrap();
        assert_eq!(args.output, PathBuf::from("frame.png"));
        assert_eq!(args.frames, 1);
        assert!(args.config.is_none() && args.depth_output.is_none());
        assert!(!args.watch && !args.gpu);
    }

    #[test]
    fn zero_frames_is_rejected() {
        assert!(Args::try_parse_from(["tilemarch", "-s", "s.json", "--frames", "0"]).is_err());
    }

    #[test]
    fn scene_is_required() {
        assert!(Args::try_parse_from(["tilemarch"]).is_err());
    }
}

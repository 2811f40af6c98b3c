//! Headless host for a scene file: loads it, streams it over sACN and
//! drives a synthetic frame loop that sweeps a paint segment across every
//! fixture.
//!
//! Run with: cargo run --bin scene_player -- rig.json --seconds 30

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use glam::{Affine3A, Quat, Vec3};
use tokio::time::{Instant, MissedTickBehavior};

use dmx_paint::models::{Color32, PaintSegment};
use dmx_paint::output::{E131Transport, RecordingTransport, Transport};
use dmx_paint::{HostHooks, RoomOrigin, SceneManager, Settings};

#[derive(Parser, Debug)]
#[command(version, about = "Paint a DMX scene file with a sweeping blade")]
struct Args {
    /// Scene definition file (JSON)
    scene: PathBuf,

    /// Settings file (JSON); defaults are used when absent
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Stop after this many seconds; 0 runs until Ctrl-C
    #[arg(long, default_value_t = 0.0)]
    seconds: f32,

    /// Frame loop rate in Hz
    #[arg(long, default_value_t = 60.0)]
    frame_rate: f32,

    /// Encode packets but keep them in memory instead of sending
    #[arg(long)]
    dry_run: bool,
}

/// Vertical segment through one column of the fixture, in world space.
fn sweep_segment(world: Affine3A, top: Vec3, bottom: Vec3, color: Color32) -> PaintSegment {
    PaintSegment::new(world.transform_point3(top), world.transform_point3(bottom), color)
}

fn sweep_color(t: f32) -> Color32 {
    let channel = |phase: f32| ((t + phase).sin() * 127.5 + 127.5) as u8;
    Color32::rgb(channel(0.0), channel(2.094), channel(4.189))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.scene_file_path = args.scene.to_string_lossy().into_owned();

    let recording = args.dry_run.then(RecordingTransport::new);
    let transport: Arc<dyn Transport> = match &recording {
        Some(recording) => Arc::new(recording.clone()),
        None => Arc::new(E131Transport::new(&settings.output.source_name)),
    };

    let mut manager = SceneManager::new(settings, transport)?;
    manager.on_scene_activated(RoomOrigin::new(Vec3::ZERO, Quat::IDENTITY));
    if !manager.is_loaded() {
        return Err(format!("could not load scene {}", args.scene.display()).into());
    }

    let frame_rate = if args.frame_rate > 0.0 { args.frame_rate } else { 60.0 };
    let mut ticker = tokio::time::interval(Duration::from_secs_f32(1.0 / frame_rate));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let started = Instant::now();
    let mut last = started;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("[scene] Interrupted");
                break;
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                let dt = (now - last).as_secs_f32();
                last = now;
                let elapsed = (now - started).as_secs_f32();

                let segments: Vec<(String, PaintSegment)> = manager
                    .scene()
                    .map(|scene| {
                        scene
                            .fixtures()
                            .map(|fixture| {
                                let h = fixture.geometry().counts.horizontal;
                                let rows = fixture.geometry().rows();
                                let col = (elapsed * 4.0) as usize % h;
                                let vertices = fixture.vertices();
                                let segment = sweep_segment(
                                    fixture.world_transform(),
                                    vertices[(rows - 1) * h + col].position,
                                    vertices[col].position,
                                    sweep_color(elapsed),
                                );
                                (fixture.name().to_string(), segment)
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                for (name, segment) in &segments {
                    manager.on_interaction_overlap(name, segment);
                }
                manager.on_frame(dt);
                manager.reload_if_dirty();

                if args.seconds > 0.0 && elapsed >= args.seconds {
                    break;
                }
            }
        }
    }

    manager.on_scene_deactivated();
    if let Some(recording) = recording {
        log::info!(
            "[output] Dry run recorded {} data and {} discovery packets",
            recording.data_packets().len(),
            recording.discovery_packets_sent().len()
        );
    }
    Ok(())
}

mod app;
mod asset_download;
mod cli;
mod config;
mod display;
mod error;
mod gesture;
mod overlay;
mod pipeline;
mod types;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, Result};
use clap::Parser;

use app::CaptureLoop;
use cli::Cli;
use config::AppConfig;
use display::{MinifbWindow, WINDOW_TITLE};
use overlay::OverlayRenderer;
use pipeline::OrtPoseEstimator;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli).context("invalid configuration")?;
    log::debug!("resolved configuration: {config:?}");

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_flag = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_flag.store(true, Ordering::SeqCst);
    })
    .context("failed to install ctrl-c handler")?;

    let estimator =
        OrtPoseEstimator::new(&config.graph_path, config.target_size, config.show_process)
            .with_context(|| format!("failed to load model {}", config.model))?;
    let overlay = OverlayRenderer::load(&config.font_path);
    log::info!(
        "overlay host label {:?}, text {}",
        overlay.host(),
        if overlay.has_font() { "enabled" } else { "disabled" }
    );
    let rule = config.gesture_rule();
    log::info!("gesture rule uses {:?} policy for missing keypoints", rule.policy());
    let camera = open_camera(config.camera)?;

    let summary = CaptureLoop::new(
        camera,
        estimator,
        MinifbWindow::new(WINDOW_TITLE),
        overlay,
        rule,
        config.zoom,
        interrupted,
    )
    .run()
    .context("capture loop stopped with an error")?;

    log::info!(
        "{} frames processed, taxi hailed in {}, last rate {}",
        summary.frames,
        summary.hailing_frames,
        overlay::fps_label(summary.last_fps)
    );
    Ok(())
}

#[cfg(feature = "camera-nokhwa")]
fn open_camera(device: u32) -> Result<pipeline::NokhwaCamera> {
    pipeline::NokhwaCamera::open(device).map_err(|err| {
        match pipeline::available_cameras() {
            Ok(cameras) if !cameras.is_empty() => {
                for (index, label) in cameras {
                    log::info!("available camera {index}: {label}");
                }
            }
            Ok(_) => log::warn!("no cameras detected"),
            Err(query_err) => log::warn!("{query_err}"),
        }
        anyhow::Error::new(err)
    })
}

#[cfg(not(feature = "camera-nokhwa"))]
fn open_camera(_device: u32) -> Result<Unsupported> {
    anyhow::bail!("built without a camera backend; enable the `camera-nokhwa` feature")
}

#[cfg(not(feature = "camera-nokhwa"))]
enum Unsupported {}

#[cfg(not(feature = "camera-nokhwa"))]
impl pipeline::CameraSource for Unsupported {
    fn read(&mut self) -> error::Result<types::Frame> {
        match *self {}
    }
}

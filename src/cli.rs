use std::path::PathBuf;

use clap::Parser;

use crate::pipeline::estimator::{DEFAULT_MODEL, DEFAULT_MODEL_DIR, DEFAULT_RESOLUTION};

/// Realtime webcam pose estimation that flags anyone hailing a taxi.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"Examples:
    taxi-hail
    taxi-hail --camera 1 --zoom 0.5
    taxi-hail --model cmu --resolution 656x368 --show-process true"#)]
pub struct Cli {
    /// Camera device index
    #[arg(long, default_value_t = 0)]
    pub camera: u32,

    /// Scale applied to each frame before it is centered on the canvas
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub zoom: f32,

    /// Network input resolution as WxH, both multiples of 16
    #[arg(long, default_value = DEFAULT_RESOLUTION)]
    pub resolution: String,

    /// Pose graph: cmu / mobilenet_thin / mobilenet_v2_large / mobilenet_v2_small
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// For debug purpose, log per-stage inference timings
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub show_process: bool,

    /// Ignore the gesture rule for people whose nose was not detected
    #[arg(long, default_value_t = false)]
    pub strict_keypoints: bool,

    /// Directory holding graph/<model>/graph_opt.onnx
    #[arg(long, default_value = DEFAULT_MODEL_DIR)]
    pub model_dir: PathBuf,
}

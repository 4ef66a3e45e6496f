use std::path::PathBuf;

use crate::{
    asset_download::default_font_path,
    cli::Cli,
    error::Result,
    gesture::{GestureRule, MissingKeypointPolicy},
    pipeline::{
        compositor::validate_zoom,
        estimator::{graph_path, model_wh},
    },
};

/// Everything the capture loop needs, checked before any device is opened.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub camera: u32,
    pub zoom: f32,
    pub target_size: (u32, u32),
    pub model: String,
    pub graph_path: PathBuf,
    pub policy: MissingKeypointPolicy,
    pub show_process: bool,
    pub font_path: PathBuf,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let zoom = validate_zoom(cli.zoom)?;
        let target_size = model_wh(&cli.resolution)?;
        let graph_path = graph_path(&cli.model_dir, &cli.model)?;
        let policy = if cli.strict_keypoints {
            MissingKeypointPolicy::Strict
        } else {
            MissingKeypointPolicy::Sentinel
        };

        Ok(Self {
            camera: cli.camera,
            zoom,
            target_size,
            model: cli.model.clone(),
            graph_path,
            policy,
            show_process: cli.show_process,
            font_path: default_font_path(),
        })
    }

    pub fn gesture_rule(&self) -> GestureRule {
        GestureRule::new(self.policy)
    }
}

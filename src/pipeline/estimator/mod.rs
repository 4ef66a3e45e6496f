pub mod ort;
pub mod paf;

use std::path::{Path, PathBuf};

use crate::{
    error::{Result, TaxiError},
    types::{DetectedPerson, Frame},
};

pub use self::ort::OrtPoseEstimator;

/// Turns one frame into the people visible in it, in frame pixel coordinates.
pub trait PoseEstimator {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<DetectedPerson>>;
}

pub const DEFAULT_MODEL: &str = "mobilenet_thin";
pub const DEFAULT_RESOLUTION: &str = "432x368";
pub const DEFAULT_MODEL_DIR: &str = "models";

/// Graph names the registry knows how to locate.
pub const KNOWN_GRAPHS: &[&str] = &[
    "cmu",
    "mobilenet_thin",
    "mobilenet_v2_large",
    "mobilenet_v2_small",
];

const GRAPH_FILENAME: &str = "graph_opt.onnx";

/// Parse a `WxH` network input size. Both sides must be positive multiples of 16.
pub fn model_wh(resolution: &str) -> Result<(u32, u32)> {
    let invalid = || {
        TaxiError::Configuration(format!(
            "resolution must look like WxH (e.g. {DEFAULT_RESOLUTION}), got {resolution:?}"
        ))
    };
    let (w, h) = resolution.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: u32 = w.trim().parse().map_err(|_| invalid())?;
    let height: u32 = h.trim().parse().map_err(|_| invalid())?;

    if width == 0 || height == 0 || width % 16 != 0 || height % 16 != 0 {
        return Err(TaxiError::Configuration(format!(
            "width and height should be positive multiples of 16, got w={width}, h={height}"
        )));
    }
    Ok((width, height))
}

/// Location of a named graph below `model_dir`, without checking that it exists.
pub fn graph_location(model_dir: &Path, name: &str) -> Result<PathBuf> {
    if !KNOWN_GRAPHS.contains(&name) {
        return Err(TaxiError::Configuration(format!(
            "unknown model {name:?}, expected one of: {}",
            KNOWN_GRAPHS.join(", ")
        )));
    }
    Ok(model_dir.join("graph").join(name).join(GRAPH_FILENAME))
}

/// Resolve a named graph to an existing ONNX file.
pub fn graph_path(model_dir: &Path, name: &str) -> Result<PathBuf> {
    let path = graph_location(model_dir, name)?;
    if !path.is_file() {
        return Err(TaxiError::Configuration(format!(
            "graph for model {name:?} not found at {}",
            path.display()
        )));
    }
    Ok(path)
}

use std::{
    fmt::Display,
    path::Path,
    time::{Duration, Instant},
};

use ndarray::{Array4, Axis, Ix3};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    PoseEstimator,
    paf::{self, OUTPUT_CHANNELS, PafConfig},
};
use crate::{
    error::{Result, TaxiError},
    pipeline::compositor::resize_rgba,
    types::{DetectedPerson, Frame},
};

/// OpenPose-style graph run through ONNX Runtime.
///
/// The graph takes `[1, H, W, 3]` BGR pixels in 0..=255 and returns a single
/// `[1, h, w, 57]` tensor of heatmaps followed by part affinity fields.
pub struct OrtPoseEstimator {
    session: Session,
    target_size: (u32, u32),
    paf: PafConfig,
    show_process: bool,
}

impl OrtPoseEstimator {
    pub fn new(graph_path: &Path, target_size: (u32, u32), show_process: bool) -> Result<Self> {
        let load_err = |err: &dyn Display| {
            TaxiError::Inference(format!(
                "failed to load pose graph from {}: {err}",
                graph_path.display()
            ))
        };
        let session = Session::builder()
            .map_err(|err| load_err(&err))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|err| load_err(&err))?
            .with_intra_threads(2)
            .map_err(|err| load_err(&err))?
            .commit_from_file(graph_path)
            .map_err(|err| load_err(&err))?;

        log::info!(
            "pose backend ready using {} at {}x{}",
            graph_path.display(),
            target_size.0,
            target_size.1
        );

        Ok(Self {
            session,
            target_size,
            paf: PafConfig::default(),
            show_process,
        })
    }

    fn report(&self, stage: &str, elapsed: Duration) {
        if self.show_process {
            log::info!("inference {stage}: {:.4}s", elapsed.as_secs_f64());
        } else {
            log::debug!("inference {stage}: {:.4}s", elapsed.as_secs_f64());
        }
    }
}

impl PoseEstimator for OrtPoseEstimator {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<DetectedPerson>> {
        let started = Instant::now();
        let input = prepare_input(frame, self.target_size)?;
        self.report("image resize", started.elapsed());

        let started = Instant::now();
        let tensor = Tensor::from_array(input)?;
        let paf_cfg = self.paf.clone();
        let (people, run_elapsed, decode_elapsed) = {
            let outputs = self.session.run(ort::inputs![tensor])?;
            if outputs.len() == 0 {
                return Err(TaxiError::Inference(
                    "pose graph returned no outputs".to_string(),
                ));
            }
            let raw = outputs[0].try_extract_array::<f32>()?;
            let shape = raw.shape().to_vec();
            if shape.len() != 4 || shape[0] != 1 || shape[3] < OUTPUT_CHANNELS {
                return Err(TaxiError::Inference(format!(
                    "unexpected pose output shape {shape:?}, need [1, h, w, {OUTPUT_CHANNELS}]"
                )));
            }
            let grid = raw
                .index_axis(Axis(0), 0)
                .into_dimensionality::<Ix3>()
                .map_err(|err| TaxiError::Inference(format!("pose output is not 3-D: {err}")))?;

            let run_elapsed = started.elapsed();

            let decode_started = Instant::now();
            let people = paf::decode_people(&grid, &paf_cfg);
            (people, run_elapsed, decode_started.elapsed())
        };
        self.report("net run", run_elapsed);
        self.report("pose decode", decode_elapsed);

        Ok(people)
    }
}

/// Stretch the frame to the network size and lay it out as NHWC BGR floats.
pub fn prepare_input(frame: &Frame, (width, height): (u32, u32)) -> Result<Array4<f32>> {
    if !frame.is_well_formed() {
        return Err(TaxiError::Inference(format!(
            "cannot run inference on a {}x{} frame with {} bytes",
            frame.width,
            frame.height,
            frame.rgba.len()
        )));
    }
    if width == 0 || height == 0 {
        return Err(TaxiError::Inference(format!(
            "network input size {width}x{height} is empty"
        )));
    }
    let resized = if (frame.width, frame.height) == (width, height) {
        frame.rgba.clone()
    } else {
        resize_rgba(frame, width, height).map_err(|err| {
            TaxiError::Inference(format!("failed to resize frame for the network: {err}"))
        })?
    };

    let bgr: Vec<f32> = resized
        .chunks_exact(4)
        .flat_map(|px| [px[2] as f32, px[1] as f32, px[0] as f32])
        .collect();
    Array4::from_shape_vec((1, height as usize, width as usize, 3), bgr)
        .map_err(|err| TaxiError::Inference(format!("failed to build input tensor: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_is_bgr_nhwc() {
        let frame = Frame::new(vec![10, 20, 30, 255, 40, 50, 60, 255], 2, 1);
        let input = prepare_input(&frame, (2, 1)).expect("input");
        assert_eq!(input.shape(), &[1, 1, 2, 3]);
        assert_eq!(input[[0, 0, 0, 0]], 30.0);
        assert_eq!(input[[0, 0, 0, 2]], 10.0);
        assert_eq!(input[[0, 0, 1, 1]], 50.0);
    }

    #[test]
    fn input_is_resized_to_network_size() {
        let frame = Frame::new(vec![128; Frame::expected_len(64, 48)], 64, 48);
        let input = prepare_input(&frame, (32, 16)).expect("input");
        assert_eq!(input.shape(), &[1, 16, 32, 3]);
        assert!(input.iter().all(|&v| v == 128.0));
    }

    #[test]
    fn malformed_frames_are_inference_errors() {
        let frame = Frame::new(vec![0; 3], 2, 2);
        assert!(matches!(
            prepare_input(&frame, (16, 16)),
            Err(TaxiError::Inference(_))
        ));
    }

    #[test]
    fn input_preparation_failures_are_inference_errors() {
        let frame = Frame::new(vec![128; Frame::expected_len(64, 48)], 64, 48);
        for size in [(0, 16), (32, 0)] {
            assert!(matches!(
                prepare_input(&frame, size),
                Err(TaxiError::Inference(_))
            ));
        }
    }
}

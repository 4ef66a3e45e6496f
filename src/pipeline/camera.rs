use crate::{error::Result, types::Frame};

/// Anything that can hand the capture loop one frame at a time.
pub trait CameraSource {
    fn read(&mut self) -> Result<Frame>;
}

#[cfg(feature = "camera-nokhwa")]
pub use self::native::{NokhwaCamera, available_cameras};

#[cfg(feature = "camera-nokhwa")]
mod native {
    use std::time::Instant;

    use nokhwa::{
        Camera,
        pixel_format::RgbFormat,
        query,
        utils::{
            ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
        },
    };

    use super::CameraSource;
    use crate::{
        error::{Result, TaxiError},
        pipeline::rgba_converter,
        types::Frame,
    };

    // Built-in macOS cameras often reject YUYV even though Nokhwa reports it.
    const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
        FrameFormat::RAWRGB,
        FrameFormat::RAWBGR,
        FrameFormat::GRAY,
        FrameFormat::YUYV,
        FrameFormat::NV12,
        FrameFormat::MJPEG,
    ];

    fn requested_formats() -> [RequestedFormat<'static>; 3] {
        [
            RequestedFormat::with_formats(
                RequestedFormatType::AbsoluteHighestFrameRate,
                PREFERRED_PIXEL_FORMATS,
            ),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
        ]
    }

    pub fn available_cameras() -> Result<Vec<(u32, String)>> {
        let cameras = query(ApiBackend::Auto)
            .map_err(|err| TaxiError::Capture(format!("camera query failed: {err}")))?;
        Ok(cameras
            .into_iter()
            .filter_map(|info| match info.index() {
                CameraIndex::Index(idx) => Some((*idx, info.human_name())),
                CameraIndex::String(_) => None,
            })
            .collect())
    }

    /// An open camera stream. The stream is stopped when the value is dropped,
    /// whichever way the capture loop exits.
    pub struct NokhwaCamera {
        camera: Camera,
        device: u32,
    }

    impl NokhwaCamera {
        pub fn open(device: u32) -> Result<Self> {
            let mut last_err = None;

            for requested in requested_formats() {
                match Camera::new(CameraIndex::Index(device), requested) {
                    Ok(mut camera) => match camera.open_stream() {
                        Ok(()) => {
                            log::info!(
                                "camera {device} opened: {} @ {}",
                                camera.resolution(),
                                camera.frame_format()
                            );
                            return Ok(Self { camera, device });
                        }
                        Err(err) => last_err = Some(err.to_string()),
                    },
                    Err(err) => last_err = Some(err.to_string()),
                }
            }

            Err(TaxiError::Capture(format!(
                "failed to open camera {device}: {}",
                last_err.unwrap_or_else(|| "no supported format".to_string())
            )))
        }
    }

    impl CameraSource for NokhwaCamera {
        fn read(&mut self) -> Result<Frame> {
            let frame_start = Instant::now();
            let buffer = self.camera.frame().map_err(|err| {
                TaxiError::Capture(format!(
                    "camera {} read failed (after {:?}): {err}",
                    self.device,
                    frame_start.elapsed()
                ))
            })?;
            rgba_converter::convert_camera_frame(&buffer)
        }
    }

    impl Drop for NokhwaCamera {
        fn drop(&mut self) {
            if let Err(err) = self.camera.stop_stream() {
                log::warn!("failed to release camera {}: {err}", self.device);
            } else {
                log::debug!("camera {} released", self.device);
            }
        }
    }
}

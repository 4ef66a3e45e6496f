pub mod camera;
pub mod compositor;
pub mod estimator;
#[cfg(feature = "camera-nokhwa")]
pub mod rgba_converter;
pub mod skeleton;

// Re-exports for convenience
#[cfg(feature = "camera-nokhwa")]
pub use camera::{NokhwaCamera, available_cameras};
pub use camera::CameraSource;
pub use estimator::{OrtPoseEstimator, PoseEstimator};

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::{
    display::DisplaySurface,
    error::Result,
    gesture::GestureRule,
    overlay::OverlayRenderer,
    pipeline::{CameraSource, PoseEstimator, compositor::compose, skeleton::draw_humans},
};

const KEY_POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// Frames per second between two timestamps, or `None` when no time passed.
pub fn fps_between(previous: Instant, now: Instant) -> Option<f64> {
    let elapsed = now.saturating_duration_since(previous).as_secs_f64();
    (elapsed > 0.0).then(|| 1.0 / elapsed)
}

/// Carries the previous frame's timestamp from one iteration to the next.
#[derive(Clone, Copy, Debug)]
pub struct FpsCounter {
    last: Instant,
}

impl FpsCounter {
    pub fn new(start: Instant) -> Self {
        Self { last: start }
    }

    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        let fps = fps_between(self.last, now);
        self.last = now;
        fps
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Escape pressed or window closed.
    UserCancelled,
    /// Ctrl+C.
    Interrupted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopState {
    Running,
    Stopped(StopReason),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopSummary {
    pub frames: u64,
    pub hailing_frames: u64,
    /// Rate between the last two captured frames.
    pub last_fps: Option<f64>,
    pub stop_reason: StopReason,
}

/// Owns the camera, estimator and window for the lifetime of one run. They
/// are dropped, and so released, when [`CaptureLoop::run`] returns for any
/// reason.
pub struct CaptureLoop<C, E, D> {
    camera: C,
    estimator: E,
    display: D,
    overlay: OverlayRenderer,
    rule: GestureRule,
    zoom: f32,
    interrupted: Arc<AtomicBool>,
}

impl<C, E, D> CaptureLoop<C, E, D>
where
    C: CameraSource,
    E: PoseEstimator,
    D: DisplaySurface,
{
    pub fn new(
        camera: C,
        estimator: E,
        display: D,
        overlay: OverlayRenderer,
        rule: GestureRule,
        zoom: f32,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            camera,
            estimator,
            display,
            overlay,
            rule,
            zoom,
            interrupted,
        }
    }

    pub fn run(mut self) -> Result<LoopSummary> {
        let first = self.camera.read()?;
        log::debug!("camera primed with a {}x{} frame", first.width, first.height);

        println!("**** CTRL+C to exit ****");

        let mut fps = FpsCounter::new(first.timestamp);
        let mut last_fps = None;
        let mut frames = 0;
        let mut hailing_frames = 0;

        let stop_reason = loop {
            let captured = self.camera.read()?;
            let mut frame = compose(&captured, self.zoom)?;

            let persons = self.estimator.infer(&frame)?;
            if self.rule.any_hailing(&persons) {
                log::info!("Someone is hailing a taxi!");
                for person in persons.iter().filter(|p| self.rule.is_hailing(p)) {
                    log::debug!(
                        "hailing person (score {:.2}): {}",
                        person.score,
                        person
                            .parts()
                            .map(|(part, kp)| format!("{}@({:.3}, {:.3})", part.name(), kp.x, kp.y))
                            .collect::<Vec<_>>()
                            .join(" ")
                    );
                }
                self.overlay.draw_gesture_indicator(&mut frame);
                hailing_frames += 1;
            } else {
                log::trace!("no hailing among {} detected people", persons.len());
            }

            draw_humans(&mut frame, &persons);

            last_fps = fps.tick(captured.timestamp);
            self.overlay.draw_fps_counter(&mut frame, last_fps);

            self.display.show(&frame)?;
            frames += 1;

            if let LoopState::Stopped(reason) = self.next_state()? {
                break reason;
            }
        };
        log::info!("capture stopped ({stop_reason:?}) after {frames} frames");

        Ok(LoopSummary {
            frames,
            hailing_frames,
            last_fps,
            stop_reason,
        })
    }

    fn next_state(&mut self) -> Result<LoopState> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Ok(LoopState::Stopped(StopReason::Interrupted));
        }
        if self.display.poll_cancel(KEY_POLL_TIMEOUT)? {
            return Ok(LoopState::Stopped(StopReason::UserCancelled));
        }
        Ok(LoopState::Running)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::{
        error::TaxiError,
        types::{BodyPart, DetectedPerson, Frame, Keypoint},
    };

    const W: u32 = 32;
    const H: u32 = 24;
    const FRAME_INTERVAL: Duration = Duration::from_millis(40);

    struct FakeCamera {
        frames_left: usize,
        next_stamp: Instant,
        released: Arc<AtomicBool>,
    }

    impl CameraSource for FakeCamera {
        fn read(&mut self) -> Result<Frame> {
            if self.frames_left == 0 {
                return Err(TaxiError::Capture("device disconnected".to_string()));
            }
            self.frames_left -= 1;
            let mut frame = Frame::new(vec![90; Frame::expected_len(W, H)], W, H);
            frame.timestamp = self.next_stamp;
            self.next_stamp += FRAME_INTERVAL;
            Ok(frame)
        }
    }

    impl Drop for FakeCamera {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    struct FakeEstimator {
        persons: Vec<DetectedPerson>,
        fail: bool,
    }

    impl PoseEstimator for FakeEstimator {
        fn infer(&mut self, frame: &Frame) -> Result<Vec<DetectedPerson>> {
            assert_eq!((frame.width, frame.height), (W, H));
            if self.fail {
                return Err(TaxiError::Inference("graph exploded".to_string()));
            }
            Ok(self.persons.clone())
        }
    }

    struct FakeDisplay {
        shown: Arc<AtomicUsize>,
        cancel_after: usize,
        polls: usize,
        closed: Arc<AtomicBool>,
    }

    impl DisplaySurface for FakeDisplay {
        fn show(&mut self, frame: &Frame) -> Result<()> {
            assert!(frame.is_well_formed());
            self.shown.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn poll_cancel(&mut self, _timeout: Duration) -> Result<bool> {
            self.polls += 1;
            Ok(self.polls >= self.cancel_after)
        }
    }

    impl Drop for FakeDisplay {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct Harness {
        frames_shown: Arc<AtomicUsize>,
        camera_released: Arc<AtomicBool>,
        window_closed: Arc<AtomicBool>,
        interrupted: Arc<AtomicBool>,
    }

    fn build(
        frames: usize,
        cancel_after: usize,
        estimator: FakeEstimator,
    ) -> (CaptureLoop<FakeCamera, FakeEstimator, FakeDisplay>, Harness) {
        let harness = Harness {
            frames_shown: Arc::new(AtomicUsize::new(0)),
            camera_released: Arc::new(AtomicBool::new(false)),
            window_closed: Arc::new(AtomicBool::new(false)),
            interrupted: Arc::new(AtomicBool::new(false)),
        };
        let capture = CaptureLoop::new(
            FakeCamera {
                frames_left: frames,
                next_stamp: Instant::now(),
                released: harness.camera_released.clone(),
            },
            estimator,
            FakeDisplay {
                shown: harness.frames_shown.clone(),
                cancel_after,
                polls: 0,
                closed: harness.window_closed.clone(),
            },
            OverlayRenderer::new(None, "test-host".to_string()),
            GestureRule::default(),
            0.5,
            harness.interrupted.clone(),
        );
        (capture, harness)
    }

    fn hailing_person() -> DetectedPerson {
        DetectedPerson::new()
            .with_part(BodyPart::Nose, Keypoint::new(0.3, 0.5, 0.9))
            .with_part(BodyPart::RWrist, Keypoint::new(0.25, 0.1, 0.9))
    }

    #[test]
    fn fps_is_reciprocal_of_elapsed_time() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(250);
        let fps = fps_between(t0, t1).expect("fps");
        assert!((fps - 4.0).abs() < 1e-9);
    }

    #[test]
    fn fps_without_elapsed_time_is_none() {
        let t0 = Instant::now();
        assert_eq!(fps_between(t0, t0), None);
        assert_eq!(fps_between(t0 + Duration::from_secs(1), t0), None);
    }

    #[test]
    fn fps_counter_carries_the_last_timestamp() {
        let t0 = Instant::now();
        let mut counter = FpsCounter::new(t0);
        let first = counter.tick(t0 + Duration::from_millis(100)).expect("fps");
        assert!((first - 10.0).abs() < 1e-9);
        let second = counter.tick(t0 + Duration::from_millis(150)).expect("fps");
        assert!((second - 20.0).abs() < 1e-9);
        assert_eq!(counter.tick(t0 + Duration::from_millis(150)), None);
    }

    #[test]
    fn escape_stops_the_loop_and_releases_resources() {
        let estimator = FakeEstimator {
            persons: vec![hailing_person()],
            fail: false,
        };
        let (capture, harness) = build(10, 3, estimator);

        let summary = capture.run().expect("loop");
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.hailing_frames, 3);
        assert_eq!(summary.stop_reason, StopReason::UserCancelled);
        assert_eq!(harness.frames_shown.load(Ordering::SeqCst), 3);
        assert!(harness.camera_released.load(Ordering::SeqCst));
        assert!(harness.window_closed.load(Ordering::SeqCst));
    }

    #[test]
    fn fps_follows_capture_timestamps() {
        let estimator = FakeEstimator {
            persons: Vec::new(),
            fail: false,
        };
        let (capture, _harness) = build(10, 4, estimator);

        let summary = capture.run().expect("loop");
        let fps = summary.last_fps.expect("fps after several frames");
        assert!((fps - 25.0).abs() < 1e-6, "got {fps}");
    }

    #[test]
    fn nobody_hailing_counts_no_hailing_frames() {
        let estimator = FakeEstimator {
            persons: Vec::new(),
            fail: false,
        };
        let (capture, _harness) = build(10, 2, estimator);
        let summary = capture.run().expect("loop");
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.hailing_frames, 0);
    }

    #[test]
    fn interrupt_flag_stops_after_the_current_frame() {
        let estimator = FakeEstimator {
            persons: Vec::new(),
            fail: false,
        };
        let (capture, harness) = build(10, usize::MAX, estimator);
        harness.interrupted.store(true, Ordering::SeqCst);

        let summary = capture.run().expect("loop");
        assert_eq!(summary.frames, 1);
        assert_eq!(harness.frames_shown.load(Ordering::SeqCst), 1);
        assert_eq!(summary.stop_reason, StopReason::Interrupted);
    }

    #[test]
    fn capture_failure_stops_and_still_releases() {
        let estimator = FakeEstimator {
            persons: Vec::new(),
            fail: false,
        };
        // One priming frame and two loop frames, then the device goes away.
        let (capture, harness) = build(3, usize::MAX, estimator);

        let err = capture.run().unwrap_err();
        assert!(matches!(err, TaxiError::Capture(_)));
        assert!(harness.camera_released.load(Ordering::SeqCst));
        assert!(harness.window_closed.load(Ordering::SeqCst));
    }

    #[test]
    fn inference_failure_is_fatal() {
        let estimator = FakeEstimator {
            persons: Vec::new(),
            fail: true,
        };
        let (capture, harness) = build(10, usize::MAX, estimator);

        let err = capture.run().unwrap_err();
        assert!(matches!(err, TaxiError::Inference(_)));
        assert!(harness.camera_released.load(Ordering::SeqCst));
    }

    #[test]
    fn missing_first_frame_is_a_capture_failure() {
        let estimator = FakeEstimator {
            persons: Vec::new(),
            fail: false,
        };
        let (capture, _harness) = build(0, 1, estimator);
        assert!(matches!(capture.run(), Err(TaxiError::Capture(_))));
    }
}

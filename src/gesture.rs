use crate::types::{BodyPart, DetectedPerson};

/// Y value substituted for an undetected keypoint under [`MissingKeypointPolicy::Sentinel`].
/// Keypoint y is a fraction of frame height, so this sits far below any
/// on-screen point whatever the camera resolution.
pub const MISSING_KEYPOINT_Y: f32 = 1000.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingKeypointPolicy {
    /// Missing wrists and nose read as [`MISSING_KEYPOINT_Y`]. A wrist seen with
    /// no nose still fires as long as it sits above the sentinel.
    #[default]
    Sentinel,
    /// A comparison with a missing operand never fires, so an undetected nose
    /// disables the rule for that person.
    Strict,
}

/// Wrist-above-nose rule for a single person.
#[derive(Clone, Copy, Debug, Default)]
pub struct GestureRule {
    policy: MissingKeypointPolicy,
}

impl GestureRule {
    pub fn new(policy: MissingKeypointPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MissingKeypointPolicy {
        self.policy
    }

    pub fn is_hailing(&self, person: &DetectedPerson) -> bool {
        let y_of = |part: BodyPart| person.get(part).map(|kp| kp.y);
        let nose = y_of(BodyPart::Nose);
        let right_wrist = y_of(BodyPart::RWrist);
        let left_wrist = y_of(BodyPart::LWrist);

        match self.policy {
            MissingKeypointPolicy::Sentinel => {
                let nose = nose.unwrap_or(MISSING_KEYPOINT_Y);
                right_wrist.unwrap_or(MISSING_KEYPOINT_Y) < nose
                    || left_wrist.unwrap_or(MISSING_KEYPOINT_Y) < nose
            }
            MissingKeypointPolicy::Strict => {
                let Some(nose) = nose else {
                    return false;
                };
                right_wrist.is_some_and(|y| y < nose) || left_wrist.is_some_and(|y| y < nose)
            }
        }
    }

    /// True when at least one person in the frame is hailing.
    pub fn any_hailing(&self, persons: &[DetectedPerson]) -> bool {
        persons.iter().any(|person| self.is_hailing(person))
    }
}

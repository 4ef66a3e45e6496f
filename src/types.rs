use std::{collections::BTreeMap, time::Instant};

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn expected_len(width: u32, height: u32) -> usize {
        (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    }

    /// True when the buffer holds exactly `width * height` RGBA pixels.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgba.len() == Self::expected_len(self.width, self.height)
    }
}

/// The 19-point COCO body model used by OpenPose-style graphs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum BodyPart {
    Nose = 0,
    Neck = 1,
    RShoulder = 2,
    RElbow = 3,
    RWrist = 4,
    LShoulder = 5,
    LElbow = 6,
    LWrist = 7,
    RHip = 8,
    RKnee = 9,
    RAnkle = 10,
    LHip = 11,
    LKnee = 12,
    LAnkle = 13,
    REye = 14,
    LEye = 15,
    REar = 16,
    LEar = 17,
    Background = 18,
}

impl BodyPart {
    pub const COUNT: usize = 19;

    pub const ALL: [BodyPart; Self::COUNT] = [
        BodyPart::Nose,
        BodyPart::Neck,
        BodyPart::RShoulder,
        BodyPart::RElbow,
        BodyPart::RWrist,
        BodyPart::LShoulder,
        BodyPart::LElbow,
        BodyPart::LWrist,
        BodyPart::RHip,
        BodyPart::RKnee,
        BodyPart::RAnkle,
        BodyPart::LHip,
        BodyPart::LKnee,
        BodyPart::LAnkle,
        BodyPart::REye,
        BodyPart::LEye,
        BodyPart::REar,
        BodyPart::LEar,
        BodyPart::Background,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            BodyPart::Nose => "Nose",
            BodyPart::Neck => "Neck",
            BodyPart::RShoulder => "RShoulder",
            BodyPart::RElbow => "RElbow",
            BodyPart::RWrist => "RWrist",
            BodyPart::LShoulder => "LShoulder",
            BodyPart::LElbow => "LElbow",
            BodyPart::LWrist => "LWrist",
            BodyPart::RHip => "RHip",
            BodyPart::RKnee => "RKnee",
            BodyPart::RAnkle => "RAnkle",
            BodyPart::LHip => "LHip",
            BodyPart::LKnee => "LKnee",
            BodyPart::LAnkle => "LAnkle",
            BodyPart::REye => "REye",
            BodyPart::LEye => "LEye",
            BodyPart::REar => "REar",
            BodyPart::LEar => "LEar",
            BodyPart::Background => "Background",
        }
    }
}

/// A detected body part. `x` and `y` are fractions of the frame width and
/// height (0.0..=1.0 on screen); y grows downward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, score }
    }

    /// Normalize a pixel position inside a `width` x `height` frame.
    #[cfg(test)]
    pub fn from_pixel(x: f32, y: f32, score: f32, width: u32, height: u32) -> Self {
        Self::new(x / width.max(1) as f32, y / height.max(1) as f32, score)
    }

    /// Nearest pixel in a `width` x `height` frame.
    pub fn to_pixel(self, width: u32, height: u32) -> (i32, i32) {
        (
            (self.x * width as f32 + 0.5) as i32,
            (self.y * height as f32 + 0.5) as i32,
        )
    }
}

/// One person as reported by the pose estimator for a single frame.
#[derive(Clone, Debug, Default)]
pub struct DetectedPerson {
    parts: BTreeMap<BodyPart, Keypoint>,
    pub score: f32,
}

impl DetectedPerson {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part(mut self, part: BodyPart, keypoint: Keypoint) -> Self {
        self.insert(part, keypoint);
        self
    }

    pub fn insert(&mut self, part: BodyPart, keypoint: Keypoint) {
        self.parts.insert(part, keypoint);
    }

    pub fn get(&self, part: BodyPart) -> Option<Keypoint> {
        self.parts.get(&part).copied()
    }

    pub fn parts(&self) -> impl Iterator<Item = (BodyPart, Keypoint)> + '_ {
        self.parts.iter().map(|(part, kp)| (*part, *kp))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

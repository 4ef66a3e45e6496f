use std::{fs, path::Path};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;

use crate::{
    asset_download::ensure_font_ready,
    error::{Result, TaxiError},
    types::Frame,
};

pub const GESTURE_TEXT: &str = "TAXI!";

const GESTURE_ORIGIN: (i32, i32) = (10, 30);
const HOST_ORIGIN: (i32, i32) = (10, 50);
const FPS_ORIGIN: (i32, i32) = (10, 10);

const GESTURE_COLOR: [u8; 3] = [255, 218, 94];
const HOST_COLOR: [u8; 3] = [0, 0, 255];
const FPS_COLOR: [u8; 3] = [0, 0, 128];

const TEXT_SCALE: f32 = 16.0;

pub fn fps_label(fps: Option<f64>) -> String {
    match fps {
        Some(fps) => format!("FPS: {fps:.2}"),
        None => "FPS: --".to_string(),
    }
}

pub fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// Writes the taxi cue and FPS counter onto frames. Text origins are baseline
/// positions, matching how the cue is laid out on screen.
pub struct OverlayRenderer {
    font: Option<FontVec>,
    host: String,
}

impl OverlayRenderer {
    pub fn new(font: Option<FontVec>, host: String) -> Self {
        Self { font, host }
    }

    /// Load the overlay font, fetching it if needed. Without a font the text
    /// overlays are skipped.
    pub fn load(font_path: &Path) -> Self {
        let font = match load_font(font_path) {
            Ok(font) => Some(font),
            Err(err) => {
                log::warn!("text overlays disabled: {err}");
                None
            }
        };
        Self::new(font, host_name())
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn draw_gesture_indicator(&self, frame: &mut Frame) {
        self.draw_text(frame, GESTURE_TEXT, GESTURE_ORIGIN, GESTURE_COLOR);
        self.draw_text(frame, &self.host, HOST_ORIGIN, HOST_COLOR);
    }

    pub fn draw_fps_counter(&self, frame: &mut Frame, fps: Option<f64>) {
        self.draw_text(frame, &fps_label(fps), FPS_ORIGIN, FPS_COLOR);
    }

    fn draw_text(&self, frame: &mut Frame, text: &str, origin: (i32, i32), color: [u8; 3]) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        if !frame.is_well_formed() {
            return;
        }
        let Some(mut image) =
            RgbaImage::from_raw(frame.width, frame.height, std::mem::take(&mut frame.rgba))
        else {
            return;
        };

        // draw_text_mut takes the top of the line box; shift it up by the
        // ascent so `origin` lands on the baseline.
        let scale = PxScale::from(TEXT_SCALE);
        let ascent = font.as_scaled(scale).ascent().round() as i32;
        let [r, g, b] = color;
        draw_text_mut(
            &mut image,
            Rgba([r, g, b, 255]),
            origin.0,
            origin.1 - ascent,
            scale,
            font,
            text,
        );
        frame.rgba = image.into_raw();
    }
}

fn load_font(font_path: &Path) -> Result<FontVec> {
    ensure_font_ready(font_path, |_evt| {})?;
    let data = fs::read(font_path).map_err(|err| {
        TaxiError::Asset(format!("failed to read {}: {err}", font_path.display()))
    })?;
    FontVec::try_from_vec(data).map_err(|err| {
        TaxiError::Asset(format!("invalid font {}: {err}", font_path.display()))
    })
}

use std::{
    thread,
    time::{Duration, Instant},
};

use minifb::{Key, Window, WindowOptions};

use crate::{
    error::{Result, TaxiError},
    types::Frame,
};

pub const WINDOW_TITLE: &str = "tf-pose-estimation result";

/// Somewhere to put annotated frames, and the place the user asks to stop from.
pub trait DisplaySurface {
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Pump input for up to `timeout`. Returns true once the user asked to stop.
    fn poll_cancel(&mut self, timeout: Duration) -> Result<bool>;
}

/// A minifb window sized from the first frame it is given. Closing happens on
/// drop.
pub struct MinifbWindow {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl MinifbWindow {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            buffer: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    fn window_for(&mut self, width: usize, height: usize) -> Result<&mut Window> {
        if self.window.is_none() {
            let mut window = Window::new(
                &self.title,
                width,
                height,
                WindowOptions {
                    resize: true,
                    ..WindowOptions::default()
                },
            )
            .map_err(|err| TaxiError::Display(format!("failed to create window: {err}")))?;
            // The capture loop paces itself.
            window.set_target_fps(0);
            self.window = Some(window);
        }
        self.window
            .as_mut()
            .ok_or_else(|| TaxiError::Display("window unavailable".to_string()))
    }
}

impl DisplaySurface for MinifbWindow {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        let (width, height) = (frame.width as usize, frame.height as usize);
        pack_rgba(&frame.rgba, &mut self.buffer);
        self.width = width;
        self.height = height;

        let buffer = std::mem::take(&mut self.buffer);
        let result = self
            .window_for(width, height)?
            .update_with_buffer(&buffer, width, height)
            .map_err(|err| TaxiError::Display(format!("failed to update window: {err}")));
        self.buffer = buffer;
        result
    }

    fn poll_cancel(&mut self, timeout: Duration) -> Result<bool> {
        let Some(window) = self.window.as_mut() else {
            return Ok(false);
        };
        let start = Instant::now();

        window.update();
        if !window.is_open() || window.is_key_down(Key::Escape) {
            return Ok(true);
        }
        if let Some(rest) = timeout.checked_sub(start.elapsed()) {
            thread::sleep(rest);
        }
        Ok(false)
    }
}

impl Drop for MinifbWindow {
    fn drop(&mut self) {
        if self.window.take().is_some() {
            log::debug!("closed window {:?} ({}x{})", self.title, self.width, self.height);
        }
    }
}

/// Pack RGBA bytes as minifb's 0x00RRGGBB pixels.
fn pack_rgba(rgba: &[u8], out: &mut Vec<u32>) {
    out.clear();
    out.extend(rgba.chunks_exact(4).map(|px| {
        let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
        (r << 16) | (g << 8) | b
    }));
}

use fast_image_resize as fir;

use crate::{
    error::{Result, TaxiError},
    types::Frame,
};

/// Where a scaled image lands on a canvas. Offsets follow floor division, so
/// they go negative when the scaled image is larger than the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub dx: i64,
    pub dy: i64,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl Placement {
    pub fn centered(canvas_w: u32, canvas_h: u32, scaled_w: u32, scaled_h: u32) -> Self {
        Self {
            dx: (canvas_w as i64 - scaled_w as i64).div_euclid(2),
            dy: (canvas_h as i64 - scaled_h as i64).div_euclid(2),
            scaled_width: scaled_w,
            scaled_height: scaled_h,
        }
    }
}

pub fn validate_zoom(zoom: f32) -> Result<f32> {
    if !zoom.is_finite() || zoom <= 0.0 {
        return Err(TaxiError::Configuration(format!(
            "zoom must be a positive finite number, got {zoom}"
        )));
    }
    Ok(zoom)
}

pub fn scaled_size(width: u32, height: u32, zoom: f32) -> (u32, u32) {
    let scale = |side: u32| (side as f64 * zoom as f64).round().max(1.0) as u32;
    (scale(width), scale(height))
}

/// Scale `frame` by `zoom` and center it on a black canvas of the original size.
///
/// Zoom above 1 clips: the canvas shows the middle of the enlarged frame.
pub fn compose(frame: &Frame, zoom: f32) -> Result<Frame> {
    let zoom = validate_zoom(zoom)?;
    if !frame.is_well_formed() {
        return Err(TaxiError::Capture(format!(
            "malformed frame: {}x{} with {} bytes",
            frame.width,
            frame.height,
            frame.rgba.len()
        )));
    }
    if zoom == 1.0 {
        return Ok(frame.clone());
    }

    let (scaled_w, scaled_h) = scaled_size(frame.width, frame.height, zoom);
    let scaled = resize_rgba(frame, scaled_w, scaled_h)?;
    let placement = Placement::centered(frame.width, frame.height, scaled_w, scaled_h);

    let mut canvas = vec![0u8; Frame::expected_len(frame.width, frame.height)];
    blit(&scaled, &mut canvas, frame.width, frame.height, placement);

    Ok(Frame {
        rgba: canvas,
        width: frame.width,
        height: frame.height,
        timestamp: frame.timestamp,
    })
}

/// Bilinear resize of an RGBA frame to exactly `width` x `height`.
pub fn resize_rgba(frame: &Frame, width: u32, height: u32) -> Result<Vec<u8>> {
    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )
    .map_err(|err| TaxiError::Capture(format!("invalid frame buffer: {err}")))?;
    let mut dst_image = fir::images::Image::new(width, height, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear))
        .use_alpha(false);
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .map_err(|err| TaxiError::Capture(format!("fast resize failed: {err}")))?;
    Ok(dst_image.into_vec())
}

fn blit(src: &[u8], canvas: &mut [u8], canvas_w: u32, canvas_h: u32, placement: Placement) {
    let (src_x0, dst_x0) = split_offset(placement.dx);
    let (src_y0, dst_y0) = split_offset(placement.dy);

    let copy_w = (placement.scaled_width as usize)
        .saturating_sub(src_x0)
        .min((canvas_w as usize).saturating_sub(dst_x0));
    let copy_h = (placement.scaled_height as usize)
        .saturating_sub(src_y0)
        .min((canvas_h as usize).saturating_sub(dst_y0));
    if copy_w == 0 || copy_h == 0 {
        return;
    }

    let src_stride = placement.scaled_width as usize * 4;
    let dst_stride = canvas_w as usize * 4;
    for row in 0..copy_h {
        let src_offset = (src_y0 + row) * src_stride + src_x0 * 4;
        let dst_offset = (dst_y0 + row) * dst_stride + dst_x0 * 4;
        canvas[dst_offset..dst_offset + copy_w * 4]
            .copy_from_slice(&src[src_offset..src_offset + copy_w * 4]);
    }
}

// Negative offsets skip into the source, positive ones into the canvas.
fn split_offset(offset: i64) -> (usize, usize) {
    if offset < 0 {
        (offset.unsigned_abs() as usize, 0)
    } else {
        (0, offset as usize)
    }
}

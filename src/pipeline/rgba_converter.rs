use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::{
    error::{Result, TaxiError},
    types::Frame,
};

/// Decode a raw camera buffer into an opaque RGBA frame.
pub fn convert_camera_frame(buffer: &Buffer) -> Result<Frame> {
    let resolution = buffer.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);
    let data = buffer.buffer();

    let rgba = match buffer.source_frame_format() {
        FrameFormat::NV12 => nv12_to_rgba(data, width, height)?,
        FrameFormat::YUYV => yuyv_to_rgba(data, width, height)?,
        FrameFormat::MJPEG => mjpeg_to_rgba(data, width, height)?,
        FrameFormat::RAWRGB => packed_to_rgba(data, width, height, Layout::Rgb)?,
        FrameFormat::RAWBGR => packed_to_rgba(data, width, height, Layout::Bgr)?,
        FrameFormat::GRAY => packed_to_rgba(data, width, height, Layout::Gray)?,
    };

    let frame = Frame::new(rgba, width, height);
    if !frame.is_well_formed() {
        return Err(TaxiError::Capture(format!(
            "decoded frame has {} bytes for {width}x{height}",
            frame.rgba.len()
        )));
    }
    Ok(frame)
}

fn ensure_len(kind: &str, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(TaxiError::Capture(format!(
            "{kind} buffer too small: got {}, expected {expected}",
            data.len()
        )));
    }
    Ok(())
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_len = width as usize * height as usize;
    let uv_len = y_len / 2;
    ensure_len("NV12", data, y_len + uv_len)?;

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_len],
        y_stride: width,
        uv_plane: &data[y_len..y_len + uv_len],
        uv_stride: width,
        width,
        height,
    };
    let mut rgba = vec![0u8; y_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| TaxiError::Capture(format!("NV12 to RGBA failed: {err:?}")))?;
    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    ensure_len("YUYV", data, pixels * 2)?;

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };
    let mut rgba = vec![0u8; pixels * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| TaxiError::Capture(format!("YUYV422 to RGBA failed: {err:?}")))?;
    Ok(rgba)
}

fn mjpeg_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| TaxiError::Capture(format!("MJPEG decode failed: {err:?}")))?;
    ensure_len("MJPEG", &rgba, width as usize * height as usize * 4)?;
    Ok(rgba)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layout {
    Rgb,
    Bgr,
    Gray,
}

impl Layout {
    fn channels(self) -> usize {
        match self {
            Layout::Rgb | Layout::Bgr => 3,
            Layout::Gray => 1,
        }
    }
}

fn packed_to_rgba(data: &[u8], width: u32, height: u32, layout: Layout) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    let channels = layout.channels();
    ensure_len(
        match layout {
            Layout::Rgb => "RGB",
            Layout::Bgr => "BGR",
            Layout::Gray => "GRAY",
        },
        data,
        pixels * channels,
    )?;

    let mut rgba = vec![0u8; pixels * 4];
    rgba.par_chunks_mut(4)
        .zip(data[..pixels * channels].par_chunks_exact(channels))
        .for_each(|(dst, src)| {
            let [r, g, b] = match layout {
                Layout::Rgb => [src[0], src[1], src[2]],
                Layout::Bgr => [src[2], src[1], src[0]],
                Layout::Gray => [src[0]; 3],
            };
            dst.copy_from_slice(&[r, g, b, 255]);
        });
    Ok(rgba)
}

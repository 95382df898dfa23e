use image::RgbImage;

use crate::{
    error::{PipelineError, Result},
    source::{Frame, PixelFormat},
};

/// Converts a raw source frame into an RGB image.
pub fn decode(frame: Frame) -> Result<RgbImage> {
    let Frame {
        pixels,
        width,
        height,
        format,
    } = frame;

    if width == 0 || height == 0 {
        return Err(PipelineError::Decode(format!(
            "Frame has an empty dimension: {width}x{height}"
        )));
    }

    let expected = width as usize * height as usize * format.bytes_per_pixel();
    if pixels.len() != expected {
        return Err(PipelineError::Decode(format!(
            "{format:?} frame of {width}x{height} needs {expected} bytes, got {}",
            pixels.len()
        )));
    }

    let rgb = match format {
        PixelFormat::Rgb8 => pixels,
        PixelFormat::Bgr8 => pixels
            .chunks_exact(3)
            .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
            .collect(),
        PixelFormat::Rgba8 => pixels
            .chunks_exact(4)
            .flat_map(|rgba| [rgba[0], rgba[1], rgba[2]])
            .collect(),
        PixelFormat::Gray8 => pixels.iter().flat_map(|&luma| [luma; 3]).collect(),
    };

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| PipelineError::Decode("Failed building the RGB image".to_string()))
}

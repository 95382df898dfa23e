use image::{Rgba, RgbaImage};

use crate::classifier::Label;

/// Vertical distance between two label rows, in pixels.
pub const ROW_PITCH: u32 = 52;
const BAR_THICKNESS: u32 = 40;
const BAR_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// A rendered label overlay, ready to be composited over the camera preview.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub labels: Vec<Label>,
    pub image: RgbaImage,
}

/// Draws one confidence bar per label on a transparent canvas.
///
/// Bars are stacked from the top with [`ROW_PITCH`] spacing and their length
/// is the confidence, clamped to `[0, 1]`, times the canvas width. Rows that
/// do not fit on the canvas are skipped.
pub fn render_labels(labels: Vec<Label>, width: u32, height: u32) -> Overlay {
    let mut image = RgbaImage::new(width, height);

    for (row, label) in labels.iter().enumerate() {
        let top = row as u32 * ROW_PITCH;
        if top >= height {
            break;
        }

        let confidence = label.confidence.clamp(0.0, 1.0);
        let length = (confidence * width as f32).round() as u32;
        let bottom = (top + BAR_THICKNESS).min(height);

        for y in top..bottom {
            for x in 0..length.min(width) {
                image.put_pixel(x, y, BAR_COLOR);
            }
        }
    }

    Overlay { labels, image }
}

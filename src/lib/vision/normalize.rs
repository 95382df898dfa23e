use image::RgbImage;

use crate::settings::manager::ChannelOrder;

/// Mean/scale normalization into an interleaved (HWC) float tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: f32,
    pub scale: f32,
    pub order: ChannelOrder,
}

impl Normalization {
    /// Every channel value becomes `(value - mean) / scale`, laid out as
    /// `[c0, c1, c2, c0, c1, c2, ...]` in the configured channel order.
    /// The output has exactly `3 * width * height` values.
    pub fn apply(&self, image: &RgbImage) -> Vec<f32> {
        let normalize = |value: u8| (value as f32 - self.mean) / self.scale;

        image
            .pixels()
            .flat_map(|pixel| {
                let [red, green, blue] = pixel.0;
                match self.order {
                    ChannelOrder::Rgb => [red, green, blue],
                    ChannelOrder::Bgr => [blue, green, red],
                }
            })
            .map(normalize)
            .collect()
    }
}

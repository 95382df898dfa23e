use image::{
    imageops::{self, FilterType},
    RgbImage,
};

use crate::settings::manager::CropSize;

/// Bilinear resampling to exactly `width` x `height`.
pub fn resize(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }

    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Clockwise rotation by a multiple of 90 degrees, other angles leave the image untouched.
pub fn rotate(image: RgbImage, degrees: u32) -> RgbImage {
    match degrees % 360 {
        90 => imageops::rotate90(&image),
        180 => imageops::rotate180(&image),
        270 => imageops::rotate270(&image),
        _ => image,
    }
}

/// Crops the centered `crop` region, clamped to the image bounds.
pub fn center_crop(image: &RgbImage, crop: CropSize) -> RgbImage {
    let (width, height) = image.dimensions();
    let crop_width = crop.width.min(width);
    let crop_height = crop.height.min(height);
    let left = (width - crop_width) / 2;
    let top = (height - crop_height) / 2;

    imageops::crop_imm(image, left, top, crop_width, crop_height).to_image()
}

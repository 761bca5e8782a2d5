//! In-memory image fixtures shared by unit tests.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

pub fn encode_as(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).expect("image encoding");
    buf.into_inner()
}

fn encode(image: DynamicImage) -> Vec<u8> {
    encode_as(image, ImageFormat::Png)
}

pub fn rgb_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        Rgb(color),
    )))
}

pub fn rgba_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    encode(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba(color),
    )))
}

pub fn gray_png(width: u32, height: u32, value: u8) -> Vec<u8> {
    encode(DynamicImage::ImageLuma8(GrayImage::from_pixel(
        width,
        height,
        Luma([value]),
    )))
}

/// A small gradient so that distinct seeds produce distinct content hashes.
pub fn gradient_png(seed: u8) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(RgbImage::from_fn(24, 24, |x, y| {
        Rgb([
            (x as u8).wrapping_mul(10).wrapping_add(seed),
            (y as u8).wrapping_mul(10),
            seed,
        ])
    })))
}

pub fn rgb_tiff(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode_as(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color))),
        ImageFormat::Tiff,
    )
}

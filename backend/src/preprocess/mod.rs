pub mod tensor;

use image::imageops::{self, FilterType};
use image::{GenericImageView, ImageFormat, RgbImage};
use ndarray::Array4;
use shared::{NormalizationProfile, PixelTransform, TensorLayout};

use crate::classifier::ClassifyError;

pub use tensor::NormalizedTensor;

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;
pub const DEFAULT_ALLOWED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::WebP,
];

#[derive(Debug, Clone)]
pub struct Preprocessor {
    max_image_bytes: usize,
    max_dimension: u32,
    allowed_formats: Vec<ImageFormat>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_DIMENSION)
    }
}

impl Preprocessor {
    pub fn new(max_image_bytes: usize, max_dimension: u32) -> Self {
        Self {
            max_image_bytes,
            max_dimension: max_dimension.max(1),
            allowed_formats: DEFAULT_ALLOWED_FORMATS.to_vec(),
        }
    }

    pub fn with_allowed_formats(mut self, formats: Vec<ImageFormat>) -> Self {
        self.allowed_formats = formats;
        self
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// Decodes `image_bytes` and produces the tensor `profile` requires.
    pub fn prepare(
        &self,
        image_bytes: &[u8],
        profile: NormalizationProfile,
    ) -> Result<NormalizedTensor, ClassifyError> {
        if image_bytes.is_empty() {
            return Err(ClassifyError::ImageDecode("empty image payload".to_string()));
        }
        if image_bytes.len() > self.max_image_bytes {
            return Err(ClassifyError::ImageDecode(format!(
                "image is {} bytes, limit is {}",
                image_bytes.len(),
                self.max_image_bytes
            )));
        }

        let format = image::guess_format(image_bytes)
            .map_err(|_| ClassifyError::ImageDecode("unrecognized image format".to_string()))?;
        if !self.allowed_formats.contains(&format) {
            return Err(ClassifyError::ImageDecode(format!(
                "image format {:?} is not accepted",
                format
            )));
        }

        let mut decoded = image::load_from_memory_with_format(image_bytes, format)?;
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(ClassifyError::ImageDecode(format!(
                "image has zero dimension ({}x{})",
                width, height
            )));
        }

        if width > self.max_dimension || height > self.max_dimension {
            log::debug!(
                "Downscaling {}x{} image to fit {}px",
                width,
                height,
                self.max_dimension
            );
            decoded = decoded.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3);
        }

        let rgb = decoded.to_rgb8();
        let (target_w, target_h) = profile.input_size();
        let resized = imageops::resize(&rgb, target_w, target_h, FilterType::Lanczos3);

        Ok(NormalizedTensor::new(to_tensor(&resized, profile), profile))
    }
}

pub fn prepare(
    image_bytes: &[u8],
    profile: NormalizationProfile,
) -> Result<NormalizedTensor, ClassifyError> {
    Preprocessor::default().prepare(image_bytes, profile)
}

fn to_tensor(image: &RgbImage, profile: NormalizationProfile) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let transform = profile.transform();

    let mut data = match profile.layout() {
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, h, w)),
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, h, w, 3)),
    };

    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = normalize(pixel[c], c, transform);
            match profile.layout() {
                TensorLayout::Nchw => data[[0, c, y, x]] = value,
                TensorLayout::Nhwc => data[[0, y, x, c]] = value,
            }
        }
    }

    data
}

fn normalize(raw: u8, channel: usize, transform: PixelTransform) -> f32 {
    let unit = raw as f32 / 255.0;
    match transform {
        PixelTransform::SymmetricRescale => unit * 2.0 - 1.0,
        PixelTransform::Standardize { mean, std } => (unit - mean[channel]) / std[channel],
    }
}

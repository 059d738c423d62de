use image::DynamicImage;
use imageproc::contrast::equalize_histogram;
use imageproc::filter::median_filter;

/// Image clean-up applied before recognition.
pub trait Preprocessor: Sync {
    fn prepare(&self, image: &DynamicImage) -> DynamicImage;
}

/// Grayscale, histogram equalization, then a 3x3 median to knock out
/// speckle noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContrastPreprocessor;

impl Preprocessor for ContrastPreprocessor {
    fn prepare(&self, image: &DynamicImage) -> DynamicImage {
        let gray = image.to_luma8();
        let equalized = equalize_histogram(&gray);
        DynamicImage::ImageLuma8(median_filter(&equalized, 1, 1))
    }
}

/// Leaves the image untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Preprocessor for Passthrough {
    fn prepare(&self, image: &DynamicImage) -> DynamicImage {
        image.clone()
    }
}

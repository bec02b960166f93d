//! Per-pixel preprocessing filters applied before OCR.
//!
//! Every filter borrows its input and returns a new buffer.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Contrast level used by `enhance_for_ocr` (-100..100 scale).
const ENHANCE_CONTRAST: f32 = 40.0;

/// Lowest threshold `enhance_for_ocr` will binarize with.
const MIN_THRESHOLD: u32 = 100;

/// Converts to grayscale, boosts contrast, then binarizes around the mean.
///
/// Luminance uses the 0.299/0.587/0.114 weights. The threshold is
/// `max(100, mean - 10)` where `mean` is taken over the contrast-adjusted
/// values; darker pixels become black, the rest white.
pub fn enhance_for_ocr(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    let pixel_count = width as u64 * height as u64;
    if pixel_count == 0 {
        return RgbImage::new(width, height);
    }

    let factor = (259.0 * (ENHANCE_CONTRAST + 255.0)) / (255.0 * (259.0 - ENHANCE_CONTRAST));

    // Single pass for gray + contrast; thresholding needs the global mean first.
    let contrasted: Vec<u8> = img
        .pixels()
        .map(|p| {
            let gray = luminance(p);
            let adjusted = (factor * (gray as f32 - 128.0) + 128.0) as i32;
            adjusted.clamp(0, 255) as u8
        })
        .collect();

    let sum: u64 = contrasted.iter().map(|&v| v as u64).sum();
    let mean = (sum / pixel_count) as u32;
    let threshold = MIN_THRESHOLD.max(mean.saturating_sub(10));

    let mut output = RgbImage::new(width, height);
    for (out, &v) in output.pixels_mut().zip(contrasted.iter()) {
        *out = if (v as u32) < threshold {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        };
    }

    output
}

/// Applies a brightness multiplier and contrast delta per channel.
///
/// Equivalent to a 5x5 color matrix with `contrast + 1` on the RGB diagonal and
/// `brightness - 1` in the translation row: `new = scale * old + bias * 255`.
/// `brightness = 1.0, contrast = 0.0` is the identity.
pub fn adjust_brightness_contrast(img: &RgbImage, brightness: f32, contrast: f32) -> RgbImage {
    let scale = contrast + 1.0;
    let bias = (brightness - 1.0) * 255.0;

    let mut output = img.clone();
    for pixel in output.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = (scale * *channel as f32 + bias).round().clamp(0.0, 255.0) as u8;
        }
    }
    output
}

/// Produces the color negative of an image.
pub fn invert_colors(img: &RgbImage) -> RgbImage {
    let mut output = img.clone();
    for pixel in output.pixels_mut() {
        let [r, g, b] = pixel.0;
        *pixel = Rgb([255 - r, 255 - g, 255 - b]);
    }
    output
}

/// Resizes by `scale` on both axes using bicubic (Catmull-Rom) interpolation.
pub fn upscale(img: &RgbImage, scale: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);
    imageops::resize(img, new_width, new_height, FilterType::CatmullRom)
}

fn luminance(p: &Rgb<u8>) -> u8 {
    let [r, g, b] = p.0;
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 17 % 256) as u8, (y * 31 % 256) as u8, ((x + y) * 7 % 256) as u8])
        })
    }

    #[test]
    fn test_brightness_contrast_identity() {
        let img = gradient(16, 9);
        let result = adjust_brightness_contrast(&img, 1.0, 0.0);
        assert_eq!(result, img);
    }

    #[test]
    fn test_brightness_contrast_brightens_and_clamps() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([100, 0, 250]));
        img.put_pixel(1, 0, Rgb([10, 60, 120]));

        // Brightness only: +0.2 * 255 = +51 per channel
        let brighter = adjust_brightness_contrast(&img, 1.2, 0.0);
        assert_eq!(*brighter.get_pixel(0, 0), Rgb([151, 51, 255]));

        // Contrast only: channels doubled
        let contrasted = adjust_brightness_contrast(&img, 1.0, 1.0);
        assert_eq!(*contrasted.get_pixel(1, 0), Rgb([20, 120, 240]));
    }

    #[test]
    fn test_brightness_contrast_does_not_mutate_input() {
        let img = gradient(4, 4);
        let before = img.clone();
        let _ = adjust_brightness_contrast(&img, 1.6, 0.2);
        assert_eq!(img, before);
    }

    #[test]
    fn test_invert_colors() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([0, 128, 255]));

        let result = invert_colors(&img);

        assert_eq!(*result.get_pixel(0, 0), Rgb([255, 127, 0]));
        // Inverting twice restores the original
        assert_eq!(invert_colors(&result), img);
    }

    #[test]
    fn test_upscale_doubles_dimensions() {
        let img = gradient(58, 27);
        let result = upscale(&img, 2.0);
        assert_eq!(result.dimensions(), (116, 54));
    }

    #[test]
    fn test_upscale_uniform_color_is_preserved() {
        let img = RgbImage::from_pixel(5, 3, Rgb([40, 90, 200]));
        let result = upscale(&img, 2.0);
        assert!(result.pixels().all(|p| *p == Rgb([40, 90, 200])));
    }

    #[test]
    fn test_enhance_for_ocr_binarizes() {
        // Dark text (20) on a light background (220)
        let mut img = RgbImage::from_pixel(10, 4, Rgb([220, 220, 220]));
        for x in 2..5 {
            img.put_pixel(x, 1, Rgb([20, 20, 20]));
            img.put_pixel(x, 2, Rgb([20, 20, 20]));
        }

        let result = enhance_for_ocr(&img);

        assert_eq!(result.dimensions(), (10, 4));
        assert_eq!(*result.get_pixel(3, 1), Rgb([0, 0, 0]), "Text should be black");
        assert_eq!(*result.get_pixel(0, 0), Rgb([255, 255, 255]), "Background should be white");
        assert!(result
            .pixels()
            .all(|p| *p == Rgb([0, 0, 0]) || *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_enhance_for_ocr_threshold_floor() {
        // Uniformly dark image: mean is low, so the floor of 100 applies and
        // everything below it turns black.
        let img = RgbImage::from_pixel(4, 4, Rgb([60, 60, 60]));
        let result = enhance_for_ocr(&img);
        assert!(result.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_enhance_for_ocr_uniform_bright_is_white() {
        // Mean-based threshold sits 10 below the uniform value, so nothing is darker.
        let img = RgbImage::from_pixel(4, 4, Rgb([200, 200, 200]));
        let result = enhance_for_ocr(&img);
        assert!(result.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_enhance_for_ocr_empty_image() {
        let img = RgbImage::new(0, 0);
        assert_eq!(enhance_for_ocr(&img).dimensions(), (0, 0));
    }
}

use anyhow::{Result, anyhow};
use image::{DynamicImage, GrayImage, Rgba, RgbaImage, imageops};
use tracing::warn;

use super::filters;
use crate::ocr::{EnhancementLevel, ImageVariant, VariantTag};

const MAX_UPSCALED_SIDE: u32 = 12_000;

/// Converts a decoded page to 8-bit grayscale, flattening alpha onto white.
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other if !other.color().has_alpha() => other.to_luma8(),
        other => {
            let page = other.to_rgba8();
            let mut canvas = RgbaImage::from_pixel(page.width(), page.height(), Rgba([255; 4]));
            imageops::overlay(&mut canvas, &page, 0, 0);
            imageops::grayscale(&canvas)
        }
    }
}

/// Builds the preprocessing variants `level` calls for, in recipe order.
///
/// A recipe that cannot run on this image is logged and left out; the
/// remaining variants are still returned.
pub fn generate_variants(image: &GrayImage, level: EnhancementLevel) -> Vec<ImageVariant> {
    let mut variants = Vec::new();
    for tag in level.variant_tags() {
        match apply_recipe(image, *tag) {
            Ok(image) => variants.push(ImageVariant { tag: *tag, image }),
            Err(err) => warn!(variant = tag.as_str(), "skipping preprocessing variant: {err}"),
        }
    }
    variants
}

fn apply_recipe(image: &GrayImage, tag: VariantTag) -> Result<GrayImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(anyhow!("image has no pixels ({}x{})", width, height));
    }

    let output = match tag {
        VariantTag::Standard => filters::binarize_otsu(&filters::gaussian_blur(image, 3)),
        VariantTag::Contrast => {
            let equalized = filters::clahe(image, 3.0, 8);
            filters::binarize_otsu(&filters::gamma(&equalized, 1.2))
        }
        VariantTag::Denoise => {
            let smoothed = filters::bilateral(image, 9, 75.0, 75.0);
            let sharpened = filters::sharpen(&filters::median3x3(&smoothed));
            filters::binarize_otsu(&sharpened)
        }
        VariantTag::Upscale => {
            let (target_w, target_h) = upscaled_size(width, height);
            let resized =
                imageops::resize(image, target_w, target_h, imageops::FilterType::CatmullRom);
            filters::binarize_otsu(&filters::gaussian_blur(&resized, 3))
        }
        VariantTag::Morphological => {
            let bin = filters::binarize_otsu(image);
            filters::close(&filters::open(&bin))
        }
        VariantTag::AdaptiveThreshold => {
            filters::adaptive_threshold(&filters::gaussian_blur(image, 5), 11)
        }
    };
    Ok(output)
}

/// Doubles both sides, shrinking the factor so neither side passes the cap.
fn upscaled_size(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height) as f64;
    let factor = (MAX_UPSCALED_SIDE as f64 / longest).clamp(1.0, 2.0);
    (
        ((width as f64 * factor).round() as u32).max(1),
        ((height as f64 * factor).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn page() -> GrayImage {
        GrayImage::from_fn(40, 20, |x, y| {
            if (8..32).contains(&x) && (8..12).contains(&y) {
                Luma([20])
            } else {
                Luma([235])
            }
        })
    }

    #[test]
    fn variant_tags_follow_level_order() {
        let tags = generate_variants(&page(), EnhancementLevel::Aggressive)
            .into_iter()
            .map(|variant| variant.tag)
            .collect::<Vec<_>>();
        assert_eq!(tags, EnhancementLevel::Aggressive.variant_tags());
    }

    #[test]
    fn upscale_doubles_dimensions() {
        let variants = generate_variants(&page(), EnhancementLevel::Standard);
        let upscaled = variants
            .iter()
            .find(|variant| variant.tag == VariantTag::Upscale)
            .unwrap();
        assert_eq!(upscaled.image.dimensions(), (80, 40));
    }

    #[test]
    fn variants_are_binary() {
        for variant in generate_variants(&page(), EnhancementLevel::Aggressive) {
            assert!(
                variant.image.pixels().all(|p| p[0] == 0 || p[0] == 255),
                "{} is not binary",
                variant.tag.as_str()
            );
        }
    }

    #[test]
    fn upscale_factor_is_capped_for_large_pages() {
        assert_eq!(upscaled_size(100, 50), (200, 100));
        assert_eq!(upscaled_size(8_000, 4_000), (12_000, 6_000));
        assert_eq!(upscaled_size(20_000, 10), (20_000, 10));
    }

    #[test]
    fn transparent_pixels_flatten_onto_white() {
        let mut rgba = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let gray = to_gray(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn rgb_pages_convert_to_luma() {
        let rgb = image::RgbImage::from_pixel(3, 2, image::Rgb([255, 255, 255]));
        let gray = to_gray(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(gray.dimensions(), (3, 2));
        assert!(gray.pixels().all(|pixel| pixel[0] == 255));
    }

    #[test]
    fn empty_image_yields_no_variants() {
        let empty = GrayImage::new(0, 0);
        assert!(generate_variants(&empty, EnhancementLevel::Aggressive).is_empty());
    }
}

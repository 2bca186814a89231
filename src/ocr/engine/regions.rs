use image::{GrayImage, Luma};
use imageproc::contrast::{self, ThresholdType};
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::BTreeMap;

use super::filters;
use crate::ocr::TextRegion;

const MIN_WIDTH: u32 = 10;
const MIN_HEIGHT: u32 = 8;
const MAX_WIDTH_FRACTION: f64 = 0.8;
const MAX_HEIGHT_FRACTION: f64 = 0.5;
const MIN_ASPECT: f64 = 0.5;
const MAX_ASPECT: f64 = 20.0;

const INK: u8 = 255;

/// Finds probable text blocks on a page, sorted top-to-bottom then left-to-right.
///
/// Dark pixels are smeared horizontally across gaps of up to `smear_gap`
/// pixels so the letters of a line join into one component. Components whose
/// bounding box is too small, too large or too elongated are dropped. An empty
/// result means the caller should OCR the whole page.
pub fn locate_text_regions(image: &GrayImage, smear_gap: u32) -> Vec<TextRegion> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let blurred = filters::gaussian_blur(image, 3);
    let level = contrast::otsu_level(&blurred);
    let mut ink = contrast::threshold(&blurred, level, ThresholdType::BinaryInverted);
    if ink.pixels().all(|pixel| pixel[0] == INK) {
        return Vec::new();
    }
    smear_rows(&mut ink, smear_gap as usize);

    let mut regions = component_boxes(&ink)
        .into_iter()
        .filter(|region| fits_text_shape(region, width, height))
        .collect::<Vec<_>>();
    regions.sort_by_key(|region| (region.y, region.x));
    regions
}

fn smear_rows(ink: &mut GrayImage, gap: usize) {
    if gap == 0 {
        return;
    }
    let width = ink.width() as usize;
    for row in ink.chunks_mut(width) {
        let mut last_ink: Option<usize> = None;
        for x in 0..row.len() {
            if row[x] != INK {
                continue;
            }
            if let Some(prev) = last_ink {
                let distance = x - prev - 1;
                if distance > 0 && distance <= gap {
                    row[prev + 1..x].fill(INK);
                }
            }
            last_ink = Some(x);
        }
    }
}

/// Bounding box of every 8-connected ink component.
fn component_boxes(ink: &GrayImage) -> Vec<TextRegion> {
    let labels = connected_components(ink, Connectivity::Eight, Luma([0u8]));
    let mut extents: BTreeMap<u32, (u32, u32, u32, u32)> = BTreeMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        extents
            .entry(label)
            .and_modify(|(min_x, min_y, max_x, max_y)| {
                *min_x = (*min_x).min(x);
                *min_y = (*min_y).min(y);
                *max_x = (*max_x).max(x);
                *max_y = (*max_y).max(y);
            })
            .or_insert((x, y, x, y));
    }
    extents
        .into_values()
        .map(|(min_x, min_y, max_x, max_y)| TextRegion {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
        .collect()
}

fn fits_text_shape(region: &TextRegion, page_width: u32, page_height: u32) -> bool {
    let (w, h) = (region.width as f64, region.height as f64);
    if region.width < MIN_WIDTH || w > page_width as f64 * MAX_WIDTH_FRACTION {
        return false;
    }
    if region.height < MIN_HEIGHT || h > page_height as f64 * MAX_HEIGHT_FRACTION {
        return false;
    }
    let aspect = w / h;
    (MIN_ASPECT..=MAX_ASPECT).contains(&aspect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_blocks(blocks: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut image = GrayImage::from_pixel(200, 120, Luma([245]));
        for &(x, y, w, h) in blocks {
            for yy in y..y + h {
                for xx in x..x + w {
                    image.put_pixel(xx, yy, Luma([15]));
                }
            }
        }
        image
    }

    fn assert_close(actual: &TextRegion, expected: (u32, u32, u32, u32)) {
        let tolerance = 2i64;
        let pairs = [
            (actual.x, expected.0),
            (actual.y, expected.1),
            (actual.width, expected.2),
            (actual.height, expected.3),
        ];
        for (got, want) in pairs {
            assert!(
                (got as i64 - want as i64).abs() <= tolerance,
                "{actual:?} vs {expected:?}"
            );
        }
    }

    #[test]
    fn diagonal_strokes_form_one_component() {
        let mut ink = GrayImage::new(6, 6);
        for i in 0..6 {
            ink.put_pixel(i, i, Luma([INK]));
        }
        let boxes = component_boxes(&ink);
        assert_eq!(boxes.len(), 1);
        assert_eq!((boxes[0].width, boxes[0].height), (6, 6));
    }

    #[test]
    fn smear_bridges_only_short_gaps() {
        let mut ink = GrayImage::new(12, 1);
        for x in [0, 3, 11] {
            ink.put_pixel(x, 0, Luma([INK]));
        }
        smear_rows(&mut ink, 3);
        let row = ink.pixels().map(|pixel| pixel[0] == INK).collect::<Vec<_>>();
        assert!(row[..4].iter().all(|&value| value));
        assert!(!row[4] && !row[10]);
        assert!(row[11]);
    }

    #[test]
    fn blank_page_has_no_regions() {
        let image = GrayImage::from_pixel(100, 80, Luma([255]));
        assert!(locate_text_regions(&image, 12).is_empty());
    }

    #[test]
    fn regions_sorted_top_then_left() {
        let image = page_with_blocks(&[(120, 70, 40, 12), (20, 20, 60, 12), (110, 20, 50, 12)]);
        let regions = locate_text_regions(&image, 4);
        assert_eq!(regions.len(), 3);
        assert_close(&regions[0], (20, 20, 60, 12));
        assert_close(&regions[1], (110, 20, 50, 12));
        assert_close(&regions[2], (120, 70, 40, 12));
    }

    #[test]
    fn smearing_joins_words_on_a_line() {
        let image = page_with_blocks(&[(20, 30, 30, 10), (56, 30, 30, 10)]);
        let regions = locate_text_regions(&image, 12);
        assert_eq!(regions.len(), 1);
        assert_close(&regions[0], (20, 30, 66, 10));
    }

    #[test]
    fn specks_and_rules_are_rejected() {
        // A 3x3 speck is too small; a full-width rule is too wide and thin.
        let image = page_with_blocks(&[(50, 10, 3, 3), (0, 100, 200, 2)]);
        assert!(locate_text_regions(&image, 4).is_empty());
    }

    #[test]
    fn every_region_satisfies_shape_bounds() {
        let image = page_with_blocks(&[(10, 10, 70, 14), (100, 40, 12, 20), (30, 80, 150, 9)]);
        for region in locate_text_regions(&image, 6) {
            assert!(region.width >= 10 && region.width as f64 <= 160.0);
            assert!(region.height >= 8 && region.height as f64 <= 60.0);
            let aspect = region.width as f64 / region.height as f64;
            assert!((0.5..=20.0).contains(&aspect));
        }
    }
}

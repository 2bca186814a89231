use image::GrayImage;
use imageproc::contrast::{self, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::{filter, morphology};

const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

/// Sigma implied by a fixed `size`-tap Gaussian kernel.
fn kernel_sigma(size: u32) -> f32 {
    (0.3 * ((size.max(1) as f32 - 1.0) * 0.5 - 1.0) + 0.8).max(0.1)
}

pub(super) fn gaussian_blur(image: &GrayImage, size: u32) -> GrayImage {
    filter::gaussian_blur_f32(image, kernel_sigma(size))
}

pub(super) fn sharpen(image: &GrayImage) -> GrayImage {
    filter::filter3x3::<_, i32, u8>(image, &SHARPEN_KERNEL)
}

pub(super) fn median3x3(image: &GrayImage) -> GrayImage {
    filter::median_filter(image, 1, 1)
}

/// Edge-preserving smoothing over a `window`×`window` neighbourhood.
pub(super) fn bilateral(
    image: &GrayImage,
    window: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> GrayImage {
    filter::bilateral_filter(image, window, sigma_color, sigma_space)
}

pub(super) fn gamma(image: &GrayImage, gamma: f32) -> GrayImage {
    let mut table = [0u8; 256];
    for (idx, value) in table.iter_mut().enumerate() {
        *value = ((idx as f32 / 255.0).powf(1.0 / gamma) * 255.0) as u8;
    }
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = table[pixel[0] as usize];
    }
    output
}

/// Contrast-limited adaptive histogram equalization over a `grid`×`grid` tiling.
pub(super) fn clahe(image: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let tiles_x = grid.clamp(1, width);
    let tiles_y = grid.clamp(1, height);
    let bounds = |tile: u32, tiles: u32, extent: u32| {
        let start = (tile as u64 * extent as u64 / tiles as u64) as u32;
        let end = ((tile as u64 + 1) * extent as u64 / tiles as u64) as u32;
        (start, end)
    };

    let mut tables = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        let (y0, y1) = bounds(ty, tiles_y, height);
        for tx in 0..tiles_x {
            let (x0, x1) = bounds(tx, tiles_x, width);
            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[image.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = ((x1 - x0) * (y1 - y0)).max(1);
            let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
            let mut excess = 0u32;
            for count in hist.iter_mut() {
                if *count > limit {
                    excess += *count - limit;
                    *count = limit;
                }
            }
            let share = excess / 256;
            let remainder = (excess % 256) as usize;
            for (idx, count) in hist.iter_mut().enumerate() {
                *count += share + u32::from(idx < remainder);
            }

            let mut table = [0u8; 256];
            let mut cdf = 0u32;
            for (idx, count) in hist.iter().enumerate() {
                cdf += count;
                table[idx] = ((cdf as f32 * 255.0 / area as f32).round()).min(255.0) as u8;
            }
            tables.push(table);
        }
    }

    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;
    let neighbours = |pos: f32, tiles: u32| {
        let max = tiles as f32 - 1.0;
        let pos = pos.clamp(0.0, max);
        let lo = pos.floor();
        let hi = (lo + 1.0).min(max);
        (lo as usize, hi as usize, pos - lo)
    };

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        let (ty0, ty1, wy) = neighbours((y as f32 + 0.5) / tile_h - 0.5, tiles_y);
        for x in 0..width {
            let (tx0, tx1, wx) = neighbours((x as f32 + 0.5) / tile_w - 0.5, tiles_x);
            let value = image.get_pixel(x, y)[0] as usize;
            let at = |ty: usize, tx: usize| tables[ty * tiles_x as usize + tx][value] as f32;
            let top = at(ty0, tx0) * (1.0 - wx) + at(ty0, tx1) * wx;
            let bottom = at(ty1, tx0) * (1.0 - wx) + at(ty1, tx1) * wx;
            let mapped = top * (1.0 - wy) + bottom * wy;
            output.put_pixel(x, y, image::Luma([mapped.round().clamp(0.0, 255.0) as u8]));
        }
    }
    output
}

/// Pixels brighter than the Otsu level become white, the rest black.
pub(super) fn binarize_otsu(image: &GrayImage) -> GrayImage {
    contrast::threshold(image, contrast::otsu_level(image), ThresholdType::Binary)
}

/// Local mean threshold over a `block`×`block` window.
pub(super) fn adaptive_threshold(image: &GrayImage, block: u32) -> GrayImage {
    contrast::adaptive_threshold(image, (block / 2).max(1))
}

pub(super) fn open(image: &GrayImage) -> GrayImage {
    morphology::open(image, Norm::LInf, 1)
}

pub(super) fn close(image: &GrayImage) -> GrayImage {
    morphology::close(image, Norm::LInf, 1)
}

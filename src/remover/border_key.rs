//! Border colour keying.
//!
//! Estimates the background colour from the outermost ring of pixels and
//! flood-fills inward from the border. A pixel is background when it is
//! connected (4-neighbourhood) to the border through pixels that are either
//! already transparent or within `tolerance` of the key colour. Enclosed
//! regions of the same colour that do not touch the border stay opaque.

use std::collections::VecDeque;

use image::{DynamicImage, Rgba, RgbaImage};

use super::{BackgroundRemover, RemovalError};

pub struct BorderKeyRemover {
    tolerance: u8,
}

impl BorderKeyRemover {
    pub fn new(tolerance: u8) -> Self {
        Self { tolerance }
    }
}

impl BackgroundRemover for BorderKeyRemover {
    fn name(&self) -> &'static str {
        "border-key"
    }

    fn remove(&self, image: DynamicImage) -> Result<RgbaImage, RemovalError> {
        let mut rgba = image.into_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Ok(rgba);
        }

        let key = border_colour(&rgba);
        let threshold = u32::from(self.tolerance).pow(2);
        let is_background = |pixel: &Rgba<u8>| {
            pixel[3] == 0 || key.is_some_and(|key| distance_sq(pixel, &key) <= threshold)
        };

        let index = |x: u32, y: u32| y as usize * width as usize + x as usize;
        let mut mask = vec![false; width as usize * height as usize];
        let mut queue = VecDeque::new();

        for (x, y) in border_coords(width, height) {
            if !mask[index(x, y)] && is_background(rgba.get_pixel(x, y)) {
                mask[index(x, y)] = true;
                queue.push_back((x, y));
            }
        }

        while let Some((x, y)) = queue.pop_front() {
            let neighbours = [
                x.checked_sub(1).map(|nx| (nx, y)),
                (x + 1 < width).then(|| (x + 1, y)),
                y.checked_sub(1).map(|ny| (x, ny)),
                (y + 1 < height).then(|| (x, y + 1)),
            ];
            for (nx, ny) in neighbours.into_iter().flatten() {
                let i = index(nx, ny);
                if !mask[i] && is_background(rgba.get_pixel(nx, ny)) {
                    mask[i] = true;
                    queue.push_back((nx, ny));
                }
            }
        }

        for (i, pixel) in rgba.pixels_mut().enumerate() {
            if mask[i] {
                pixel[3] = 0;
            }
        }

        Ok(rgba)
    }
}

/// Every pixel on the outer ring. Corners appear more than once.
fn border_coords(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let horizontal = (0..width).flat_map(move |x| [(x, 0), (x, height - 1)]);
    let vertical = (0..height).flat_map(move |y| [(0, y), (width - 1, y)]);
    horizontal.chain(vertical)
}

/// Mean colour of the non-transparent border pixels, or `None` when the
/// whole border is already transparent.
fn border_colour(image: &RgbaImage) -> Option<Rgba<u8>> {
    let (width, height) = image.dimensions();
    let mut sums = [0u64; 3];
    let mut count = 0u64;

    for (x, y) in border_coords(width, height) {
        let pixel = image.get_pixel(x, y);
        if pixel[3] == 0 {
            continue;
        }
        for (sum, channel) in sums.iter_mut().zip(pixel.0.iter()) {
            *sum += u64::from(*channel);
        }
        count += 1;
    }

    if count == 0 {
        return None;
    }
    let [r, g, b] = sums.map(|sum| (sum / count) as u8);
    Some(Rgba([r, g, b, 255]))
}

fn distance_sq(a: &Rgba<u8>, b: &Rgba<u8>) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .take(3)
        .map(|(x, y)| u32::from(x.abs_diff(*y)).pow(2))
        .sum()
}

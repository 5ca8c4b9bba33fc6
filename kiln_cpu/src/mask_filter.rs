// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mask filters turn the coverage of a shape into a different mask before it is blitted.

use kiln_common::geom::IntRect;
use kiln_common::mask::{Mask, MaskFormat, Plane};
use kiln_common::paint::{EmbossLight, MaskFilter};

/// Apply `filter` to an A8 coverage mask.
pub(crate) fn filter_mask(filter: &MaskFilter, mask: &Mask) -> Mask {
    match filter {
        MaskFilter::Emboss { light, blur_radius } => emboss(mask, light, *blur_radius),
    }
}

/// One horizontal pass of a box blur with the given radius.
fn box_blur_rows(src: &[u8], width: usize, radius: usize) -> Vec<u8> {
    let mut out = vec![0; src.len()];
    let window = (2 * radius + 1) as u32;
    for (src_row, out_row) in src.chunks_exact(width).zip(out.chunks_exact_mut(width)) {
        for (x, o) in out_row.iter_mut().enumerate() {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius + 1).min(width);
            let sum: u32 = src_row[lo..hi].iter().map(|v| u32::from(*v)).sum();
            *o = ((sum + window / 2) / window) as u8;
        }
    }
    out
}

fn transpose(src: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0; src.len()];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = src[y * width + x];
        }
    }
    out
}

/// Light the coverage of `mask` as a height field.
///
/// The result covers the original bounds grown by the blur radius. Its alpha plane is the
/// original coverage; the multiply plane holds the ambient plus diffuse light and the add plane
/// the specular highlight.
fn emboss(mask: &Mask, light: &EmbossLight, blur_radius: f32) -> Mask {
    let radius = blur_radius.max(0.0).ceil() as i32;
    let src_bounds = mask.bounds();
    let bounds = IntRect::new(
        src_bounds.left - radius,
        src_bounds.top - radius,
        src_bounds.right + radius,
        src_bounds.bottom + radius,
    );
    let mut out = Mask::new(MaskFormat::ThreeD, bounds);
    if bounds.is_empty() {
        return out;
    }
    let width = bounds.width() as usize;
    let height = bounds.height() as usize;

    let mut heights = vec![0_u8; width * height];
    for y in src_bounds.top..src_bounds.bottom {
        for x in src_bounds.left..src_bounds.right {
            let alpha = mask.alpha_at(x, y);
            heights[(y - bounds.top) as usize * width + (x - bounds.left) as usize] = alpha;
            out.set_alpha(x, y, alpha);
        }
    }
    if radius > 0 {
        let r = radius as usize;
        let blurred = box_blur_rows(&heights, width, r);
        let blurred = box_blur_rows(&transpose(&blurred, width, height), height, r);
        heights = transpose(&blurred, height, width);
    }

    let [lx, ly, lz] = light.direction;
    let len = (lx * lx + ly * ly + lz * lz).sqrt();
    let (lx, ly, lz) = if len > 0.0 {
        (lx / len, ly / len, lz / len)
    } else {
        (0.0, 0.0, 1.0)
    };
    let ambient = f32::from(light.ambient);
    let exponent = 1.0 + f32::from(light.specular) / 16.0;
    let at = |x: usize, y: usize| f32::from(heights[y * width + x]) / 255.0;

    for y in 0..height {
        for x in 0..width {
            let nx = at(x.saturating_sub(1), y) - at((x + 1).min(width - 1), y);
            let ny = at(x, y.saturating_sub(1)) - at(x, (y + 1).min(height - 1));
            let n_len = (nx * nx + ny * ny + 1.0).sqrt();
            let dot = ((nx * lx + ny * ly + lz) / n_len).max(0.0);
            let mul = (ambient + dot * 255.0).min(255.0);
            let add = if light.specular == 0 {
                0.0
            } else {
                dot.powf(exponent) * 255.0
            };
            let (px, py) = (bounds.left + x as i32, bounds.top + y as i32);
            out.set_plane_at(Plane::Mul, px, py, (mul + 0.5) as u8);
            out.set_plane_at(Plane::Add, px, py, (add + 0.5).min(255.0) as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::filter_mask;
    use kiln_common::geom::IntRect;
    use kiln_common::mask::{Mask, MaskFormat, Plane};
    use kiln_common::paint::{EmbossLight, MaskFilter};

    fn filter(direction: [f32; 3], specular: u8, blur_radius: f32) -> MaskFilter {
        MaskFilter::Emboss {
            light: EmbossLight {
                direction,
                ambient: 0,
                specular,
            },
            blur_radius,
        }
    }

    #[test]
    fn flat_mask_faces_the_light() {
        let bounds = IntRect::new(0, 0, 3, 3);
        let mask = Mask::from_a8(bounds, vec![255; 9]);
        let out = filter_mask(&filter([0.0, 0.0, 1.0], 0, 0.0), &mask);
        assert_eq!(out.format(), MaskFormat::ThreeD);
        assert_eq!(out.bounds(), bounds);
        assert_eq!(out.alpha_at(1, 1), 255);
        assert_eq!(out.plane_at(Plane::Mul, 1, 1), 255);
        assert_eq!(out.plane_at(Plane::Add, 1, 1), 0);
    }

    #[test]
    fn blur_grows_the_bounds_and_shades_edges() {
        let mask = Mask::from_a8(IntRect::new(2, 2, 4, 4), vec![255; 4]);
        let out = filter_mask(&filter([1.0, 0.0, 0.2], 8, 1.0), &mask);
        assert_eq!(out.bounds(), IntRect::new(1, 1, 5, 5));
        // Coverage is kept as is.
        assert_eq!(out.alpha_at(1, 1), 0);
        assert_eq!(out.alpha_at(2, 2), 255);
        // The edge facing the light is brighter than the one facing away.
        assert!(out.plane_at(Plane::Mul, 4, 2) > out.plane_at(Plane::Mul, 1, 2));
    }
}

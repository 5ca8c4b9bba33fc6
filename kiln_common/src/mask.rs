// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coverage masks in device space.

use crate::geom::IntRect;

/// The storage format of a [`Mask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskFormat {
    /// One bit per pixel, most significant bit first.
    Bw,
    /// One byte of coverage per pixel.
    A8,
    /// Three consecutive byte planes: coverage, a multiplicative term and an additive term.
    ///
    /// Produced by emboss mask filters.
    ThreeD,
}

/// The plane of a [`MaskFormat::ThreeD`] mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plane {
    /// Coverage.
    Alpha = 0,
    /// Per-pixel factor applied to the shaded colour.
    Mul = 1,
    /// Per-pixel term added to the shaded colour after multiplication.
    Add = 2,
}

/// A coverage mask positioned in device space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    format: MaskFormat,
    bounds: IntRect,
    row_bytes: usize,
    image: Vec<u8>,
}

impl Mask {
    /// Create a zeroed mask of the given format covering `bounds`.
    ///
    /// Empty bounds produce a mask without pixels.
    pub fn new(format: MaskFormat, bounds: IntRect) -> Self {
        let (width, height) = if bounds.is_empty() {
            (0, 0)
        } else {
            (bounds.width() as usize, bounds.height() as usize)
        };
        let row_bytes = match format {
            MaskFormat::Bw => width.div_ceil(8),
            MaskFormat::A8 | MaskFormat::ThreeD => width,
        };
        let planes = if format == MaskFormat::ThreeD { 3 } else { 1 };
        Self {
            format,
            bounds,
            row_bytes,
            image: vec![0; row_bytes * height * planes],
        }
    }

    /// Create an A8 mask from row-major coverage.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not exactly one byte per pixel of `bounds`.
    pub fn from_a8(bounds: IntRect, data: Vec<u8>) -> Self {
        let mask = Self::new(MaskFormat::A8, bounds);
        assert_eq!(
            data.len(),
            mask.image.len(),
            "Expected `data` to have length of exactly `width * height`"
        );
        Self {
            image: data,
            ..mask
        }
    }

    /// The storage format.
    pub fn format(&self) -> MaskFormat {
        self.format
    }

    /// The device-space bounds.
    pub fn bounds(&self) -> IntRect {
        self.bounds
    }

    /// The number of bytes between consecutive rows of one plane.
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// The raw bytes, all planes included.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// The raw bytes, all planes included.
    pub fn image_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    fn plane_len(&self) -> usize {
        if self.bounds.is_empty() {
            0
        } else {
            self.row_bytes * self.bounds.height() as usize
        }
    }

    /// One plane of a three-plane mask, or the whole image for single plane formats.
    pub fn plane(&self, plane: Plane) -> &[u8] {
        match self.format {
            MaskFormat::ThreeD => {
                let len = self.plane_len();
                let start = plane as usize * len;
                &self.image[start..start + len]
            }
            MaskFormat::Bw | MaskFormat::A8 => &self.image,
        }
    }

    /// Mutable access to one plane; see [`Mask::plane`].
    pub fn plane_mut(&mut self, plane: Plane) -> &mut [u8] {
        match self.format {
            MaskFormat::ThreeD => {
                let len = self.plane_len();
                let start = plane as usize * len;
                &mut self.image[start..start + len]
            }
            MaskFormat::Bw | MaskFormat::A8 => &mut self.image,
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.bounds.contains(x, y) {
            return None;
        }
        let dx = (x - self.bounds.left) as usize;
        let dy = (y - self.bounds.top) as usize;
        let column = match self.format {
            MaskFormat::Bw => dx >> 3,
            MaskFormat::A8 | MaskFormat::ThreeD => dx,
        };
        Some(dy * self.row_bytes + column)
    }

    /// Read the coverage at device pixel `(x, y)`; zero outside the bounds.
    pub fn alpha_at(&self, x: i32, y: i32) -> u8 {
        let Some(idx) = self.index(x, y) else {
            return 0;
        };
        match self.format {
            MaskFormat::Bw => {
                let bit = 0x80_u8 >> ((x - self.bounds.left) & 7);
                if self.image[idx] & bit != 0 {
                    255
                } else {
                    0
                }
            }
            MaskFormat::A8 | MaskFormat::ThreeD => self.image[idx],
        }
    }

    /// Read a three-plane value at device pixel `(x, y)`.
    pub fn plane_at(&self, plane: Plane, x: i32, y: i32) -> u8 {
        self.index(x, y).map_or(0, |idx| self.plane(plane)[idx])
    }

    /// Write the coverage at device pixel `(x, y)`. Writes outside the bounds are ignored.
    ///
    /// BW masks treat any non-zero alpha as set.
    pub fn set_alpha(&mut self, x: i32, y: i32, alpha: u8) {
        let Some(idx) = self.index(x, y) else {
            return;
        };
        match self.format {
            MaskFormat::Bw => {
                let bit = 0x80_u8 >> ((x - self.bounds.left) & 7);
                if alpha != 0 {
                    self.image[idx] |= bit;
                } else {
                    self.image[idx] &= !bit;
                }
            }
            MaskFormat::A8 | MaskFormat::ThreeD => self.image[idx] = alpha,
        }
    }

    /// Write a three-plane value at device pixel `(x, y)`.
    pub fn set_plane_at(&mut self, plane: Plane, x: i32, y: i32, value: u8) {
        if let Some(idx) = self.index(x, y) {
            self.plane_mut(plane)[idx] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Mask, MaskFormat, Plane};
    use crate::geom::IntRect;

    #[test]
    fn bw_bits_are_msb_first() {
        let mut mask = Mask::new(MaskFormat::Bw, IntRect::new(10, 0, 20, 2));
        assert_eq!(mask.row_bytes(), 2);
        mask.set_alpha(10, 1, 1);
        mask.set_alpha(18, 1, 1);
        assert_eq!(mask.image(), &[0, 0, 0x80, 0x80]);
        assert_eq!(mask.alpha_at(10, 1), 255);
        assert_eq!(mask.alpha_at(11, 1), 0);
        assert_eq!(mask.alpha_at(30, 1), 0);
    }

    #[test]
    fn three_d_planes_are_separate() {
        let mut mask = Mask::new(MaskFormat::ThreeD, IntRect::new(0, 0, 2, 2));
        assert_eq!(mask.image().len(), 12);
        mask.set_alpha(1, 1, 200);
        mask.set_plane_at(Plane::Add, 1, 1, 7);
        assert_eq!(mask.alpha_at(1, 1), 200);
        assert_eq!(mask.plane_at(Plane::Mul, 1, 1), 0);
        assert_eq!(mask.plane_at(Plane::Add, 1, 1), 7);
    }
}

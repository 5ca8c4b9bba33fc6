// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A pixel buffer with a tagged pixel format.

use crate::geom::IntRect;
use crate::peniko::color::PremulRgba8;
use core::cell::Cell;

static_assertions::assert_eq_size!(PremulRgba8, u32);
static_assertions::assert_eq_align!(PremulRgba8, u8);

/// The layout of one pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorType {
    /// No pixels can be read or written.
    Unknown,
    /// One byte of alpha.
    Alpha8,
    /// Opaque 16-bit colour, 5 bits red, 6 bits green and 5 bits blue, little endian.
    Rgb565,
    /// Premultiplied RGBA, one byte per channel.
    Rgba8888,
}

impl ColorType {
    /// The native 32-bit format.
    pub const N32: Self = Self::Rgba8888;

    /// The number of bytes per pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::Alpha8 => 1,
            Self::Rgb565 => 2,
            Self::Rgba8888 => 4,
        }
    }

    /// Return whether every pixel of this format is opaque.
    pub const fn is_always_opaque(self) -> bool {
        matches!(self, Self::Rgb565)
    }
}

/// Pack a premultiplied colour into 16-bit 565, dropping alpha.
pub const fn pack_565(c: PremulRgba8) -> u16 {
    ((c.r as u16 >> 3) << 11) | ((c.g as u16 >> 2) << 5) | (c.b as u16 >> 3)
}

/// Expand a 16-bit 565 colour to opaque RGBA, replicating the high bits.
pub const fn unpack_565(v: u16) -> PremulRgba8 {
    let r = ((v >> 11) & 0x1F) as u8;
    let g = ((v >> 5) & 0x3F) as u8;
    let b = (v & 0x1F) as u8;
    PremulRgba8 {
        r: (r << 3) | (r >> 2),
        g: (g << 2) | (g >> 4),
        b: (b << 3) | (b >> 2),
        a: 0xFF,
    }
}

/// A rectangular buffer of pixels.
///
/// The buffer keeps an accounting of how many consumers currently hold it locked. The count is
/// informational only; it does not provide mutual exclusion.
#[derive(Debug)]
pub struct Pixmap {
    width: u16,
    height: u16,
    color_type: ColorType,
    row_bytes: usize,
    bytes: Vec<u8>,
    lock_count: Cell<u32>,
}

impl Clone for Pixmap {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            color_type: self.color_type,
            row_bytes: self.row_bytes,
            bytes: self.bytes.clone(),
            lock_count: Cell::new(0),
        }
    }
}

impl Pixmap {
    /// Create a new pixmap with the given size in pixels.
    ///
    /// All pixels are zero, which is transparent black for the alpha formats.
    pub fn new(width: u16, height: u16, color_type: ColorType) -> Self {
        let row_bytes = usize::from(width) * color_type.bytes_per_pixel();
        Self {
            width,
            height,
            color_type,
            row_bytes,
            bytes: vec![0; row_bytes * usize::from(height)],
            lock_count: Cell::new(0),
        }
    }

    /// Create a new premultiplied RGBA pixmap.
    pub fn new_n32(width: u16, height: u16) -> Self {
        Self::new(width, height, ColorType::N32)
    }

    /// Create a pixmap from tightly packed rows.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` does not hold exactly `width * height` pixels of `color_type`.
    pub fn from_parts(bytes: Vec<u8>, width: u16, height: u16, color_type: ColorType) -> Self {
        let row_bytes = usize::from(width) * color_type.bytes_per_pixel();
        assert_eq!(
            bytes.len(),
            row_bytes * usize::from(height),
            "Expected `bytes` to have length of exactly `width * height * bytes_per_pixel`"
        );
        Self {
            width,
            height,
            color_type,
            row_bytes,
            bytes,
            lock_count: Cell::new(0),
        }
    }

    /// Create a premultiplied RGBA pixmap from pixels in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not of length `width * height`.
    pub fn from_premul_rgba8(data: &[PremulRgba8], width: u16, height: u16) -> Self {
        Self::from_parts(
            bytemuck::cast_slice(data).to_vec(),
            width,
            height,
            ColorType::N32,
        )
    }

    /// The width in pixels.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// The height in pixels.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The pixel format.
    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    /// The number of bytes between the starts of consecutive rows.
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// The rectangle `(0, 0, width, height)`.
    pub fn bounds(&self) -> IntRect {
        IntRect::from_size(self.width, self.height)
    }

    /// The raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable access to the raw bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Consume the pixmap and return its bytes.
    pub fn take(self) -> Vec<u8> {
        self.bytes
    }

    /// The bytes of row `y`.
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.row_bytes;
        &self.bytes[start..start + self.row_bytes]
    }

    /// Mutable access to the bytes of row `y`.
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.row_bytes;
        &mut self.bytes[start..start + self.row_bytes]
    }

    /// The pixels of a premultiplied RGBA pixmap, or `None` for other formats.
    pub fn as_premul_rgba8(&self) -> Option<&[PremulRgba8]> {
        (self.color_type == ColorType::N32).then(|| bytemuck::cast_slice(&self.bytes[..]))
    }

    /// Mutable access to the pixels of a premultiplied RGBA pixmap.
    pub fn as_premul_rgba8_mut(&mut self) -> Option<&mut [PremulRgba8]> {
        if self.color_type == ColorType::N32 {
            Some(bytemuck::cast_slice_mut(&mut self.bytes[..]))
        } else {
            None
        }
    }

    /// Read pixel `(x, y)` as premultiplied RGBA.
    ///
    /// Alpha-only pixels read as black with that alpha; 565 pixels are opaque.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    pub fn pixel(&self, x: u16, y: u16) -> PremulRgba8 {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        let bpp = self.color_type.bytes_per_pixel();
        let idx = usize::from(y) * self.row_bytes + usize::from(x) * bpp;
        let px = &self.bytes[idx..idx + bpp];
        match self.color_type {
            ColorType::Unknown => PremulRgba8::from_u32(0),
            ColorType::Alpha8 => PremulRgba8 {
                r: 0,
                g: 0,
                b: 0,
                a: px[0],
            },
            ColorType::Rgb565 => unpack_565(u16::from_le_bytes([px[0], px[1]])),
            ColorType::Rgba8888 => PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            },
        }
    }

    /// Write pixel `(x, y)` from premultiplied RGBA, converting to the pixel format.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    pub fn set_pixel(&mut self, x: u16, y: u16, color: PremulRgba8) {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        let bpp = self.color_type.bytes_per_pixel();
        let idx = usize::from(y) * self.row_bytes + usize::from(x) * bpp;
        let encoded = encode(self.color_type, color);
        self.bytes[idx..idx + bpp].copy_from_slice(&encoded[..bpp]);
    }

    /// Set every pixel to `color`.
    pub fn erase(&mut self, color: PremulRgba8) {
        let bpp = self.color_type.bytes_per_pixel();
        if bpp == 0 {
            return;
        }
        let encoded = encode(self.color_type, color);
        for px in self.bytes.chunks_exact_mut(bpp) {
            px.copy_from_slice(&encoded[..bpp]);
        }
    }

    /// Return whether every pixel is known to be opaque.
    pub fn is_opaque(&self) -> bool {
        match self.color_type {
            ColorType::Unknown | ColorType::Alpha8 => false,
            ColorType::Rgb565 => true,
            ColorType::Rgba8888 => self.bytes.chunks_exact(4).all(|px| px[3] == 0xFF),
        }
    }

    /// Register a consumer of the pixels until the returned guard is dropped.
    pub fn lock(&self) -> PixmapLock<'_> {
        self.lock_count.set(self.lock_count.get() + 1);
        PixmapLock { pixmap: self }
    }

    /// The number of outstanding [`lock`](Self::lock) guards.
    pub fn lock_count(&self) -> u32 {
        self.lock_count.get()
    }
}

/// Encode `color` into the bytes of one pixel, padded to four bytes.
fn encode(color_type: ColorType, color: PremulRgba8) -> [u8; 4] {
    match color_type {
        ColorType::Unknown => [0; 4],
        ColorType::Alpha8 => [color.a, 0, 0, 0],
        ColorType::Rgb565 => {
            let [lo, hi] = pack_565(color).to_le_bytes();
            [lo, hi, 0, 0]
        }
        ColorType::Rgba8888 => [color.r, color.g, color.b, color.a],
    }
}

/// Lock accounting guard returned by [`Pixmap::lock`].
#[derive(Debug)]
pub struct PixmapLock<'a> {
    pixmap: &'a Pixmap,
}

impl Drop for PixmapLock<'_> {
    fn drop(&mut self) {
        let count = &self.pixmap.lock_count;
        count.set(count.get().saturating_sub(1));
    }
}

// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel-backed devices that canvas layers draw into.

use kiln_common::geom::IntRect;
use kiln_common::pixmap::{ColorType, Pixmap};

/// A pixmap placed in the coordinate space of the base device.
#[derive(Debug)]
pub(crate) struct BitmapDevice {
    pub(crate) pixmap: Pixmap,
    /// Position of the pixmap's top left corner in base device pixels.
    pub(crate) origin: (i32, i32),
}

impl BitmapDevice {
    pub(crate) fn new(pixmap: Pixmap, origin: (i32, i32)) -> Self {
        Self { pixmap, origin }
    }

    /// A transparent device covering `bounds` that layers over `base` can be drawn into.
    ///
    /// Opaque formats cannot hold the transparency a fresh layer starts with, so they get N32
    /// layers.
    pub(crate) fn compatible_layer(base: ColorType, bounds: IntRect) -> Self {
        let color_type = match base {
            ColorType::Alpha8 => ColorType::Alpha8,
            ColorType::Rgb565 | ColorType::Rgba8888 | ColorType::Unknown => ColorType::N32,
        };
        let width = bounds.width().clamp(0, i32::from(u16::MAX)) as u16;
        let height = bounds.height().clamp(0, i32::from(u16::MAX)) as u16;
        Self::new(
            Pixmap::new(width, height, color_type),
            (bounds.left, bounds.top),
        )
    }

    /// The pixmap's bounds in its own pixels.
    pub(crate) fn local_bounds(&self) -> IntRect {
        self.pixmap.bounds()
    }

    /// The pixmap's bounds in base device pixels.
    pub(crate) fn bounds(&self) -> IntRect {
        self.local_bounds().offset(self.origin.0, self.origin.1)
    }
}

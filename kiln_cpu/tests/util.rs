// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Utility functions shared across different tests.

use kiln_common::color::PremulRgba8;
use kiln_common::geom::IntRect;
use kiln_common::pixmap::Pixmap;
use kiln_cpu::Canvas;

pub(crate) const TRANSPARENT: PremulRgba8 = rgba(0, 0, 0, 0);
pub(crate) const RED: PremulRgba8 = rgba(255, 0, 0, 255);
pub(crate) const LIME: PremulRgba8 = rgba(0, 255, 0, 255);
pub(crate) const BLUE: PremulRgba8 = rgba(0, 0, 255, 255);

pub(crate) const fn rgba(r: u8, g: u8, b: u8, a: u8) -> PremulRgba8 {
    PremulRgba8 { r, g, b, a }
}

/// A transparent N32 canvas.
pub(crate) fn get_canvas(width: u16, height: u16) -> Canvas {
    Canvas::new(Pixmap::new_n32(width, height))
}

/// An N32 pixmap filled with `color`.
pub(crate) fn filled(width: u16, height: u16, color: PremulRgba8) -> Pixmap {
    let mut pixmap = Pixmap::new_n32(width, height);
    pixmap.erase(color);
    pixmap
}

/// Assert that exactly the pixels of `rect` are `inside`, and every other pixel is `outside`.
#[track_caller]
pub(crate) fn check_rect(
    pixmap: &Pixmap,
    rect: IntRect,
    inside: PremulRgba8,
    outside: PremulRgba8,
) {
    for y in 0..pixmap.height() {
        for x in 0..pixmap.width() {
            let expected = if rect.contains(i32::from(x), i32::from(y)) {
                inside
            } else {
                outside
            };
            assert_eq!(pixmap.pixel(x, y), expected, "pixel ({x}, {y})");
        }
    }
}

/// Assert that two channel values differ by at most one.
#[track_caller]
pub(crate) fn assert_close(actual: u8, expected: u8) {
    assert!(
        actual.abs_diff(expected) <= 1,
        "expected {expected} (±1), got {actual}"
    );
}

/// The number of pixels that are not fully transparent.
pub(crate) fn covered_count(pixmap: &Pixmap) -> usize {
    let mut count = 0;
    for y in 0..pixmap.height() {
        for x in 0..pixmap.width() {
            if pixmap.pixel(x, y).a != 0 {
                count += 1;
            }
        }
    }
    count
}

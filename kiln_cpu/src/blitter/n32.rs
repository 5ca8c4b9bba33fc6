// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Blitters for premultiplied RGBA destinations.

use super::{for_each_run, Blit, CoverageRun, Shade};
use crate::shader::ShaderContext;
use crate::util::{from_rgba8, src_over, src_over_coverage, to_rgba8};
use kiln_common::color::PremulRgba8;
use kiln_common::pixmap::Pixmap;
use kiln_common::util::mul_255;

const BLACK: PremulRgba8 = PremulRgba8 {
    r: 0,
    g: 0,
    b: 0,
    a: 255,
};

fn span(pixmap: &mut Pixmap, x: i32, y: i32, n: usize) -> &mut [PremulRgba8] {
    let row: &mut [PremulRgba8] = bytemuck::cast_slice_mut(pixmap.row_mut(y as usize));
    let x = x as usize;
    &mut row[x..x + n]
}

/// Writes one opaque colour.
#[derive(Debug)]
pub struct N32OpaqueBlitter<'a> {
    pixmap: &'a mut Pixmap,
    color: PremulRgba8,
}

impl<'a> N32OpaqueBlitter<'a> {
    pub(crate) fn new(pixmap: &'a mut Pixmap, color: PremulRgba8) -> Self {
        debug_assert_eq!(color.a, 255, "colour must be opaque");
        Self { pixmap, color }
    }
}

impl Blit for N32OpaqueBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        span(self.pixmap, x, y, width as usize).fill(self.color);
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        let color = self.color;
        for_each_run(x, runs, |x, n, alpha| {
            let dst = span(self.pixmap, x, y, n);
            if alpha == 255 {
                dst.fill(color);
            } else {
                for d in dst {
                    *d = src_over_coverage(color, *d, alpha);
                }
            }
        });
    }

    fn blit_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        for row in (y..).take(height as usize) {
            span(self.pixmap, x, row, width as usize).fill(self.color);
        }
    }

    fn just_an_opaque_color(&self) -> Option<PremulRgba8> {
        Some(self.color)
    }
}

/// Writes opaque black.
///
/// Partial coverage only darkens the destination, so no source channels have to be blended.
#[derive(Debug)]
pub struct N32BlackBlitter<'a> {
    pixmap: &'a mut Pixmap,
}

impl<'a> N32BlackBlitter<'a> {
    pub(crate) fn new(pixmap: &'a mut Pixmap) -> Self {
        Self { pixmap }
    }
}

impl Blit for N32BlackBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        span(self.pixmap, x, y, width as usize).fill(BLACK);
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        for_each_run(x, runs, |x, n, alpha| {
            let dst = span(self.pixmap, x, y, n);
            if alpha == 255 {
                dst.fill(BLACK);
                return;
            }
            let inv = 255 - alpha;
            for d in dst {
                *d = PremulRgba8 {
                    r: mul_255(d.r, inv),
                    g: mul_255(d.g, inv),
                    b: mul_255(d.b, inv),
                    a: alpha + mul_255(d.a, inv),
                };
            }
        });
    }

    fn just_an_opaque_color(&self) -> Option<PremulRgba8> {
        Some(BLACK)
    }
}

/// Blends one translucent colour over the destination.
#[derive(Debug)]
pub struct N32BlendBlitter<'a> {
    pixmap: &'a mut Pixmap,
    color: PremulRgba8,
}

impl<'a> N32BlendBlitter<'a> {
    pub(crate) fn new(pixmap: &'a mut Pixmap, color: PremulRgba8) -> Self {
        Self { pixmap, color }
    }
}

impl Blit for N32BlendBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        let color = self.color;
        for d in span(self.pixmap, x, y, width as usize) {
            *d = src_over(color, *d);
        }
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        let color = self.color;
        for_each_run(x, runs, |x, n, alpha| {
            for d in span(self.pixmap, x, y, n) {
                *d = src_over_coverage(color, *d, alpha);
            }
        });
    }
}

/// Evaluates a shader and blends its colours with the blend mode.
#[derive(Debug)]
pub struct N32ShaderBlitter<'a> {
    pixmap: &'a mut Pixmap,
    shade: Shade,
}

impl<'a> N32ShaderBlitter<'a> {
    pub(crate) fn new(pixmap: &'a mut Pixmap, shade: Shade) -> Self {
        Self { pixmap, shade }
    }

    fn run(&mut self, x: i32, y: i32, n: usize, alpha: u8) {
        let mode = self.shade.mode;
        let opaque = mode.is_none() && alpha == 255 && self.shade.context.is_opaque();
        let colors = self.shade.shade(x, y, n);
        let dst = span(self.pixmap, x, y, n);
        if opaque {
            for (d, c) in dst.iter_mut().zip(colors) {
                *d = to_rgba8(*c);
            }
        } else if mode.is_none() {
            for (d, c) in dst.iter_mut().zip(colors) {
                *d = src_over_coverage(to_rgba8(*c), *d, alpha);
            }
        } else {
            for (d, c) in dst.iter_mut().zip(colors) {
                *d = to_rgba8(Shade::combine(mode, *c, from_rgba8(*d), alpha));
            }
        }
    }
}

impl Blit for N32ShaderBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        self.run(x, y, width as usize, 255);
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        for_each_run(x, runs, |x, n, alpha| self.run(x, y, n, alpha));
    }

    fn shader_context_mut(&mut self) -> Option<&mut ShaderContext> {
        Some(&mut self.shade.context)
    }
}

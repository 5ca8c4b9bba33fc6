// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Blitters for opaque 16-bit destinations.

use super::{for_each_run, Blit, CoverageRun, Shade};
use crate::shader::ShaderContext;
use crate::util::{from_rgba8, src_over_coverage, to_rgba8};
use kiln_common::color::PremulRgba8;
use kiln_common::pixmap::{pack_565, unpack_565, Pixmap};

/// Apply `f` to every pixel of a span, reading and writing packed values.
fn for_each_pixel(
    pixmap: &mut Pixmap,
    x: i32,
    y: i32,
    n: usize,
    mut f: impl FnMut(usize, u16) -> u16,
) {
    let x = x as usize;
    let row = &mut pixmap.row_mut(y as usize)[x * 2..(x + n) * 2];
    for (i, px) in row.chunks_exact_mut(2).enumerate() {
        let v = f(i, u16::from_le_bytes([px[0], px[1]]));
        px.copy_from_slice(&v.to_le_bytes());
    }
}

fn fill(pixmap: &mut Pixmap, x: i32, y: i32, n: usize, value: u16) {
    for_each_pixel(pixmap, x, y, n, |_, _| value);
}

/// Writes one opaque colour.
#[derive(Debug)]
pub struct Rgb565OpaqueBlitter<'a> {
    pixmap: &'a mut Pixmap,
    color: PremulRgba8,
    packed: u16,
}

impl<'a> Rgb565OpaqueBlitter<'a> {
    pub(crate) fn new(pixmap: &'a mut Pixmap, color: PremulRgba8) -> Self {
        Self {
            pixmap,
            color,
            packed: pack_565(color),
        }
    }
}

impl Blit for Rgb565OpaqueBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        fill(self.pixmap, x, y, width as usize, self.packed);
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        let (color, packed) = (self.color, self.packed);
        for_each_run(x, runs, |x, n, alpha| {
            if alpha == 255 {
                fill(self.pixmap, x, y, n, packed);
            } else {
                for_each_pixel(self.pixmap, x, y, n, |_, d| {
                    pack_565(src_over_coverage(color, unpack_565(d), alpha))
                });
            }
        });
    }

    fn just_an_opaque_color(&self) -> Option<PremulRgba8> {
        Some(unpack_565(self.packed))
    }
}

/// Blends one translucent colour over the destination.
#[derive(Debug)]
pub struct Rgb565BlendBlitter<'a> {
    pixmap: &'a mut Pixmap,
    color: PremulRgba8,
}

impl<'a> Rgb565BlendBlitter<'a> {
    pub(crate) fn new(pixmap: &'a mut Pixmap, color: PremulRgba8) -> Self {
        Self { pixmap, color }
    }
}

impl Blit for Rgb565BlendBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        self.blit_anti_h(x, y, &[CoverageRun::new(width, 255)]);
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        let color = self.color;
        for_each_run(x, runs, |x, n, alpha| {
            for_each_pixel(self.pixmap, x, y, n, |_, d| {
                pack_565(src_over_coverage(color, unpack_565(d), alpha))
            });
        });
    }
}

/// Evaluates a shader into a 16-bit destination.
#[derive(Debug)]
pub struct Rgb565ShaderBlitter<'a> {
    pixmap: &'a mut Pixmap,
    shade: Shade,
}

impl<'a> Rgb565ShaderBlitter<'a> {
    pub(crate) fn new(pixmap: &'a mut Pixmap, shade: Shade) -> Self {
        Self { pixmap, shade }
    }

    fn run(&mut self, x: i32, y: i32, n: usize, coverage: u8) {
        let mode = self.shade.mode;
        let colors = self.shade.shade(x, y, n);
        for_each_pixel(self.pixmap, x, y, n, |i, d| {
            let dst = from_rgba8(unpack_565(d));
            pack_565(to_rgba8(Shade::combine(mode, colors[i], dst, coverage)))
        });
    }
}

impl Blit for Rgb565ShaderBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        self.run(x, y, width as usize, 255);
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        for_each_run(x, runs, |x, n, coverage| self.run(x, y, n, coverage));
    }

    fn shader_context_mut(&mut self) -> Option<&mut ShaderContext> {
        Some(&mut self.shade.context)
    }
}

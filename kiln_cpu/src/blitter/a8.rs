// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Blitters for alpha-only destinations.

use super::{for_each_run, Blit, CoverageRun, Shade};
use crate::shader::ShaderContext;
use crate::util::src_over_alpha;
use kiln_common::geom::IntRect;
use kiln_common::mask::Mask;
use kiln_common::pixmap::Pixmap;
use kiln_common::util::mul_255;

fn span(pixmap: &mut Pixmap, x: i32, y: i32, n: usize) -> &mut [u8] {
    let x = x as usize;
    &mut pixmap.row_mut(y as usize)[x..x + n]
}

/// Blends one alpha value over the destination.
#[derive(Debug)]
pub struct A8Blitter<'a> {
    pixmap: &'a mut Pixmap,
    alpha: u8,
}

impl<'a> A8Blitter<'a> {
    pub(crate) fn new(pixmap: &'a mut Pixmap, alpha: u8) -> Self {
        Self { pixmap, alpha }
    }
}

impl Blit for A8Blitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        let alpha = self.alpha;
        let dst = span(self.pixmap, x, y, width as usize);
        if alpha == 255 {
            dst.fill(255);
        } else {
            for d in dst {
                *d = src_over_alpha(alpha, *d);
            }
        }
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        let alpha = self.alpha;
        for_each_run(x, runs, |x, n, coverage| {
            let src = mul_255(alpha, coverage);
            for d in span(self.pixmap, x, y, n) {
                *d = src_over_alpha(src, *d);
            }
        });
    }
}

/// Evaluates a shader and keeps only the alpha of the blended result.
#[derive(Debug)]
pub struct A8ShaderBlitter<'a> {
    pixmap: &'a mut Pixmap,
    shade: Shade,
}

impl<'a> A8ShaderBlitter<'a> {
    pub(crate) fn new(pixmap: &'a mut Pixmap, shade: Shade) -> Self {
        Self { pixmap, shade }
    }

    fn run(&mut self, x: i32, y: i32, n: usize, coverage: u8) {
        let mode = self.shade.mode;
        let colors = self.shade.shade(x, y, n);
        let dst = span(self.pixmap, x, y, n);
        for (d, c) in dst.iter_mut().zip(colors) {
            let dst_color = [0.0, 0.0, 0.0, f32::from(*d) / 255.0];
            let out = Shade::combine(mode, *c, dst_color, coverage);
            *d = (out[3].clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        }
    }
}

impl Blit for A8ShaderBlitter<'_> {
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

/// Writes coverage itself rather than a colour.
#[derive(Debug)]
pub struct A8CoverageBlitter<'a> {
    pixmap: &'a mut Pixmap,
}

impl<'a> A8CoverageBlitter<'a> {
    pub(crate) fn new(pixmap: &'a mut Pixmap) -> Self {
        Self { pixmap }
    }
}

impl Blit for A8CoverageBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        span(self.pixmap, x, y, width as usize).fill(255);
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        for_each_run(x, runs, |x, n, coverage| {
            span(self.pixmap, x, y, n).fill(coverage);
        });
    }

    fn blit_mask(&mut self, mask: &Mask, clip: &IntRect) {
        let Some(area) = clip.intersect(&mask.bounds()) else {
            return;
        };
        for y in area.top..area.bottom {
            let dst = span(self.pixmap, area.left, y, area.width() as usize);
            for (x, d) in (area.left..).zip(dst) {
                *d = mask.alpha_at(x, y);
            }
        }
    }
}

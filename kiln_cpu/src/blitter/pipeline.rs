// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The general blitter: floating point, every pixel format and every blend mode.

use super::{for_each_run, Blit, CoverageRun};
use crate::blend::{apply_color_filter, blend};
use crate::shader::ShaderContext;
use crate::util::{from_rgba8, to_rgba8, PremulF32};
use kiln_common::paint::ColorFilter;
use kiln_common::peniko::BlendMode;
use kiln_common::pixmap::Pixmap;

/// Shades, filters and blends every pixel in floating point.
///
/// Slower than the specialized blitters, but handles the separable and non-separable mix modes
/// on any destination.
#[derive(Debug)]
pub struct PipelineBlitter<'a> {
    pixmap: &'a mut Pixmap,
    context: ShaderContext,
    filter: Option<ColorFilter>,
    mode: BlendMode,
    buffer: Vec<PremulF32>,
}

impl<'a> PipelineBlitter<'a> {
    pub(crate) fn new(
        pixmap: &'a mut Pixmap,
        context: ShaderContext,
        filter: Option<ColorFilter>,
        mode: BlendMode,
    ) -> Self {
        Self {
            pixmap,
            context,
            filter,
            mode,
            buffer: Vec::new(),
        }
    }

    fn run(&mut self, x: i32, y: i32, n: usize, coverage: u8) {
        self.buffer.resize(n, [0.0; 4]);
        self.context.shade_row(x, y, &mut self.buffer);
        let coverage = f32::from(coverage) / 255.0;
        for (px, src) in (x..).zip(&self.buffer) {
            let src = match &self.filter {
                Some(filter) => apply_color_filter(filter, *src),
                None => *src,
            };
            // Span coordinates are inside the destination, which is at most `u16` wide.
            let (px, py) = (px as u16, y as u16);
            let dst = from_rgba8(self.pixmap.pixel(px, py));
            let out = blend(src, dst, self.mode, coverage);
            self.pixmap.set_pixel(px, py, to_rgba8(out));
        }
    }
}

impl Blit for PipelineBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        self.run(x, y, width as usize, 255);
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        for_each_run(x, runs, |x, n, coverage| self.run(x, y, n, coverage));
    }

    fn shader_context_mut(&mut self) -> Option<&mut ShaderContext> {
        Some(&mut self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineBlitter;
    use crate::blitter::{Blit, CoverageRun};
    use crate::shader::ShaderContext;
    use kiln_common::color::PremulRgba8;
    use kiln_common::peniko::{BlendMode, Compose, Mix};
    use kiln_common::pixmap::{ColorType, Pixmap};

    #[test]
    fn multiply_on_n32() {
        let mut pixmap = Pixmap::new_n32(2, 1);
        let gray = PremulRgba8 {
            r: 128,
            g: 128,
            b: 128,
            a: 255,
        };
        pixmap.erase(gray);
        let context = ShaderContext::Color([1.0, 0.0, 0.0, 1.0]);
        let mode = BlendMode::new(Mix::Multiply, Compose::SrcOver);
        let mut blitter = PipelineBlitter::new(&mut pixmap, context, None, mode);
        blitter.blit_anti_h(0, 0, &[CoverageRun::new(1, 255)]);
        assert_eq!(
            pixmap.pixel(0, 0),
            PremulRgba8 {
                r: 128,
                g: 0,
                b: 0,
                a: 255
            }
        );
        assert_eq!(pixmap.pixel(1, 0), gray);
    }

    #[test]
    fn works_on_alpha8() {
        let mut pixmap = Pixmap::new(1, 1, ColorType::Alpha8);
        let context = ShaderContext::Color([0.5, 0.5, 0.5, 0.5]);
        let mode = BlendMode::new(Mix::Screen, Compose::SrcOver);
        PipelineBlitter::new(&mut pixmap, context, None, mode).blit_h(0, 0, 1);
        assert_eq!(pixmap.data(), [128]);
    }
}

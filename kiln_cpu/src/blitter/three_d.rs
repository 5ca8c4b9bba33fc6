// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{Blit, Blitter, CoverageRun};
use crate::shader::ShaderContext;
use kiln_common::geom::IntRect;
use kiln_common::mask::{Mask, MaskFormat};

/// Hands the multiply and add planes of three-plane masks to the shader of the blitter it wraps.
///
/// Every other call is forwarded unchanged.
#[derive(Debug)]
pub struct ThreeDBlitter<'a> {
    inner: Box<Blitter<'a>>,
}

impl<'a> ThreeDBlitter<'a> {
    pub(crate) fn new(inner: Blitter<'a>) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    /// The wrapped blitter.
    pub fn inner(&self) -> &Blitter<'a> {
        &self.inner
    }
}

impl Blit for ThreeDBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        self.inner.blit_h(x, y, width);
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        self.inner.blit_anti_h(x, y, runs);
    }

    fn blit_v(&mut self, x: i32, y: i32, height: u32, alpha: u8) {
        self.inner.blit_v(x, y, height, alpha);
    }

    fn blit_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.inner.blit_rect(x, y, width, height);
    }

    fn blit_mask(&mut self, mask: &Mask, clip: &IntRect) {
        if mask.format() != MaskFormat::ThreeD {
            self.inner.blit_mask(mask, clip);
            return;
        }
        let installed = self
            .inner
            .shader_context_mut()
            .is_some_and(|ctx| ctx.set_3d_mask(Some(mask.clone())));
        self.inner.blit_mask(mask, clip);
        if installed {
            if let Some(ctx) = self.inner.shader_context_mut() {
                ctx.set_3d_mask(None);
            }
        }
    }

    fn is_null(&self) -> bool {
        self.inner.is_null()
    }

    fn shader_context_mut(&mut self) -> Option<&mut ShaderContext> {
        self.inner.shader_context_mut()
    }

    fn request_rows_preserved(&self) -> u32 {
        self.inner.request_rows_preserved()
    }
}

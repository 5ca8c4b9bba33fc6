// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Blitters write spans of pixels into a destination.
//!
//! A blitter is chosen once per draw call by [`Blitter::choose`], which specializes it to the
//! destination format and the paint. Scan conversion then feeds it horizontal runs, vertical
//! runs, rectangles and masks. Clipping is composed around a chosen blitter with
//! [`Blitter::with_clip`], so the blitters themselves never see the clip.

mod a8;
mod choose;
mod clip;
mod n32;
mod pipeline;
mod rgb565;
mod three_d;

pub use a8::{A8Blitter, A8CoverageBlitter, A8ShaderBlitter};
pub use clip::{AaClipBlitter, RectClipBlitter, RegionClipBlitter};
pub use n32::{N32BlackBlitter, N32BlendBlitter, N32OpaqueBlitter, N32ShaderBlitter};
pub use pipeline::PipelineBlitter;
pub use rgb565::{Rgb565BlendBlitter, Rgb565OpaqueBlitter, Rgb565ShaderBlitter};
pub use three_d::ThreeDBlitter;

use crate::blend::blend;
use crate::shader::ShaderContext;
use crate::util::PremulF32;
use kiln_common::color::PremulRgba8;
use kiln_common::geom::IntRect;
use kiln_common::mask::Mask;
use kiln_common::peniko::BlendMode;
use smallvec::SmallVec;

/// A run of pixels sharing one coverage value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoverageRun {
    /// The number of pixels.
    pub count: u32,
    /// Their coverage.
    pub alpha: u8,
}

impl CoverageRun {
    /// Create a new run.
    pub const fn new(count: u32, alpha: u8) -> Self {
        Self { count, alpha }
    }
}

/// Scratch storage for the runs of one scanline.
pub(crate) type Runs = SmallVec<[CoverageRun; 16]>;

/// The capability of writing pixels.
///
/// Coordinates are device pixels and must lie inside the destination; clip wrappers establish
/// that before forwarding.
pub trait Blit {
    /// Fill `width` pixels of row `y` starting at `x` at full coverage.
    fn blit_h(&mut self, x: i32, y: i32, width: u32);

    /// Fill consecutive runs of row `y`, starting at `x`, each with its own coverage.
    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]);

    /// Fill `height` pixels of column `x` starting at `y` with coverage `alpha`.
    fn blit_v(&mut self, x: i32, y: i32, height: u32, alpha: u8) {
        let run = [CoverageRun::new(1, alpha)];
        for row in (y..).take(height as usize) {
            self.blit_anti_h(x, row, &run);
        }
    }

    /// Fill a rectangle at full coverage.
    fn blit_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        for row in (y..).take(height as usize) {
            self.blit_h(x, row, width);
        }
    }

    /// Fill a rectangle with partially covered left and right columns.
    ///
    /// Column `x` gets `left_alpha`, the next `width` columns full coverage and the column after
    /// them `right_alpha`.
    fn blit_anti_rect(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        left_alpha: u8,
        right_alpha: u8,
    ) {
        self.blit_v(x, y, height, left_alpha);
        if width > 0 {
            self.blit_rect(x + 1, y, width, height);
        }
        self.blit_v(x + 1 + width as i32, y, height, right_alpha);
    }

    /// Fill the part of `mask` inside `clip`, using the mask's coverage.
    fn blit_mask(&mut self, mask: &Mask, clip: &IntRect) {
        let Some(area) = clip.intersect(&mask.bounds()) else {
            return;
        };
        let mut runs = Runs::new();
        for y in area.top..area.bottom {
            runs.clear();
            for x in area.left..area.right {
                push_run(&mut runs, 1, mask.alpha_at(x, y));
            }
            self.blit_anti_h(area.left, y, &runs);
        }
    }

    /// Fill two horizontally adjacent pixels.
    fn blit_anti_h2(&mut self, x: i32, y: i32, a0: u8, a1: u8) {
        self.blit_anti_h(x, y, &[CoverageRun::new(1, a0), CoverageRun::new(1, a1)]);
    }

    /// Fill two vertically adjacent pixels.
    fn blit_anti_v2(&mut self, x: i32, y: i32, a0: u8, a1: u8) {
        self.blit_anti_h(x, y, &[CoverageRun::new(1, a0)]);
        self.blit_anti_h(x, y + 1, &[CoverageRun::new(1, a1)]);
    }

    /// The colour written at full coverage, if the blitter writes one opaque colour.
    fn just_an_opaque_color(&self) -> Option<PremulRgba8> {
        None
    }

    /// Return whether the blitter discards every write.
    fn is_null(&self) -> bool {
        false
    }

    /// The shader context evaluated by the blitter, if any.
    fn shader_context_mut(&mut self) -> Option<&mut ShaderContext> {
        None
    }

    /// The number of consecutive rows the caller should keep before handing them over.
    fn request_rows_preserved(&self) -> u32 {
        1
    }
}

/// Append a run, merging it into the previous one when the coverage is the same.
pub(crate) fn push_run(runs: &mut Runs, count: u32, alpha: u8) {
    if count == 0 {
        return;
    }
    match runs.last_mut() {
        Some(last) if last.alpha == alpha => last.count += count,
        _ => runs.push(CoverageRun::new(count, alpha)),
    }
}

/// Call `f(x, count, alpha)` for every run with non-zero coverage.
pub(crate) fn for_each_run(x: i32, runs: &[CoverageRun], mut f: impl FnMut(i32, usize, u8)) {
    let mut x = x;
    for run in runs {
        if run.alpha != 0 && run.count > 0 {
            f(x, run.count as usize, run.alpha);
        }
        x += run.count as i32;
    }
}

/// A shader context together with the blend mode and a scratch row.
#[derive(Debug)]
pub(crate) struct Shade {
    pub(crate) context: ShaderContext,
    /// `None` means source-over.
    pub(crate) mode: Option<BlendMode>,
    buffer: Vec<PremulF32>,
}

impl Shade {
    pub(crate) fn new(context: ShaderContext, mode: Option<BlendMode>) -> Self {
        Self {
            context,
            mode,
            buffer: Vec::new(),
        }
    }

    /// Shade `n` pixels of row `y` from column `x`.
    pub(crate) fn shade(&mut self, x: i32, y: i32, n: usize) -> &[PremulF32] {
        self.buffer.resize(n, [0.0; 4]);
        self.context.shade_row(x, y, &mut self.buffer);
        &self.buffer
    }

    /// Combine a shaded colour with a destination colour.
    #[inline]
    pub(crate) fn combine(
        mode: Option<BlendMode>,
        src: PremulF32,
        dst: PremulF32,
        coverage: u8,
    ) -> PremulF32 {
        let coverage = f32::from(coverage) / 255.0;
        blend(src, dst, mode.unwrap_or_default(), coverage)
    }
}

/// A blitter that discards every write.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBlitter;

impl Blit for NullBlitter {
    fn blit_h(&mut self, _: i32, _: i32, _: u32) {}

    fn blit_anti_h(&mut self, _: i32, _: i32, _: &[CoverageRun]) {}

    fn blit_v(&mut self, _: i32, _: i32, _: u32, _: u8) {}

    fn blit_rect(&mut self, _: i32, _: i32, _: u32, _: u32) {}

    fn blit_anti_rect(&mut self, _: i32, _: i32, _: u32, _: u32, _: u8, _: u8) {}

    fn blit_mask(&mut self, _: &Mask, _: &IntRect) {}

    fn blit_anti_h2(&mut self, _: i32, _: i32, _: u8, _: u8) {}

    fn blit_anti_v2(&mut self, _: i32, _: i32, _: u8, _: u8) {}

    fn is_null(&self) -> bool {
        true
    }
}

/// The category of a [`Blitter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlitterKind {
    /// Discards writes.
    Null,
    /// One opaque colour into N32.
    N32Opaque,
    /// Opaque black into N32.
    N32Black,
    /// One translucent colour into N32.
    N32Blend,
    /// A shader into N32.
    N32Shader,
    /// One colour into Alpha8.
    A8,
    /// A shader into Alpha8.
    A8Shader,
    /// Raw coverage into Alpha8.
    A8Coverage,
    /// One opaque colour into RGB565.
    Rgb565Opaque,
    /// One translucent colour into RGB565.
    Rgb565Blend,
    /// A shader into RGB565.
    Rgb565Shader,
    /// The general floating point path.
    Pipeline,
    /// Three-plane mask support around another blitter.
    ThreeD,
    /// A rectangle clip around another blitter.
    RectClip,
    /// A region clip around another blitter.
    RegionClip,
    /// An antialiased clip around another blitter.
    AaClip,
}

/// A blitter selected for one draw call.
#[derive(Debug)]
pub enum Blitter<'a> {
    /// See [`NullBlitter`].
    Null(NullBlitter),
    /// See [`N32OpaqueBlitter`].
    N32Opaque(N32OpaqueBlitter<'a>),
    /// See [`N32BlackBlitter`].
    N32Black(N32BlackBlitter<'a>),
    /// See [`N32BlendBlitter`].
    N32Blend(N32BlendBlitter<'a>),
    /// See [`N32ShaderBlitter`].
    N32Shader(N32ShaderBlitter<'a>),
    /// See [`A8Blitter`].
    A8(A8Blitter<'a>),
    /// See [`A8ShaderBlitter`].
    A8Shader(A8ShaderBlitter<'a>),
    /// See [`A8CoverageBlitter`].
    A8Coverage(A8CoverageBlitter<'a>),
    /// See [`Rgb565OpaqueBlitter`].
    Rgb565Opaque(Rgb565OpaqueBlitter<'a>),
    /// See [`Rgb565BlendBlitter`].
    Rgb565Blend(Rgb565BlendBlitter<'a>),
    /// See [`Rgb565ShaderBlitter`].
    Rgb565Shader(Rgb565ShaderBlitter<'a>),
    /// See [`PipelineBlitter`].
    Pipeline(PipelineBlitter<'a>),
    /// See [`ThreeDBlitter`].
    ThreeD(ThreeDBlitter<'a>),
    /// See [`RectClipBlitter`].
    RectClip(RectClipBlitter<'a>),
    /// See [`RegionClipBlitter`].
    RegionClip(RegionClipBlitter<'a>),
    /// See [`AaClipBlitter`].
    AaClip(AaClipBlitter<'a>),
}

macro_rules! dispatch {
    ($self:expr, $b:ident => $body:expr) => {
        match $self {
            Blitter::Null($b) => $body,
            Blitter::N32Opaque($b) => $body,
            Blitter::N32Black($b) => $body,
            Blitter::N32Blend($b) => $body,
            Blitter::N32Shader($b) => $body,
            Blitter::A8($b) => $body,
            Blitter::A8Shader($b) => $body,
            Blitter::A8Coverage($b) => $body,
            Blitter::Rgb565Opaque($b) => $body,
            Blitter::Rgb565Blend($b) => $body,
            Blitter::Rgb565Shader($b) => $body,
            Blitter::Pipeline($b) => $body,
            Blitter::ThreeD($b) => $body,
            Blitter::RectClip($b) => $body,
            Blitter::RegionClip($b) => $body,
            Blitter::AaClip($b) => $body,
        }
    };
}

impl Blitter<'_> {
    /// The null blitter.
    pub const fn null() -> Self {
        Self::Null(NullBlitter)
    }

    /// The category of this blitter.
    pub fn kind(&self) -> BlitterKind {
        match self {
            Self::Null(_) => BlitterKind::Null,
            Self::N32Opaque(_) => BlitterKind::N32Opaque,
            Self::N32Black(_) => BlitterKind::N32Black,
            Self::N32Blend(_) => BlitterKind::N32Blend,
            Self::N32Shader(_) => BlitterKind::N32Shader,
            Self::A8(_) => BlitterKind::A8,
            Self::A8Shader(_) => BlitterKind::A8Shader,
            Self::A8Coverage(_) => BlitterKind::A8Coverage,
            Self::Rgb565Opaque(_) => BlitterKind::Rgb565Opaque,
            Self::Rgb565Blend(_) => BlitterKind::Rgb565Blend,
            Self::Rgb565Shader(_) => BlitterKind::Rgb565Shader,
            Self::Pipeline(_) => BlitterKind::Pipeline,
            Self::ThreeD(_) => BlitterKind::ThreeD,
            Self::RectClip(_) => BlitterKind::RectClip,
            Self::RegionClip(_) => BlitterKind::RegionClip,
            Self::AaClip(_) => BlitterKind::AaClip,
        }
    }

    /// The category of the blitter underneath any clip and three-plane wrappers.
    pub fn inner_kind(&self) -> BlitterKind {
        match self {
            Self::ThreeD(b) => b.inner().inner_kind(),
            Self::RectClip(b) => b.inner().inner_kind(),
            Self::RegionClip(b) => b.inner().inner_kind(),
            Self::AaClip(b) => b.inner().inner_kind(),
            _ => self.kind(),
        }
    }
}

impl Blit for Blitter<'_> {
    #[inline]
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        dispatch!(self, b => b.blit_h(x, y, width));
    }

    #[inline]
    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        dispatch!(self, b => b.blit_anti_h(x, y, runs));
    }

    fn blit_v(&mut self, x: i32, y: i32, height: u32, alpha: u8) {
        dispatch!(self, b => b.blit_v(x, y, height, alpha));
    }

    fn blit_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        dispatch!(self, b => b.blit_rect(x, y, width, height));
    }

    fn blit_anti_rect(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        left_alpha: u8,
        right_alpha: u8,
    ) {
        dispatch!(self, b => b.blit_anti_rect(x, y, width, height, left_alpha, right_alpha));
    }

    fn blit_mask(&mut self, mask: &Mask, clip: &IntRect) {
        dispatch!(self, b => b.blit_mask(mask, clip));
    }

    fn blit_anti_h2(&mut self, x: i32, y: i32, a0: u8, a1: u8) {
        dispatch!(self, b => b.blit_anti_h2(x, y, a0, a1));
    }

    fn blit_anti_v2(&mut self, x: i32, y: i32, a0: u8, a1: u8) {
        dispatch!(self, b => b.blit_anti_v2(x, y, a0, a1));
    }

    fn just_an_opaque_color(&self) -> Option<PremulRgba8> {
        dispatch!(self, b => b.just_an_opaque_color())
    }

    fn is_null(&self) -> bool {
        dispatch!(self, b => b.is_null())
    }

    fn shader_context_mut(&mut self) -> Option<&mut ShaderContext> {
        dispatch!(self, b => b.shader_context_mut())
    }

    fn request_rows_preserved(&self) -> u32 {
        dispatch!(self, b => b.request_rows_preserved())
    }
}

#[cfg(test)]
mod tests {
    use super::{push_run, Blit, Blitter, CoverageRun, Runs};
    use kiln_common::geom::IntRect;
    use kiln_common::mask::{Mask, MaskFormat};

    #[test]
    fn runs_merge() {
        let mut runs = Runs::new();
        push_run(&mut runs, 2, 10);
        push_run(&mut runs, 3, 10);
        push_run(&mut runs, 0, 20);
        push_run(&mut runs, 1, 20);
        assert_eq!(
            runs.as_slice(),
            [CoverageRun::new(5, 10), CoverageRun::new(1, 20)]
        );
    }

    #[test]
    fn null_blitter_accepts_anything() {
        let mut blitter = Blitter::null();
        assert!(blitter.is_null());
        blitter.blit_h(-5, i32::MAX, u32::MAX);
        blitter.blit_anti_h(i32::MIN, 0, &[CoverageRun::new(u32::MAX, 255)]);
        blitter.blit_v(0, 0, 0, 255);
        blitter.blit_rect(1_000_000, -1_000_000, 0, 0);
        blitter.blit_anti_rect(0, 0, u32::MAX, u32::MAX, 1, 2);
        let mask = Mask::new(MaskFormat::A8, IntRect::new(0, 0, 4, 4));
        blitter.blit_mask(&mask, &IntRect::new(-100, -100, 100, 100));
        blitter.blit_anti_h2(-1, -1, 0, 0);
        blitter.blit_anti_v2(-1, -1, 0, 0);
        assert!(blitter.shader_context_mut().is_none());
        assert!(blitter.just_an_opaque_color().is_none());
    }
}

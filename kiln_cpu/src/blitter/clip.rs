// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Blitters that enforce a clip before forwarding to the blitter they wrap.

use super::{push_run, Blit, Blitter, CoverageRun, Runs};
use crate::shader::ShaderContext;
use kiln_common::aa_clip::AaClip;
use kiln_common::geom::IntRect;
use kiln_common::mask::{Mask, MaskFormat, Plane};
use kiln_common::raster_clip::{ClipRepr, RasterClip};
use kiln_common::region::Region;
use kiln_common::util::mul_255;

impl<'a> Blitter<'a> {
    /// Wrap the blitter so that it only writes inside `clip`.
    ///
    /// `bounds` is the device bounds of what is about to be drawn; when the clip contains it no
    /// wrapper is needed at all.
    pub fn with_clip(self, clip: &'a RasterClip, bounds: &IntRect) -> Self {
        if self.is_null() {
            return self;
        }
        match clip.repr() {
            ClipRepr::Bw(region) => self.with_region(region, bounds),
            ClipRepr::Aa(aa) => {
                if aa.quick_contains(bounds) {
                    self
                } else {
                    Self::AaClip(AaClipBlitter::new(self, aa))
                }
            }
        }
    }

    /// Wrap the blitter so that it only writes inside `region`.
    pub fn with_region(self, region: &'a Region, bounds: &IntRect) -> Self {
        if region.is_empty() {
            return Self::null();
        }
        if region.is_rect() {
            let clip = region.bounds();
            if clip.contains_rect(bounds) {
                self
            } else {
                Self::RectClip(RectClipBlitter::new(self, clip))
            }
        } else if region.quick_contains(bounds) {
            self
        } else {
            Self::RegionClip(RegionClipBlitter::new(self, region))
        }
    }
}

/// Keep the part of `runs`, starting at `x`, that lies inside `[left, right)`.
fn clip_runs(x: i32, runs: &[CoverageRun], left: i32, right: i32, out: &mut Runs) -> i32 {
    out.clear();
    let start = x.max(left);
    let mut cur = x;
    for run in runs {
        let end = cur + run.count as i32;
        let (l, r) = (cur.max(left), end.min(right));
        if l < r {
            push_run(out, (r - l) as u32, run.alpha);
        }
        cur = end;
        if cur >= right {
            break;
        }
    }
    start
}

fn run_width(runs: &[CoverageRun]) -> i32 {
    runs.iter().map(|r| r.count as i32).sum()
}

/// Clips to a single rectangle by clamping coordinates.
#[derive(Debug)]
pub struct RectClipBlitter<'a> {
    inner: Box<Blitter<'a>>,
    clip: IntRect,
    runs: Runs,
}

impl<'a> RectClipBlitter<'a> {
    pub(crate) fn new(inner: Blitter<'a>, clip: IntRect) -> Self {
        Self {
            inner: Box::new(inner),
            clip,
            runs: Runs::new(),
        }
    }

    /// The wrapped blitter.
    pub fn inner(&self) -> &Blitter<'a> {
        &self.inner
    }
}

impl Blit for RectClipBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        let row = IntRect::new(x, y, x + width as i32, y + 1);
        if let Some(r) = row.intersect(&self.clip) {
            self.inner.blit_h(r.left, y, r.width() as u32);
        }
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        if y < self.clip.top || y >= self.clip.bottom {
            return;
        }
        let start = clip_runs(x, runs, self.clip.left, self.clip.right, &mut self.runs);
        if !self.runs.is_empty() {
            self.inner.blit_anti_h(start, y, &self.runs);
        }
    }

    fn blit_v(&mut self, x: i32, y: i32, height: u32, alpha: u8) {
        let col = IntRect::new(x, y, x + 1, y + height as i32);
        if let Some(r) = col.intersect(&self.clip) {
            self.inner.blit_v(x, r.top, r.height() as u32, alpha);
        }
    }

    fn blit_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        let rect = IntRect::from_xywh(x, y, width as i32, height as i32);
        if let Some(r) = rect.intersect(&self.clip) {
            self.inner
                .blit_rect(r.left, r.top, r.width() as u32, r.height() as u32);
        }
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
        let outer = IntRect::new(x, y, x + width as i32 + 2, y + height as i32);
        let Some(r) = outer.intersect(&self.clip) else {
            return;
        };
        if r == outer {
            self.inner
                .blit_anti_rect(x, y, width, height, left_alpha, right_alpha);
            return;
        }
        // Split into the edge columns and the interior and clip each.
        let (top, h) = (r.top, r.height() as u32);
        if r.left == x {
            self.inner.blit_v(x, top, h, left_alpha);
        }
        let inner_left = r.left.max(x + 1);
        let inner_right = r.right.min(x + 1 + width as i32);
        if inner_left < inner_right {
            self.inner
                .blit_rect(inner_left, top, (inner_right - inner_left) as u32, h);
        }
        if r.right == outer.right {
            self.inner.blit_v(outer.right - 1, top, h, right_alpha);
        }
    }

    fn blit_mask(&mut self, mask: &Mask, clip: &IntRect) {
        if let Some(r) = clip.intersect(&self.clip) {
            self.inner.blit_mask(mask, &r);
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

/// Clips to a complex region by walking its spans.
#[derive(Debug)]
pub struct RegionClipBlitter<'a> {
    inner: Box<Blitter<'a>>,
    region: &'a Region,
    runs: Runs,
}

impl<'a> RegionClipBlitter<'a> {
    pub(crate) fn new(inner: Blitter<'a>, region: &'a Region) -> Self {
        Self {
            inner: Box::new(inner),
            region,
            runs: Runs::new(),
        }
    }

    /// The wrapped blitter.
    pub fn inner(&self) -> &Blitter<'a> {
        &self.inner
    }
}

impl Blit for RegionClipBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        for (left, right) in self.region.spanerator(y, x, x + width as i32) {
            self.inner.blit_h(left, y, (right - left) as u32);
        }
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        let right = x + run_width(runs);
        for (l, r) in self.region.spanerator(y, x, right) {
            let start = clip_runs(x, runs, l, r, &mut self.runs);
            if !self.runs.is_empty() {
                self.inner.blit_anti_h(start, y, &self.runs);
            }
        }
    }

    fn blit_v(&mut self, x: i32, y: i32, height: u32, alpha: u8) {
        let col = IntRect::new(x, y, x + 1, y + height as i32);
        for r in self.region.cliperator(col) {
            self.inner.blit_v(x, r.top, r.height() as u32, alpha);
        }
    }

    fn blit_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        let rect = IntRect::from_xywh(x, y, width as i32, height as i32);
        for r in self.region.cliperator(rect) {
            self.inner
                .blit_rect(r.left, r.top, r.width() as u32, r.height() as u32);
        }
    }

    fn blit_mask(&mut self, mask: &Mask, clip: &IntRect) {
        let Some(area) = clip.intersect(&mask.bounds()) else {
            return;
        };
        for r in self.region.cliperator(area) {
            self.inner.blit_mask(mask, &r);
        }
    }

    fn is_null(&self) -> bool {
        self.inner.is_null()
    }

    fn shader_context_mut(&mut self) -> Option<&mut ShaderContext> {
        self.inner.shader_context_mut()
    }
}

/// Multiplies the coverage of an antialiased clip into everything it forwards.
#[derive(Debug)]
pub struct AaClipBlitter<'a> {
    inner: Box<Blitter<'a>>,
    clip: &'a AaClip,
    coverage: Vec<u8>,
    runs: Runs,
}

impl<'a> AaClipBlitter<'a> {
    pub(crate) fn new(inner: Blitter<'a>, clip: &'a AaClip) -> Self {
        Self {
            inner: Box::new(inner),
            clip,
            coverage: Vec::new(),
            runs: Runs::new(),
        }
    }

    /// The wrapped blitter.
    pub fn inner(&self) -> &Blitter<'a> {
        &self.inner
    }

    /// Forward `runs`, starting at `x`, after multiplying them with the clip's coverage.
    fn forward(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        let bounds = self.clip.bounds();
        if y < bounds.top || y >= bounds.bottom {
            return;
        }
        let right = (x + run_width(runs)).min(bounds.right);
        let left = x.max(bounds.left);
        if left >= right {
            return;
        }
        self.coverage.resize((right - left) as usize, 0);
        self.clip.expand_row(y, left, &mut self.coverage);

        self.runs.clear();
        let mut cur = x;
        for run in runs {
            let end = cur + run.count as i32;
            for px in cur.max(left)..end.min(right) {
                let clip = self.coverage[(px - left) as usize];
                push_run(&mut self.runs, 1, mul_255(run.alpha, clip));
            }
            cur = end;
        }
        if self.runs.iter().any(|r| r.alpha != 0) {
            self.inner.blit_anti_h(left, y, &self.runs);
        }
    }
}

impl Blit for AaClipBlitter<'_> {
    fn blit_h(&mut self, x: i32, y: i32, width: u32) {
        self.forward(x, y, &[CoverageRun::new(width, 255)]);
    }

    fn blit_anti_h(&mut self, x: i32, y: i32, runs: &[CoverageRun]) {
        self.forward(x, y, runs);
    }

    fn blit_v(&mut self, x: i32, y: i32, height: u32, alpha: u8) {
        for row in (y..).take(height as usize) {
            self.forward(x, row, &[CoverageRun::new(1, alpha)]);
        }
    }

    fn blit_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        let rect = IntRect::from_xywh(x, y, width as i32, height as i32);
        if self.clip.quick_contains(&rect) {
            self.inner.blit_rect(x, y, width, height);
            return;
        }
        for row in (y..).take(height as usize) {
            self.forward(x, row, &[CoverageRun::new(width, 255)]);
        }
    }

    fn blit_mask(&mut self, mask: &Mask, clip: &IntRect) {
        let Some(area) = clip
            .intersect(&mask.bounds())
            .and_then(|r| r.intersect(&self.clip.bounds()))
        else {
            return;
        };
        let mut clipped = match mask.format() {
            MaskFormat::ThreeD => mask.clone(),
            MaskFormat::Bw | MaskFormat::A8 => Mask::new(MaskFormat::A8, area),
        };
        for y in area.top..area.bottom {
            for x in area.left..area.right {
                let alpha = mul_255(mask.alpha_at(x, y), self.clip.coverage(x, y));
                clipped.set_plane_at(Plane::Alpha, x, y, alpha);
            }
        }
        self.inner.blit_mask(&clipped, &area);
    }

    fn is_null(&self) -> bool {
        self.inner.is_null()
    }

    fn shader_context_mut(&mut self) -> Option<&mut ShaderContext> {
        self.inner.shader_context_mut()
    }
}

#[cfg(test)]
mod tests {
    use crate::blitter::{Blit, Blitter, BlitterKind, CoverageRun, N32OpaqueBlitter};
    use kiln_common::color::PremulRgba8;
    use kiln_common::geom::IntRect;
    use kiln_common::kurbo::{Affine, Rect};
    use kiln_common::mask::{Mask, MaskFormat};
    use kiln_common::pixmap::Pixmap;
    use kiln_common::raster_clip::RasterClip;
    use kiln_common::region::{Region, RegionOp};

    const RED: PremulRgba8 = PremulRgba8 {
        r: 255,
        g: 0,
        b: 0,
        a: 255,
    };

    fn alphas(pixmap: &Pixmap, y: u16) -> Vec<u8> {
        (0..pixmap.width()).map(|x| pixmap.pixel(x, y).a).collect()
    }

    #[test]
    fn rect_clip() {
        let mut pixmap = Pixmap::new_n32(8, 3);
        let clip = RasterClip::from_rect(IntRect::new(2, 0, 6, 2));
        let bounds = IntRect::new(0, 0, 8, 3);
        let mut blitter = Blitter::N32Opaque(N32OpaqueBlitter::new(&mut pixmap, RED))
            .with_clip(&clip, &bounds);
        assert_eq!(blitter.kind(), BlitterKind::RectClip);
        assert_eq!(blitter.inner_kind(), BlitterKind::N32Opaque);
        blitter.blit_h(0, 0, 8);
        blitter.blit_anti_h(
            0,
            1,
            &[CoverageRun::new(3, 100), CoverageRun::new(5, 255)],
        );
        blitter.blit_rect(0, 2, 8, 1);
        blitter.blit_anti_rect(0, 0, 6, 3, 10, 20);
        assert_eq!(alphas(&pixmap, 0), [0, 0, 255, 255, 255, 255, 0, 0]);
        assert_eq!(pixmap.pixel(2, 1).r, 255);
        assert_eq!(pixmap.pixel(3, 1), RED);
        assert_eq!(alphas(&pixmap, 2), [0; 8]);
    }

    #[test]
    fn no_wrapper_when_contained() {
        let mut pixmap = Pixmap::new_n32(8, 8);
        let clip = RasterClip::from_rect(IntRect::new(0, 0, 8, 8));
        let blitter = Blitter::N32Opaque(N32OpaqueBlitter::new(&mut pixmap, RED))
            .with_clip(&clip, &IntRect::new(1, 1, 4, 4));
        assert_eq!(blitter.kind(), BlitterKind::N32Opaque);
    }

    #[test]
    fn empty_clip_is_null() {
        let mut pixmap = Pixmap::new_n32(4, 4);
        let clip = RasterClip::new(false);
        let blitter = Blitter::N32Opaque(N32OpaqueBlitter::new(&mut pixmap, RED))
            .with_clip(&clip, &IntRect::new(0, 0, 4, 4));
        assert!(blitter.is_null());
    }

    #[test]
    fn region_clip() {
        let mut region = Region::from_rect(IntRect::new(0, 0, 8, 2));
        region.op_rect(IntRect::new(2, 0, 4, 2), RegionOp::Difference);
        let mut pixmap = Pixmap::new_n32(8, 2);
        let mut clip = RasterClip::new(false);
        clip.set_region(&region);
        let mut blitter = Blitter::N32Opaque(N32OpaqueBlitter::new(&mut pixmap, RED))
            .with_clip(&clip, &IntRect::new(0, 0, 8, 2));
        assert_eq!(blitter.kind(), BlitterKind::RegionClip);
        blitter.blit_h(0, 0, 8);
        blitter.blit_anti_h(1, 1, &[CoverageRun::new(6, 255)]);
        let mask = Mask::from_a8(IntRect::new(0, 0, 1, 1), vec![255]);
        blitter.blit_mask(&mask, &IntRect::new(0, 0, 8, 2));
        assert_eq!(alphas(&pixmap, 0), [255, 255, 0, 0, 255, 255, 255, 255]);
        assert_eq!(alphas(&pixmap, 1), [0, 255, 0, 0, 255, 255, 255, 0]);
    }

    #[test]
    fn aa_clip_multiplies_coverage() {
        let mut clip = RasterClip::new(false);
        let device = IntRect::new(0, 0, 4, 2);
        let rect = Rect::new(0.5, 0.0, 4.0, 2.0);
        clip.op_rect(&rect, &Affine::IDENTITY, device, RegionOp::Replace, true);
        assert!(!clip.is_bw());

        let mut pixmap = Pixmap::new_n32(4, 2);
        let mut blitter =
            Blitter::N32Opaque(N32OpaqueBlitter::new(&mut pixmap, RED)).with_clip(&clip, &device);
        assert_eq!(blitter.kind(), BlitterKind::AaClip);
        blitter.blit_rect(0, 0, 4, 1);
        blitter.blit_anti_h(0, 1, &[CoverageRun::new(4, 128)]);
        drop(blitter);
        assert_eq!(alphas(&pixmap, 0), [128, 255, 255, 255]);
        assert_eq!(alphas(&pixmap, 1), [64, 128, 128, 128]);
    }

    #[test]
    fn aa_clip_masks() {
        let mut clip = RasterClip::new(false);
        clip.op_rect(
            &Rect::new(0.0, 0.0, 1.5, 1.0),
            &Affine::IDENTITY,
            IntRect::new(0, 0, 2, 1),
            RegionOp::Replace,
            true,
        );
        assert_eq!(clip.aa_clip().map(|aa| aa.coverage(1, 0)), Some(128));

        let mut pixmap = Pixmap::new_n32(2, 1);
        let bounds = IntRect::new(0, 0, 2, 1);
        let mut blitter =
            Blitter::N32Opaque(N32OpaqueBlitter::new(&mut pixmap, RED)).with_clip(&clip, &bounds);
        let mut mask = Mask::new(MaskFormat::Bw, bounds);
        mask.set_alpha(0, 0, 255);
        mask.set_alpha(1, 0, 255);
        blitter.blit_mask(&mask, &bounds);
        drop(blitter);
        assert_eq!(alphas(&pixmap, 0), [255, 128]);
    }
}

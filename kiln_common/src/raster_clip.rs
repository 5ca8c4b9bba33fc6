// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A clip that is either hard-edged or antialiased.

use crate::aa_clip::AaClip;
use crate::geom::IntRect;
use crate::kurbo::{Affine, BezPath, Rect, Shape};
use crate::peniko::Fill;
use crate::region::{Region, RegionOp};

/// The active representation of a [`RasterClip`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClipRepr {
    /// A hard-edged region.
    Bw(Region),
    /// A clip with per-pixel coverage.
    Aa(AaClip),
}

/// A device-space clip.
///
/// The clip stays a cheap [`Region`] as long as no antialiased edge has to be represented, and
/// turns back into one as soon as an antialiased clip is found to be a plain rectangle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterClip {
    repr: ClipRepr,
    force_conservative_rects: bool,
}

impl Default for RasterClip {
    fn default() -> Self {
        Self::new(false)
    }
}

/// What a conservative clip should do with an operation.
enum Conservative {
    /// Leave the clip as it is.
    DoNothing,
    /// Apply the (possibly rewritten) operation with the rounded-out rectangle.
    Continue(RegionOp),
}

/// Rewrite `op` for a clip that only tracks conservative rectangular bounds.
///
/// Difference can only shrink the clip, so ignoring it keeps the bounds conservative; the rest are
/// widened to operations that can only grow it.
fn mutate_conservative_op(op: RegionOp) -> Conservative {
    match op {
        RegionOp::Intersect | RegionOp::Union | RegionOp::Replace => Conservative::Continue(op),
        RegionOp::Difference => Conservative::DoNothing,
        RegionOp::ReverseDifference => Conservative::Continue(RegionOp::Replace),
        RegionOp::Xor => Conservative::Continue(RegionOp::Union),
    }
}

fn nearly_integral(x: f64) -> bool {
    const DOMAIN: f64 = 1.0 / 4.0;
    const HALF_DOMAIN: f64 = DOMAIN / 2.0;
    let x = x + HALF_DOMAIN;
    x - x.floor() < DOMAIN
}

fn is_scale_translate(matrix: &Affine) -> bool {
    let [_, b, c, _, _, _] = matrix.as_coeffs();
    b == 0.0 && c == 0.0
}

impl RasterClip {
    /// Create an empty clip.
    ///
    /// With `force_conservative_rects` the clip never becomes antialiased or complex; it keeps
    /// a rectangle that contains the exact result instead.
    pub fn new(force_conservative_rects: bool) -> Self {
        Self {
            repr: ClipRepr::Bw(Region::new()),
            force_conservative_rects,
        }
    }

    /// Create a hard-edged clip covering `rect`.
    pub fn from_rect(rect: IntRect) -> Self {
        let mut clip = Self::new(false);
        clip.set_rect(rect);
        clip
    }

    /// Whether the clip only tracks conservative rectangles.
    pub fn force_conservative_rects(&self) -> bool {
        self.force_conservative_rects
    }

    /// The active representation.
    pub fn repr(&self) -> &ClipRepr {
        &self.repr
    }

    /// Return whether the clip is hard-edged.
    pub fn is_bw(&self) -> bool {
        matches!(self.repr, ClipRepr::Bw(_))
    }

    /// The region of a hard-edged clip.
    pub fn bw_region(&self) -> Option<&Region> {
        match &self.repr {
            ClipRepr::Bw(region) => Some(region),
            ClipRepr::Aa(_) => None,
        }
    }

    /// The coverage of an antialiased clip.
    pub fn aa_clip(&self) -> Option<&AaClip> {
        match &self.repr {
            ClipRepr::Bw(_) => None,
            ClipRepr::Aa(aa) => Some(aa),
        }
    }

    /// Return whether no pixel passes the clip.
    pub fn is_empty(&self) -> bool {
        match &self.repr {
            ClipRepr::Bw(region) => region.is_empty(),
            ClipRepr::Aa(aa) => aa.is_empty(),
        }
    }

    /// Return whether the clip is one fully covered rectangle.
    pub fn is_rect(&self) -> bool {
        match &self.repr {
            ClipRepr::Bw(region) => region.is_rect(),
            ClipRepr::Aa(aa) => aa.is_rect(),
        }
    }

    /// Return whether the clip is neither empty nor a rectangle.
    pub fn is_complex(&self) -> bool {
        match &self.repr {
            ClipRepr::Bw(region) => region.is_complex(),
            ClipRepr::Aa(aa) => !aa.is_empty() && !aa.is_rect(),
        }
    }

    /// The bounding box of all pixels that pass the clip.
    pub fn bounds(&self) -> IntRect {
        match &self.repr {
            ClipRepr::Bw(region) => region.bounds(),
            ClipRepr::Aa(aa) => aa.bounds(),
        }
    }

    /// Make the clip empty. Always returns `false`.
    pub fn set_empty(&mut self) -> bool {
        self.repr = ClipRepr::Bw(Region::new());
        false
    }

    /// Make the clip the hard-edged rectangle `rect`. Returns whether the result is non-empty.
    pub fn set_rect(&mut self, rect: IntRect) -> bool {
        self.repr = ClipRepr::Bw(Region::from_rect(rect));
        !self.is_empty()
    }

    /// Make the clip the pixels of `region`. Returns whether the result is non-empty.
    pub fn set_region(&mut self, region: &Region) -> bool {
        self.repr = ClipRepr::Bw(region.clone());
        !self.is_empty()
    }

    /// Make the clip the device-space `path`, restricted to `clip`.
    pub fn set_path(&mut self, path: &BezPath, fill: Fill, clip: &Region, antialias: bool) -> bool {
        if self.force_conservative_rects {
            let ir = IntRect::from_rect_round_out(&path.bounding_box());
            self.repr = ClipRepr::Bw(Region::from_rect(ir));
            return self.op_region(clip, RegionOp::Intersect);
        }

        let mut aa = AaClip::new();
        aa.set_path(path, fill, clip, antialias);
        self.repr = if antialias {
            ClipRepr::Aa(aa)
        } else {
            ClipRepr::Bw(aa.to_region())
        };
        self.update_cache_and_return_non_empty()
    }

    /// Combine a rectangle, mapped to device space by `matrix`, into the clip.
    ///
    /// `device_bounds` limits the area a path has to be rasterized in when the mapped rectangle
    /// is not axis-aligned.
    pub fn op_rect(
        &mut self,
        rect: &Rect,
        matrix: &Affine,
        device_bounds: IntRect,
        op: RegionOp,
        antialias: bool,
    ) -> bool {
        if self.force_conservative_rects {
            let op = match mutate_conservative_op(op) {
                Conservative::DoNothing => return !self.is_empty(),
                Conservative::Continue(op) => op,
            };
            let ir = IntRect::from_rect_round_out(&matrix.transform_rect_bbox(*rect));
            return self.op_irect(ir, op);
        }

        if !is_scale_translate(matrix) {
            let path = *matrix * rect.to_path(0.1);
            return self.op_path(&path, Fill::NonZero, device_bounds, op, antialias);
        }

        let dev = matrix.transform_rect_bbox(*rect);
        let mut antialias = antialias;
        if self.is_bw()
            && antialias
            && [dev.x0, dev.y0, dev.x1, dev.y1]
                .into_iter()
                .all(nearly_integral)
        {
            antialias = false;
        }

        if !antialias {
            if let ClipRepr::Bw(region) = &mut self.repr {
                region.op_rect(IntRect::from_rect_round(&dev), op);
                return self.update_cache_and_return_non_empty();
            }
        }
        // Coverage is only rasterized where it can affect the result.
        let limit = self.aa_operand_limit(op, device_bounds).to_rect();
        let dev = dev.intersect(limit);
        let mut other = AaClip::new();
        if dev.width() > 0.0 && dev.height() > 0.0 {
            other.set_rect_aa(&dev, antialias);
        }
        self.with_aa(|aa| {
            aa.op(&other, op);
        });
        self.update_cache_and_return_non_empty()
    }

    /// Combine the hard-edged rectangle `rect` into the clip.
    pub fn op_irect(&mut self, rect: IntRect, op: RegionOp) -> bool {
        match &mut self.repr {
            ClipRepr::Bw(region) => {
                region.op_rect(rect, op);
            }
            ClipRepr::Aa(aa) => {
                aa.op_rect(rect, op);
            }
        }
        self.update_cache_and_return_non_empty()
    }

    /// Combine the pixels of `region` into the clip.
    pub fn op_region(&mut self, region: &Region, op: RegionOp) -> bool {
        match &mut self.repr {
            ClipRepr::Bw(bw) => {
                bw.op(region, op);
            }
            ClipRepr::Aa(aa) => {
                aa.op_region(region, op);
            }
        }
        self.update_cache_and_return_non_empty()
    }

    /// Combine another clip into this one.
    pub fn op_clip(&mut self, other: &Self, op: RegionOp) -> bool {
        match &other.repr {
            ClipRepr::Bw(other) => {
                if let ClipRepr::Bw(bw) = &mut self.repr {
                    bw.op(other, op);
                } else {
                    let mut tmp = AaClip::new();
                    tmp.set_region(other);
                    self.with_aa(|aa| {
                        aa.op(&tmp, op);
                    });
                }
            }
            ClipRepr::Aa(other) => self.with_aa(|aa| {
                aa.op(other, op);
            }),
        }
        self.update_cache_and_return_non_empty()
    }

    /// Combine a device-space path into the clip.
    pub fn op_path(
        &mut self,
        path: &BezPath,
        fill: Fill,
        device_bounds: IntRect,
        op: RegionOp,
        antialias: bool,
    ) -> bool {
        if self.force_conservative_rects {
            let op = match mutate_conservative_op(op) {
                Conservative::DoNothing => return !self.is_empty(),
                Conservative::Continue(op) => op,
            };
            let ir = IntRect::from_rect_round_out(&path.bounding_box());
            return self.op_irect(ir, op);
        }

        // The base region limits how much of the path gets rasterized.
        if op == RegionOp::Intersect {
            if self.is_rect() {
                let base = Region::from_rect(self.bounds());
                return self.set_path(path, fill, &base, antialias);
            }
            let base = Region::from_rect(self.bounds());
            let mut clip = Self::new(self.force_conservative_rects);
            clip.set_path(path, fill, &base, antialias);
            return self.op_clip(&clip, op);
        }

        let base = Region::from_rect(device_bounds);
        if op == RegionOp::Replace {
            return self.set_path(path, fill, &base, antialias);
        }
        let mut clip = Self::new(self.force_conservative_rects);
        clip.set_path(path, fill, &base, antialias);
        self.op_clip(&clip, op)
    }

    /// Move the clip by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        match &mut self.repr {
            ClipRepr::Bw(region) => region.translate(dx, dy),
            ClipRepr::Aa(aa) => aa.translate(dx, dy),
        }
    }

    /// Return whether `rect` is cheaply known to pass the clip entirely.
    pub fn quick_contains(&self, rect: &IntRect) -> bool {
        match &self.repr {
            ClipRepr::Bw(region) => region.quick_contains(rect),
            ClipRepr::Aa(aa) => aa.quick_contains(rect),
        }
    }

    /// Return whether `rect` is cheaply known to be clipped out entirely.
    pub fn quick_reject(&self, rect: &IntRect) -> bool {
        self.is_empty() || !self.bounds().intersects(rect)
    }

    /// The pixels outside of which a coverage operand cannot change the result of `op`.
    fn aa_operand_limit(&self, op: RegionOp, device_bounds: IntRect) -> IntRect {
        match op {
            RegionOp::Intersect | RegionOp::Difference => self.bounds(),
            _ => device_bounds.union(&self.bounds()),
        }
    }

    /// Run `f` on the clip's coverage, converting a hard-edged clip first.
    fn with_aa(&mut self, f: impl FnOnce(&mut AaClip)) {
        let mut aa = match core::mem::replace(&mut self.repr, ClipRepr::Bw(Region::new())) {
            ClipRepr::Bw(region) => {
                let mut aa = AaClip::new();
                aa.set_region(&region);
                aa
            }
            ClipRepr::Aa(aa) => aa,
        };
        f(&mut aa);
        self.repr = ClipRepr::Aa(aa);
    }

    fn update_cache_and_return_non_empty(&mut self) -> bool {
        if let ClipRepr::Aa(aa) = &self.repr {
            if aa.is_empty() {
                self.repr = ClipRepr::Bw(Region::new());
            } else if aa.is_rect() {
                self.repr = ClipRepr::Bw(Region::from_rect(aa.bounds()));
            }
        }
        !self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::RasterClip;
    use crate::geom::IntRect;
    use crate::kurbo::{Affine, Point, Rect};
    use crate::region::{Region, RegionOp};

    const DEVICE: IntRect = IntRect::new(0, 0, 100, 100);

    #[test]
    fn set_rect_is_bw_rect() {
        let mut clip = RasterClip::default();
        assert!(clip.set_rect(IntRect::new(2, 2, 6, 6)));
        assert!(clip.is_bw());
        assert!(!clip.is_empty());
        assert!(clip.bw_region().unwrap().is_rect());
    }

    #[test]
    fn nearly_integral_rect_stays_bw() {
        let mut clip = RasterClip::from_rect(DEVICE);
        let rect = Rect::new(10.05, 10.0, 20.0, 19.96);
        assert!(clip.op_rect(&rect, &Affine::IDENTITY, DEVICE, RegionOp::Intersect, true));
        assert!(clip.is_bw());
        assert_eq!(clip.bounds(), IntRect::new(10, 10, 20, 20));
    }

    #[test]
    fn fractional_rect_becomes_aa_and_back() {
        let mut clip = RasterClip::from_rect(DEVICE);
        let rect = Rect::new(10.5, 10.0, 20.0, 20.0);
        assert!(clip.op_rect(&rect, &Affine::IDENTITY, DEVICE, RegionOp::Intersect, true));
        assert!(!clip.is_bw());
        assert!(clip.is_complex());
        assert_eq!(clip.aa_clip().unwrap().coverage(10, 15), 128);

        assert!(clip.op_irect(IntRect::new(11, 11, 15, 15), RegionOp::Intersect));
        assert!(clip.is_bw());
        assert!(clip.is_rect());
    }

    #[test]
    fn rotated_rect_uses_coverage() {
        let mut clip = RasterClip::from_rect(DEVICE);
        let matrix = Affine::rotate_about(0.3, Point::new(50.0, 50.0));
        let rect = Rect::new(30.0, 30.0, 70.0, 70.0);
        assert!(clip.op_rect(&rect, &matrix, DEVICE, RegionOp::Intersect, true));
        assert!(!clip.is_bw());
        assert!(clip.quick_contains(&IntRect::new(45, 45, 55, 55)));
        assert!(!clip.quick_contains(&IntRect::new(28, 28, 32, 32)));
    }

    #[test]
    fn conservative_op_table() {
        let mut clip = RasterClip::new(true);
        clip.set_rect(IntRect::new(0, 0, 10, 10));
        let identity = Affine::IDENTITY;

        let hole = Rect::new(2.0, 2.0, 4.0, 4.0);
        assert!(clip.op_rect(&hole, &identity, DEVICE, RegionOp::Difference, true));
        assert_eq!(clip.bounds(), IntRect::new(0, 0, 10, 10));

        let far = Rect::new(20.0, 0.0, 30.0, 10.0);
        clip.op_rect(&far, &identity, DEVICE, RegionOp::Xor, true);
        assert!(clip.is_bw());
        assert!(clip.bw_region().unwrap().contains(25, 5));
        assert!(clip.bw_region().unwrap().contains(5, 5));

        let small = Rect::new(0.5, 0.5, 1.5, 1.5);
        clip.op_rect(&small, &identity, DEVICE, RegionOp::ReverseDifference, true);
        assert_eq!(clip.bounds(), IntRect::new(0, 0, 2, 2));
        assert!(clip.is_bw());
    }

    #[test]
    fn op_clip_mixes_representations() {
        let mut aa = RasterClip::from_rect(DEVICE);
        aa.op_rect(
            &Rect::new(0.5, 0.0, 10.0, 10.0),
            &Affine::IDENTITY,
            DEVICE,
            RegionOp::Intersect,
            true,
        );
        let mut bw = RasterClip::from_rect(IntRect::new(5, 0, 20, 10));
        bw.op_clip(&aa, RegionOp::Intersect);
        assert!(bw.is_bw());
        assert_eq!(bw.bounds(), IntRect::new(5, 0, 10, 10));

        let mut region = Region::from_rect(IntRect::new(0, 0, 4, 4));
        region.op_rect(IntRect::new(6, 6, 8, 8), RegionOp::Union);
        let mut clip = RasterClip::from_rect(DEVICE);
        clip.op_region(&region, RegionOp::Intersect);
        assert!(clip.is_complex());
        clip.translate(1, 1);
        assert_eq!(clip.bounds(), IntRect::new(1, 1, 9, 9));
        assert!(clip.quick_reject(&IntRect::new(50, 50, 60, 60)));
    }

    #[test]
    fn oversized_aa_rect_is_bounded() {
        let device = IntRect::new(0, 0, 10, 10);
        let huge = Rect::new(0.5, 0.5, 40000.5, 40000.5);

        let mut clip = RasterClip::from_rect(device);
        assert!(clip.op_rect(&huge, &Affine::IDENTITY, device, RegionOp::Intersect, true));
        assert_eq!(clip.bounds(), device);
        let aa = clip.aa_clip().unwrap();
        assert_eq!(aa.coverage(0, 0), 64);
        assert_eq!(aa.coverage(9, 9), 255);
        assert_eq!(aa.coverage(0, 5), 128);

        // Expanding ops stop at the device bounds.
        let mut clip = RasterClip::from_rect(IntRect::new(0, 0, 2, 2));
        clip.op_rect(&huge, &Affine::IDENTITY, device, RegionOp::Union, true);
        assert_eq!(clip.bounds(), device);
        assert_eq!(clip.aa_clip().unwrap().coverage(1, 0), 255);
        assert_eq!(clip.aa_clip().unwrap().coverage(5, 0), 128);

        let mut clip = RasterClip::from_rect(IntRect::new(2, 2, 4, 4));
        clip.op_rect(&huge, &Affine::IDENTITY, device, RegionOp::Xor, true);
        assert_eq!(clip.bounds(), device);
        assert_eq!(clip.aa_clip().unwrap().coverage(3, 3), 0);

        // Nothing to keep from an operand outside of an intersection.
        let mut clip = RasterClip::from_rect(device);
        let far = Rect::new(50000.5, 0.0, 90000.5, 10.0);
        assert!(!clip.op_rect(&far, &Affine::IDENTITY, device, RegionOp::Intersect, true));
    }
}

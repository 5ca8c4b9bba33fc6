// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Run-length encoded sets of pixels.
//!
//! A [`Region`] is either empty, a single rectangle, or a list of horizontal bands. Complex
//! regions store their bands in one flat run array:
//!
//! ```text
//! top, { bottom, interval_count, left, right, ..., SENTINEL }..., SENTINEL
//! ```
//!
//! Bands are sorted top to bottom and tile the vertical extent of the region without gaps; a
//! vertical gap is stored as a band with zero intervals. Within a band the `(left, right)`
//! intervals are sorted and never touch. Vertically adjacent bands with identical intervals are
//! always merged and empty bands never start or end the list, so two regions covering the same
//! pixels have identical encodings.

use crate::geom::IntRect;
use bands::{Band, BandWalker};
use smallvec::SmallVec;

/// The terminator of a band and of the whole run array.
///
/// It is larger than any legal coordinate.
pub const RUN_SENTINEL: i32 = i32::MAX;

/// A boolean operation combining two pixel sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionOp {
    /// Pixels in the first set but not in the second.
    Difference,
    /// Pixels in both sets.
    Intersect,
    /// Pixels in either set.
    Union,
    /// Pixels in exactly one of the sets.
    Xor,
    /// Pixels in the second set but not in the first.
    ReverseDifference,
    /// Exactly the pixels of the second set.
    Replace,
}

/// What a visitor passed to [`Region::for_each`] wants to happen next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    /// Visit the next rectangle.
    Continue,
    /// Skip the given number of rectangles, then continue.
    Skip(usize),
    /// Stop the iteration.
    Stop,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum RunHead {
    Empty,
    Rect,
    Complex(Vec<i32>),
}

/// A set of pixels stored as run-length encoded horizontal bands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    bounds: IntRect,
    runs: RunHead,
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}

impl Region {
    /// Create an empty region.
    pub const fn new() -> Self {
        Self {
            bounds: IntRect::EMPTY,
            runs: RunHead::Empty,
        }
    }

    /// Create a region covering `rect`, which is empty if `rect` is.
    pub fn from_rect(rect: IntRect) -> Self {
        let mut region = Self::new();
        region.set_rect(rect);
        region
    }

    /// Return whether the region contains no pixels.
    pub fn is_empty(&self) -> bool {
        matches!(self.runs, RunHead::Empty)
    }

    /// Return whether the region is exactly one non-empty rectangle.
    pub fn is_rect(&self) -> bool {
        matches!(self.runs, RunHead::Rect)
    }

    /// Return whether the region is neither empty nor a single rectangle.
    pub fn is_complex(&self) -> bool {
        matches!(self.runs, RunHead::Complex(_))
    }

    /// The bounding box of all contained pixels.
    pub fn bounds(&self) -> IntRect {
        self.bounds
    }

    /// The raw run array of a complex region.
    pub fn runs(&self) -> Option<&[i32]> {
        match &self.runs {
            RunHead::Complex(runs) => Some(runs),
            _ => None,
        }
    }

    /// Make the region empty.
    ///
    /// Always returns `false`, the emptiness of the result.
    pub fn set_empty(&mut self) -> bool {
        self.bounds = IntRect::EMPTY;
        self.runs = RunHead::Empty;
        false
    }

    /// Make the region the single rectangle `rect`.
    ///
    /// An empty rectangle makes the region empty. Returns whether the result is non-empty.
    pub fn set_rect(&mut self, rect: IntRect) -> bool {
        if rect.is_empty() || rect.right == RUN_SENTINEL || rect.bottom == RUN_SENTINEL {
            return self.set_empty();
        }
        self.bounds = rect;
        self.runs = RunHead::Rect;
        true
    }

    /// Make this region a copy of `other`. Returns whether the result is non-empty.
    pub fn set_region(&mut self, other: &Self) -> bool {
        self.clone_from(other);
        !self.is_empty()
    }

    /// Make the region the union of `rects`. Returns whether the result is non-empty.
    pub fn set_rects(&mut self, rects: &[IntRect]) -> bool {
        let bands = rects
            .iter()
            .filter(|r| !r.is_empty())
            .fold(Vec::new(), |acc, r| {
                combine(&acc, &[Band::from_rect(r)], RegionOp::Union)
            });
        *self = Self::from_bands(bands);
        !self.is_empty()
    }

    /// Combine `other` into this region. Returns whether the result is non-empty.
    pub fn op(&mut self, other: &Self, op: RegionOp) -> bool {
        let result = Self::oper(self, other, op);
        *self = result;
        !self.is_empty()
    }

    /// Combine `rect` into this region. Returns whether the result is non-empty.
    pub fn op_rect(&mut self, rect: IntRect, op: RegionOp) -> bool {
        self.op(&Self::from_rect(rect), op)
    }

    /// Make this region the combination of `a` and `b`. Returns whether the result is non-empty.
    pub fn set_op(&mut self, a: &Self, b: &Self, op: RegionOp) -> bool {
        *self = Self::oper(a, b, op);
        !self.is_empty()
    }

    fn oper(a: &Self, b: &Self, op: RegionOp) -> Self {
        match op {
            RegionOp::Replace => return b.clone(),
            RegionOp::ReverseDifference => return Self::oper(b, a, RegionOp::Difference),
            RegionOp::Intersect => {
                if a.is_empty() || b.is_empty() || !a.bounds.intersects(&b.bounds) {
                    return Self::new();
                }
                if a.is_rect() && b.is_rect() {
                    return a
                        .bounds
                        .intersect(&b.bounds)
                        .map_or_else(Self::new, Self::from_rect);
                }
                if a.is_rect() && a.bounds.contains_rect(&b.bounds) {
                    return b.clone();
                }
                if b.is_rect() && b.bounds.contains_rect(&a.bounds) {
                    return a.clone();
                }
            }
            RegionOp::Union => {
                if a.is_empty() {
                    return b.clone();
                }
                if b.is_empty() {
                    return a.clone();
                }
                if a.is_rect() && a.bounds.contains_rect(&b.bounds) {
                    return a.clone();
                }
                if b.is_rect() && b.bounds.contains_rect(&a.bounds) {
                    return b.clone();
                }
            }
            RegionOp::Difference => {
                if a.is_empty() {
                    return Self::new();
                }
                if b.is_empty() || !a.bounds.intersects(&b.bounds) {
                    return a.clone();
                }
                if b.is_rect() && b.bounds.contains_rect(&a.bounds) {
                    return Self::new();
                }
            }
            RegionOp::Xor => {
                if a.is_empty() {
                    return b.clone();
                }
                if b.is_empty() {
                    return a.clone();
                }
            }
        }

        Self::from_bands(combine(&a.to_bands(), &b.to_bands(), op))
    }

    /// Move the region by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        match &self.runs {
            RunHead::Empty => {}
            RunHead::Rect => self.bounds = self.bounds.offset(dx, dy),
            RunHead::Complex(_) => {
                let bands = self
                    .to_bands()
                    .into_iter()
                    .map(|mut band| {
                        band.top = shift(band.top, dy);
                        band.bottom = shift(band.bottom, dy);
                        band.xs.iter_mut().for_each(|x| *x = shift(*x, dx));
                        band
                    })
                    .collect();
                *self = Self::from_bands(bands);
            }
        }
    }

    /// Return whether the pixel at `(x, y)` is in the region.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        if !self.bounds.contains(x, y) {
            return false;
        }
        match &self.runs {
            RunHead::Empty => false,
            RunHead::Rect => true,
            RunHead::Complex(runs) => BandWalker::new(runs)
                .find(|band| y < band.bottom)
                .is_some_and(|band| {
                    band.xs
                        .chunks_exact(2)
                        .any(|span| span[0] <= x && x < span[1])
                }),
        }
    }

    /// Return whether every pixel of `rect` is in the region.
    ///
    /// An empty rectangle is never contained.
    pub fn contains_rect(&self, rect: &IntRect) -> bool {
        if !self.bounds.contains_rect(rect) {
            return false;
        }
        match &self.runs {
            RunHead::Empty => false,
            RunHead::Rect => true,
            RunHead::Complex(runs) => BandWalker::new(runs)
                .skip_while(|band| band.bottom <= rect.top)
                .take_while(|band| band.top < rect.bottom)
                .all(|band| {
                    band.xs
                        .chunks_exact(2)
                        .any(|span| span[0] <= rect.left && rect.right <= span[1])
                }),
        }
    }

    /// Return whether at least one pixel of `rect` is in the region.
    pub fn intersects_rect(&self, rect: &IntRect) -> bool {
        !self.quick_reject(rect) && self.cliperator(*rect).next().is_some()
    }

    /// Return whether `rect` is cheaply known to be inside the region.
    ///
    /// This only succeeds for rectangular regions; a `false` result is inconclusive.
    pub fn quick_contains(&self, rect: &IntRect) -> bool {
        self.is_rect() && self.bounds.contains_rect(rect)
    }

    /// Return whether `rect` is cheaply known to be outside the region.
    pub fn quick_reject(&self, rect: &IntRect) -> bool {
        self.is_empty() || rect.is_empty() || !self.bounds.intersects(rect)
    }

    /// The number of rectangles the region iterates as.
    pub fn rect_count(&self) -> usize {
        match &self.runs {
            RunHead::Empty => 0,
            RunHead::Rect => 1,
            RunHead::Complex(runs) => BandWalker::new(runs).map(|band| band.xs.len() / 2).sum(),
        }
    }

    /// Iterate over the rectangles of the region, top to bottom, then left to right.
    pub fn iter(&self) -> Iter<'_> {
        let state = match &self.runs {
            RunHead::Empty => IterState::Done,
            RunHead::Rect => IterState::Rect(self.bounds),
            RunHead::Complex(runs) => IterState::Runs {
                bands: BandWalker::new(runs),
                band: None,
                idx: 0,
            },
        };
        Iter { state }
    }

    /// Iterate over the rectangles of the region intersected with `clip`.
    pub fn cliperator(&self, clip: IntRect) -> Cliperator<'_> {
        let iter = if self.quick_reject(&clip) {
            Iter {
                state: IterState::Done,
            }
        } else {
            self.iter()
        };
        Cliperator { iter, clip }
    }

    /// Iterate over the spans of scanline `y` that fall inside `[left, right)`.
    pub fn spanerator(&self, y: i32, left: i32, right: i32) -> Spanerator<'_> {
        let row = IntRect::new(left, y, right, y + 1);
        let source = if self.quick_reject(&row) {
            SpanSource::Done
        } else {
            match &self.runs {
                RunHead::Empty => SpanSource::Done,
                RunHead::Rect => SpanSource::One(self.bounds.left, self.bounds.right),
                RunHead::Complex(runs) => BandWalker::new(runs)
                    .find(|band| y < band.bottom)
                    .map_or(SpanSource::Done, |band| SpanSource::Slice(band.xs)),
            }
        };
        Spanerator {
            source,
            idx: 0,
            left,
            right,
        }
    }

    /// Visit every rectangle in iteration order until the visitor asks to stop.
    ///
    /// Returns `true` if every rectangle was offered to the visitor or skipped, and `false` if
    /// the visitor stopped early.
    pub fn for_each(&self, mut visitor: impl FnMut(IntRect) -> Visit) -> bool {
        let mut iter = self.iter();
        while let Some(rect) = iter.next() {
            match visitor(rect) {
                Visit::Continue => {}
                Visit::Skip(n) => {
                    if n > 0 {
                        _ = iter.nth(n - 1);
                    }
                }
                Visit::Stop => return false,
            }
        }
        true
    }

    pub(crate) fn to_bands(&self) -> Vec<Band> {
        match &self.runs {
            RunHead::Empty => Vec::new(),
            RunHead::Rect => vec![Band::from_rect(&self.bounds)],
            RunHead::Complex(runs) => BandWalker::new(runs)
                .map(|band| Band {
                    top: band.top,
                    bottom: band.bottom,
                    xs: SmallVec::from_slice(band.xs),
                })
                .collect(),
        }
    }

    /// Build a canonical region from bands sorted by `top` that do not overlap vertically.
    pub(crate) fn from_bands(bands: Vec<Band>) -> Self {
        let mut merged: Vec<Band> = Vec::with_capacity(bands.len());
        for band in bands.into_iter().filter(|b| b.top < b.bottom) {
            if let Some(last) = merged.last_mut() {
                if last.bottom < band.top {
                    if last.xs.is_empty() {
                        last.bottom = band.top;
                    } else {
                        let gap = Band {
                            top: last.bottom,
                            bottom: band.top,
                            xs: SmallVec::new(),
                        };
                        merged.push(gap);
                    }
                }
            }
            match merged.last_mut() {
                Some(last) if last.bottom == band.top && last.xs == band.xs => {
                    last.bottom = band.bottom;
                }
                _ => merged.push(band),
            }
        }

        let first = merged.iter().position(|b| !b.xs.is_empty());
        let last = merged.iter().rposition(|b| !b.xs.is_empty());
        let (Some(first), Some(last)) = (first, last) else {
            return Self::new();
        };
        let merged = &merged[first..=last];

        if let [band] = merged {
            if let [left, right] = band.xs[..] {
                return Self::from_rect(IntRect::new(left, band.top, right, band.bottom));
            }
        }

        let mut left = i32::MAX;
        let mut right = i32::MIN;
        let mut runs = Vec::with_capacity(2 + merged.iter().map(|b| b.xs.len() + 3).sum::<usize>());
        runs.push(merged[0].top);
        for band in merged {
            if let (Some(l), Some(r)) = (band.xs.first(), band.xs.last()) {
                left = left.min(*l);
                right = right.max(*r);
            }
            runs.push(band.bottom);
            runs.push((band.xs.len() / 2) as i32);
            runs.extend_from_slice(&band.xs);
            runs.push(RUN_SENTINEL);
        }
        runs.push(RUN_SENTINEL);

        Self {
            bounds: IntRect::new(left, merged[0].top, right, merged[merged.len() - 1].bottom),
            runs: RunHead::Complex(runs),
        }
    }
}

impl<'a> IntoIterator for &'a Region {
    type Item = IntRect;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn shift(v: i32, d: i32) -> i32 {
    v.saturating_add(d).min(RUN_SENTINEL - 1)
}

/// The inclusive range of membership codes kept by each operation.
///
/// A code is `1` for pixels only in the first operand, `2` for pixels only in the second and `3`
/// for pixels in both.
const fn op_min_max(op: RegionOp) -> (u8, u8) {
    match op {
        RegionOp::Difference => (1, 1),
        RegionOp::Intersect => (3, 3),
        RegionOp::Union => (1, 3),
        RegionOp::Xor => (1, 2),
        // Both are rewritten before reaching the band merge.
        RegionOp::ReverseDifference => (2, 2),
        RegionOp::Replace => (2, 3),
    }
}

/// Merge two band lists scanline band by scanline band.
fn combine(a: &[Band], b: &[Band], op: RegionOp) -> Vec<Band> {
    let (min, max) = op_min_max(op);
    let mut ys: Vec<i32> = a
        .iter()
        .chain(b)
        .flat_map(|band| [band.top, band.bottom])
        .collect();
    ys.sort_unstable();
    ys.dedup();

    let mut out = Vec::with_capacity(ys.len());
    let (mut ia, mut ib) = (0, 0);
    for w in ys.windows(2) {
        let (top, bottom) = (w[0], w[1]);
        while ia < a.len() && a[ia].bottom <= top {
            ia += 1;
        }
        while ib < b.len() && b[ib].bottom <= top {
            ib += 1;
        }
        let xa = a.get(ia).filter(|band| band.top <= top).map_or(&[][..], |band| &band.xs[..]);
        let xb = b.get(ib).filter(|band| band.top <= top).map_or(&[][..], |band| &band.xs[..]);
        out.push(Band {
            top,
            bottom,
            xs: operate_on_span(xa, xb, min, max),
        });
    }
    out
}

/// Combine the intervals of one band of each operand.
fn operate_on_span(a: &[i32], b: &[i32], min: u8, max: u8) -> SmallVec<[i32; 8]> {
    let mut out: SmallVec<[i32; 8]> = SmallVec::new();
    let mut xs: SmallVec<[i32; 16]> = a.iter().chain(b).copied().collect();
    xs.sort_unstable();
    xs.dedup();

    let (mut ia, mut ib) = (0, 0);
    for w in xs.windows(2) {
        let (x0, x1) = (w[0], w[1]);
        while ia + 1 < a.len() && a[ia + 1] <= x0 {
            ia += 2;
        }
        while ib + 1 < b.len() && b[ib + 1] <= x0 {
            ib += 2;
        }
        let in_a = ia + 1 < a.len() && a[ia] <= x0;
        let in_b = ib + 1 < b.len() && b[ib] <= x0;
        let code = u8::from(in_a) | (u8::from(in_b) << 1);
        if (min..=max).contains(&code) {
            match out.last_mut() {
                Some(last) if *last == x0 => *last = x1,
                _ => out.extend([x0, x1]),
            }
        }
    }
    out
}

/// Iterator over the rectangles of a [`Region`].
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    state: IterState<'a>,
}

#[derive(Clone, Debug)]
enum IterState<'a> {
    Done,
    Rect(IntRect),
    Runs {
        bands: BandWalker<'a>,
        band: Option<bands::BandRef<'a>>,
        idx: usize,
    },
}

impl Iterator for Iter<'_> {
    type Item = IntRect;

    fn next(&mut self) -> Option<IntRect> {
        match &mut self.state {
            IterState::Done => None,
            IterState::Rect(rect) => {
                let rect = *rect;
                self.state = IterState::Done;
                Some(rect)
            }
            IterState::Runs { bands, band, idx } => loop {
                if let Some(current) = band {
                    if *idx + 1 < current.xs.len() {
                        let rect = IntRect::new(
                            current.xs[*idx],
                            current.top,
                            current.xs[*idx + 1],
                            current.bottom,
                        );
                        *idx += 2;
                        return Some(rect);
                    }
                }
                *band = Some(bands.next()?);
                *idx = 0;
            },
        }
    }
}

/// Iterator over the rectangles of a [`Region`] clipped to a rectangle.
#[derive(Clone, Debug)]
pub struct Cliperator<'a> {
    iter: Iter<'a>,
    clip: IntRect,
}

impl Iterator for Cliperator<'_> {
    type Item = IntRect;

    fn next(&mut self) -> Option<IntRect> {
        for rect in self.iter.by_ref() {
            if rect.top >= self.clip.bottom {
                break;
            }
            if let Some(clipped) = rect.intersect(&self.clip) {
                return Some(clipped);
            }
        }
        self.iter.state = IterState::Done;
        None
    }
}

#[derive(Clone, Copy, Debug)]
enum SpanSource<'a> {
    Done,
    One(i32, i32),
    Slice(&'a [i32]),
}

/// Iterator over the `(left, right)` spans of one scanline of a [`Region`].
#[derive(Clone, Debug)]
pub struct Spanerator<'a> {
    source: SpanSource<'a>,
    idx: usize,
    left: i32,
    right: i32,
}

impl Iterator for Spanerator<'_> {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        loop {
            let (l, r) = match self.source {
                SpanSource::Done => return None,
                SpanSource::One(l, r) => {
                    self.source = SpanSource::Done;
                    (l, r)
                }
                SpanSource::Slice(xs) => {
                    let span = xs.get(self.idx..self.idx + 2)?;
                    self.idx += 2;
                    (span[0], span[1])
                }
            };
            if l >= self.right {
                self.source = SpanSource::Done;
                return None;
            }
            let (l, r) = (l.max(self.left), r.min(self.right));
            if l < r {
                return Some((l, r));
            }
        }
    }
}

/// Owned bands used while combining, and borrowed ones used while walking a run array.
pub(crate) mod bands {
    use super::RUN_SENTINEL;
    use crate::geom::IntRect;
    use smallvec::{smallvec, SmallVec};

    /// An owned horizontal band.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) struct Band {
        pub(crate) top: i32,
        pub(crate) bottom: i32,
        /// Sorted `left, right` pairs.
        pub(crate) xs: SmallVec<[i32; 8]>,
    }

    impl Band {
        pub(crate) fn from_rect(rect: &IntRect) -> Self {
            Self {
                top: rect.top,
                bottom: rect.bottom,
                xs: smallvec![rect.left, rect.right],
            }
        }
    }

    /// A band borrowed from a run array.
    #[derive(Clone, Copy, Debug)]
    pub(crate) struct BandRef<'a> {
        pub(crate) top: i32,
        pub(crate) bottom: i32,
        pub(crate) xs: &'a [i32],
    }

    /// Walks the bands of a run array.
    #[derive(Clone, Debug)]
    pub(crate) struct BandWalker<'a> {
        runs: &'a [i32],
        top: i32,
        pos: usize,
    }

    impl<'a> BandWalker<'a> {
        pub(crate) fn new(runs: &'a [i32]) -> Self {
            Self {
                runs,
                top: runs.first().copied().unwrap_or(RUN_SENTINEL),
                pos: 1,
            }
        }
    }

    impl<'a> Iterator for BandWalker<'a> {
        type Item = BandRef<'a>;

        fn next(&mut self) -> Option<BandRef<'a>> {
            let bottom = *self.runs.get(self.pos)?;
            if bottom == RUN_SENTINEL {
                return None;
            }
            let count = usize::try_from(*self.runs.get(self.pos + 1)?).ok()?;
            let start = self.pos + 2;
            let xs = self.runs.get(start..start + 2 * count)?;
            let band = BandRef {
                top: self.top,
                bottom,
                xs,
            };
            self.top = bottom;
            // Step over the intervals and the band's sentinel.
            self.pos = start + 2 * count + 1;
            Some(band)
        }
    }
}

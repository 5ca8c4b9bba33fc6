// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Antialiased clips.
//!
//! An [`AaClip`] stores 8-bit coverage for every pixel inside its bounds. Each stored row is a
//! list of `(count, alpha)` byte pairs whose counts add up to the clip width, and consecutive
//! identical rows are stored once, tagged with the last scanline that shares them. Builders trim
//! fully transparent rows and columns so the bounds are always tight.

use crate::coverage;
use crate::geom::IntRect;
use crate::kurbo::{BezPath, Rect, Shape};
use crate::mask::{Mask, MaskFormat};
use crate::peniko::Fill;
use crate::region::bands::Band;
use crate::region::{Region, RegionOp};
use crate::util::mul_255;
use log::warn;
use smallvec::SmallVec;

#[derive(Clone, Debug, PartialEq, Eq)]
struct YOffset {
    /// The last scanline sharing this row, relative to the top of the bounds.
    y: i32,
    /// Byte offset of the row in `RunHead::data`.
    offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct RunHead {
    y_offsets: Vec<YOffset>,
    data: Vec<u8>,
}

/// A clip carrying 8-bit coverage per pixel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AaClip {
    bounds: IntRect,
    run_head: Option<RunHead>,
}

impl AaClip {
    /// Create an empty clip.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return whether no pixel has any coverage.
    pub fn is_empty(&self) -> bool {
        self.run_head.is_none()
    }

    /// Return whether every pixel in the bounds is fully covered.
    ///
    /// Such a clip can be replaced by its bounding rectangle.
    pub fn is_rect(&self) -> bool {
        self.run_head.as_ref().is_some_and(|head| {
            head.y_offsets.len() == 1 && head.data.chunks_exact(2).all(|run| run[1] == 0xFF)
        })
    }

    /// The bounding box of all pixels with non-zero coverage.
    pub fn bounds(&self) -> IntRect {
        self.bounds
    }

    /// Make the clip empty. Always returns `false`.
    pub fn set_empty(&mut self) -> bool {
        self.bounds = IntRect::EMPTY;
        self.run_head = None;
        false
    }

    /// Make the clip a fully covered rectangle. Returns whether the result is non-empty.
    pub fn set_rect(&mut self, rect: IntRect) -> bool {
        if rect.is_empty() {
            return self.set_empty();
        }
        let mut data = Vec::new();
        push_run(&mut data, rect.width() as usize, 0xFF);
        self.bounds = rect;
        self.run_head = Some(RunHead {
            y_offsets: vec![YOffset {
                y: rect.height() - 1,
                offset: 0,
            }],
            data,
        });
        true
    }

    /// Make the clip cover `rect`, with partial coverage along fractional edges if `antialias`.
    pub fn set_rect_aa(&mut self, rect: &Rect, antialias: bool) -> bool {
        let rounded = IntRect::from_rect_round(rect);
        if !antialias || rounded.to_rect() == *rect {
            return self.set_rect(rounded);
        }
        let clip = Region::from_rect(IntRect::from_rect_round_out(rect));
        self.set_path(&rect.to_path(0.1), Fill::NonZero, &clip, true)
    }

    /// Make the clip cover exactly the pixels of `region`.
    pub fn set_region(&mut self, region: &Region) -> bool {
        if region.is_empty() {
            return self.set_empty();
        }
        if region.is_rect() {
            return self.set_rect(region.bounds());
        }
        let window = region.bounds();
        let width = window.width() as usize;
        let mut dense = vec![0_u8; width * window.height() as usize];
        for rect in region {
            for y in rect.top..rect.bottom {
                let row = (y - window.top) as usize * width;
                let start = row + (rect.left - window.left) as usize;
                let end = row + (rect.right - window.left) as usize;
                dense[start..end].fill(0xFF);
            }
        }
        *self = Self::from_dense(window, &dense);
        !self.is_empty()
    }

    /// Rasterize `path` restricted to `clip`.
    ///
    /// With `antialias` edges get fractional coverage; otherwise a pixel is covered when its
    /// centre is inside the path.
    pub fn set_path(&mut self, path: &BezPath, fill: Fill, clip: &Region, antialias: bool) -> bool {
        if clip.is_empty() {
            return self.set_empty();
        }
        let path_bounds = path.bounding_box();
        if !path_bounds.is_finite() {
            warn!("ignoring a clip path with non-finite bounds");
            return self.set_empty();
        }
        let Some(window) = IntRect::from_rect_round_out(&path_bounds).intersect(&clip.bounds())
        else {
            return self.set_empty();
        };

        let mut dense = coverage::rasterize(path, fill, window, antialias);
        if !clip.is_rect() {
            let width = window.width() as usize;
            for (y, row) in (window.top..).zip(dense.chunks_exact_mut(width)) {
                let mut x = window.left;
                for (l, r) in clip.spanerator(y, window.left, window.right) {
                    row[(x - window.left) as usize..(l - window.left) as usize].fill(0);
                    x = r;
                }
                row[(x - window.left) as usize..].fill(0);
            }
        }

        *self = Self::from_dense(window, &dense);
        !self.is_empty()
    }

    /// Combine `other` into this clip. Returns whether the result is non-empty.
    pub fn op(&mut self, other: &Self, op: RegionOp) -> bool {
        *self = Self::oper(self, other, op);
        !self.is_empty()
    }

    /// Combine a fully covered rectangle into this clip.
    pub fn op_rect(&mut self, rect: IntRect, op: RegionOp) -> bool {
        let mut other = Self::new();
        other.set_rect(rect);
        self.op(&other, op)
    }

    /// Combine the pixels of `region` into this clip.
    pub fn op_region(&mut self, region: &Region, op: RegionOp) -> bool {
        let mut other = Self::new();
        other.set_region(region);
        self.op(&other, op)
    }

    /// Make this clip the combination of `a` and `b`.
    pub fn set_op(&mut self, a: &Self, b: &Self, op: RegionOp) -> bool {
        *self = Self::oper(a, b, op);
        !self.is_empty()
    }

    fn oper(a: &Self, b: &Self, op: RegionOp) -> Self {
        let (window, combine): (IntRect, fn(u8, u8) -> u8) = match op {
            RegionOp::Replace => return b.clone(),
            RegionOp::ReverseDifference => return Self::oper(b, a, RegionOp::Difference),
            RegionOp::Intersect => match a.bounds.intersect(&b.bounds) {
                Some(window) if !a.is_empty() && !b.is_empty() => (window, mul_255),
                _ => return Self::new(),
            },
            RegionOp::Difference => {
                if a.is_empty() {
                    return Self::new();
                }
                if b.is_empty() || !a.bounds.intersects(&b.bounds) {
                    return a.clone();
                }
                (a.bounds, |a, b| mul_255(a, 0xFF - b))
            }
            RegionOp::Union | RegionOp::Xor => {
                if a.is_empty() {
                    return b.clone();
                }
                if b.is_empty() {
                    return a.clone();
                }
                let window = a.bounds.union(&b.bounds);
                if op == RegionOp::Union {
                    (window, |a, b| {
                        (u16::from(a) + u16::from(b) - u16::from(mul_255(a, b))) as u8
                    })
                } else {
                    (window, |a, b| {
                        (u16::from(a) + u16::from(b) - 2 * u16::from(mul_255(a, b))) as u8
                    })
                }
            }
        };

        let width = window.width() as usize;
        let mut dense = vec![0_u8; width * window.height() as usize];
        let mut row_a = vec![0_u8; width];
        let mut row_b = vec![0_u8; width];
        for (y, out) in (window.top..).zip(dense.chunks_exact_mut(width)) {
            a.expand_row(y, window.left, &mut row_a);
            b.expand_row(y, window.left, &mut row_b);
            for ((o, &ca), &cb) in out.iter_mut().zip(&row_a).zip(&row_b) {
                *o = combine(ca, cb);
            }
        }
        Self::from_dense(window, &dense)
    }

    /// Move the clip by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        if !self.is_empty() {
            self.bounds = self.bounds.offset(dx, dy);
        }
    }

    /// Find the stored row for scanline `y`.
    ///
    /// Returns the row's `(count, alpha)` pairs and the last scanline that shares the row, so
    /// callers can reuse one lookup for a whole run of identical scanlines.
    pub fn find_row(&self, y: i32) -> Option<(&[u8], i32)> {
        let head = self.run_head.as_ref()?;
        if y < self.bounds.top || y >= self.bounds.bottom {
            return None;
        }
        let rel = y - self.bounds.top;
        let idx = head.y_offsets.partition_point(|yo| yo.y < rel);
        let yo = head.y_offsets.get(idx)?;
        let end = head
            .y_offsets
            .get(idx + 1)
            .map_or(head.data.len(), |next| next.offset);
        Some((&head.data[yo.offset..end], self.bounds.top + yo.y))
    }

    /// Find the run covering column `x` in `row`.
    ///
    /// Returns the byte index of the run's `(count, alpha)` pair and how many pixels of the run
    /// remain starting at `x`. A column right of the bounds yields `(row.len(), 0)`.
    pub fn find_x(&self, row: &[u8], x: i32) -> (usize, usize) {
        let mut rel = (x - self.bounds.left).max(0) as usize;
        for (i, run) in row.chunks_exact(2).enumerate() {
            let n = usize::from(run[0]);
            if rel < n {
                return (i * 2, n - rel);
            }
            rel -= n;
        }
        (row.len(), 0)
    }

    /// The coverage of pixel `(x, y)`; zero outside the bounds.
    pub fn coverage(&self, x: i32, y: i32) -> u8 {
        if !self.bounds.contains(x, y) {
            return 0;
        }
        let Some((row, _)) = self.find_row(y) else {
            return 0;
        };
        let (idx, _) = self.find_x(row, x);
        row.get(idx + 1).copied().unwrap_or(0)
    }

    /// Return whether every pixel of `rect` has full coverage.
    pub fn quick_contains(&self, rect: &IntRect) -> bool {
        if self.is_empty() || !self.bounds.contains_rect(rect) {
            return false;
        }
        if self.is_rect() {
            return true;
        }
        let mut y = rect.top;
        while y < rect.bottom {
            let Some((row, last_y)) = self.find_row(y) else {
                return false;
            };
            let (mut idx, mut n) = self.find_x(row, rect.left);
            let mut remaining = (rect.right - rect.left) as usize;
            loop {
                if row.get(idx + 1) != Some(&0xFF) {
                    return false;
                }
                if n >= remaining {
                    break;
                }
                remaining -= n;
                idx += 2;
                n = row.get(idx).map_or(0, |&c| usize::from(c));
            }
            y = last_y + 1;
        }
        true
    }

    /// Expand the coverage of scanline `y` into `out`, starting at column `left`.
    pub fn expand_row(&self, y: i32, left: i32, out: &mut [u8]) {
        out.fill(0);
        let Some((row, _)) = self.find_row(y) else {
            return;
        };
        let mut x = self.bounds.left - left;
        for run in row.chunks_exact(2) {
            let n = i32::from(run[0]);
            let start = x.clamp(0, out.len() as i32) as usize;
            let end = (x + n).clamp(0, out.len() as i32) as usize;
            out[start..end].fill(run[1]);
            x += n;
        }
    }

    /// Expand into a dense A8 mask covering the bounds.
    pub fn copy_to_mask(&self) -> Mask {
        let mut mask = Mask::new(MaskFormat::A8, self.bounds);
        if self.is_empty() {
            return mask;
        }
        let width = mask.row_bytes();
        let left = self.bounds.left;
        for (y, row) in (self.bounds.top..).zip(mask.image_mut().chunks_exact_mut(width)) {
            self.expand_row(y, left, row);
        }
        mask
    }

    /// The pixels that have full coverage.
    pub fn to_region(&self) -> Region {
        let Some(head) = &self.run_head else {
            return Region::new();
        };
        let mut top = self.bounds.top;
        let mut bands = Vec::with_capacity(head.y_offsets.len());
        for (i, yo) in head.y_offsets.iter().enumerate() {
            let end = head
                .y_offsets
                .get(i + 1)
                .map_or(head.data.len(), |next| next.offset);
            let mut xs: SmallVec<[i32; 8]> = SmallVec::new();
            let mut x = self.bounds.left;
            for run in head.data[yo.offset..end].chunks_exact(2) {
                let next = x + i32::from(run[0]);
                if run[1] == 0xFF {
                    match xs.last_mut() {
                        Some(last) if *last == x => *last = next,
                        _ => xs.extend([x, next]),
                    }
                }
                x = next;
            }
            let bottom = self.bounds.top + yo.y + 1;
            bands.push(Band { top, bottom, xs });
            top = bottom;
        }
        Region::from_bands(bands)
    }

    /// Build a trimmed clip from one coverage byte per pixel of `window`.
    pub fn from_dense(window: IntRect, data: &[u8]) -> Self {
        if window.is_empty() {
            return Self::new();
        }
        let width = window.width() as usize;
        let rows: Vec<&[u8]> = data.chunks_exact(width).collect();
        let non_zero = |row: &&[u8]| row.iter().any(|&c| c != 0);
        let (Some(first), Some(last)) = (
            rows.iter().position(non_zero),
            rows.iter().rposition(non_zero),
        ) else {
            return Self::new();
        };
        let rows = &rows[first..=last];
        let left = rows
            .iter()
            .filter_map(|row| row.iter().position(|&c| c != 0))
            .min()
            .unwrap_or(0);
        let right = rows
            .iter()
            .filter_map(|row| row.iter().rposition(|&c| c != 0))
            .max()
            .map_or(width, |r| r + 1);

        let mut head = RunHead {
            y_offsets: Vec::new(),
            data: Vec::new(),
        };
        let mut scratch = Vec::new();
        for (rel, row) in rows.iter().enumerate() {
            scratch.clear();
            encode_row(&row[left..right], &mut scratch);
            match head.y_offsets.last_mut() {
                Some(prev) if head.data[prev.offset..] == scratch[..] => prev.y += 1,
                _ => {
                    head.y_offsets.push(YOffset {
                        y: rel as i32,
                        offset: head.data.len(),
                    });
                    head.data.extend_from_slice(&scratch);
                }
            }
        }

        Self {
            bounds: IntRect::new(
                window.left + left as i32,
                window.top + first as i32,
                window.left + right as i32,
                window.top + last as i32 + 1,
            ),
            run_head: Some(head),
        }
    }
}

/// Append `count` pixels of `alpha`, splitting counts above 255.
fn push_run(data: &mut Vec<u8>, mut count: usize, alpha: u8) {
    while count > 0 {
        let n = count.min(255);
        data.extend([n as u8, alpha]);
        count -= n;
    }
}

fn encode_row(row: &[u8], out: &mut Vec<u8>) {
    let mut iter = row.iter().peekable();
    while let Some(&alpha) = iter.next() {
        let mut count = 1;
        while iter.next_if_eq(&&alpha).is_some() {
            count += 1;
        }
        push_run(out, count, alpha);
    }
}

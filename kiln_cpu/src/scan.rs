// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scan conversion of rectangles, hairlines and paths into blitter calls.
//!
//! Every function takes the bounds of the clip so it can skip work outside of it. The blitter
//! is expected to enforce the exact clip shape itself (see [`Blitter::with_clip`]).
//!
//! [`Blitter::with_clip`]: crate::blitter::Blitter::with_clip

use crate::blitter::{Blit, CoverageRun};
use kiln_common::aa_clip::AaClip;
use kiln_common::geom::IntRect;
use kiln_common::kurbo::{BezPath, Point, Rect, Shape, Vec2};
use kiln_common::mask::Mask;
use kiln_common::peniko::Fill;
use kiln_common::region::{Region, RegionOp};

/// 24.8 fixed point.
type Fixed = i32;

const FIXED_ONE: Fixed = 256;

fn to_fixed(v: f64) -> Fixed {
    // Keep a margin so that adding one pixel cannot overflow.
    (v * 256.0).round().clamp(-(1 << 30) as f64, (1 << 30) as f64) as Fixed
}

/// Map a coverage in `0..=256` to an alpha in `0..=255`.
fn coverage_to_alpha(coverage: i32) -> u8 {
    (coverage - (coverage >> 8)).clamp(0, 255) as u8
}

/// Fill the pixels of `rect` inside `clip`.
pub fn fill_irect(rect: &IntRect, clip: &IntRect, blitter: &mut impl Blit) {
    if let Some(r) = rect.intersect(clip) {
        blitter.blit_rect(r.left, r.top, r.width() as u32, r.height() as u32);
    }
}

/// Fill the pixels whose centres lie inside `rect`.
pub fn fill_rect(rect: &Rect, clip: &IntRect, blitter: &mut impl Blit) {
    let rect = rect.abs();
    if !rect.is_finite() {
        return;
    }
    fill_irect(&IntRect::from_rect_round(&rect), clip, blitter);
}

/// Fill `rect` with partial coverage along fractional edges.
pub fn anti_fill_rect(rect: &Rect, clip: &IntRect, blitter: &mut impl Blit) {
    let rect = rect.abs();
    if !rect.is_finite() || clip.is_empty() {
        return;
    }
    let rect = rect.intersect(clip.to_rect());
    if rect.width() <= 0.0 || rect.height() <= 0.0 {
        return;
    }
    fill_fixed(
        to_fixed(rect.x0),
        to_fixed(rect.y0),
        to_fixed(rect.x1),
        to_fixed(rect.y1),
        blitter,
        true,
    );
}

/// Fill a 24.8 rectangle, leaving out the fully covered interior unless `fill_inner`.
fn fill_fixed(l: Fixed, t: Fixed, r: Fixed, b: Fixed, blitter: &mut impl Blit, fill_inner: bool) {
    if l >= r || t >= b {
        return;
    }
    let mut top = t >> 8;
    if top == (b - 1) >> 8 {
        // Only one row high.
        fixed_row(l, top, r, b - t, blitter);
        return;
    }
    if t & 0xFF != 0 {
        fixed_row(l, top, r, FIXED_ONE - (t & 0xFF), blitter);
        top += 1;
    }

    let bottom = b >> 8;
    let height = bottom - top;
    if height > 0 {
        let mut left = l >> 8;
        if left == (r - 1) >> 8 {
            // Only one column wide.
            blit_v(blitter, left, top, height, coverage_to_alpha(r - l));
        } else {
            let left_alpha = if l & 0xFF != 0 {
                let alpha = coverage_to_alpha(FIXED_ONE - (l & 0xFF));
                left += 1;
                Some(alpha)
            } else {
                None
            };
            let right = r >> 8;
            let width = right - left;
            let right_alpha = (r & 0xFF != 0).then(|| coverage_to_alpha(r & 0xFF));
            match (left_alpha, right_alpha) {
                (Some(la), Some(ra)) if fill_inner => {
                    blitter.blit_anti_rect(left - 1, top, width as u32, height as u32, la, ra);
                }
                _ => {
                    if let Some(alpha) = left_alpha {
                        blit_v(blitter, left - 1, top, height, alpha);
                    }
                    if width > 0 && fill_inner {
                        blitter.blit_rect(left, top, width as u32, height as u32);
                    }
                    if let Some(alpha) = right_alpha {
                        blit_v(blitter, right, top, height, alpha);
                    }
                }
            }
        }
    }

    if b & 0xFF != 0 {
        fixed_row(l, bottom, r, b & 0xFF, blitter);
    }
}

/// Fill the part of row `y` between `l` and `r`, scaled by the vertical coverage `cov`.
fn fixed_row(l: Fixed, y: i32, r: Fixed, cov: i32, blitter: &mut impl Blit) {
    let mut left = l >> 8;
    if left == (r - 1) >> 8 {
        blit_v(blitter, left, y, 1, coverage_to_alpha((cov * (r - l)) >> 8));
        return;
    }
    if l & 0xFF != 0 {
        blit_v(blitter, left, y, 1, coverage_to_alpha((cov * (FIXED_ONE - (l & 0xFF))) >> 8));
        left += 1;
    }
    let right = r >> 8;
    let width = right - left;
    let alpha = coverage_to_alpha(cov);
    if width > 0 && alpha > 0 {
        blitter.blit_anti_h(left, y, &[CoverageRun::new(width as u32, alpha)]);
    }
    if r & 0xFF != 0 {
        blit_v(blitter, right, y, 1, coverage_to_alpha((cov * (r & 0xFF)) >> 8));
    }
}

fn blit_v(blitter: &mut impl Blit, x: i32, y: i32, height: i32, alpha: u8) {
    if alpha > 0 && height > 0 {
        blitter.blit_v(x, y, height as u32, alpha);
    }
}

/// The outer and inner rectangles of the frame around `rect`, `radius` wide on each side.
fn frame_bounds(rect: &Rect, radius: Vec2) -> (Rect, Rect) {
    let rect = rect.abs();
    let outer = rect.inflate(radius.x, radius.y);
    let inner = rect.inflate(-radius.x, -radius.y);
    (outer, inner)
}

/// The four sides of a frame, clockwise from the top.
fn frame_sides(outer: Rect, inner: Rect) -> [Rect; 4] {
    [
        Rect::new(outer.x0, outer.y0, outer.x1, inner.y0),
        Rect::new(inner.x1, inner.y0, outer.x1, inner.y1),
        Rect::new(outer.x0, inner.y1, outer.x1, outer.y1),
        Rect::new(outer.x0, inner.y0, inner.x0, inner.y1),
    ]
}

/// Stroke the outline of `rect` with a pen extending `radius` to each side.
///
/// A zero radius draws a hairline frame.
pub fn frame_rect(rect: &Rect, radius: Vec2, clip: &IntRect, blitter: &mut impl Blit) {
    if radius.x <= 0.0 && radius.y <= 0.0 {
        hair_rect(rect, clip, blitter, false);
        return;
    }
    let (outer, inner) = frame_bounds(rect, radius);
    if inner.width() <= 0.0 || inner.height() <= 0.0 {
        fill_rect(&outer, clip, blitter);
        return;
    }
    // Round the rectangles first so the sides cannot overlap.
    let outer = IntRect::from_rect_round(&outer);
    let inner = IntRect::from_rect_round(&inner);
    for side in frame_sides(outer.to_rect(), inner.to_rect()) {
        fill_irect(&IntRect::from_rect_round(&side), clip, blitter);
    }
}

/// Stroke the outline of `rect` with partial coverage along fractional edges.
pub fn anti_frame_rect(rect: &Rect, radius: Vec2, clip: &IntRect, blitter: &mut impl Blit) {
    if radius.x <= 0.0 && radius.y <= 0.0 {
        hair_rect(rect, clip, blitter, true);
        return;
    }
    let (outer, inner) = frame_bounds(rect, radius);
    if inner.width() <= 0.0 || inner.height() <= 0.0 {
        anti_fill_rect(&outer, clip, blitter);
        return;
    }
    // The inner edges can share pixels with the outer ones, so use a path for thin frames.
    if inner.x0 - outer.x0 < 1.0 || inner.y0 - outer.y0 < 1.0 {
        let mut path = outer.to_path(0.1);
        path.extend(inner.path_elements(0.1));
        fill_path(&path, Fill::EvenOdd, clip, true, blitter);
        return;
    }
    for side in frame_sides(outer, inner) {
        anti_fill_rect(&side, clip, blitter);
    }
}

fn hair_rect(rect: &Rect, clip: &IntRect, blitter: &mut impl Blit, antialias: bool) {
    let rect = rect.abs();
    let corners = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ];
    if !antialias {
        // Hard-edged frames cover the pixels of the rounded rectangle's border exactly once.
        let r = IntRect::from_rect_round(&rect);
        if r.is_empty() {
            hair_line(corners[0], corners[2], clip, blitter);
            return;
        }
        let sides = [
            IntRect::new(r.left, r.top, r.right, r.top + 1),
            IntRect::new(r.left, r.bottom - 1, r.right, r.bottom),
            IntRect::new(r.left, r.top + 1, r.left + 1, r.bottom - 1),
            IntRect::new(r.right - 1, r.top + 1, r.right, r.bottom - 1),
        ];
        for side in sides {
            fill_irect(&side, clip, blitter);
        }
        return;
    }
    hair_polygon(&corners, true, clip, blitter, antialias);
}

/// Draw hairlines between consecutive points, closing the outline if `close`.
pub(crate) fn hair_polygon(
    points: &[Point],
    close: bool,
    clip: &IntRect,
    blitter: &mut impl Blit,
    antialias: bool,
) {
    let closing = if close && points.len() > 2 {
        points.last().copied().zip(points.first().copied())
    } else {
        None
    };
    let segments = points.windows(2).map(|w| (w[0], w[1])).chain(closing);
    for (p0, p1) in segments {
        if antialias {
            anti_hair_line(p0, p1, clip, blitter);
        } else {
            hair_line(p0, p1, clip, blitter);
        }
    }
}

/// Clip the segment `p0 p1` to `rect` (Liang-Barsky).
fn clip_line(p0: Point, p1: Point, rect: Rect) -> Option<(Point, Point)> {
    let d = p1 - p0;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    let checks = [
        (-d.x, p0.x - rect.x0),
        (d.x, rect.x1 - p0.x),
        (-d.y, p0.y - rect.y0),
        (d.y, rect.y1 - p0.y),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((p0 + d * t0, p0 + d * t1))
}

/// A hairline oriented along its major axis, with the clip in the same orientation.
struct Hair {
    a: Point,
    b: Point,
    swap: bool,
    major: (i32, i32),
    minor: (i32, i32),
}

impl Hair {
    fn minor_inside(&self, minor: i32) -> bool {
        (self.minor.0..self.minor.1).contains(&minor)
    }

    /// Write a single pixel, given in major/minor coordinates, if it lies inside the clip.
    fn pixel(&self, major: i32, minor: i32, alpha: u8, blitter: &mut impl Blit) {
        if alpha == 0 || !self.minor_inside(minor) {
            return;
        }
        if self.swap {
            blitter.blit_v(minor, major, 1, alpha);
        } else {
            blitter.blit_v(major, minor, 1, alpha);
        }
    }
}

/// Prepare a hairline for stepping: clip it and orient it along its major axis.
///
/// The line is clipped with one pixel of slack so partially covered neighbours of the clip edge
/// are kept; callers must still drop the pixels that fall outside `major` and `minor`.
fn hair_setup(p0: Point, p1: Point, clip: &IntRect) -> Option<Hair> {
    if clip.is_empty() || !p0.is_finite() || !p1.is_finite() {
        return None;
    }
    let (p0, p1) = clip_line(p0, p1, clip.to_rect().inflate(1.0, 1.0))?;
    let d = p1 - p0;
    let swap = d.y.abs() > d.x.abs();
    let (mut a, mut b) = if swap {
        (Point::new(p0.y, p0.x), Point::new(p1.y, p1.x))
    } else {
        (p0, p1)
    };
    if a.x > b.x {
        std::mem::swap(&mut a, &mut b);
    }
    let (major, minor) = if swap {
        ((clip.top, clip.bottom), (clip.left, clip.right))
    } else {
        ((clip.left, clip.right), (clip.top, clip.bottom))
    };
    Some(Hair {
        a,
        b,
        swap,
        major,
        minor,
    })
}

/// Draw a one pixel wide line between two device points.
///
/// Every column (or row, for steep lines) whose centre lies between the endpoints gets the pixel
/// the line crosses at that centre.
pub fn hair_line(p0: Point, p1: Point, clip: &IntRect, blitter: &mut impl Blit) {
    let Some(hair) = hair_setup(p0, p1, clip) else {
        return;
    };
    let (a, b) = (hair.a, hair.b);
    let start = ((a.x - 0.5).ceil() as i32).max(hair.major.0);
    let end = ((b.x - 0.5).ceil() as i32).min(hair.major.1);
    if start >= end {
        return;
    }
    let slope = (b.y - a.y) / (b.x - a.x);
    // Accumulate runs along the major axis.
    let mut run: Option<(i32, i32, u32)> = None;
    for major in start..end {
        let minor = (a.y + slope * (f64::from(major) + 0.5 - a.x)).floor() as i32;
        if !hair.minor_inside(minor) {
            if let Some(done) = run.take() {
                hair_run(done, hair.swap, blitter);
            }
            continue;
        }
        run = match run {
            Some((m, n, len)) if n == minor => Some((m, n, len + 1)),
            Some(done) => {
                hair_run(done, hair.swap, blitter);
                Some((major, minor, 1))
            }
            None => Some((major, minor, 1)),
        };
    }
    if let Some(done) = run {
        hair_run(done, hair.swap, blitter);
    }
}

fn hair_run((major, minor, len): (i32, i32, u32), swap: bool, blitter: &mut impl Blit) {
    if swap {
        blitter.blit_v(minor, major, len, 255);
    } else {
        blitter.blit_h(major, minor, len);
    }
}

/// Draw a one pixel wide antialiased line between two device points.
///
/// Coverage along the minor axis is split between the two pixels the line passes between.
pub fn anti_hair_line(p0: Point, p1: Point, clip: &IntRect, blitter: &mut impl Blit) {
    let Some(hair) = hair_setup(p0, p1, clip) else {
        return;
    };
    let (a, b) = (hair.a, hair.b);
    if b.x - a.x <= 0.0 {
        return;
    }
    let start = (a.x.floor() as i32).max(hair.major.0);
    let end = (b.x.ceil() as i32).min(hair.major.1);
    let slope = (b.y - a.y) / (b.x - a.x);
    for major in start..end {
        // The part of this column the segment spans scales its coverage.
        let lo = a.x.max(f64::from(major));
        let hi = b.x.min(f64::from(major + 1));
        let span = (hi - lo).clamp(0.0, 1.0);
        if span <= 0.0 {
            continue;
        }
        let centre = (lo + hi) * 0.5;
        let y = a.y + slope * (centre - a.x) - 0.5;
        let minor = y.floor();
        let frac = y - minor;
        let a0 = ((1.0 - frac) * span * 255.0).round() as u8;
        let a1 = (frac * span * 255.0).round() as u8;
        let minor = minor as i32;
        if !hair.minor_inside(minor) || !hair.minor_inside(minor + 1) {
            hair.pixel(major, minor, a0, blitter);
            hair.pixel(major, minor + 1, a1, blitter);
        } else if hair.swap {
            blitter.blit_anti_h2(minor, major, a0, a1);
        } else {
            blitter.blit_anti_v2(major, minor, a0, a1);
        }
    }
}

/// Rasterize `path` inside `clip` into an A8 mask.
pub fn path_mask(path: &BezPath, fill: Fill, clip: &IntRect, antialias: bool) -> Option<Mask> {
    let mut aa = AaClip::new();
    if !aa.set_path(path, fill, &Region::from_rect(*clip), antialias) {
        return None;
    }
    Some(aa.copy_to_mask())
}

/// Fill a device-space path.
pub fn fill_path(
    path: &BezPath,
    fill: Fill,
    clip: &IntRect,
    antialias: bool,
    blitter: &mut impl Blit,
) {
    if let Some(mask) = path_mask(path, fill, clip, antialias) {
        blitter.blit_mask(&mask, &mask.bounds());
    }
}

/// Fill the union of several device-space paths, covering overlaps only once.
pub fn fill_paths(
    paths: &[BezPath],
    fill: Fill,
    clip: &IntRect,
    antialias: bool,
    blitter: &mut impl Blit,
) {
    let region = Region::from_rect(*clip);
    let mut union = AaClip::new();
    let mut part = AaClip::new();
    for path in paths {
        if part.set_path(path, fill, &region, antialias) {
            union.op(&part, RegionOp::Union);
        }
    }
    if !union.is_empty() {
        let mask = union.copy_to_mask();
        blitter.blit_mask(&mask, &mask.bounds());
    }
}

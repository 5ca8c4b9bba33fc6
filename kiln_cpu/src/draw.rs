// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scan conversion of primitives against a clip into one pixmap.

use crate::blitter::{Blit, Blitter};
use crate::mask_filter::filter_mask;
use crate::scan;
use crate::xfer::Xfer;
use kiln_common::geom::IntRect;
use kiln_common::kurbo::{Affine, BezPath, Circle, Line, Point, Rect, Shape, Vec2};
use kiln_common::paint::{Cap, Paint, Shader, Style};
use kiln_common::peniko::Fill;
use kiln_common::pixmap::Pixmap;
use kiln_common::raster_clip::RasterClip;
use kiln_common::region::RegionOp;
use log::{debug, warn};
use std::borrow::Cow;
use std::rc::Rc;

const TOLERANCE: f64 = 0.1;

/// How [`Draw::draw_points`] interprets its points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointMode {
    /// Every point on its own.
    Points,
    /// Each pair of points is a line segment.
    Lines,
    /// Consecutive points are joined by line segments.
    Polygon,
}

/// Return whether `matrix` maps axis-aligned rectangles to axis-aligned rectangles.
pub(crate) fn is_scale_translate(matrix: &Affine) -> bool {
    let [_, b, c, ..] = matrix.as_coeffs();
    b == 0.0 && c == 0.0
}

/// Draws primitives into one pixmap through one transform and clip.
#[derive(Debug)]
pub struct Draw<'a> {
    pixmap: &'a mut Pixmap,
    matrix: Affine,
    clip: Cow<'a, RasterClip>,
}

impl<'a> Draw<'a> {
    /// Create a draw context.
    ///
    /// A clip reaching outside of the pixmap is restricted to it.
    pub fn new(pixmap: &'a mut Pixmap, matrix: Affine, clip: &'a RasterClip) -> Self {
        let bounds = pixmap.bounds();
        let clip = if clip.is_empty() || bounds.contains_rect(&clip.bounds()) {
            Cow::Borrowed(clip)
        } else {
            let mut clip = clip.clone();
            clip.op_irect(bounds, RegionOp::Intersect);
            Cow::Owned(clip)
        };
        Self {
            pixmap,
            matrix,
            clip,
        }
    }

    /// The transform applied to geometry.
    pub fn matrix(&self) -> &Affine {
        &self.matrix
    }

    /// The clip in device space.
    pub fn clip(&self) -> &RasterClip {
        &self.clip
    }

    /// Device bounds of `bounds` that survive the clip, or `None` if nothing can be drawn.
    fn visible(&self, bounds: IntRect) -> Option<IntRect> {
        if self.clip.is_empty() {
            return None;
        }
        let visible = bounds.intersect(&self.clip.bounds());
        if visible.is_none() {
            debug!("draw outside of the clip rejected");
        }
        visible
    }

    fn blitter(&mut self, paint: &Paint, matrix: &Affine, bounds: &IntRect) -> Blitter<'_> {
        Blitter::choose(self.pixmap, matrix, paint, false).with_clip(&self.clip, bounds)
    }

    /// Fill the whole clip with `paint`.
    pub fn draw_paint(&mut self, paint: &Paint) {
        if paint.nothing_to_draw() {
            return;
        }
        let Some(bounds) = self.visible(self.clip.bounds()) else {
            return;
        };
        if let Some(region) = self.clip.bw_region() {
            if let Some(xfer) = Xfer::from_paint(paint, self.pixmap.color_type()) {
                xfer.apply(self.pixmap, region, &bounds);
                return;
            }
        }
        let matrix = self.matrix;
        let mut blitter = self.blitter(paint, &matrix, &bounds);
        scan::fill_irect(&bounds, &bounds, &mut blitter);
    }

    /// Draw `rect` with the style of `paint`.
    pub fn draw_rect(&mut self, rect: &Rect, paint: &Paint) {
        let rect = rect.abs();
        let matrix = self.matrix;
        if !rect.is_finite() || !matrix.is_finite() {
            warn!("ignoring a rectangle with non-finite geometry");
            return;
        }
        let radius = paint.stroke_width.max(0.0) * 0.5;
        let outset = match paint.style {
            Style::Fill => 0.0,
            Style::Stroke | Style::StrokeAndFill => radius,
        };
        let device = matrix.transform_rect_bbox(rect.inflate(outset, outset));
        let Some(bounds) = self.visible(device_bounds(&device)) else {
            return;
        };
        let clip = self.clip.bounds();
        let aa = paint.anti_alias;
        let axis_aligned = is_scale_translate(&matrix);

        if let (Some(filter), Style::Fill) = (&paint.mask_filter, paint.style) {
            let path = matrix * rect.to_path(TOLERANCE);
            let Some(coverage) = scan::path_mask(&path, Fill::NonZero, &clip, aa) else {
                return;
            };
            let mask = filter_mask(filter, &coverage);
            let mut blitter = self.blitter(paint, &matrix, &mask.bounds());
            blitter.blit_mask(&mask, &clip);
            return;
        }

        let mut blitter = self.blitter(paint, &matrix, &bounds);
        match paint.style {
            Style::Fill => fill_rect(&rect, &matrix, &clip, aa, &mut blitter),
            Style::StrokeAndFill if radius > 0.0 => {
                fill_rect(&rect.inflate(radius, radius), &matrix, &clip, aa, &mut blitter);
            }
            Style::StrokeAndFill => fill_rect(&rect, &matrix, &clip, aa, &mut blitter),
            Style::Stroke if axis_aligned => {
                let [sx, _, _, sy, ..] = matrix.as_coeffs();
                let device = matrix.transform_rect_bbox(rect);
                let radius = Vec2::new(radius * sx.abs(), radius * sy.abs());
                if aa {
                    scan::anti_frame_rect(&device, radius, &clip, &mut blitter);
                } else {
                    scan::frame_rect(&device, radius, &clip, &mut blitter);
                }
            }
            Style::Stroke if radius == 0.0 => {
                let corners = [
                    matrix * Point::new(rect.x0, rect.y0),
                    matrix * Point::new(rect.x1, rect.y0),
                    matrix * Point::new(rect.x1, rect.y1),
                    matrix * Point::new(rect.x0, rect.y1),
                ];
                scan::hair_polygon(&corners, true, &clip, &mut blitter, aa);
            }
            Style::Stroke => {
                let mut path = rect.inflate(radius, radius).to_path(TOLERANCE);
                let inner = rect.inflate(-radius, -radius);
                if inner.width() > 0.0 && inner.height() > 0.0 {
                    path.extend(inner.path_elements(TOLERANCE));
                }
                let path = matrix * path;
                scan::fill_path(&path, Fill::EvenOdd, &clip, aa, &mut blitter);
            }
        }
    }

    /// Draw `points` as dots, separate lines or a connected polyline.
    ///
    /// Dots are squares (circles with round caps) as wide as the stroke width; a zero stroke
    /// width draws single pixels and hairlines.
    pub fn draw_points(&mut self, mode: PointMode, points: &[Point], paint: &Paint) {
        let Some(first) = points.first() else {
            return;
        };
        let matrix = self.matrix;
        if !matrix.is_finite() || points.iter().any(|p| !p.is_finite()) {
            warn!("ignoring points with non-finite geometry");
            return;
        }
        let width = paint.stroke_width.max(0.0);
        let local = points
            .iter()
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
            .inflate(width, width);
        let Some(bounds) = self.visible(device_bounds(&matrix.transform_rect_bbox(local)))
        else {
            return;
        };
        let clip = self.clip.bounds();
        let aa = paint.anti_alias;
        let cap = paint.cap;
        let mut blitter = self.blitter(paint, &matrix, &bounds);

        match mode {
            PointMode::Points => {
                for p in points {
                    draw_dot(*p, width, cap, &matrix, &clip, aa, &mut blitter);
                }
            }
            PointMode::Lines => {
                for pair in points.chunks_exact(2) {
                    let line = Line::new(pair[0], pair[1]);
                    draw_segment(line, width, cap, &matrix, &clip, aa, &mut blitter);
                }
            }
            PointMode::Polygon => {
                for pair in points.windows(2) {
                    let line = Line::new(pair[0], pair[1]);
                    draw_segment(line, width, cap, &matrix, &clip, aa, &mut blitter);
                }
            }
        }
    }

    /// Composite `pixmap` with its top left corner at device pixel `(x, y)`.
    ///
    /// The transform is ignored; the paint's alpha, blend mode and colour filter apply.
    pub fn draw_pixmap_at(&mut self, pixmap: &Rc<Pixmap>, x: i32, y: i32, paint: &Paint) {
        let _lock = pixmap.lock();
        let placed = IntRect::from_xywh(
            x,
            y,
            i32::from(pixmap.width()),
            i32::from(pixmap.height()),
        );
        let Some(bounds) = self.visible(placed) else {
            return;
        };
        let paint = Paint {
            shader: Some(Shader::image_at(
                Rc::clone(pixmap),
                f64::from(x),
                f64::from(y),
            )),
            style: Style::Fill,
            mask_filter: None,
            ..paint.clone()
        };
        let mut blitter = self.blitter(&paint, &Affine::IDENTITY, &bounds);
        scan::fill_irect(&bounds, &bounds, &mut blitter);
    }
}

/// Device pixels touched by `rect`, with one pixel of slack for antialiasing.
fn device_bounds(rect: &Rect) -> IntRect {
    let r = IntRect::from_rect_round_out(rect);
    IntRect::new(
        r.left.saturating_sub(1),
        r.top.saturating_sub(1),
        r.right.saturating_add(1),
        r.bottom.saturating_add(1),
    )
}

fn fill_rect(rect: &Rect, matrix: &Affine, clip: &IntRect, aa: bool, blitter: &mut impl Blit) {
    if is_scale_translate(matrix) {
        let device = matrix.transform_rect_bbox(*rect);
        if aa {
            scan::anti_fill_rect(&device, clip, blitter);
        } else {
            scan::fill_rect(&device, clip, blitter);
        }
    } else {
        let path = *matrix * rect.to_path(TOLERANCE);
        scan::fill_path(&path, Fill::NonZero, clip, aa, blitter);
    }
}

fn draw_dot(
    p: Point,
    width: f64,
    cap: Cap,
    matrix: &Affine,
    clip: &IntRect,
    aa: bool,
    blitter: &mut impl Blit,
) {
    if width == 0.0 {
        let d = *matrix * p;
        let pixel = Rect::new(d.x.floor(), d.y.floor(), d.x.floor() + 1.0, d.y.floor() + 1.0);
        if aa {
            scan::anti_fill_rect(&Rect::from_center_size(d, (1.0, 1.0)), clip, blitter);
        } else {
            scan::fill_rect(&pixel, clip, blitter);
        }
        return;
    }
    let r = width * 0.5;
    match cap {
        Cap::Round => {
            let path = *matrix * Circle::new(p, r).to_path(TOLERANCE);
            scan::fill_path(&path, Fill::NonZero, clip, aa, blitter);
        }
        Cap::Butt | Cap::Square => {
            fill_rect(&Rect::new(p.x - r, p.y - r, p.x + r, p.y + r), matrix, clip, aa, blitter);
        }
    }
}

fn draw_segment(
    line: Line,
    width: f64,
    cap: Cap,
    matrix: &Affine,
    clip: &IntRect,
    aa: bool,
    blitter: &mut impl Blit,
) {
    if width == 0.0 {
        let (d0, d1) = (*matrix * line.p0, *matrix * line.p1);
        if aa {
            scan::anti_hair_line(d0, d1, clip, blitter);
        } else {
            scan::hair_line(d0, d1, clip, blitter);
        }
        return;
    }
    let paths: Vec<BezPath> = segment_paths(line.p0, line.p1, width, cap)
        .into_iter()
        .map(|path| *matrix * path)
        .collect();
    scan::fill_paths(&paths, Fill::NonZero, clip, aa, blitter);
}

/// The outlines covering a `width` wide segment with the given caps, in local space.
fn segment_paths(p0: Point, p1: Point, width: f64, cap: Cap) -> Vec<BezPath> {
    let r = width * 0.5;
    let d = p1 - p0;
    let len = d.hypot();
    if len == 0.0 && cap == Cap::Butt {
        return Vec::new();
    }
    let dir = if len > 0.0 { d / len } else { Vec2::new(1.0, 0.0) };
    let ext = if cap == Cap::Square { dir * r } else { Vec2::ZERO };
    let n = Vec2::new(-dir.y, dir.x) * r;
    let (a, b) = (p0 - ext, p1 + ext);

    let mut quad = BezPath::new();
    quad.move_to(a + n);
    quad.line_to(b + n);
    quad.line_to(b - n);
    quad.line_to(a - n);
    quad.close_path();

    let mut paths = vec![quad];
    if cap == Cap::Round {
        paths.push(Circle::new(p0, r).to_path(TOLERANCE));
        paths.push(Circle::new(p1, r).to_path(TOLERANCE));
    }
    paths
}

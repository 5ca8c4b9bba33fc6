// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rasterizing paths into dense coverage.

use crate::geom::IntRect;
use crate::kurbo::{self, BezPath, PathEl, Point};
use crate::peniko::Fill;
use smallvec::SmallVec;

/// Flattening tolerance in device pixels.
const TOLERANCE: f64 = 0.25;
/// Sub-scanlines per pixel row when antialiasing.
const SUPERSAMPLE: u32 = 4;

#[derive(Clone, Copy, Debug)]
struct Edge {
    p0: Point,
    p1: Point,
    /// `1` for downward edges, `-1` for upward ones.
    winding: i32,
}

fn push(p0: Point, p1: Point, edges: &mut Vec<Edge>) {
    if p0.y != p1.y {
        let winding = if p1.y > p0.y { 1 } else { -1 };
        edges.push(Edge { p0, p1, winding });
    }
}

fn edges(path: &BezPath) -> Vec<Edge> {
    let mut edges = Vec::new();
    let mut start = Point::ZERO;
    let mut last = Point::ZERO;
    kurbo::flatten(path.iter(), TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            // Implicitly close the previous subpath.
            push(last, start, &mut edges);
            start = p;
            last = p;
        }
        PathEl::LineTo(p) => {
            push(last, p, &mut edges);
            last = p;
        }
        PathEl::ClosePath => {
            push(last, start, &mut edges);
            last = start;
        }
        // Flattening only emits lines.
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });
    push(last, start, &mut edges);
    edges
}

/// Return the `[x0, x1)` intervals of scanline `y` that are inside the path.
fn scanline_spans(edges: &[Edge], y: f64, fill: Fill, spans: &mut SmallVec<[(f64, f64); 8]>) {
    let mut crossings: SmallVec<[(f64, i32); 16]> = SmallVec::new();
    for edge in edges {
        let (top, bottom) = if edge.p0.y < edge.p1.y {
            (edge.p0.y, edge.p1.y)
        } else {
            (edge.p1.y, edge.p0.y)
        };
        if y < top || y >= bottom {
            continue;
        }
        let t = (y - edge.p0.y) / (edge.p1.y - edge.p0.y);
        let x = edge.p0.x + t * (edge.p1.x - edge.p0.x);
        crossings.push((x, edge.winding));
    }
    crossings.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    spans.clear();
    let mut winding = 0;
    let mut span_start = 0.0;
    for (x, w) in crossings {
        let was_inside = is_inside(winding, fill);
        winding += w;
        let inside = is_inside(winding, fill);
        if !was_inside && inside {
            span_start = x;
        } else if was_inside && !inside && x > span_start {
            spans.push((span_start, x));
        }
    }
}

fn is_inside(winding: i32, fill: Fill) -> bool {
    match fill {
        Fill::NonZero => winding != 0,
        Fill::EvenOdd => winding % 2 != 0,
    }
}

/// Rasterize `path` into one coverage byte per pixel of `window`, row-major.
///
/// With antialiasing every pixel row is sampled on four sub-scanlines and each sub-scanline
/// contributes its exact horizontal overlap. Without it a pixel is either fully covered or not,
/// decided by whether its centre is inside the path.
pub(crate) fn rasterize(path: &BezPath, fill: Fill, window: IntRect, antialias: bool) -> Vec<u8> {
    if window.is_empty() {
        return Vec::new();
    }
    let width = window.width() as usize;
    let height = window.height() as usize;
    let mut coverage = vec![0_u8; width * height];
    let edges = edges(path);
    if edges.is_empty() {
        return coverage;
    }

    let left = f64::from(window.left);
    let right = f64::from(window.right);
    let mut spans = SmallVec::new();
    let mut accum = vec![0.0_f32; width];

    for (row, out) in coverage.chunks_exact_mut(width).enumerate() {
        let py = f64::from(window.top) + row as f64;
        if antialias {
            accum.fill(0.0);
            for sub in 0..SUPERSAMPLE {
                let y = py + (f64::from(sub) + 0.5) / f64::from(SUPERSAMPLE);
                scanline_spans(&edges, y, fill, &mut spans);
                for &(x0, x1) in &spans {
                    let (x0, x1) = (x0.max(left), x1.min(right));
                    if x0 >= x1 {
                        continue;
                    }
                    let first = x0.floor() as i32;
                    let last = x1.ceil() as i32;
                    for px in first..last {
                        let cell = f64::from(px);
                        let overlap = x1.min(cell + 1.0) - x0.max(cell);
                        if overlap > 0.0 {
                            accum[(px - window.left) as usize] +=
                                overlap as f32 / SUPERSAMPLE as f32;
                        }
                    }
                }
            }
            for (o, a) in out.iter_mut().zip(&accum) {
                *o = (a * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
            }
        } else {
            scanline_spans(&edges, py + 0.5, fill, &mut spans);
            for &(x0, x1) in &spans {
                // Pixels whose centre lies in [x0, x1).
                let first = ((x0 - 0.5).ceil().max(left)) as i32;
                let last = ((x1 - 0.5).ceil().min(right)) as i32;
                for px in first..last {
                    out[(px - window.left) as usize] = 255;
                }
            }
        }
    }
    coverage
}

// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing state machine clients drive.
//!
//! A [`Canvas`] owns a stack of matrix and clip states and a chain of layers. Every draw call
//! is expanded by the paint's looper and image filter, then rendered into each layer the
//! current state reaches, bottom-most first, with the clip and matrix mapped into that layer's
//! pixels.

mod iter;
mod layer;
mod looper;

pub use layer::{SaveLayerFlags, SaveLayerRec};
pub use looper::{DrawFilter, DrawType};

use crate::device::BitmapDevice;
use crate::draw::{Draw, PointMode};
use crate::error::CanvasError;
use crate::surface_props::{CanvasInitFlags, SurfaceProps};
use core::cell::OnceCell;
use iter::DrawIter;
use kiln_common::color::{AlphaColor, Srgb};
use kiln_common::geom::IntRect;
use kiln_common::kurbo::{Affine, BezPath, Point, Rect};
use kiln_common::paint::{ImageFilter, Paint, Style};
use kiln_common::peniko::{BlendMode, Compose, Fill};
use kiln_common::pixmap::{ColorType, Pixmap};
use kiln_common::raster_clip::RasterClip;
use kiln_common::region::{Region, RegionOp};
use layer::{Layer, LayerId, McRec};
use log::{debug, warn};
use looper::{fold_color_filter, AutoDrawLooper};
use std::rc::Rc;

/// A drawing surface over a pixmap.
#[derive(Debug)]
pub struct Canvas {
    /// Layer arena; the base layer is always at index 0 and saved layers follow in save order.
    layers: Vec<Layer>,
    /// The current state.
    mc: McRec,
    /// The states below the current one.
    mc_stack: Vec<McRec>,
    save_count: u32,
    props: SurfaceProps,
    conservative_rects: bool,
    local_clip_bounds: OnceCell<Option<Rect>>,
}

impl Canvas {
    /// Create a canvas drawing into `pixmap`.
    pub fn new(pixmap: Pixmap) -> Self {
        Self::with_options(pixmap, SurfaceProps::default(), CanvasInitFlags::empty())
    }

    /// Create a canvas drawing into `pixmap` with explicit surface properties and flags.
    pub fn with_options(pixmap: Pixmap, props: SurfaceProps, flags: CanvasInitFlags) -> Self {
        let conservative_rects = flags.contains(CanvasInitFlags::CONSERVATIVE_RASTER_CLIP);
        let device = BitmapDevice::new(pixmap, (0, 0));
        let mut clip = RasterClip::new(conservative_rects);
        clip.set_rect(device.bounds());
        let base = Layer::new(device, None, None, conservative_rects);
        let mut canvas = Self {
            layers: vec![base],
            mc: McRec::new(clip, LayerId(0)),
            mc_stack: Vec::new(),
            save_count: 1,
            props,
            conservative_rects,
            local_clip_bounds: OnceCell::new(),
        };
        canvas.update_layers();
        canvas
    }

    /// The surface properties the canvas was created with.
    pub fn props(&self) -> &SurfaceProps {
        &self.props
    }

    /// The size of the base layer in pixels.
    pub fn base_layer_size(&self) -> (u16, u16) {
        let pixmap = self.base_pixmap();
        (pixmap.width(), pixmap.height())
    }

    /// The pixels of the base layer.
    pub fn base_pixmap(&self) -> &Pixmap {
        &self.layers[0].device.pixmap
    }

    /// Restore every level and return the base layer's pixels.
    pub fn into_pixmap(mut self) -> Pixmap {
        self.restore_to_count(1);
        self.layers.swap_remove(0).device.pixmap
    }

    fn base_bounds(&self) -> IntRect {
        self.layers[0].device.bounds()
    }

    // --- Save and restore ---

    /// The number of saved levels plus one.
    pub fn save_count(&self) -> u32 {
        self.save_count
    }

    /// Push the matrix, clip and draw filter. Returns the save count before the push.
    pub fn save(&mut self) -> u32 {
        let count = self.save_count;
        self.save_count += 1;
        self.mc.deferred_save_count += 1;
        count
    }

    /// Give a deferred save its own record before the current state is changed.
    fn check_for_deferred_save(&mut self) {
        if self.mc.deferred_save_count > 0 {
            self.mc.deferred_save_count -= 1;
            self.push_record();
        }
    }

    fn push_record(&mut self) {
        let child = self.mc.child();
        let parent = core::mem::replace(&mut self.mc, child);
        self.mc_stack.push(parent);
    }

    /// Pop the last save, compositing its layer if it made one.
    pub fn restore(&mut self) {
        if self.save_count <= 1 {
            warn!("restore called without a matching save");
            return;
        }
        self.save_count -= 1;
        if self.mc.deferred_save_count > 0 {
            self.mc.deferred_save_count -= 1;
            return;
        }
        let Some(parent) = self.mc_stack.pop() else {
            return;
        };
        let popped = core::mem::replace(&mut self.mc, parent);
        self.invalidate_local_clip_bounds();
        self.update_layers();
        if popped.layer.is_some() {
            if let Some(layer) = self.layers.pop() {
                self.composite(layer);
            }
        }
    }

    /// Restore until the save count is `count`.
    pub fn restore_to_count(&mut self, count: u32) {
        if count < 1 || count > self.save_count {
            warn!(
                "restore_to_count({count}) out of range 1..={}",
                self.save_count
            );
        }
        let count = count.max(1);
        while self.save_count > count {
            self.restore();
        }
    }

    // --- Layers ---

    /// Redirect drawing into a transparent layer composited with `paint` on restore.
    ///
    /// Returns the save count before the push.
    pub fn save_layer(&mut self, bounds: Option<&Rect>, paint: Option<&Paint>) -> u32 {
        self.save_layer_with(SaveLayerRec {
            bounds,
            paint,
            flags: SaveLayerFlags::empty(),
        })
    }

    /// Redirect drawing into a layer composited with the given opacity on restore.
    pub fn save_layer_alpha(&mut self, bounds: Option<&Rect>, alpha: u8) -> u32 {
        if alpha == 0xFF {
            self.save_layer(bounds, None)
        } else {
            let mut paint = Paint::default();
            paint.set_alpha(alpha);
            self.save_layer(bounds, Some(&paint))
        }
    }

    /// Redirect drawing into a layer described by `rec`.
    pub fn save_layer_with(&mut self, rec: SaveLayerRec<'_>) -> u32 {
        let count = self.save_count;
        self.save_count += 1;
        self.push_record();
        self.invalidate_local_clip_bounds();

        let dont_clip = rec.flags.contains(SaveLayerFlags::DONT_CLIP_TO_LAYER);
        let mut bounds = if self.mc.clip.is_empty() {
            None
        } else {
            Some(self.mc.clip.bounds())
        };
        if let Some(local) = rec.bounds {
            let device = self.mc.matrix.transform_rect_bbox(local.abs());
            bounds = bounds.and_then(|b| b.intersect(&IntRect::from_rect_round_out(&device)));
        }
        let Some(bounds) = bounds else {
            debug!("save_layer bounds are empty, the layer draws nothing");
            if !dont_clip {
                self.mc.clip.set_empty();
                self.update_layers();
            }
            return count;
        };
        if !dont_clip {
            self.mc.clip.op_irect(bounds, RegionOp::Intersect);
        }

        let device = BitmapDevice::compatible_layer(self.base_pixmap().color_type(), bounds);
        let next = dont_clip.then_some(self.mc.top_layer);
        let id = LayerId(self.layers.len());
        self.layers.push(Layer::new(
            device,
            rec.paint.cloned(),
            next,
            self.conservative_rects,
        ));
        self.mc.layer = Some(id);
        self.mc.top_layer = id;
        self.update_layers();
        count
    }

    /// Draw a popped layer into the layers the restored state reaches.
    fn composite(&mut self, layer: Layer) {
        let Layer { device, paint, .. } = layer;
        let mut paint = paint.unwrap_or_default();
        let (mut x, mut y) = device.origin;
        match paint.image_filter.take() {
            Some(ImageFilter::ColorFilter(filter)) => fold_color_filter(&mut paint, filter),
            Some(ImageFilter::Offset(offset)) => {
                x += offset.x.round() as i32;
                y += offset.y.round() as i32;
            }
            None => {}
        }
        paint.shader = None;
        paint.mask_filter = None;
        paint.looper = None;
        paint.style = Style::Fill;

        let pixmap = Rc::new(device.pixmap);
        for id in DrawIter::new(&self.layers, self.mc.top_layer) {
            if let Some(target) = self.layers.get_mut(id.0) {
                let (tx, ty) = target.device.origin;
                target
                    .draw()
                    .draw_pixmap_at(&pixmap, x - tx, y - ty, &paint);
            }
        }
    }

    /// Push the current matrix and clip to every layer the current state reaches.
    fn update_layers(&mut self) {
        let mut next = Some(self.mc.top_layer);
        while let Some(id) = next {
            let Some(layer) = self.layers.get_mut(id.0) else {
                break;
            };
            layer.update(&self.mc.matrix, &self.mc.clip);
            next = layer.next;
        }
    }

    // --- Matrix ---

    /// Pre-translate the matrix.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.concat(&Affine::translate((dx, dy)));
    }

    /// Pre-scale the matrix.
    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.concat(&Affine::scale_non_uniform(sx, sy));
    }

    /// Pre-rotate the matrix by `radians`.
    pub fn rotate(&mut self, radians: f64) {
        self.concat(&Affine::rotate(radians));
    }

    /// Pre-multiply the matrix by `matrix`, so it applies to coordinates first.
    pub fn concat(&mut self, matrix: &Affine) {
        if *matrix == Affine::IDENTITY {
            return;
        }
        self.check_for_deferred_save();
        self.mc.matrix = self.mc.matrix * *matrix;
        self.matrix_changed();
    }

    /// Replace the matrix.
    pub fn set_matrix(&mut self, matrix: Affine) {
        self.check_for_deferred_save();
        self.mc.matrix = matrix;
        self.matrix_changed();
    }

    /// Replace the matrix with the identity.
    pub fn reset_matrix(&mut self) {
        self.set_matrix(Affine::IDENTITY);
    }

    /// The current matrix.
    pub fn total_matrix(&self) -> Affine {
        self.mc.matrix
    }

    fn matrix_changed(&mut self) {
        self.invalidate_local_clip_bounds();
        self.update_layers();
    }

    // --- Clip ---

    /// Combine a local rectangle into the clip. Returns whether the clip is non-empty.
    pub fn clip_rect(&mut self, rect: &Rect, op: RegionOp, antialias: bool) -> bool {
        self.check_for_deferred_save();
        let base = self.base_bounds();
        let matrix = self.mc.matrix;
        self.mc.clip.op_rect(rect, &matrix, base, op, antialias);
        self.clip_changed()
    }

    /// Combine a device-space region into the clip, ignoring the matrix.
    pub fn clip_region(&mut self, region: &Region, op: RegionOp) -> bool {
        self.check_for_deferred_save();
        // The clip never leaves the base layer, so neither does the operand.
        let mut region = region.clone();
        region.op_rect(self.base_bounds(), RegionOp::Intersect);
        self.mc.clip.op_region(&region, op);
        self.clip_changed()
    }

    /// Combine a local path into the clip.
    pub fn clip_path(&mut self, path: &BezPath, fill: Fill, op: RegionOp, antialias: bool) -> bool {
        self.check_for_deferred_save();
        let base = self.base_bounds();
        let device_path = self.mc.matrix * path.clone();
        self.mc.clip.op_path(&device_path, fill, base, op, antialias);
        self.clip_changed()
    }

    fn clip_changed(&mut self) -> bool {
        // Expanding ops can reach past the base layer.
        let base = self.base_bounds();
        self.mc.clip.op_irect(base, RegionOp::Intersect);
        self.invalidate_local_clip_bounds();
        self.update_layers();
        !self.mc.clip.is_empty()
    }

    fn invalidate_local_clip_bounds(&mut self) {
        self.local_clip_bounds = OnceCell::new();
    }

    /// Whether nothing can be drawn.
    pub fn is_clip_empty(&self) -> bool {
        self.mc.clip.is_empty()
    }

    /// Whether the clip is a single hard-edged rectangle.
    pub fn is_clip_rect(&self) -> bool {
        self.mc.clip.is_rect()
    }

    /// The clip bounds in base device pixels, empty if the clip is empty.
    pub fn device_clip_bounds(&self) -> IntRect {
        if self.mc.clip.is_empty() {
            IntRect::EMPTY
        } else {
            self.mc.clip.bounds()
        }
    }

    /// The clip bounds mapped back to local coordinates, outset by one pixel for antialiasing.
    ///
    /// `None` if the clip is empty or the matrix cannot be inverted.
    pub fn local_clip_bounds(&self) -> Option<Rect> {
        *self.local_clip_bounds.get_or_init(|| {
            if self.mc.clip.is_empty() || self.mc.matrix.determinant() == 0.0 {
                return None;
            }
            let device = self.mc.clip.bounds().to_rect().inflate(1.0, 1.0);
            Some(self.mc.matrix.inverse().transform_rect_bbox(device))
        })
    }

    /// Whether a local rectangle is certainly outside the clip.
    pub fn quick_reject(&self, rect: &Rect) -> bool {
        let Some(clip) = self.local_clip_bounds() else {
            return true;
        };
        let rect = rect.abs();
        if !rect.is_finite() {
            return true;
        }
        rect.x1 < clip.x0 || rect.x0 > clip.x1 || rect.y1 < clip.y0 || rect.y0 > clip.y1
    }

    // --- Draw filter ---

    /// Install a filter for draws at this save level. Returns the previous one.
    pub fn set_draw_filter(
        &mut self,
        filter: Option<Rc<dyn DrawFilter>>,
    ) -> Option<Rc<dyn DrawFilter>> {
        self.check_for_deferred_save();
        core::mem::replace(&mut self.mc.filter, filter)
    }

    /// The filter for draws at this save level.
    pub fn draw_filter(&self) -> Option<&Rc<dyn DrawFilter>> {
        self.mc.filter.as_ref()
    }

    // --- Drawing ---

    /// Run `draw` once per paint the looper produces, on every layer the state reaches.
    fn draw_with(
        &mut self,
        paint: &Paint,
        ty: DrawType,
        bounds: Option<&Rect>,
        mut draw: impl FnMut(&mut Draw<'_>, &Paint),
    ) {
        let mut looper = AutoDrawLooper::new(self, paint, bounds);
        while let Some((mut paint, offset)) = looper.next() {
            if let Some(filter) = self.mc.filter.clone() {
                if !filter.filter(&mut paint, ty) {
                    continue;
                }
            }
            let shifted = offset.x != 0.0 || offset.y != 0.0;
            if shifted {
                self.save();
                self.translate(offset.x, offset.y);
            }
            for id in DrawIter::new(&self.layers, self.mc.top_layer) {
                if let Some(layer) = self.layers.get_mut(id.0) {
                    draw(&mut layer.draw(), &paint);
                }
            }
            if shifted {
                self.restore();
            }
        }
        looper.finish(self);
    }

    /// Whether a draw with `paint` covering local `bounds` can be skipped.
    fn reject(&self, bounds: &Rect, paint: &Paint) -> bool {
        let can_bound =
            paint.looper.is_none() && paint.image_filter.is_none() && paint.mask_filter.is_none();
        let rejected = can_bound && self.quick_reject(bounds);
        if rejected {
            debug!("draw of {bounds:?} is outside the clip");
        }
        rejected
    }

    /// Fill the clip with `paint`.
    pub fn draw_paint(&mut self, paint: &Paint) {
        self.draw_with(paint, DrawType::Paint, None, |draw, paint| {
            draw.draw_paint(paint);
        });
    }

    /// Fill the clip with `color` combined by `mode`.
    pub fn draw_color(&mut self, color: AlphaColor<Srgb>, mode: BlendMode) {
        let paint = Paint {
            blend_mode: mode,
            ..Paint::from(color)
        };
        self.draw_paint(&paint);
    }

    /// Replace every pixel in the clip with `color`.
    pub fn clear(&mut self, color: AlphaColor<Srgb>) {
        self.draw_color(color, Compose::Copy.into());
    }

    /// Draw a rectangle, filled or stroked per the paint's style.
    pub fn draw_rect(&mut self, rect: &Rect, paint: &Paint) {
        let bounds = stroke_bounds(rect.abs(), paint);
        if self.reject(&bounds, paint) {
            return;
        }
        self.draw_with(paint, DrawType::Rect, Some(&bounds), |draw, paint| {
            draw.draw_rect(rect, paint);
        });
    }

    /// Draw a single point.
    pub fn draw_point(&mut self, point: Point, paint: &Paint) {
        self.draw_points(PointMode::Points, &[point], paint);
    }

    /// Draw points, separate lines or a polyline.
    pub fn draw_points(&mut self, mode: PointMode, points: &[Point], paint: &Paint) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        let hull = rest
            .iter()
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p));
        let bounds = hull.inflate(paint.stroke_width / 2.0 + 1.0, paint.stroke_width / 2.0 + 1.0);
        if self.reject(&bounds, paint) {
            return;
        }
        let ty = match mode {
            PointMode::Points => DrawType::Point,
            PointMode::Lines | PointMode::Polygon => DrawType::Line,
        };
        self.draw_with(paint, ty, Some(&bounds), |draw, paint| {
            draw.draw_points(mode, points, paint);
        });
    }

    // --- Pixel access ---

    /// Copy base layer pixels starting at `(x, y)` into `dst`, converting to its colour type.
    ///
    /// The matrix and clip are ignored. Pixels of `dst` outside the base layer are left alone.
    pub fn read_pixels(&self, dst: &mut Pixmap, x: i32, y: i32) -> Result<(), CanvasError> {
        let base = self.base_pixmap();
        if base.color_type() == ColorType::Unknown || base.bounds().is_empty() {
            return Err(CanvasError::NoDevicePixels);
        }
        if dst.color_type() == ColorType::Unknown {
            return Err(CanvasError::UnsupportedConversion {
                from: base.color_type(),
                to: dst.color_type(),
            });
        }
        let src = IntRect::from_xywh(x, y, i32::from(dst.width()), i32::from(dst.height()));
        let area = src
            .intersect(&base.bounds())
            .ok_or(CanvasError::RectOutsideBaseLayer(src))?;
        let _lock = base.lock();
        copy_pixels(base, dst, area, (-x, -y));
        Ok(())
    }

    /// Copy `src` into the base layer with its top left corner at `(x, y)`.
    ///
    /// The matrix and clip are ignored.
    pub fn write_pixels(&mut self, src: &Pixmap, x: i32, y: i32) -> Result<(), CanvasError> {
        let base_type = self.base_pixmap().color_type();
        if base_type == ColorType::Unknown || self.base_bounds().is_empty() {
            return Err(CanvasError::NoDevicePixels);
        }
        if src.color_type() == ColorType::Unknown {
            return Err(CanvasError::UnsupportedConversion {
                from: src.color_type(),
                to: base_type,
            });
        }
        let dst = IntRect::from_xywh(x, y, i32::from(src.width()), i32::from(src.height()));
        let area = dst
            .intersect(&self.base_bounds())
            .ok_or(CanvasError::RectOutsideBaseLayer(dst))?;
        let _lock = src.lock();
        let area = area.offset(-x, -y);
        copy_pixels(src, &mut self.layers[0].device.pixmap, area, (x, y));
        Ok(())
    }
}

/// Copy the pixels of `area` in `src` to `dst`, shifted by `offset`.
fn copy_pixels(src: &Pixmap, dst: &mut Pixmap, area: IntRect, offset: (i32, i32)) {
    for y in area.top..area.bottom {
        for x in area.left..area.right {
            let color = src.pixel(x as u16, y as u16);
            dst.set_pixel((x + offset.0) as u16, (y + offset.1) as u16, color);
        }
    }
}

/// Local bounds of everything a rectangle drawn with `paint` can touch.
fn stroke_bounds(rect: Rect, paint: &Paint) -> Rect {
    let outset = match paint.style {
        Style::Fill => 0.0,
        // Hairlines are one device pixel wide whatever the matrix.
        Style::Stroke | Style::StrokeAndFill if paint.stroke_width == 0.0 => 1.0,
        Style::Stroke | Style::StrokeAndFill => paint.stroke_width / 2.0,
    };
    rect.inflate(outset, outset)
}

// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the canvas state machine.

use crate::util::{
    check_rect, covered_count, filled, get_canvas, rgba, BLUE, LIME, RED, TRANSPARENT,
};
use kiln_common::color::palette::css;
use kiln_common::geom::IntRect;
use kiln_common::kurbo::{Affine, Rect, Vec2};
use kiln_common::paint::{ColorFilter, DrawLooper, ImageFilter, LooperLayer, Paint};
use kiln_common::pixmap::{ColorType, Pixmap};
use kiln_common::region::RegionOp;
use kiln_cpu::surface_props::{
    CanvasInitFlags, LcdConfig, LcdOrder, LcdOrientation, PixelGeometry, SurfaceProps,
    SurfacePropsFlags,
};
use kiln_cpu::{Canvas, CanvasError, DrawFilter, DrawType};
use std::f64::consts::FRAC_PI_2;
use std::rc::Rc;

#[test]
fn save_counts() {
    let mut canvas = get_canvas(4, 4);
    assert_eq!(canvas.save_count(), 1);
    assert_eq!(canvas.save(), 1);
    assert_eq!(canvas.save(), 2);
    assert_eq!(canvas.save_layer(None, None), 3);
    assert_eq!(canvas.save_count(), 4);
    canvas.restore_to_count(2);
    assert_eq!(canvas.save_count(), 2);
    // Unbalanced restores are ignored.
    canvas.restore();
    canvas.restore();
    canvas.restore();
    assert_eq!(canvas.save_count(), 1);
}

#[test]
fn matrix_is_restored() {
    let mut canvas = get_canvas(4, 4);
    canvas.translate(1.0, 2.0);
    canvas.save();
    canvas.scale(2.0, 2.0);
    assert_eq!(
        canvas.total_matrix(),
        Affine::translate((1.0, 2.0)) * Affine::scale(2.0)
    );
    canvas.restore();
    assert_eq!(canvas.total_matrix(), Affine::translate((1.0, 2.0)));

    canvas.save();
    canvas.set_matrix(Affine::scale(3.0));
    assert_eq!(canvas.total_matrix(), Affine::scale(3.0));
    canvas.reset_matrix();
    assert_eq!(canvas.total_matrix(), Affine::IDENTITY);
    canvas.restore();
    assert_eq!(canvas.total_matrix(), Affine::translate((1.0, 2.0)));
}

#[test]
fn concat_applies_first() {
    let mut canvas = get_canvas(8, 8);
    canvas.translate(4.0, 0.0);
    canvas.concat(&Affine::translate((0.0, 4.0)));
    canvas.draw_rect(&Rect::new(0.0, 0.0, 2.0, 2.0), &Paint::from(css::RED));

    check_rect(canvas.base_pixmap(), IntRect::new(4, 4, 6, 6), RED, TRANSPARENT);
}

#[test]
fn rotated_quarter_turn() {
    let mut canvas = get_canvas(8, 8);
    canvas.translate(8.0, 0.0);
    canvas.rotate(FRAC_PI_2);
    // (x, y) maps to (8 - y, x).
    canvas.draw_rect(&Rect::new(0.0, 0.0, 4.0, 2.0), &Paint::from(css::RED));

    check_rect(canvas.base_pixmap(), IntRect::new(6, 0, 8, 4), RED, TRANSPARENT);
}

#[derive(Debug)]
struct Recolor;

impl DrawFilter for Recolor {
    fn filter(&self, paint: &mut Paint, ty: DrawType) -> bool {
        if ty == DrawType::Point {
            return false;
        }
        paint.color = css::BLUE;
        true
    }
}

#[test]
fn draw_filter_per_save_level() {
    let mut canvas = get_canvas(4, 4);
    canvas.save();
    assert!(canvas.set_draw_filter(Some(Rc::new(Recolor))).is_none());
    assert!(canvas.draw_filter().is_some());
    canvas.draw_rect(&Rect::new(0.0, 0.0, 2.0, 2.0), &Paint::from(css::RED));
    canvas.draw_point((3.5, 3.5).into(), &Paint::from(css::RED));
    assert_eq!(canvas.base_pixmap().pixel(0, 0), BLUE);
    assert_eq!(canvas.base_pixmap().pixel(3, 3), TRANSPARENT);
    canvas.restore();

    assert!(canvas.draw_filter().is_none());
    canvas.draw_point((3.5, 3.5).into(), &Paint::from(css::RED));
    assert_eq!(canvas.base_pixmap().pixel(3, 3), RED);
}

#[test]
fn looper_draws_each_layer() {
    let mut canvas = get_canvas(8, 8);
    let paint = Paint {
        looper: Some(DrawLooper::new(vec![
            LooperLayer {
                offset: Vec2::new(2.0, 2.0),
                color: Some(css::BLUE),
            },
            LooperLayer {
                offset: Vec2::ZERO,
                color: None,
            },
        ])),
        ..Paint::from(css::RED)
    };
    canvas.draw_rect(&Rect::new(0.0, 0.0, 3.0, 3.0), &paint);

    let pixmap = canvas.base_pixmap();
    // The shadow is drawn first and the paint's own colour on top.
    assert_eq!(pixmap.pixel(0, 0), RED);
    assert_eq!(pixmap.pixel(2, 2), RED);
    assert_eq!(pixmap.pixel(4, 4), BLUE);
    assert_eq!(pixmap.pixel(5, 5), TRANSPARENT);
    assert_eq!(canvas.total_matrix(), Affine::IDENTITY);
    assert_eq!(canvas.save_count(), 1);
}

#[test]
fn draw_with_offset_image_filter() {
    let mut canvas = get_canvas(8, 8);
    let paint = Paint {
        image_filter: Some(ImageFilter::Offset(Vec2::new(3.0, 1.0))),
        ..Paint::from(css::RED)
    };
    canvas.draw_paint(&Paint::from(css::TRANSPARENT));
    canvas.draw_rect(&Rect::new(0.0, 0.0, 2.0, 2.0), &paint);

    assert_eq!(canvas.save_count(), 1);
    check_rect(canvas.base_pixmap(), IntRect::new(3, 1, 5, 3), RED, TRANSPARENT);
}

#[test]
fn draw_with_color_image_filter() {
    let mut canvas = get_canvas(4, 4);
    let tint = ColorFilter::Blend {
        color: css::LIME,
        mode: kiln_common::peniko::Compose::SrcIn.into(),
    };
    let paint = Paint {
        image_filter: Some(ImageFilter::ColorFilter(tint)),
        ..Paint::from(css::RED)
    };
    canvas.draw_rect(&Rect::new(0.0, 0.0, 2.0, 2.0), &paint);

    check_rect(canvas.base_pixmap(), IntRect::new(0, 0, 2, 2), LIME, TRANSPARENT);
}

#[test]
fn read_pixels() {
    let mut canvas = get_canvas(4, 4);
    canvas.clip_rect(&Rect::new(0.0, 0.0, 1.0, 1.0), RegionOp::Intersect, false);
    canvas.translate(10.0, 10.0);
    canvas.draw_paint(&Paint::from(css::RED));

    // The matrix and clip do not affect reads.
    let mut dst = filled(2, 2, BLUE);
    assert_eq!(canvas.read_pixels(&mut dst, -1, -1), Ok(()));
    assert_eq!(dst.pixel(0, 0), BLUE);
    assert_eq!(dst.pixel(1, 1), RED);
    assert_eq!(dst.pixel(1, 0), BLUE);

    let mut alpha = Pixmap::new(1, 1, ColorType::Alpha8);
    canvas.read_pixels(&mut alpha, 0, 0).unwrap();
    assert_eq!(alpha.pixel(0, 0).a, 255);
}

#[test]
fn read_pixels_errors() {
    let canvas = get_canvas(4, 4);
    let mut dst = Pixmap::new_n32(2, 2);
    assert_eq!(
        canvas.read_pixels(&mut dst, 10, 0),
        Err(CanvasError::RectOutsideBaseLayer(IntRect::new(10, 0, 12, 2)))
    );

    let mut unknown = Pixmap::new(2, 2, ColorType::Unknown);
    assert_eq!(
        canvas.read_pixels(&mut unknown, 0, 0),
        Err(CanvasError::UnsupportedConversion {
            from: ColorType::Rgba8888,
            to: ColorType::Unknown,
        })
    );

    let no_pixels = Canvas::new(Pixmap::new(4, 4, ColorType::Unknown));
    let err = no_pixels.read_pixels(&mut dst, 0, 0).unwrap_err();
    assert_eq!(err, CanvasError::NoDevicePixels);
    assert_eq!(err.to_string(), "the canvas has no pixel-backed device");
}

#[test]
fn write_pixels() {
    let mut canvas = get_canvas(4, 4);
    canvas.clip_rect(&Rect::new(3.0, 3.0, 4.0, 4.0), RegionOp::Intersect, false);
    let src = filled(2, 2, LIME);
    assert_eq!(canvas.write_pixels(&src, -1, 1), Ok(()));
    assert_eq!(src.lock_count(), 0);

    check_rect(canvas.base_pixmap(), IntRect::new(0, 1, 1, 3), LIME, TRANSPARENT);
    assert_eq!(
        canvas.write_pixels(&src, 4, 0),
        Err(CanvasError::RectOutsideBaseLayer(IntRect::new(4, 0, 6, 2)))
    );
}

#[test]
fn into_pixmap_restores_layers() {
    let mut canvas = get_canvas(4, 4);
    assert_eq!(canvas.base_layer_size(), (4, 4));
    canvas.save_layer(None, None);
    canvas.draw_paint(&Paint::from(css::RED));
    let pixmap = canvas.into_pixmap();

    assert_eq!(covered_count(&pixmap), 16);
    assert_eq!(pixmap.pixel(0, 0), RED);
}

#[test]
fn surface_props_are_kept() {
    let props = SurfaceProps::new(
        SurfacePropsFlags::USE_DEVICE_INDEPENDENT_FONTS,
        LcdConfig {
            order: LcdOrder::Bgr,
            orientation: LcdOrientation::Vertical,
        },
    );
    let canvas = Canvas::with_options(Pixmap::new_n32(2, 2), props, CanvasInitFlags::empty());
    assert_eq!(canvas.props().pixel_geometry, PixelGeometry::BgrV);
    assert!(canvas
        .props()
        .flags
        .contains(SurfacePropsFlags::USE_DEVICE_INDEPENDENT_FONTS));
}

#[test]
fn translucent_pixels_round_trip() {
    let mut canvas = get_canvas(1, 1);
    let mut paint = Paint::from(css::BLUE);
    paint.set_alpha(64);
    canvas.draw_paint(&paint);
    let pixel = canvas.base_pixmap().pixel(0, 0);
    assert_eq!((pixel.r, pixel.g, pixel.a), (0, 0, 64));

    let mut dst = Pixmap::new_n32(1, 1);
    canvas.read_pixels(&mut dst, 0, 0).unwrap();
    assert_eq!(dst.pixel(0, 0), rgba(0, 0, 64, 64));
}

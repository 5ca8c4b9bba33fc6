// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for offscreen layers.

use crate::util::{assert_close, check_rect, filled, get_canvas, BLUE, LIME, RED, TRANSPARENT};
use kiln_common::color::palette::css;
use kiln_common::geom::IntRect;
use kiln_common::kurbo::{Rect, Vec2};
use kiln_common::paint::{ColorFilter, ImageFilter, Paint};
use kiln_common::peniko::Compose;
use kiln_common::pixmap::{ColorType, Pixmap};
use kiln_cpu::{Canvas, SaveLayerFlags, SaveLayerRec};

fn swap_red_blue() -> ColorFilter {
    ColorFilter::Matrix(Box::new([
        0.0, 0.0, 1.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0,
    ]))
}

#[test]
fn layer_composites_on_restore() {
    let mut canvas = get_canvas(10, 10);
    assert_eq!(canvas.save_layer(None, None), 1);
    canvas.draw_rect(&Rect::new(2.0, 3.0, 7.0, 8.0), &Paint::from(css::BLUE));
    // Nothing reaches the base layer before the restore.
    assert_eq!(canvas.base_pixmap().pixel(4, 4), TRANSPARENT);
    canvas.restore();

    assert_eq!(canvas.save_count(), 1);
    check_rect(canvas.base_pixmap(), IntRect::new(2, 3, 7, 8), BLUE, TRANSPARENT);
}

#[test]
fn layer_over_existing_content() {
    let mut canvas = Canvas::new(filled(4, 4, LIME));
    canvas.save_layer(None, None);
    canvas.draw_rect(&Rect::new(0.0, 0.0, 2.0, 4.0), &Paint::from(css::RED));
    canvas.restore();

    check_rect(canvas.base_pixmap(), IntRect::new(0, 0, 2, 4), RED, LIME);
}

#[test]
fn layer_alpha() {
    let mut canvas = get_canvas(4, 4);
    canvas.save_layer_alpha(None, 128);
    canvas.draw_paint(&Paint::from(css::BLUE));
    canvas.draw_rect(&Rect::new(0.0, 0.0, 2.0, 2.0), &Paint::from(css::RED));
    canvas.restore();

    let blue = canvas.base_pixmap().pixel(3, 3);
    assert_close(blue.b, 128);
    assert_close(blue.a, 128);
    assert_eq!((blue.r, blue.g), (0, 0));
    // Overlapping draws inside the layer do not accumulate opacity.
    let red = canvas.base_pixmap().pixel(0, 0);
    assert_close(red.r, 128);
    assert_eq!(red.b, 0);
    assert_close(red.a, 128);
}

#[test]
fn layer_bounds_restrict_the_clip() {
    let mut canvas = get_canvas(8, 8);
    canvas.save_layer(Some(&Rect::new(2.0, 2.0, 6.0, 6.0)), None);
    assert_eq!(canvas.device_clip_bounds(), IntRect::new(2, 2, 6, 6));
    canvas.draw_paint(&Paint::from(css::RED));
    canvas.restore();

    assert_eq!(canvas.device_clip_bounds(), IntRect::new(0, 0, 8, 8));
    check_rect(canvas.base_pixmap(), IntRect::new(2, 2, 6, 6), RED, TRANSPARENT);
}

#[test]
fn layer_bounds_follow_the_matrix() {
    let mut canvas = get_canvas(8, 8);
    canvas.translate(4.0, 0.0);
    canvas.save_layer(Some(&Rect::new(0.0, 0.0, 2.0, 2.0)), None);
    assert_eq!(canvas.device_clip_bounds(), IntRect::new(4, 0, 6, 2));
    canvas.draw_rect(&Rect::new(-4.0, 0.0, 4.0, 8.0), &Paint::from(css::RED));
    canvas.restore();

    check_rect(canvas.base_pixmap(), IntRect::new(4, 0, 6, 2), RED, TRANSPARENT);
}

#[test]
fn dont_clip_to_layer_draws_into_both() {
    let mut canvas = get_canvas(8, 8);
    let bounds = Rect::new(0.0, 0.0, 4.0, 8.0);
    canvas.save_layer_with(SaveLayerRec {
        bounds: Some(&bounds),
        paint: None,
        flags: SaveLayerFlags::DONT_CLIP_TO_LAYER,
    });
    assert_eq!(canvas.device_clip_bounds(), IntRect::new(0, 0, 8, 8));
    canvas.draw_paint(&Paint::from(css::RED));
    // The layer beneath receives the draw straight away.
    assert_eq!(canvas.base_pixmap().pixel(6, 0), RED);
    canvas.restore();

    check_rect(canvas.base_pixmap(), IntRect::new(0, 0, 8, 8), RED, TRANSPARENT);
}

#[test]
fn nested_layers() {
    let mut canvas = get_canvas(6, 6);
    canvas.save_layer(None, None);
    canvas.draw_rect(&Rect::new(0.0, 0.0, 3.0, 6.0), &Paint::from(css::RED));
    canvas.save_layer(Some(&Rect::new(2.0, 0.0, 6.0, 6.0)), None);
    canvas.draw_paint(&Paint::from(css::BLUE));
    canvas.restore_to_count(1);

    let pixmap = canvas.base_pixmap();
    assert_eq!(pixmap.pixel(0, 0), RED);
    assert_eq!(pixmap.pixel(2, 0), BLUE);
    assert_eq!(pixmap.pixel(5, 5), BLUE);
}

#[test]
fn layer_paint_blend_mode() {
    let mut canvas = Canvas::new(filled(4, 4, LIME));
    let paint = Paint {
        blend_mode: Compose::DestOut.into(),
        ..Paint::default()
    };
    canvas.save_layer(None, Some(&paint));
    canvas.draw_rect(&Rect::new(0.0, 0.0, 2.0, 2.0), &Paint::from(css::RED));
    canvas.restore();

    // The layer's coverage punches a hole into the destination.
    check_rect(canvas.base_pixmap(), IntRect::new(0, 0, 2, 2), TRANSPARENT, LIME);
}

#[test]
fn layer_color_filter_image_filter() {
    let mut canvas = get_canvas(4, 4);
    let paint = Paint {
        image_filter: Some(ImageFilter::ColorFilter(swap_red_blue())),
        ..Paint::default()
    };
    canvas.save_layer(None, Some(&paint));
    canvas.draw_paint(&Paint::from(css::RED));
    canvas.restore();

    assert_eq!(canvas.base_pixmap().pixel(1, 1), BLUE);
}

#[test]
fn layer_offset_image_filter() {
    let mut canvas = get_canvas(8, 8);
    let paint = Paint {
        image_filter: Some(ImageFilter::Offset(Vec2::new(2.0, 1.0))),
        ..Paint::default()
    };
    canvas.save_layer(None, Some(&paint));
    canvas.draw_rect(&Rect::new(0.0, 0.0, 2.0, 2.0), &Paint::from(css::RED));
    canvas.restore();

    check_rect(canvas.base_pixmap(), IntRect::new(2, 1, 4, 3), RED, TRANSPARENT);
}

#[test]
fn layers_over_alpha8_stay_alpha8() {
    let mut canvas = Canvas::new(Pixmap::new(4, 4, ColorType::Alpha8));
    canvas.save_layer_alpha(None, 128);
    canvas.draw_paint(&Paint::from(css::RED));
    canvas.restore();

    assert_close(canvas.base_pixmap().pixel(0, 0).a, 128);
}

#[test]
fn layers_over_rgb565() {
    let mut canvas = Canvas::new(Pixmap::new(4, 4, ColorType::Rgb565));
    canvas.save_layer(None, None);
    canvas.draw_rect(&Rect::new(0.0, 0.0, 2.0, 2.0), &Paint::from(css::LIME));
    canvas.restore();

    let pixmap = canvas.base_pixmap();
    assert!(pixmap.pixel(0, 0).g > 250);
    // Transparent layer pixels leave the destination alone.
    assert_eq!(pixmap.pixel(3, 3).g, 0);
}

// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Expansion of one draw call into the draws its paint asks for.

use super::layer::{SaveLayerFlags, SaveLayerRec};
use super::Canvas;
use core::fmt::Debug;
use kiln_common::kurbo::{Rect, Vec2};
use kiln_common::paint::{ColorFilter, DrawLooper, ImageFilter, Paint};

/// The kind of primitive a draw call renders, as reported to a [`DrawFilter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawType {
    /// [`Canvas::draw_paint`] and the calls built on it.
    Paint,
    /// Individual points.
    Point,
    /// Lines and polygons.
    Line,
    /// Rectangles.
    Rect,
}

/// A hook that can modify or veto the paint of every draw made at a save level.
pub trait DrawFilter: Debug {
    /// Adjust `paint` for a draw of kind `ty`. Returning `false` skips the draw.
    fn filter(&self, paint: &mut Paint, ty: DrawType) -> bool;
}

/// Add `filter` after the colour filter already on `paint`.
pub(crate) fn fold_color_filter(paint: &mut Paint, filter: ColorFilter) {
    paint.color_filter = Some(match paint.color_filter.take() {
        Some(inner) => ColorFilter::compose(filter, inner),
        None => filter,
    });
}

/// Produces the paints one draw call is made with.
///
/// An image filter that reduces to a colour filter is folded into the paint. Any other image
/// filter gets a temporary layer carrying it, restored by [`AutoDrawLooper::finish`]. A paint
/// looper yields one paint per looper layer, bottom first, each with its own offset.
#[derive(Debug)]
pub(crate) struct AutoDrawLooper {
    paint: Paint,
    looper: Option<DrawLooper>,
    index: usize,
    temp_layer: bool,
}

impl AutoDrawLooper {
    pub(crate) fn new(canvas: &mut Canvas, paint: &Paint, bounds: Option<&Rect>) -> Self {
        let mut paint = paint.clone();
        let mut temp_layer = false;
        match paint.image_filter.take() {
            Some(ImageFilter::ColorFilter(filter)) => fold_color_filter(&mut paint, filter),
            Some(filter) => {
                let layer_paint = Paint {
                    image_filter: Some(filter),
                    ..Paint::default()
                };
                canvas.save_layer_with(SaveLayerRec {
                    bounds,
                    paint: Some(&layer_paint),
                    flags: SaveLayerFlags::empty(),
                });
                temp_layer = true;
            }
            None => {}
        }
        let looper = paint.looper.take();
        Self {
            paint,
            looper,
            index: 0,
            temp_layer,
        }
    }

    /// The next paint to draw with and the offset to draw it at.
    pub(crate) fn next(&mut self) -> Option<(Paint, Vec2)> {
        let index = self.index;
        self.index += 1;
        match &self.looper {
            None => (index == 0).then(|| (self.paint.clone(), Vec2::ZERO)),
            Some(looper) => {
                let layer = looper.layers().get(index)?;
                let mut paint = self.paint.clone();
                if let Some(color) = layer.color {
                    paint.color = color;
                }
                Some((paint, layer.offset))
            }
        }
    }

    /// Restore the temporary layer, if one was made.
    pub(crate) fn finish(self, canvas: &mut Canvas) {
        if self.temp_layer {
            canvas.restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AutoDrawLooper;
    use crate::canvas::Canvas;
    use kiln_common::color::AlphaColor;
    use kiln_common::kurbo::Vec2;
    use kiln_common::paint::{ColorFilter, DrawLooper, ImageFilter, LooperLayer, Paint};
    use kiln_common::peniko::Compose;
    use kiln_common::pixmap::Pixmap;

    fn canvas() -> Canvas {
        Canvas::new(Pixmap::new_n32(4, 4))
    }

    #[test]
    fn plain_paint_draws_once() {
        let mut canvas = canvas();
        let paint = Paint::from(AlphaColor::from_rgba8(1, 2, 3, 255));
        let mut looper = AutoDrawLooper::new(&mut canvas, &paint, None);
        let (first, offset) = looper.next().unwrap();
        assert_eq!(first.color, paint.color);
        assert_eq!(offset, Vec2::ZERO);
        assert!(looper.next().is_none());
        looper.finish(&mut canvas);
        assert_eq!(canvas.save_count(), 1);
    }

    #[test]
    fn color_image_filter_is_folded() {
        let mut canvas = canvas();
        let filter = ColorFilter::Blend {
            color: AlphaColor::WHITE,
            mode: Compose::SrcIn.into(),
        };
        let paint = Paint {
            image_filter: Some(ImageFilter::ColorFilter(filter.clone())),
            ..Paint::default()
        };
        let mut looper = AutoDrawLooper::new(&mut canvas, &paint, None);
        assert_eq!(canvas.save_count(), 1);
        let (folded, _) = looper.next().unwrap();
        assert!(folded.image_filter.is_none());
        assert_eq!(folded.color_filter, Some(filter));
    }

    #[test]
    fn other_image_filters_get_a_layer() {
        let mut canvas = canvas();
        let paint = Paint {
            image_filter: Some(ImageFilter::Offset(Vec2::new(1.0, 0.0))),
            ..Paint::default()
        };
        let looper = AutoDrawLooper::new(&mut canvas, &paint, None);
        assert_eq!(canvas.save_count(), 2);
        looper.finish(&mut canvas);
        assert_eq!(canvas.save_count(), 1);
    }

    #[test]
    fn looper_layers_bottom_first() {
        let mut canvas = canvas();
        let shadow = AlphaColor::from_rgba8(0, 0, 0, 128);
        let paint = Paint {
            looper: Some(DrawLooper::new(vec![
                LooperLayer {
                    offset: Vec2::new(2.0, 2.0),
                    color: Some(shadow),
                },
                LooperLayer {
                    offset: Vec2::ZERO,
                    color: None,
                },
            ])),
            ..Paint::from(AlphaColor::WHITE)
        };
        let mut looper = AutoDrawLooper::new(&mut canvas, &paint, None);
        let (first, offset) = looper.next().unwrap();
        assert_eq!((first.color, offset), (shadow, Vec2::new(2.0, 2.0)));
        assert!(first.looper.is_none());
        let (second, offset) = looper.next().unwrap();
        assert_eq!((second.color, offset), (AlphaColor::WHITE, Vec2::ZERO));
        assert!(looper.next().is_none());
    }
}

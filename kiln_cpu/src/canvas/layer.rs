// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer records and the save/restore stack records referring to them.

use super::looper::DrawFilter;
use crate::device::BitmapDevice;
use crate::draw::Draw;
use bitflags::bitflags;
use kiln_common::kurbo::{Affine, Rect};
use kiln_common::paint::Paint;
use kiln_common::raster_clip::RasterClip;
use kiln_common::region::RegionOp;
use std::rc::Rc;

/// Index of a layer in the canvas's layer arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LayerId(pub(crate) usize);

/// One device that draws reach, with the clip and matrix mapped into its pixels.
#[derive(Debug)]
pub(crate) struct Layer {
    pub(crate) device: BitmapDevice,
    /// The canvas clip in device pixels, restricted to the device.
    pub(crate) clip: RasterClip,
    /// The canvas matrix followed by the translation to the device origin.
    pub(crate) matrix: Affine,
    /// Applied when the layer is composited into the layers beneath it.
    pub(crate) paint: Option<Paint>,
    /// The next layer the same draws reach.
    pub(crate) next: Option<LayerId>,
}

impl Layer {
    pub(crate) fn new(
        device: BitmapDevice,
        paint: Option<Paint>,
        next: Option<LayerId>,
        conservative_rects: bool,
    ) -> Self {
        Self {
            device,
            clip: RasterClip::new(conservative_rects),
            matrix: Affine::IDENTITY,
            paint,
            next,
        }
    }

    /// Refresh the cached clip and matrix from the canvas state.
    pub(crate) fn update(&mut self, matrix: &Affine, clip: &RasterClip) {
        let (x, y) = self.device.origin;
        self.matrix = Affine::translate((-f64::from(x), -f64::from(y))) * *matrix;
        self.clip.clone_from(clip);
        self.clip.translate(-x, -y);
        self.clip
            .op_irect(self.device.local_bounds(), RegionOp::Intersect);
    }

    /// A draw context for this layer's pixels.
    pub(crate) fn draw(&mut self) -> Draw<'_> {
        Draw::new(&mut self.device.pixmap, self.matrix, &self.clip)
    }
}

/// The state saved by one level of the save/restore stack.
#[derive(Clone, Debug)]
pub(crate) struct McRec {
    pub(crate) matrix: Affine,
    /// The clip in base device pixels.
    pub(crate) clip: RasterClip,
    /// The top-most layer draws at this level reach.
    pub(crate) top_layer: LayerId,
    /// The layer this level introduced, composited when the level is restored.
    pub(crate) layer: Option<LayerId>,
    pub(crate) filter: Option<Rc<dyn DrawFilter>>,
    /// Saves that have not needed a record of their own yet.
    pub(crate) deferred_save_count: u32,
}

impl McRec {
    pub(crate) fn new(clip: RasterClip, top_layer: LayerId) -> Self {
        Self {
            matrix: Affine::IDENTITY,
            clip,
            top_layer,
            layer: None,
            filter: None,
            deferred_save_count: 0,
        }
    }

    /// A copy of this state for a new stack level.
    pub(crate) fn child(&self) -> Self {
        Self {
            layer: None,
            deferred_save_count: 0,
            ..self.clone()
        }
    }
}

bitflags! {
    /// Flags of [`SaveLayerRec`].
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct SaveLayerFlags: u32 {
        /// Do not restrict the clip to the layer bounds, and keep drawing into the layers
        /// beneath as well.
        const DONT_CLIP_TO_LAYER = 1 << 0;
    }
}

/// Parameters of [`Canvas::save_layer_with`](super::Canvas::save_layer_with).
#[derive(Clone, Copy, Debug, Default)]
pub struct SaveLayerRec<'a> {
    /// Local bounds the layer needs to cover; the whole clip if `None`.
    pub bounds: Option<&'a Rect>,
    /// Applied when the layer is composited back on restore.
    pub paint: Option<&'a Paint>,
    /// Behaviour flags.
    pub flags: SaveLayerFlags,
}

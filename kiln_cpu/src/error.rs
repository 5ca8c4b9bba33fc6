// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kiln_common::geom::IntRect;
use kiln_common::pixmap::ColorType;
use thiserror::Error;

/// Errors returned by the fallible [`Canvas`](crate::Canvas) operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanvasError {
    /// The base layer has no pixels that could be read or written.
    #[error("the canvas has no pixel-backed device")]
    NoDevicePixels,
    /// The requested rectangle does not overlap the base layer.
    #[error("rectangle {0:?} lies outside of the base layer")]
    RectOutsideBaseLayer(IntRect),
    /// Pixels cannot be converted between the two formats.
    #[error("cannot convert pixels from {from:?} to {to:?}")]
    UnsupportedConversion {
        /// The format of the source pixels.
        from: ColorType,
        /// The format of the destination pixels.
        to: ColorType,
    },
}

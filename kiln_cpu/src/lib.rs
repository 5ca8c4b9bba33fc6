// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kiln CPU is a software 2D rasterizer core.
//!
//! It draws rectangles, points, lines and whole-clip fills into a [`Pixmap`], clipped by
//! hard-edged or antialiased clips, and composites offscreen layers back on restore.
//!
//! # Usage
//!
//! ```
//! use kiln_cpu::kiln_common::color::AlphaColor;
//! use kiln_cpu::kiln_common::kurbo::Rect;
//! use kiln_cpu::kiln_common::paint::Paint;
//! use kiln_cpu::kiln_common::pixmap::Pixmap;
//! use kiln_cpu::kiln_common::region::RegionOp;
//! use kiln_cpu::Canvas;
//!
//! let mut canvas = Canvas::new(Pixmap::new_n32(16, 16));
//! canvas.clip_rect(&Rect::new(2.0, 2.0, 12.0, 12.0), RegionOp::Intersect, false);
//! canvas.draw_rect(
//!     &Rect::new(0.0, 0.0, 8.0, 8.0),
//!     &Paint::from(AlphaColor::from_rgba8(0, 0, 255, 255)),
//! );
//! let pixmap = canvas.into_pixmap();
//! assert_eq!(pixmap.pixel(4, 4).b, 255);
//! assert_eq!(pixmap.pixel(1, 1).a, 0);
//! ```
//!
//! # Structure
//!
//! - [`Canvas`] keeps the save/restore stack of matrices and clips and the chain of layers.
//! - [`Draw`] scan converts one primitive into one pixmap through a clip.
//! - [`Blitter`](blitter::Blitter) writes coverage runs into pixels; [`Blitter::choose`]
//!   picks the narrowest one for a destination format and paint.
//! - [`scan`] holds the scan converters the draw calls are built on.
// LINEBENDER LINT SET - lib.rs - v3
// See https://linebender.org/wiki/canonical-lints/
// These lints shouldn't apply to examples or tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
// These lints shouldn't apply to examples.
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![forbid(unsafe_code)]
#![expect(
    clippy::cast_possible_truncation,
    reason = "pixel coordinates are clipped to the destination before narrowing, and colour \
channels are clamped to 0..=255"
)]

mod blend;
pub mod blitter;
mod canvas;
mod device;
mod draw;
mod error;
mod mask_filter;
pub mod scan;
pub mod shader;
pub mod surface_props;
mod util;
mod xfer;

pub use blitter::Blitter;
pub use canvas::{Canvas, DrawFilter, DrawType, SaveLayerFlags, SaveLayerRec};
pub use draw::{Draw, PointMode};
pub use error::CanvasError;
pub use kiln_common;
pub use kiln_common::pixmap::Pixmap;

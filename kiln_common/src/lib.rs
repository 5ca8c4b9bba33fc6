// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! This crate includes the clip algebra, coverage masks, pixel buffers and paint values used by
//! [Kiln CPU][kiln_cpu].
//!
//! # Usage
//!
//! This crate should not be used on its own; the types here only become useful once a canvas
//! draws through them. You probably want [Kiln CPU][kiln_cpu].
//!
//! # Contents
//!
//! - [`Region`][region::Region]: a run-length encoded set of rectangles with boolean set algebra.
//! - [`AaClip`][aa_clip::AaClip]: the antialiased counterpart of a region, carrying 8-bit coverage.
//! - [`RasterClip`][raster_clip::RasterClip]: either of the two, chosen by whether antialiasing
//!   was requested.
//! - [`Pixmap`][pixmap::Pixmap] and [`Paint`][paint::Paint]: the pixel buffer and paint values
//!   that the renderer reads from and writes to.
//!
//! [kiln_cpu]: https://crates.io/crates/kiln_cpu
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
    reason = "coordinates are clamped into legal ranges before narrowing, and coverage values \
are bounded by 255 by construction"
)]

pub mod aa_clip;
mod coverage;
pub mod geom;
pub mod mask;
pub mod paint;
pub mod pixmap;
pub mod raster_clip;
pub mod region;
pub mod util;

pub use peniko;
pub use peniko::color;
pub use peniko::kurbo;

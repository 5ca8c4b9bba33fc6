// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Colour conversions and 8-bit pixel arithmetic shared by the blitters.

use kiln_common::color::{AlphaColor, PremulRgba8, Srgb};
use kiln_common::util::{div_255, mul_255};

/// A premultiplied colour with components in `[0, 1]`.
pub(crate) type PremulF32 = [f32; 4];

/// Premultiply an unpremultiplied colour.
pub(crate) fn premultiply(color: AlphaColor<Srgb>) -> PremulF32 {
    let [r, g, b, a] = color.components;
    let a = a.clamp(0.0, 1.0);
    [
        r.clamp(0.0, 1.0) * a,
        g.clamp(0.0, 1.0) * a,
        b.clamp(0.0, 1.0) * a,
        a,
    ]
}

/// Undo [`premultiply`]. Fully transparent colours become transparent black.
pub(crate) fn unpremultiply(color: PremulF32) -> AlphaColor<Srgb> {
    let a = color[3];
    if a <= 0.0 {
        return AlphaColor::new([0.0; 4]);
    }
    AlphaColor::new([color[0] / a, color[1] / a, color[2] / a, a])
}

pub(crate) fn from_rgba8(c: PremulRgba8) -> PremulF32 {
    [c.r, c.g, c.b, c.a].map(|v| f32::from(v) / 255.0)
}

pub(crate) fn to_rgba8(c: PremulF32) -> PremulRgba8 {
    let [r, g, b, a] = c.map(|v| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8);
    // Keep the colour premultiplied after rounding.
    PremulRgba8 {
        r: r.min(a),
        g: g.min(a),
        b: b.min(a),
        a,
    }
}

/// Scale every channel of a premultiplied colour by `alpha`.
#[inline(always)]
pub(crate) fn scale(c: PremulRgba8, alpha: u8) -> PremulRgba8 {
    PremulRgba8 {
        r: mul_255(c.r, alpha),
        g: mul_255(c.g, alpha),
        b: mul_255(c.b, alpha),
        a: mul_255(c.a, alpha),
    }
}

/// Source-over for premultiplied 8-bit colours.
#[inline(always)]
pub(crate) fn src_over(src: PremulRgba8, dst: PremulRgba8) -> PremulRgba8 {
    let inv = 255 - u16::from(src.a);
    let ch = |s: u8, d: u8| (u16::from(s) + div_255(u16::from(d) * inv)).min(255) as u8;
    PremulRgba8 {
        r: ch(src.r, dst.r),
        g: ch(src.g, dst.g),
        b: ch(src.b, dst.b),
        a: ch(src.a, dst.a),
    }
}

/// Source-over of `src` scaled by `coverage`.
#[inline(always)]
pub(crate) fn src_over_coverage(src: PremulRgba8, dst: PremulRgba8, coverage: u8) -> PremulRgba8 {
    match coverage {
        0 => dst,
        255 => src_over(src, dst),
        c => src_over(scale(src, c), dst),
    }
}

/// Source-over on a single alpha channel.
#[inline(always)]
pub(crate) fn src_over_alpha(src: u8, dst: u8) -> u8 {
    (u16::from(src) + div_255(u16::from(dst) * (255 - u16::from(src)))).min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::{from_rgba8, premultiply, scale, src_over, to_rgba8, unpremultiply};
    use kiln_common::color::{AlphaColor, PremulRgba8};

    #[test]
    fn premultiply_round_trip() {
        let color = AlphaColor::from_rgba8(255, 128, 0, 128);
        let premul = premultiply(color);
        assert!((premul[0] - 128.0 / 255.0).abs() < 1e-6);
        let back = unpremultiply(premul);
        assert!((back.components[1] - color.components[1]).abs() < 1e-6);
        assert_eq!(unpremultiply([0.0; 4]).components, [0.0; 4]);
    }

    #[test]
    fn byte_conversion_stays_premultiplied() {
        let c = to_rgba8([0.6, 0.2, 0.0, 0.5]);
        assert_eq!(c.a, 128);
        assert!(c.r <= c.a);
        let f = from_rgba8(PremulRgba8 {
            r: 255,
            g: 0,
            b: 0,
            a: 255,
        });
        assert_eq!(f, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn src_over_8bit() {
        let dst = PremulRgba8 {
            r: 0,
            g: 0,
            b: 255,
            a: 255,
        };
        let opaque = PremulRgba8 {
            r: 255,
            g: 0,
            b: 0,
            a: 255,
        };
        assert_eq!(src_over(opaque, dst), opaque);
        let half = scale(opaque, 128);
        let out = src_over(half, dst);
        assert_eq!(out.a, 255);
        assert_eq!(out.r, 128);
        assert_eq!(out.b, 127);
    }
}

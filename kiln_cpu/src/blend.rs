// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Support for blending in floating point. See <https://www.w3.org/TR/compositing-1/> for the
//! formulas.

use crate::util::{premultiply, unpremultiply, PremulF32};
use kiln_common::paint::ColorFilter;
use kiln_common::peniko::{BlendMode, Compose, Mix};

/// Blend `src` onto `dst` with `mode`, then interpolate towards `dst` by `1 - coverage`.
pub(crate) fn blend(src: PremulF32, dst: PremulF32, mode: BlendMode, coverage: f32) -> PremulF32 {
    let mixed = mix(src, dst, mode.mix);
    let composed = compose(mixed, dst, mode.compose);
    if coverage >= 1.0 {
        return composed;
    }
    let mut out = dst;
    for (o, c) in out.iter_mut().zip(composed) {
        *o += (c - *o) * coverage;
    }
    out
}

/// Apply a colour filter to a premultiplied colour.
pub(crate) fn apply_color_filter(filter: &ColorFilter, color: PremulF32) -> PremulF32 {
    match filter {
        ColorFilter::Blend { color: c, mode } => blend(premultiply(*c), color, *mode, 1.0),
        ColorFilter::Matrix(m) => {
            let [r, g, b, a] = unpremultiply(color).components;
            let mut out = [0.0; 4];
            for (i, o) in out.iter_mut().enumerate() {
                let row = &m[i * 5..i * 5 + 5];
                *o = (row[0] * r + row[1] * g + row[2] * b + row[3] * a + row[4]).clamp(0.0, 1.0);
            }
            [out[0] * out[3], out[1] * out[3], out[2] * out[3], out[3]]
        }
        ColorFilter::Compose { outer, inner } => {
            apply_color_filter(outer, apply_color_filter(inner, color))
        }
    }
}

fn mix(src: PremulF32, bg: PremulF32, mix: Mix) -> PremulF32 {
    if matches!(mix, Mix::Normal | Mix::Clip) {
        return src;
    }
    let bg_alpha = bg[3];
    let cs = unpremultiply(src).components;
    let cb = unpremultiply(bg).components;
    let cs3 = [cs[0], cs[1], cs[2]];
    let cb3 = [cb[0], cb[1], cb[2]];

    let mixed = match mix {
        Mix::Multiply => separable(cs3, cb3, |s, b| s * b),
        Mix::Screen => separable(cs3, cb3, screen),
        Mix::Overlay => separable(cs3, cb3, |s, b| hard_light(b, s)),
        Mix::Darken => separable(cs3, cb3, f32::min),
        Mix::Lighten => separable(cs3, cb3, f32::max),
        Mix::ColorDodge => separable(cs3, cb3, |s, b| {
            if b == 0.0 {
                0.0
            } else if s >= 1.0 {
                1.0
            } else {
                (b / (1.0 - s)).min(1.0)
            }
        }),
        Mix::ColorBurn => separable(cs3, cb3, |s, b| {
            if b >= 1.0 {
                1.0
            } else if s == 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - b) / s).min(1.0)
            }
        }),
        Mix::HardLight => separable(cs3, cb3, hard_light),
        Mix::SoftLight => separable(cs3, cb3, |s, b| {
            let d = if b <= 0.25 {
                ((16.0 * b - 12.0) * b + 4.0) * b
            } else {
                b.sqrt()
            };
            if s <= 0.5 {
                b - (1.0 - 2.0 * s) * b * (1.0 - b)
            } else {
                b + (2.0 * s - 1.0) * (d - b)
            }
        }),
        Mix::Difference => separable(cs3, cb3, |s, b| (s - b).abs()),
        Mix::Exclusion => separable(cs3, cb3, |s, b| s + b - 2.0 * s * b),
        Mix::Hue => set_lum(set_sat(cs3, sat(cb3)), lum(cb3)),
        Mix::Saturation => set_lum(set_sat(cb3, sat(cs3)), lum(cb3)),
        Mix::Color => set_lum(cs3, lum(cb3)),
        Mix::Luminosity => set_lum(cb3, lum(cs3)),
        // Same as `Normal`.
        Mix::Normal | Mix::Clip => cs3,
    };

    // Account for the backdrop alpha, then premultiply again.
    let sa = src[3];
    let mut out = [0.0; 4];
    for i in 0..3 {
        out[i] = ((1.0 - bg_alpha) * cs[i] + bg_alpha * mixed[i]) * sa;
    }
    out[3] = sa;
    out
}

fn compose(src: PremulF32, bg: PremulF32, compose: Compose) -> PremulF32 {
    let al_s = src[3];
    let al_b = bg[3];
    let (fa, fb, saturate) = match compose {
        Compose::Clear => (0.0, 0.0, false),
        Compose::Copy => (1.0, 0.0, false),
        Compose::SrcOver => (1.0, 1.0 - al_s, false),
        Compose::DestOver => (1.0 - al_b, 1.0, false),
        Compose::Dest => (0.0, 1.0, false),
        Compose::SrcIn => (al_b, 0.0, false),
        Compose::DestIn => (0.0, al_s, false),
        Compose::SrcOut => (1.0 - al_b, 0.0, false),
        Compose::DestOut => (0.0, 1.0 - al_s, false),
        Compose::SrcAtop => (al_b, 1.0 - al_s, false),
        Compose::DestAtop => (1.0 - al_b, al_s, false),
        Compose::Xor => (1.0 - al_b, 1.0 - al_s, false),
        Compose::Plus | Compose::PlusLighter => (1.0, 1.0, true),
    };
    let mut out = [0.0; 4];
    for i in 0..4 {
        let v = src[i] * fa + bg[i] * fb;
        out[i] = if saturate { v.clamp(0.0, 1.0) } else { v };
    }
    out
}

fn separable(cs: [f32; 3], cb: [f32; 3], f: impl Fn(f32, f32) -> f32) -> [f32; 3] {
    [f(cs[0], cb[0]), f(cs[1], cb[1]), f(cs[2], cb[2])]
}

fn screen(s: f32, b: f32) -> f32 {
    b + s - s * b
}

fn hard_light(s: f32, b: f32) -> f32 {
    if s <= 0.5 {
        b * (2.0 * s)
    } else {
        screen(b, 2.0 * s - 1.0)
    }
}

fn lum(c: [f32; 3]) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn sat(c: [f32; 3]) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn clip_color(mut c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    for v in &mut c {
        if n < 0.0 {
            *v = l + (*v - l) * l / (l - n);
        }
        if x > 1.0 {
            *v = l + (*v - l) * (1.0 - l) / (x - l);
        }
    }
    c
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color([c[0] + d, c[1] + d, c[2] + d])
}

fn set_sat(c: [f32; 3], s: f32) -> [f32; 3] {
    let mut idx = [0, 1, 2];
    idx.sort_unstable_by(|&a, &b| c[a].total_cmp(&c[b]));
    let [min, mid, max] = idx;
    let mut out = [0.0; 3];
    if c[max] > c[min] {
        out[mid] = (c[mid] - c[min]) * s / (c[max] - c[min]);
        out[max] = s;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{apply_color_filter, blend};
    use kiln_common::color::AlphaColor;
    use kiln_common::paint::ColorFilter;
    use kiln_common::peniko::{BlendMode, Compose, Mix};

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
    const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
    const HALF_RED: [f32; 4] = [0.5, 0.0, 0.0, 0.5];

    fn close(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn porter_duff() {
        assert!(close(blend(HALF_RED, BLUE, Compose::SrcOver.into(), 1.0), [0.5, 0.0, 0.5, 1.0]));
        assert!(close(blend(HALF_RED, BLUE, Compose::Copy.into(), 1.0), HALF_RED));
        assert!(close(blend(HALF_RED, BLUE, Compose::Dest.into(), 1.0), BLUE));
        assert!(close(blend(RED, BLUE, Compose::Clear.into(), 1.0), [0.0; 4]));
        assert!(close(blend(RED, [0.0; 4], Compose::SrcIn.into(), 1.0), [0.0; 4]));
        assert!(close(blend(RED, RED, Compose::Plus.into(), 1.0), RED));
    }

    #[test]
    fn coverage_interpolates_towards_destination() {
        let out = blend(RED, BLUE, Compose::Copy.into(), 0.25);
        assert!(close(out, [0.25, 0.0, 0.75, 1.0]));
        assert!(close(blend(RED, BLUE, Compose::Copy.into(), 0.0), BLUE));
    }

    #[test]
    fn separable_and_non_separable_mix() {
        let gray = [0.5, 0.5, 0.5, 1.0];
        let multiply = BlendMode::new(Mix::Multiply, Compose::SrcOver);
        assert!(close(blend(gray, gray, multiply, 1.0), [0.25, 0.25, 0.25, 1.0]));
        let screen = BlendMode::new(Mix::Screen, Compose::SrcOver);
        assert!(close(blend(gray, gray, screen, 1.0), [0.75, 0.75, 0.75, 1.0]));
        let difference = BlendMode::new(Mix::Difference, Compose::SrcOver);
        assert!(close(blend(RED, RED, difference, 1.0), [0.0, 0.0, 0.0, 1.0]));
        // Luminosity of a gray source over gray keeps the gray.
        let luminosity = BlendMode::new(Mix::Luminosity, Compose::SrcOver);
        assert!(close(blend(gray, gray, luminosity, 1.0), gray));
        // Without a backdrop the source shows unchanged.
        assert!(close(blend(RED, [0.0; 4], multiply, 1.0), RED));
    }

    #[test]
    fn color_filters() {
        let tint = ColorFilter::Blend {
            color: AlphaColor::from_rgba8(0, 255, 0, 255),
            mode: Compose::SrcAtop.into(),
        };
        assert!(close(apply_color_filter(&tint, HALF_RED), [0.0, 0.5, 0.0, 0.5]));

        #[rustfmt::skip]
        let swap_rb = ColorFilter::Matrix(Box::new([
            0.0, 0.0, 1.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0, 0.0,
            1.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0, 0.0,
        ]));
        assert!(close(apply_color_filter(&swap_rb, HALF_RED), [0.0, 0.0, 0.5, 0.5]));

        let both = ColorFilter::compose(swap_rb, tint);
        assert!(close(apply_color_filter(&both, HALF_RED), [0.0, 0.5, 0.0, 0.5]));
    }
}

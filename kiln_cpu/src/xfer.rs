// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Whole-region pixel transfers that bypass blitter construction.

use crate::util::{premultiply, to_rgba8};
use kiln_common::color::PremulRgba8;
use kiln_common::geom::IntRect;
use kiln_common::paint::Paint;
use kiln_common::peniko::{Compose, Mix};
use kiln_common::pixmap::{pack_565, ColorType, Pixmap};
use kiln_common::region::Region;

/// A transfer that writes one constant value, or nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Xfer {
    /// Write zero.
    Clear,
    /// Leave the destination alone.
    Dst,
    /// Write a 32-bit pixel.
    Src32(PremulRgba8),
    /// Write a 16-bit pixel.
    Src16(u16),
    /// Write an 8-bit alpha.
    Src8(u8),
}

impl Xfer {
    /// Return the transfer `paint` reduces to on a destination of `color_type`, if any.
    pub(crate) fn from_paint(paint: &Paint, color_type: ColorType) -> Option<Self> {
        if paint.shader.is_some()
            || paint.color_filter.is_some()
            || paint.mask_filter.is_some()
            || !matches!(paint.blend_mode.mix, Mix::Normal | Mix::Clip)
        {
            return None;
        }
        let alpha = paint.alpha();
        let src = match paint.blend_mode.compose {
            Compose::Clear => return Some(Self::Clear),
            Compose::Dest => return Some(Self::Dst),
            Compose::SrcOver if alpha == 0 => return Some(Self::Dst),
            Compose::SrcOver if alpha == 0xFF => to_rgba8(premultiply(paint.color)),
            Compose::Copy => to_rgba8(premultiply(paint.color)),
            _ => return None,
        };
        match color_type {
            ColorType::Rgba8888 => Some(Self::Src32(src)),
            ColorType::Rgb565 => Some(Self::Src16(pack_565(src))),
            ColorType::Alpha8 => Some(Self::Src8(src.a)),
            ColorType::Unknown => None,
        }
    }

    /// Apply the transfer to every rectangle of `region` inside `bounds`.
    pub(crate) fn apply(self, pixmap: &mut Pixmap, region: &Region, bounds: &IntRect) {
        let bytes = pixmap.color_type().bytes_per_pixel();
        let pattern: ([u8; 4], usize) = match self {
            Self::Clear => ([0; 4], bytes),
            Self::Dst => return,
            Self::Src32(c) => ([c.r, c.g, c.b, c.a], 4),
            Self::Src16(v) => {
                let [lo, hi] = v.to_le_bytes();
                ([lo, hi, 0, 0], 2)
            }
            Self::Src8(a) => ([a, 0, 0, 0], 1),
        };
        let (value, size) = pattern;
        if size != bytes {
            return;
        }
        let Some(bounds) = bounds.intersect(&pixmap.bounds()) else {
            return;
        };
        for rect in region.cliperator(bounds) {
            let start = rect.left as usize * size;
            let end = rect.right as usize * size;
            for y in rect.top..rect.bottom {
                let row = &mut pixmap.row_mut(y as usize)[start..end];
                for px in row.chunks_exact_mut(size) {
                    px.copy_from_slice(&value[..size]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Xfer;
    use kiln_common::color::{AlphaColor, PremulRgba8};
    use kiln_common::geom::IntRect;
    use kiln_common::paint::{Paint, Shader};
    use kiln_common::peniko::{BlendMode, Compose, Mix};
    use kiln_common::pixmap::{ColorType, Pixmap};
    use kiln_common::region::{Region, RegionOp};

    #[test]
    fn reductions() {
        let red = Paint::from(AlphaColor::from_rgba8(255, 0, 0, 255));
        let expected = PremulRgba8 {
            r: 255,
            g: 0,
            b: 0,
            a: 255,
        };
        assert_eq!(
            Xfer::from_paint(&red, ColorType::N32),
            Some(Xfer::Src32(expected))
        );
        assert_eq!(
            Xfer::from_paint(&red, ColorType::Rgb565),
            Some(Xfer::Src16(0xF800))
        );

        let mut clear = red.clone();
        clear.blend_mode = Compose::Clear.into();
        assert_eq!(Xfer::from_paint(&clear, ColorType::N32), Some(Xfer::Clear));

        let mut invisible = red.clone();
        invisible.set_alpha(0);
        assert_eq!(Xfer::from_paint(&invisible, ColorType::N32), Some(Xfer::Dst));

        let mut translucent = red.clone();
        translucent.set_alpha(128);
        assert_eq!(Xfer::from_paint(&translucent, ColorType::N32), None);
        translucent.blend_mode = Compose::Copy.into();
        assert_eq!(
            Xfer::from_paint(&translucent, ColorType::Alpha8),
            Some(Xfer::Src8(128))
        );

        let mut shaded = red.clone();
        shaded.shader = Some(Shader::Color(AlphaColor::BLACK));
        assert_eq!(Xfer::from_paint(&shaded, ColorType::N32), None);

        let mut multiply = red;
        multiply.blend_mode = BlendMode::new(Mix::Multiply, Compose::SrcOver);
        assert_eq!(Xfer::from_paint(&multiply, ColorType::N32), None);
    }

    #[test]
    fn apply_over_region() {
        let mut pixmap = Pixmap::new(4, 2, ColorType::Alpha8);
        let mut region = Region::from_rect(IntRect::new(0, 0, 1, 2));
        region.op_rect(IntRect::new(3, 0, 4, 1), RegionOp::Union);
        Xfer::Src8(7).apply(&mut pixmap, &region, &IntRect::new(0, 0, 4, 2));
        assert_eq!(pixmap.data(), [7, 0, 0, 7, 7, 0, 0, 0]);

        Xfer::Clear.apply(&mut pixmap, &region, &IntRect::new(0, 1, 4, 2));
        assert_eq!(pixmap.data(), [7, 0, 0, 7, 0, 0, 0, 0]);
    }
}

// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Picking the narrowest blitter for a destination and a paint.

use super::{
    A8Blitter, A8CoverageBlitter, A8ShaderBlitter, Blit, Blitter, N32BlackBlitter,
    N32BlendBlitter, N32OpaqueBlitter, N32ShaderBlitter, PipelineBlitter, Rgb565BlendBlitter,
    Rgb565OpaqueBlitter, Rgb565ShaderBlitter, Shade, ThreeDBlitter,
};
use crate::blend::apply_color_filter;
use crate::shader::ShaderContext;
use crate::util::{premultiply, to_rgba8, unpremultiply};
use kiln_common::color::AlphaColor;
use kiln_common::kurbo::Affine;
use kiln_common::paint::{MaskFilter, Paint, Shader};
use kiln_common::peniko::{Compose, Mix};
use kiln_common::pixmap::{ColorType, Pixmap};
use log::debug;
use std::borrow::Cow;

/// What a Porter-Duff mode amounts to for a given paint and destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Interpretation {
    /// Plain source-over.
    SrcOver,
    /// The destination cannot change.
    Skip,
    /// The mode has to be evaluated.
    Mode,
}

/// The paint is one opaque colour with nothing modifying it.
fn just_solid_color(paint: &Paint) -> bool {
    paint.alpha() == 0xFF && paint.shader.is_none() && paint.color_filter.is_none()
}

fn interpret(paint: &Paint, dst_is_opaque: bool) -> Interpretation {
    match paint.blend_mode.compose {
        Compose::SrcOver => Interpretation::SrcOver,
        Compose::Copy if just_solid_color(paint) => Interpretation::SrcOver,
        Compose::Dest => Interpretation::Skip,
        Compose::DestOver if dst_is_opaque => Interpretation::Skip,
        Compose::SrcIn if dst_is_opaque && just_solid_color(paint) => Interpretation::SrcOver,
        Compose::DestIn if just_solid_color(paint) => Interpretation::Skip,
        _ => Interpretation::Mode,
    }
}

impl<'a> Blitter<'a> {
    /// Choose the blitter that draws `paint` into `pixmap`.
    ///
    /// `matrix` maps the paint's shader into device space. With `draw_coverage` the blitter
    /// writes raw coverage instead of colour, which is only meaningful for `Alpha8`
    /// destinations. Combinations that cannot be drawn yield the null blitter.
    pub fn choose(
        pixmap: &'a mut Pixmap,
        matrix: &Affine,
        paint: &Paint,
        draw_coverage: bool,
    ) -> Self {
        let color_type = pixmap.color_type();
        if color_type == ColorType::Unknown {
            debug!("no blitter for a destination of unknown format");
            return Self::null();
        }
        if draw_coverage {
            // The coverage blitter only exists for Alpha8 destinations.
            if color_type == ColorType::Alpha8 {
                return Self::A8Coverage(A8CoverageBlitter::new(pixmap));
            }
            debug!("coverage can only be drawn into alpha destinations");
            return Self::null();
        }

        let three_d = matches!(paint.mask_filter, Some(MaskFilter::Emboss { .. }));
        let mut paint = Cow::Borrowed(paint);
        let separable_mix = matches!(paint.blend_mode.mix, Mix::Normal | Mix::Clip);

        if separable_mix {
            match interpret(&paint, color_type.is_always_opaque()) {
                Interpretation::Skip => {
                    debug!("blend mode leaves the destination unchanged");
                    return Self::null();
                }
                Interpretation::SrcOver => {
                    if paint.blend_mode.compose != Compose::SrcOver {
                        paint.to_mut().blend_mode = Compose::SrcOver.into();
                    }
                }
                Interpretation::Mode => {}
            }
            if paint.blend_mode.compose == Compose::Clear {
                let p = paint.to_mut();
                p.blend_mode = Compose::Copy.into();
                p.color = AlphaColor::TRANSPARENT;
                p.shader = None;
                p.color_filter = None;
            }
        }

        // Mix modes go through the general pipeline.
        if !separable_mix {
            let Some(context) = source_context(&paint, matrix, three_d) else {
                debug!("shader cannot be drawn with a singular matrix");
                return Self::null();
            };
            let pipeline = Self::Pipeline(PipelineBlitter::new(
                pixmap,
                context,
                paint.color_filter.clone(),
                paint.blend_mode,
            ));
            return wrap_three_d(pipeline, three_d);
        }

        let has_mode = paint.blend_mode.compose != Compose::SrcOver;
        if paint.shader.is_none() {
            if let Some(filter) = &paint.color_filter {
                let color = unpremultiply(apply_color_filter(filter, premultiply(paint.color)));
                let p = paint.to_mut();
                p.color = color;
                p.color_filter = None;
            }
            if has_mode || three_d {
                let p = paint.to_mut();
                p.shader = Some(Shader::Color(p.color.with_alpha(1.0)));
            }
        }
        if paint.shader.is_some() && paint.color_filter.is_some() {
            let p = paint.to_mut();
            if let (Some(shader), Some(filter)) = (p.shader.take(), p.color_filter.take()) {
                p.shader = Some(Shader::Filtered {
                    shader: Box::new(shader),
                    filter,
                });
            }
        }

        let shade = match &paint.shader {
            Some(shader) => {
                let alpha = paint.color.components[3];
                let Some(mut context) = ShaderContext::new(shader, alpha, matrix) else {
                    debug!("shader cannot be drawn with a singular matrix");
                    return Self::null();
                };
                if three_d {
                    context = context.into_three_d();
                }
                let mode = has_mode.then_some(paint.blend_mode);
                Some(Shade::new(context, mode))
            }
            None => None,
        };

        let color = to_rgba8(premultiply(paint.color));
        let blitter = match (color_type, shade) {
            (ColorType::Rgba8888, Some(shade)) => {
                Self::N32Shader(N32ShaderBlitter::new(pixmap, shade))
            }
            (ColorType::Rgba8888, None) if color.a == 0xFF => {
                if color.r == 0 && color.g == 0 && color.b == 0 {
                    Self::N32Black(N32BlackBlitter::new(pixmap))
                } else {
                    Self::N32Opaque(N32OpaqueBlitter::new(pixmap, color))
                }
            }
            (ColorType::Rgba8888, None) => Self::N32Blend(N32BlendBlitter::new(pixmap, color)),
            (ColorType::Alpha8, Some(shade)) => Self::A8Shader(A8ShaderBlitter::new(pixmap, shade)),
            (ColorType::Alpha8, None) => Self::A8(A8Blitter::new(pixmap, color.a)),
            (ColorType::Rgb565, Some(shade)) => {
                Self::Rgb565Shader(Rgb565ShaderBlitter::new(pixmap, shade))
            }
            (ColorType::Rgb565, None) if color.a == 0xFF => {
                Self::Rgb565Opaque(Rgb565OpaqueBlitter::new(pixmap, color))
            }
            (ColorType::Rgb565, None) => Self::Rgb565Blend(Rgb565BlendBlitter::new(pixmap, color)),
            (ColorType::Unknown, _) => Self::null(),
        };
        wrap_three_d(blitter, three_d)
    }
}

/// The shader context for the paint, synthesizing one from the colour if it has no shader.
fn source_context(paint: &Paint, matrix: &Affine, three_d: bool) -> Option<ShaderContext> {
    let context = match &paint.shader {
        Some(shader) => ShaderContext::new(shader, paint.color.components[3], matrix)?,
        None => ShaderContext::Color(premultiply(paint.color)),
    };
    Some(if three_d {
        context.into_three_d()
    } else {
        context
    })
}

fn wrap_three_d(blitter: Blitter<'_>, three_d: bool) -> Blitter<'_> {
    if three_d && !blitter.is_null() {
        Blitter::ThreeD(ThreeDBlitter::new(blitter))
    } else {
        blitter
    }
}

#[cfg(test)]
mod tests {
    use crate::blitter::{Blit, Blitter, BlitterKind};
    use kiln_common::color::AlphaColor;
    use kiln_common::kurbo::{Affine, Point};
    use kiln_common::paint::{
        ColorFilter, ColorStop, EmbossLight, LinearGradient, MaskFilter, Paint, Shader,
    };
    use kiln_common::peniko::{BlendMode, Compose, Mix};
    use kiln_common::pixmap::{ColorType, Pixmap};

    fn kind(color_type: ColorType, paint: &Paint) -> BlitterKind {
        let mut pixmap = Pixmap::new(4, 4, color_type);
        Blitter::choose(&mut pixmap, &Affine::IDENTITY, paint, false).kind()
    }

    fn red() -> Paint {
        Paint::from(AlphaColor::from_rgba8(255, 0, 0, 255))
    }

    fn gradient() -> Shader {
        Shader::LinearGradient(LinearGradient {
            start: Point::new(0.0, 0.0),
            end: Point::new(4.0, 0.0),
            stops: vec![ColorStop {
                offset: 0.0,
                color: AlphaColor::from_rgba8(0, 0, 255, 255),
            }],
        })
    }

    #[test]
    fn unknown_destination_is_null() {
        assert_eq!(kind(ColorType::Unknown, &red()), BlitterKind::Null);
    }

    #[test]
    fn draw_coverage() {
        let mut pixmap = Pixmap::new(2, 2, ColorType::Alpha8);
        let blitter = Blitter::choose(&mut pixmap, &Affine::IDENTITY, &red(), true);
        assert_eq!(blitter.kind(), BlitterKind::A8Coverage);
        let mut pixmap = Pixmap::new_n32(2, 2);
        let blitter = Blitter::choose(&mut pixmap, &Affine::IDENTITY, &red(), true);
        assert!(blitter.is_null());
    }

    #[test]
    fn n32_solid_colours() {
        assert_eq!(kind(ColorType::N32, &red()), BlitterKind::N32Opaque);
        assert_eq!(kind(ColorType::N32, &Paint::default()), BlitterKind::N32Black);
        let translucent = Paint::from(AlphaColor::from_rgba8(255, 0, 0, 100));
        assert_eq!(kind(ColorType::N32, &translucent), BlitterKind::N32Blend);
    }

    #[test]
    fn selection_is_deterministic() {
        let paint = red();
        let first = kind(ColorType::N32, &paint);
        for _ in 0..8 {
            assert_eq!(kind(ColorType::N32, &paint), first);
        }
    }

    #[test]
    fn blend_mode_interpretation() {
        // Copy with an opaque solid colour is plain source-over.
        let mut paint = red();
        paint.blend_mode = Compose::Copy.into();
        assert_eq!(kind(ColorType::N32, &paint), BlitterKind::N32Opaque);

        paint.blend_mode = Compose::Dest.into();
        assert_eq!(kind(ColorType::N32, &paint), BlitterKind::Null);

        paint.blend_mode = Compose::DestIn.into();
        assert_eq!(kind(ColorType::N32, &paint), BlitterKind::Null);

        // An opaque destination is never changed by `DestOver`.
        paint.blend_mode = Compose::DestOver.into();
        assert_eq!(kind(ColorType::Rgb565, &paint), BlitterKind::Null);
        assert_eq!(kind(ColorType::N32, &paint), BlitterKind::N32Shader);

        paint.blend_mode = Compose::SrcIn.into();
        assert_eq!(kind(ColorType::Rgb565, &paint), BlitterKind::Rgb565Opaque);

        // Translucent copies need the mode.
        let mut translucent = Paint::from(AlphaColor::from_rgba8(255, 0, 0, 100));
        translucent.blend_mode = Compose::Copy.into();
        assert_eq!(kind(ColorType::N32, &translucent), BlitterKind::N32Shader);
    }

    #[test]
    fn clear_writes_transparent() {
        let mut pixmap = Pixmap::new_n32(2, 1);
        pixmap.erase(kiln_common::color::PremulRgba8 {
            r: 9,
            g: 9,
            b: 9,
            a: 9,
        });
        let paint = Paint {
            blend_mode: Compose::Clear.into(),
            shader: Some(gradient()),
            ..red()
        };
        let mut blitter = Blitter::choose(&mut pixmap, &Affine::IDENTITY, &paint, false);
        blitter.blit_h(0, 0, 2);
        drop(blitter);
        assert_eq!(pixmap.data(), [0; 8]);
    }

    #[test]
    fn mix_modes_use_the_pipeline() {
        let mut paint = red();
        paint.blend_mode = BlendMode::new(Mix::Multiply, Compose::SrcOver);
        for color_type in [ColorType::N32, ColorType::Alpha8, ColorType::Rgb565] {
            assert_eq!(kind(color_type, &paint), BlitterKind::Pipeline);
        }
    }

    #[test]
    fn shaders_per_format() {
        let paint = Paint {
            shader: Some(gradient()),
            ..red()
        };
        assert_eq!(kind(ColorType::N32, &paint), BlitterKind::N32Shader);
        assert_eq!(kind(ColorType::Alpha8, &paint), BlitterKind::A8Shader);
        assert_eq!(kind(ColorType::Rgb565, &paint), BlitterKind::Rgb565Shader);

        let mut pixmap = Pixmap::new_n32(2, 2);
        let singular = Affine::scale(0.0);
        assert!(Blitter::choose(&mut pixmap, &singular, &paint, false).is_null());
    }

    #[test]
    fn color_filter_is_folded_into_the_colour() {
        let paint = Paint {
            color_filter: Some(ColorFilter::Blend {
                color: AlphaColor::from_rgba8(0, 255, 0, 255),
                mode: Compose::SrcAtop.into(),
            }),
            ..red()
        };
        let mut pixmap = Pixmap::new_n32(1, 1);
        let blitter = Blitter::choose(&mut pixmap, &Affine::IDENTITY, &paint, false);
        assert_eq!(blitter.kind(), BlitterKind::N32Opaque);
        assert_eq!(blitter.just_an_opaque_color().map(|c| c.g), Some(255));
    }

    #[test]
    fn emboss_wraps_in_three_d() {
        let paint = Paint {
            mask_filter: Some(MaskFilter::Emboss {
                light: EmbossLight {
                    direction: [1.0, 1.0, 1.0],
                    ambient: 32,
                    specular: 16,
                },
                blur_radius: 2.0,
            }),
            ..red()
        };
        let mut pixmap = Pixmap::new_n32(2, 2);
        let mut blitter = Blitter::choose(&mut pixmap, &Affine::IDENTITY, &paint, false);
        assert_eq!(blitter.kind(), BlitterKind::ThreeD);
        assert_eq!(blitter.inner_kind(), BlitterKind::N32Shader);
        assert!(blitter.shader_context_mut().is_some());
    }
}

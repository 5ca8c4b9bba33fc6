// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-draw evaluation state for shaders.

use crate::blend::apply_color_filter;
use crate::util::{from_rgba8, premultiply, PremulF32};
use kiln_common::color::{AlphaColor, Srgb};
use kiln_common::kurbo::{Affine, Point, Vec2};
use kiln_common::mask::{Mask, Plane};
use kiln_common::paint::{ColorFilter, ColorStop, Shader};
use kiln_common::pixmap::Pixmap;
use std::rc::Rc;

/// A shader prepared for one draw call: its transform is inverted and its colours premultiplied.
#[derive(Debug)]
pub enum ShaderContext {
    /// A constant colour.
    Color(PremulF32),
    /// A linear gradient evaluated in device space.
    LinearGradient {
        /// Maps device space to the gradient's local space.
        inverse: Affine,
        /// Where offset 0 lies.
        start: Point,
        /// `end - start`, divided by its squared length.
        axis: Vec2,
        /// Unpremultiplied stops.
        stops: Vec<ColorStop>,
        /// Paint alpha multiplied into every colour.
        alpha: f32,
    },
    /// A pixmap sampled with nearest neighbour.
    Image {
        /// The pixels.
        pixmap: Rc<Pixmap>,
        /// Maps device space to pixmap space.
        inverse: Affine,
        /// Paint alpha multiplied into every colour.
        alpha: f32,
    },
    /// Another context whose output is filtered.
    Filtered {
        /// The context producing colours.
        inner: Box<ShaderContext>,
        /// The filter.
        filter: ColorFilter,
    },
    /// Another context modulated by the multiply and add planes of a three-plane mask.
    ThreeD {
        /// The context producing colours.
        inner: Box<ShaderContext>,
        /// The mask of the current `blit_mask` call.
        mask: Option<Mask>,
    },
}

impl ShaderContext {
    /// Prepare `shader` for drawing with `matrix`, or return `None` if the matrix cannot be
    /// inverted.
    pub fn new(shader: &Shader, alpha: f32, matrix: &Affine) -> Option<Self> {
        let ctx = match shader {
            Shader::Color(color) => {
                let mut c = premultiply(*color);
                for v in &mut c {
                    *v *= alpha;
                }
                Self::Color(c)
            }
            Shader::LinearGradient(gradient) => {
                let Some(last) = gradient.stops.last() else {
                    return Some(Self::Color([0.0; 4]));
                };
                let axis = gradient.end - gradient.start;
                let len2 = axis.hypot2();
                if len2 == 0.0 {
                    return Self::new(&Shader::Color(last.color), alpha, matrix);
                }
                Self::LinearGradient {
                    inverse: invert(matrix)?,
                    start: gradient.start,
                    axis: axis / len2,
                    stops: gradient.stops.clone(),
                    alpha,
                }
            }
            Shader::Image(image) => Self::Image {
                pixmap: image.pixmap.clone(),
                inverse: invert(&(*matrix * image.transform))?,
                alpha,
            },
            Shader::Filtered { shader, filter } => Self::Filtered {
                inner: Box::new(Self::new(shader, alpha, matrix)?),
                filter: filter.clone(),
            },
        };
        Some(ctx)
    }

    /// Wrap a context so that it honours three-plane masks.
    pub fn into_three_d(self) -> Self {
        Self::ThreeD {
            inner: Box::new(self),
            mask: None,
        }
    }

    /// Install or remove the three-plane mask of a [`ThreeD`](Self::ThreeD) context.
    ///
    /// Returns whether the context accepted the mask.
    pub fn set_3d_mask(&mut self, new_mask: Option<Mask>) -> bool {
        match self {
            Self::ThreeD { mask, .. } => {
                *mask = new_mask;
                true
            }
            _ => false,
        }
    }

    /// The colour produced for every pixel, if it does not vary.
    pub fn constant(&self) -> Option<PremulF32> {
        match self {
            Self::Color(c) => Some(*c),
            Self::Filtered { inner, filter } => {
                inner.constant().map(|c| apply_color_filter(filter, c))
            }
            _ => None,
        }
    }

    /// Return whether every produced colour is opaque.
    pub fn is_opaque(&self) -> bool {
        match self {
            Self::Color(c) => c[3] >= 1.0,
            Self::LinearGradient { stops, alpha, .. } => {
                *alpha >= 1.0 && stops.iter().all(|s| s.color.components[3] >= 1.0)
            }
            Self::Image { .. } | Self::Filtered { .. } | Self::ThreeD { .. } => false,
        }
    }

    /// Shade `out.len()` pixels of row `y`, starting at column `x`.
    pub fn shade_row(&self, x: i32, y: i32, out: &mut [PremulF32]) {
        match self {
            Self::Color(c) => out.fill(*c),
            Self::LinearGradient {
                inverse,
                start,
                axis,
                stops,
                alpha,
            } => {
                for (px, o) in (x..).zip(out.iter_mut()) {
                    let p = *inverse * pixel_center(px, y);
                    let t = ((p - *start).dot(*axis) as f32).clamp(0.0, 1.0);
                    let mut c = premultiply(sample_stops(stops, t));
                    for v in &mut c {
                        *v *= alpha;
                    }
                    *o = c;
                }
            }
            Self::Image {
                pixmap,
                inverse,
                alpha,
            } => {
                let (w, h) = (f64::from(pixmap.width()), f64::from(pixmap.height()));
                for (px, o) in (x..).zip(out.iter_mut()) {
                    let p = *inverse * pixel_center(px, y);
                    *o = if p.x >= 0.0 && p.y >= 0.0 && p.x < w && p.y < h {
                        let mut c = from_rgba8(pixmap.pixel(p.x as u16, p.y as u16));
                        for v in &mut c {
                            *v *= alpha;
                        }
                        c
                    } else {
                        [0.0; 4]
                    };
                }
            }
            Self::Filtered { inner, filter } => {
                inner.shade_row(x, y, out);
                for c in out.iter_mut() {
                    *c = apply_color_filter(filter, *c);
                }
            }
            Self::ThreeD { inner, mask } => {
                inner.shade_row(x, y, out);
                let Some(mask) = mask else {
                    return;
                };
                for (px, c) in (x..).zip(out.iter_mut()) {
                    let mul = f32::from(mask.plane_at(Plane::Mul, px, y)) / 255.0;
                    let add = f32::from(mask.plane_at(Plane::Add, px, y)) / 255.0;
                    let a = c[3];
                    for v in &mut c[..3] {
                        *v = (*v * mul + add * a).min(a);
                    }
                }
            }
        }
    }
}

fn invert(matrix: &Affine) -> Option<Affine> {
    let det = matrix.determinant();
    (det != 0.0 && det.is_finite()).then(|| matrix.inverse())
}

fn pixel_center(x: i32, y: i32) -> Point {
    Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5)
}

/// Interpolate unpremultiplied stop colours at `t`, padding beyond the ends.
fn sample_stops(stops: &[ColorStop], t: f32) -> AlphaColor<Srgb> {
    let first = stops[0];
    if t <= first.offset {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            let f = if span > 0.0 { (t - a.offset) / span } else { 1.0 };
            let mut c = a.color.components;
            for (v, w) in c.iter_mut().zip(b.color.components) {
                *v += (w - *v) * f;
            }
            return AlphaColor::new(c);
        }
    }
    stops[stops.len() - 1].color
}

#[cfg(test)]
mod tests {
    use super::ShaderContext;
    use kiln_common::color::{AlphaColor, PremulRgba8};
    use kiln_common::kurbo::{Affine, Point};
    use kiln_common::paint::{ColorStop, LinearGradient, Shader};
    use kiln_common::pixmap::Pixmap;
    use std::rc::Rc;

    #[test]
    fn singular_matrix_has_no_context() {
        let shader = Shader::LinearGradient(LinearGradient {
            start: Point::new(0.0, 0.0),
            end: Point::new(10.0, 0.0),
            stops: vec![ColorStop {
                offset: 0.0,
                color: AlphaColor::from_rgba8(0, 0, 0, 255),
            }],
        });
        assert!(ShaderContext::new(&shader, 1.0, &Affine::scale(0.0)).is_none());
        assert!(ShaderContext::new(&shader, 1.0, &Affine::IDENTITY).is_some());
    }

    #[test]
    fn linear_gradient_pads_and_interpolates() {
        let shader = Shader::LinearGradient(LinearGradient {
            start: Point::new(0.0, 0.0),
            end: Point::new(4.0, 0.0),
            stops: vec![
                ColorStop {
                    offset: 0.0,
                    color: AlphaColor::from_rgba8(0, 0, 0, 255),
                },
                ColorStop {
                    offset: 1.0,
                    color: AlphaColor::from_rgba8(255, 0, 0, 255),
                },
            ],
        });
        let ctx = ShaderContext::new(&shader, 1.0, &Affine::IDENTITY).unwrap();
        assert!(ctx.is_opaque());
        let mut row = [[0.0; 4]; 6];
        ctx.shade_row(-1, 0, &mut row);
        assert_eq!(row[0][0], 0.0);
        assert!((row[2][0] - 0.375).abs() < 1e-6);
        assert_eq!(row[5][0], 1.0);
    }

    #[test]
    fn image_is_transparent_outside() {
        let mut pixmap = Pixmap::new_n32(2, 2);
        pixmap.erase(PremulRgba8 {
            r: 0,
            g: 255,
            b: 0,
            a: 255,
        });
        let shader = Shader::image_at(Rc::new(pixmap), 1.0, 0.0);
        let ctx = ShaderContext::new(&shader, 1.0, &Affine::IDENTITY).unwrap();
        let mut row = [[0.0; 4]; 4];
        ctx.shade_row(0, 0, &mut row);
        assert_eq!(row[0], [0.0; 4]);
        assert_eq!(row[1], [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(row[2], [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(row[3], [0.0; 4]);
    }

    #[test]
    fn constant_colour_is_scaled_by_alpha() {
        let shader = Shader::Color(AlphaColor::from_rgba8(255, 255, 255, 255));
        let ctx = ShaderContext::new(&shader, 0.5, &Affine::IDENTITY).unwrap();
        assert_eq!(ctx.constant(), Some([0.5; 4]));
        assert!(!ctx.is_opaque());
    }
}

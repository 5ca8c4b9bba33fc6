// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Types for paints.
//!
//! These are plain values describing what colour to write. The renderer only reads them; all
//! evaluation happens in the CPU crate.

use crate::kurbo::{Affine, Point, Vec2};
use crate::peniko::color::{AlphaColor, Srgb};
use crate::peniko::{BlendMode, Compose, Mix};
use crate::pixmap::Pixmap;
use std::rc::Rc;

/// How a geometry is turned into pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Style {
    /// Fill the interior.
    #[default]
    Fill,
    /// Stroke the outline with the paint's stroke width.
    Stroke,
    /// Fill the interior and stroke the outline.
    StrokeAndFill,
}

/// The shape at the ends of open strokes, also used for points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Cap {
    /// Ends exactly at the end point.
    #[default]
    Butt,
    /// A half circle around the end point.
    Round,
    /// A half square around the end point.
    Square,
}

/// A colour at a position along a gradient.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorStop {
    /// Position in `[0, 1]`.
    pub offset: f32,
    /// Colour at `offset`.
    pub color: AlphaColor<Srgb>,
}

/// A linear gradient between two points, padded beyond its ends.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearGradient {
    /// Where offset 0 lies.
    pub start: Point,
    /// Where offset 1 lies.
    pub end: Point,
    /// Stops sorted by offset.
    pub stops: Vec<ColorStop>,
}

/// Pixels of a pixmap placed in the shader's coordinate space.
#[derive(Clone, Debug)]
pub struct ImageShader {
    /// The pixels to sample, nearest neighbour, transparent outside.
    pub pixmap: Rc<Pixmap>,
    /// Maps pixmap coordinates to local coordinates.
    pub transform: Affine,
}

/// A source of colour that varies per pixel.
#[derive(Clone, Debug)]
pub enum Shader {
    /// One colour everywhere.
    Color(AlphaColor<Srgb>),
    /// A linear gradient.
    LinearGradient(LinearGradient),
    /// A pixmap.
    Image(ImageShader),
    /// Another shader whose output is passed through a colour filter.
    Filtered {
        /// The shader producing colours.
        shader: Box<Shader>,
        /// The filter applied to them.
        filter: ColorFilter,
    },
}

impl Shader {
    /// Create an image shader drawing `pixmap` with its top left corner at `(x, y)`.
    pub fn image_at(pixmap: Rc<Pixmap>, x: f64, y: f64) -> Self {
        Self::Image(ImageShader {
            pixmap,
            transform: Affine::translate((x, y)),
        })
    }

    /// Return whether every colour this shader produces is opaque.
    pub fn is_opaque(&self) -> bool {
        match self {
            Self::Color(c) => c.components[3] >= 1.0,
            Self::LinearGradient(g) => g.stops.iter().all(|s| s.color.components[3] >= 1.0),
            // Pixels outside the image are transparent.
            Self::Image(_) => false,
            Self::Filtered { .. } => false,
        }
    }

    /// The colour of a constant shader.
    pub fn as_color(&self) -> Option<AlphaColor<Srgb>> {
        match self {
            Self::Color(c) => Some(*c),
            _ => None,
        }
    }
}

/// A per-colour transformation applied after shading.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorFilter {
    /// Blend a constant colour, as source, over the incoming colour, as destination.
    Blend {
        /// The constant colour.
        color: AlphaColor<Srgb>,
        /// How it is blended.
        mode: BlendMode,
    },
    /// A row-major 4×5 matrix applied to unpremultiplied `[r, g, b, a, 1]` in `[0, 1]`.
    Matrix(Box<[f32; 20]>),
    /// `outer(inner(c))`.
    Compose {
        /// Applied second.
        outer: Box<ColorFilter>,
        /// Applied first.
        inner: Box<ColorFilter>,
    },
}

impl ColorFilter {
    /// The filter applying `inner` and then `outer`.
    pub fn compose(outer: Self, inner: Self) -> Self {
        Self::Compose {
            outer: Box::new(outer),
            inner: Box::new(inner),
        }
    }

    /// Return whether the filter can change alpha.
    pub fn affects_alpha(&self) -> bool {
        match self {
            Self::Blend { mode, .. } => {
                !matches!(mode.mix, Mix::Normal | Mix::Clip)
                    || !matches!(mode.compose, Compose::SrcAtop | Compose::Dest)
            }
            Self::Matrix(m) => m[15..20] != [0.0, 0.0, 0.0, 1.0, 0.0],
            Self::Compose { outer, inner } => outer.affects_alpha() || inner.affects_alpha(),
        }
    }
}

/// Light parameters of an emboss mask filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmbossLight {
    /// Direction towards the light; it does not need to be normalized.
    pub direction: [f32; 3],
    /// Light applied to every pixel.
    pub ambient: u8,
    /// Sharpness of the highlight.
    pub specular: u8,
}

/// A filter applied to the coverage of a shape before it is drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaskFilter {
    /// Light the coverage as a height field, producing a three-plane mask.
    Emboss {
        /// The light.
        light: EmbossLight,
        /// How far the edges are softened before lighting.
        blur_radius: f32,
    },
}

/// A filter applied to a whole drawn layer.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageFilter {
    /// Apply a colour filter to every pixel.
    ColorFilter(ColorFilter),
    /// Move the layer.
    Offset(Vec2),
}

impl ImageFilter {
    /// Return the colour filter this image filter is equivalent to, if any.
    pub fn as_color_filter(&self) -> Option<&ColorFilter> {
        match self {
            Self::ColorFilter(filter) => Some(filter),
            Self::Offset(_) => None,
        }
    }

    /// Return whether the filter can change alpha.
    pub fn affects_alpha(&self) -> bool {
        match self {
            Self::ColorFilter(filter) => filter.affects_alpha(),
            Self::Offset(_) => true,
        }
    }
}

/// One repetition of a [`DrawLooper`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LooperLayer {
    /// Translation applied to the draw.
    pub offset: Vec2,
    /// Replacement colour, keeping the paint's colour if `None`.
    pub color: Option<AlphaColor<Srgb>>,
}

/// Draws the same primitive several times with different offsets and colours.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawLooper {
    layers: Vec<LooperLayer>,
}

impl DrawLooper {
    /// Create a looper from layers listed bottom first.
    pub fn new(layers: Vec<LooperLayer>) -> Self {
        Self { layers }
    }

    /// The layers, bottom first.
    pub fn layers(&self) -> &[LooperLayer] {
        &self.layers
    }
}

/// Everything that decides how a draw call colours pixels.
#[derive(Clone, Debug)]
pub struct Paint {
    /// The colour, or the alpha applied to the shader if there is one.
    pub color: AlphaColor<Srgb>,
    /// How new colours combine with the destination.
    pub blend_mode: BlendMode,
    /// Per-pixel colour source replacing `color`.
    pub shader: Option<Shader>,
    /// Applied to every shaded colour.
    pub color_filter: Option<ColorFilter>,
    /// Applied to the coverage of the shape.
    pub mask_filter: Option<MaskFilter>,
    /// Applied to the whole draw, through a temporary layer if needed.
    pub image_filter: Option<ImageFilter>,
    /// Repeats the draw.
    pub looper: Option<DrawLooper>,
    /// Fill or stroke.
    pub style: Style,
    /// Stroke width; zero is a one pixel hairline.
    pub stroke_width: f64,
    /// Stroke end caps.
    pub cap: Cap,
    /// Whether edges get partial coverage.
    pub anti_alias: bool,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            color: AlphaColor::BLACK,
            blend_mode: BlendMode::default(),
            shader: None,
            color_filter: None,
            mask_filter: None,
            image_filter: None,
            looper: None,
            style: Style::Fill,
            stroke_width: 0.0,
            cap: Cap::Butt,
            anti_alias: false,
        }
    }
}

impl From<AlphaColor<Srgb>> for Paint {
    fn from(color: AlphaColor<Srgb>) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }
}

impl Paint {
    /// The colour's alpha as a byte.
    pub fn alpha(&self) -> u8 {
        (self.color.components[3].clamp(0.0, 1.0) * 255.0 + 0.5) as u8
    }

    /// Replace the colour's alpha.
    pub fn set_alpha(&mut self, alpha: u8) {
        self.color.components[3] = f32::from(alpha) / 255.0;
    }

    /// Return whether the paint's colour source is known to be opaque.
    pub fn is_opaque(&self) -> bool {
        if self.alpha() != 0xFF {
            return false;
        }
        match &self.shader {
            None => !self
                .color_filter
                .as_ref()
                .is_some_and(ColorFilter::affects_alpha),
            Some(shader) => shader.is_opaque() && self.color_filter.is_none(),
        }
    }

    /// Return whether drawing with this paint can never change the destination.
    pub fn nothing_to_draw(&self) -> bool {
        if self.looper.is_some() {
            return false;
        }
        if !matches!(self.blend_mode.mix, Mix::Normal | Mix::Clip) {
            return false;
        }
        match self.blend_mode.compose {
            Compose::SrcOver
            | Compose::SrcAtop
            | Compose::DestOut
            | Compose::DestOver
            | Compose::Plus => {
                self.alpha() == 0
                    && !self.color_filter.as_ref().is_some_and(ColorFilter::affects_alpha)
                    && !self.image_filter.as_ref().is_some_and(ImageFilter::affects_alpha)
            }
            Compose::Dest => true,
            _ => false,
        }
    }
}

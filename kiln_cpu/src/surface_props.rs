// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration passed to a canvas when it is created.

use bitflags::bitflags;

/// The order of the colour elements within one LCD pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LcdOrder {
    /// Red, green, blue.
    #[default]
    Rgb,
    /// Blue, green, red.
    Bgr,
    /// The display has no addressable sub-pixels.
    None,
}

/// The direction the elements of an LCD pixel are laid out in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LcdOrientation {
    /// Side by side.
    #[default]
    Horizontal,
    /// Stacked.
    Vertical,
}

/// Description of the display a canvas is rendered for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LcdConfig {
    /// Element order.
    pub order: LcdOrder,
    /// Element orientation.
    pub orientation: LcdOrientation,
}

/// The sub-pixel layout used for LCD text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelGeometry {
    /// Sub-pixels are not addressable.
    #[default]
    Unknown,
    /// Horizontal red, green, blue.
    RgbH,
    /// Horizontal blue, green, red.
    BgrH,
    /// Vertical red, green, blue.
    RgbV,
    /// Vertical blue, green, red.
    BgrV,
}

impl From<LcdConfig> for PixelGeometry {
    fn from(config: LcdConfig) -> Self {
        match (config.order, config.orientation) {
            (LcdOrder::None, _) => Self::Unknown,
            (LcdOrder::Rgb, LcdOrientation::Horizontal) => Self::RgbH,
            (LcdOrder::Bgr, LcdOrientation::Horizontal) => Self::BgrH,
            (LcdOrder::Rgb, LcdOrientation::Vertical) => Self::RgbV,
            (LcdOrder::Bgr, LcdOrientation::Vertical) => Self::BgrV,
        }
    }
}

impl PixelGeometry {
    /// Return whether the geometry has sub-pixels at all.
    pub fn is_lcd(self) -> bool {
        self != Self::Unknown
    }
}

bitflags! {
    /// Flags of [`SurfaceProps`].
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct SurfacePropsFlags: u32 {
        /// Distance fields may be used for text.
        const USE_DEVICE_INDEPENDENT_FONTS = 1 << 0;
    }
}

/// Properties of the surface a canvas draws into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SurfaceProps {
    /// Behaviour flags.
    pub flags: SurfacePropsFlags,
    /// Sub-pixel layout.
    pub pixel_geometry: PixelGeometry,
}

impl SurfaceProps {
    /// Create properties from flags and an explicit display description.
    pub fn new(flags: SurfacePropsFlags, lcd: LcdConfig) -> Self {
        Self {
            flags,
            pixel_geometry: lcd.into(),
        }
    }
}

bitflags! {
    /// Flags controlling how a canvas is initialized.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct CanvasInitFlags: u32 {
        /// Clips stay rectangles, rounding antialiased or complex shapes out to their bounds.
        const CONSERVATIVE_RASTER_CLIP = 1 << 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        LcdConfig, LcdOrder, LcdOrientation, PixelGeometry, SurfaceProps, SurfacePropsFlags,
    };

    #[test]
    fn geometry_from_config() {
        let vertical_bgr = LcdConfig {
            order: LcdOrder::Bgr,
            orientation: LcdOrientation::Vertical,
        };
        assert_eq!(PixelGeometry::from(vertical_bgr), PixelGeometry::BgrV);
        assert_eq!(
            PixelGeometry::from(LcdConfig::default()),
            PixelGeometry::RgbH
        );
        let none = LcdConfig {
            order: LcdOrder::None,
            ..LcdConfig::default()
        };
        assert!(!PixelGeometry::from(none).is_lcd());

        let props = SurfaceProps::new(SurfacePropsFlags::empty(), vertical_bgr);
        assert_eq!(props.pixel_geometry, PixelGeometry::BgrV);
        assert_eq!(SurfaceProps::default().pixel_geometry, PixelGeometry::Unknown);
    }
}

// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer rectangles in device space.

use crate::kurbo::Rect;

/// A half-open rectangle with integer coordinates.
///
/// A rectangle whose `left >= right` or `top >= bottom` is empty. Empty rectangles are never
/// rejected; every operation below treats them as containing no pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    /// The left edge (inclusive).
    pub left: i32,
    /// The top edge (inclusive).
    pub top: i32,
    /// The right edge (exclusive).
    pub right: i32,
    /// The bottom edge (exclusive).
    pub bottom: i32,
}

impl IntRect {
    /// The empty rectangle at the origin.
    pub const EMPTY: Self = Self::new(0, 0, 0, 0);

    /// Create a new rectangle from its edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a new rectangle from its origin and size.
    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Create a rectangle of the given size at the origin.
    pub fn from_size(width: u16, height: u16) -> Self {
        Self::new(0, 0, i32::from(width), i32::from(height))
    }

    /// Return the width, which is negative or zero for empty rectangles.
    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    /// Return the height, which is negative or zero for empty rectangles.
    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Return whether the rectangle contains no pixels.
    pub const fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Return whether the pixel at `(x, y)` lies inside the rectangle.
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Return whether `other` is non-empty and lies entirely inside this rectangle.
    pub const fn contains_rect(&self, other: &Self) -> bool {
        !other.is_empty()
            && !self.is_empty()
            && self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    /// Return whether the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersect(other).is_some()
    }

    /// Return the overlap of the two rectangles, or `None` if they do not overlap.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let r = Self::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    /// Return the smallest rectangle containing both, ignoring empty operands.
    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        Self::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Return the rectangle moved by `(dx, dy)`.
    pub const fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    /// Round each edge of `rect` to the nearest integer.
    pub fn from_rect_round(rect: &Rect) -> Self {
        Self::new(
            round_to_i32(rect.x0),
            round_to_i32(rect.y0),
            round_to_i32(rect.x1),
            round_to_i32(rect.y1),
        )
    }

    /// Return the smallest integer rectangle containing `rect`.
    pub fn from_rect_round_out(rect: &Rect) -> Self {
        Self::new(
            saturate(rect.x0.floor()),
            saturate(rect.y0.floor()),
            saturate(rect.x1.ceil()),
            saturate(rect.y1.ceil()),
        )
    }

    /// Return the largest integer rectangle inside `rect`.
    pub fn from_rect_round_in(rect: &Rect) -> Self {
        Self::new(
            saturate(rect.x0.ceil()),
            saturate(rect.y0.ceil()),
            saturate(rect.x1.floor()),
            saturate(rect.y1.floor()),
        )
    }

    /// Convert to a floating point rectangle.
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            f64::from(self.left),
            f64::from(self.top),
            f64::from(self.right),
            f64::from(self.bottom),
        )
    }
}

/// Clamp into the range of legal region coordinates.
///
/// `i32::MAX` is reserved as the run sentinel, so it is never produced here.
fn saturate(v: f64) -> i32 {
    if v.is_nan() {
        return 0;
    }
    v.clamp(f64::from(i32::MIN + 1), f64::from(i32::MAX - 1)) as i32
}

// Rounds half up, matching pixel-centre sampling for both edges.
fn round_to_i32(v: f64) -> i32 {
    saturate((v + 0.5).floor())
}

#[cfg(test)]
mod tests {
    use super::IntRect;
    use crate::kurbo::Rect;

    #[test]
    fn empty_rects() {
        assert!(IntRect::new(5, 0, 5, 10).is_empty());
        assert!(IntRect::new(6, 0, 5, 10).is_empty());
        assert!(!IntRect::new(0, 0, 1, 1).is_empty());
    }

    #[test]
    fn intersect_and_union() {
        let a = IntRect::new(0, 0, 10, 10);
        let b = IntRect::new(5, 5, 15, 15);
        assert_eq!(a.intersect(&b), Some(IntRect::new(5, 5, 10, 10)));
        assert_eq!(a.union(&b), IntRect::new(0, 0, 15, 15));
        assert_eq!(a.intersect(&IntRect::new(10, 0, 20, 10)), None);
        assert_eq!(a.union(&IntRect::EMPTY), a);
    }

    #[test]
    fn rounding() {
        let r = Rect::new(0.4, 0.5, 9.6, 9.4);
        assert_eq!(IntRect::from_rect_round(&r), IntRect::new(0, 1, 10, 9));
        assert_eq!(IntRect::from_rect_round_out(&r), IntRect::new(0, 0, 10, 10));
        assert_eq!(IntRect::from_rect_round_in(&r), IntRect::new(1, 1, 9, 9));
    }
}

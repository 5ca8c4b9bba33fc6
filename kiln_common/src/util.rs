// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer helpers shared by the clip algebra and the blitters.

/// Perform an approximate division by 255.
///
/// This calculates the ceiling of `val / 256`, which agrees with an exact division for every
/// multiple of 255 and is at most one higher otherwise. `val` must be below `65280`.
#[inline(always)]
pub const fn div_255(val: u16) -> u16 {
    debug_assert!(
        val < 65280,
        "the properties of `div_255` do not hold for values of `65280` or greater"
    );
    (val + 255) >> 8
}

/// Multiply two 8-bit normalized values, rounding to nearest.
#[inline(always)]
pub const fn mul_255(a: u8, b: u8) -> u8 {
    let prod = a as u32 * b as u32 + 128;
    ((prod + (prod >> 8)) >> 8) as u8
}

/// Scale an 8-bit value by `scale` in `0..=256`, where 256 is the identity.
#[inline(always)]
pub const fn scale_256(val: u8, scale: u32) -> u8 {
    ((val as u32 * scale) >> 8) as u8
}

/// Map an alpha in `0..=255` to a scale in `0..=256`.
#[inline(always)]
pub const fn alpha_to_scale(alpha: u8) -> u32 {
    alpha as u32 + 1
}

/// Linearly interpolate from `dst` towards `src` by `alpha`.
#[inline(always)]
pub const fn lerp_255(src: u8, dst: u8, alpha: u8) -> u8 {
    let a = alpha as i32;
    let delta = (src as i32 - dst as i32) * a;
    let rounded = delta + 128;
    (dst as i32 + ((rounded + (rounded >> 8)) >> 8)) as u8
}

#[cfg(test)]
mod tests {
    use super::{div_255, lerp_255, mul_255};

    #[test]
    fn div_255_properties() {
        for i in 0_u16..256 * 255 {
            let expected = i / 255;
            let actual = div_255(i);

            assert!(
                expected <= actual,
                "In case of a discrepancy, the division should yield a value higher than the original."
            );

            let diff = expected.abs_diff(actual);
            assert!(diff <= 1, "Rounding error shouldn't be higher than 1.");

            if i % 255 == 0 {
                assert_eq!(diff, 0, "Division should be accurate for multiples of 255.");
            }
        }
    }

    #[test]
    fn mul_255_is_exact_at_bounds() {
        for a in 0..=255_u8 {
            assert_eq!(mul_255(a, 255), a);
            assert_eq!(mul_255(255, a), a);
            assert_eq!(mul_255(a, 0), 0);
        }
        assert_eq!(mul_255(128, 128), 64);
    }

    #[test]
    fn lerp_endpoints() {
        for v in [0_u8, 17, 128, 255] {
            assert_eq!(lerp_255(v, 200, 255), v);
            assert_eq!(lerp_255(v, 200, 0), 200);
        }
    }
}

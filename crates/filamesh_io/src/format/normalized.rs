//! Normalized-integer conversions used by the filamesh vertex formats.
//! Half floats go through [`half::f16`].

/// Decodes a signed normalized 16-bit component.
#[inline]
#[must_use]
pub fn snorm16_to_f32(v: i16) -> f32 {
    (f32::from(v) / 32767.0).max(-1.0)
}

/// Encodes a component in `[-1, 1]` as signed normalized 16-bit.
#[inline]
#[must_use]
pub fn f32_to_snorm16(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Decodes an unsigned normalized 8-bit component.
#[inline]
#[must_use]
pub fn unorm8_to_f32(v: u8) -> f32 {
    f32::from(v) / 255.0
}

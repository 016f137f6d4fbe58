//! DPT 9.xxx - 2-byte KNX float
//!
//! ```text
//! Byte 0: SEEE EMMM
//! Byte 1: MMMM MMMM
//!
//! S   sign of the mantissa
//! E   exponent, 0-15
//! M   low 11 bits of the mantissa; with S it forms a
//!     12-bit two's complement value (-2048..=2047)
//!
//! Value = 0.01 * mantissa * 2^E
//! ```
//!
//! Values outside `MIN..=MAX` saturate instead of overflowing the exponent.
//! Common subtypes: 9.001 temperature, 9.004 illuminance, 9.007 humidity.

use crate::error::{KnxError, Result};

/// Smallest representable value (mantissa -2048, exponent 15).
pub const MIN: f32 = -671_088.64;
/// Largest representable value (mantissa 2047, exponent 15).
pub const MAX: f32 = 670_760.96;

const MANTISSA_MIN: i64 = -2048;
const MANTISSA_MAX: i64 = 2047;
const EXPONENT_MAX: u8 = 15;

/// Round half away from zero (`f64::round` is not in `core`).
fn round(x: f64) -> i64 {
    if x >= 0.0 {
        (x + 0.5) as i64
    } else {
        (x - 0.5) as i64
    }
}

/// Encode `value` as a big-endian KNX float.
///
/// NaN has no KNX representation and is rejected.
pub fn encode(value: f32) -> Result<[u8; 2]> {
    if value.is_nan() {
        return Err(KnxError::dpt_value_out_of_range());
    }
    let mut scaled = f64::from(value.clamp(MIN, MAX)) * 100.0;
    let mut exponent = 0u8;
    let mut mantissa = round(scaled);

    while !(MANTISSA_MIN..=MANTISSA_MAX).contains(&mantissa) && exponent < EXPONENT_MAX {
        exponent += 1;
        scaled /= 2.0;
        mantissa = round(scaled);
    }
    let mantissa = mantissa.clamp(MANTISSA_MIN, MANTISSA_MAX);

    let sign = u16::from(mantissa < 0) << 15;
    let raw = sign | (u16::from(exponent) << 11) | (mantissa as u16 & 0x07FF);
    Ok(raw.to_be_bytes())
}

/// Decode a big-endian KNX float.
pub fn decode(bytes: [u8; 2]) -> f32 {
    let raw = u16::from_be_bytes(bytes);
    let exponent = (raw >> 11) & 0x0F;
    let mut mantissa = i32::from(raw & 0x07FF);
    if raw & 0x8000 != 0 {
        mantissa -= 2048;
    }
    (f64::from(mantissa) * f64::from(1u32 << exponent) / 100.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_twenty_point_five() {
        let bytes = encode(20.5).unwrap();
        // exponent 1, mantissa 1025
        assert_eq!(bytes, [0x0C, 0x01]);
        assert_close(decode(bytes), 20.5, 0.01);
    }

    #[test]
    fn test_zero_and_small_values() {
        assert_eq!(encode(0.0).unwrap(), [0x00, 0x00]);
        assert_eq!(encode(0.01).unwrap(), [0x00, 0x01]);
        assert_eq!(encode(-0.01).unwrap(), [0x87, 0xFF]);
        assert_close(decode([0x87, 0xFF]), -0.01, 0.001);
    }

    #[test]
    fn test_negative_values() {
        // -3000 does not fit 12 bits, so exponent 1 with mantissa -1500
        let bytes = encode(-30.0).unwrap();
        assert_close(decode(bytes), -30.0, 0.02);
        assert_eq!(bytes[0] & 0x80, 0x80);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(encode(MAX).unwrap(), [0x7F, 0xFF]);
        assert_eq!(encode(MIN).unwrap(), [0xF8, 0x00]);
        assert_close(decode([0x7F, 0xFF]), MAX, 0.01);
        assert_close(decode([0xF8, 0x00]), MIN, 0.01);
    }

    #[test]
    fn test_saturation() {
        assert_eq!(encode(1.0e9).unwrap(), [0x7F, 0xFF]);
        assert_eq!(encode(-1.0e9).unwrap(), [0xF8, 0x00]);
        assert_eq!(encode(f32::INFINITY).unwrap(), [0x7F, 0xFF]);
        assert_eq!(encode(f32::NEG_INFINITY).unwrap(), [0xF8, 0x00]);
    }

    #[test]
    fn test_nan_rejected() {
        assert!(encode(f32::NAN).is_err());
    }

    #[test]
    fn test_typical_temperatures() {
        for temp in [-20.0f32, -5.5, 0.5, 18.0, 21.3, 25.75, 100.0] {
            assert_close(decode(encode(temp).unwrap()), temp, 0.02);
        }
    }

    #[test]
    fn test_large_values_keep_relative_precision() {
        for value in [1_000.0f32, 50_000.0, 300_000.0, -250_000.0] {
            let decoded = decode(encode(value).unwrap());
            assert!((decoded - value).abs() / value.abs() < 0.001, "{value} -> {decoded}");
        }
    }
}

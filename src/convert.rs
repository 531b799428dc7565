//! Hex <-> numeric conversions for the device's single-byte encoded fields.

use crate::{Error, Result};

/// Decode a temperature from its hex representation.
///
/// The first byte is the reading multiplied by `divisor` (2 for setpoints
/// and the outdoor sensor, 1 for the indoor sensor). Values >= 128 are
/// two's-complement negatives.
pub fn hex_to_temperature(hex: &str, divisor: f64) -> Result<f64> {
    let byte = hex.get(..2).ok_or_else(|| {
        Error::Protocol(format!("temperature hex too short: {hex:?}"))
    })?;
    let mut raw = i64::from(u8::from_str_radix(byte, 16).map_err(|_| {
        Error::Protocol(format!("invalid temperature hex: {hex:?}"))
    })?);
    if raw >= 128 {
        raw -= 256;
    }
    Ok((raw as f64 / divisor * 10.0).round() / 10.0)
}

/// Encode a target temperature as the 2-digit hex the device expects.
/// Clamps to `[min, max]` and rounds to the device's 0.5 degree resolution.
pub fn temperature_to_hex(celsius: f64, min: f64, max: f64) -> String {
    let clamped = celsius.clamp(min, max);
    let raw = (clamped * 2.0).round() as i64 & 0xFF;
    format!("{raw:02X}")
}

pub fn percentage_to_hex(percent: u8) -> String {
    format!("{:02X}", percent.min(100))
}

pub fn hex_to_percentage(hex: &str) -> Result<u8> {
    u8::from_str_radix(hex, 16)
        .map_err(|_| Error::Protocol(format!("invalid percentage hex: {hex:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_positive() {
        assert_eq!(hex_to_temperature("34", 2.0).unwrap(), 26.0);
        assert_eq!(hex_to_temperature("34", 1.0).unwrap(), 52.0);
        assert_eq!(hex_to_temperature("35", 2.0).unwrap(), 26.5);
    }

    #[test]
    fn decode_negative_twos_complement() {
        assert_eq!(hex_to_temperature("FF", 2.0).unwrap(), -0.5);
        assert_eq!(hex_to_temperature("F6", 2.0).unwrap(), -5.0);
        assert_eq!(hex_to_temperature("F6", 1.0).unwrap(), -10.0);
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        // Some fields carry extra bytes after the value.
        assert_eq!(hex_to_temperature("340000", 2.0).unwrap(), 26.0);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(hex_to_temperature("ZZ", 2.0).is_err());
        assert!(hex_to_temperature("3", 2.0).is_err());
    }

    #[test]
    fn encode_clamps_and_rounds() {
        assert_eq!(temperature_to_hex(26.0, 10.0, 30.0), "34");
        assert_eq!(temperature_to_hex(26.3, 10.0, 30.0), "35");
        assert_eq!(temperature_to_hex(99.0, 10.0, 30.0), "3C"); // clamped to 30
        assert_eq!(temperature_to_hex(-5.0, 10.0, 30.0), "14"); // clamped to 10
    }

    #[test]
    fn encode_decode_roundtrip_within_half_degree() {
        let mut c = -40.0;
        while c <= 60.0 {
            let hex = temperature_to_hex(c, 10.0, 30.0);
            let back = hex_to_temperature(&hex, 2.0).unwrap();
            let expected = c.clamp(10.0, 30.0);
            assert!(
                (back - expected).abs() <= 0.5,
                "roundtrip {c} -> {hex} -> {back}"
            );
            c += 0.25;
        }
    }

    #[test]
    fn percentage_roundtrip() {
        assert_eq!(percentage_to_hex(50), "32");
        assert_eq!(percentage_to_hex(55), "37");
        assert_eq!(percentage_to_hex(200), "64"); // clamped to 100
        assert_eq!(hex_to_percentage("32").unwrap(), 50);
        assert!(hex_to_percentage("xx").is_err());
    }
}

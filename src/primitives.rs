//! Bit-exact Blink wire primitives: variable-length integers, the shared
//! null marker, and the fixed-shape primitive types built on top of them.
//!
//! All multibyte primitives are little-endian on the wire except the
//! big-endian IEEE-754 float payloads, which the format fixes explicitly
//! for cross-implementation interop.

use std::io::{self, Read, Write};

use num_bigint::{BigInt, Sign};

use crate::result::{DecodingError, EncodingError, Error, Result};

/// The single byte that denotes "no value" for any nullable field: the
/// length-prefixed VLC form with a zero byte count.
pub const NULL_BYTE: u8 = 0xC0;

fn read_byte<R: Read>(r: &mut R) -> Result<u8> {
    let mut b = [0u8; 1];
    match r.read_exact(&mut b) {
        Ok(()) => Ok(b[0]),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(DecodingError::Truncated.into()),
        Err(e) => Err(Error::Io(e)),
    }
}

fn read_bytes<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    match r.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(DecodingError::Truncated.into()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Variable-length integer coding: the self-delimiting frames shared by
/// every Blink primitive.
pub mod vlc {
    use super::*;

    /// Smallest byte count able to hold `v` in the length-prefixed form.
    fn unsigned_len(v: u64) -> u8 {
        let bits = 64 - v.leading_zeros();
        (((bits + 7) / 8).max(1)) as u8
    }

    fn trim_signed_le(mut bytes: Vec<u8>) -> Vec<u8> {
        while bytes.len() > 1 {
            let msb = bytes[bytes.len() - 1];
            let next = bytes[bytes.len() - 2];
            let redundant =
                (msb == 0x00 && next & 0x80 == 0) || (msb == 0xFF && next & 0x80 != 0);
            if !redundant {
                break;
            }
            bytes.pop();
        }
        bytes
    }

    fn sign_extend(raw: u64, bits: u32) -> i64 {
        let shift = 64 - bits;
        ((raw << shift) as i64) >> shift
    }

    pub fn encode_null<W: Write>(w: &mut W) -> io::Result<()> {
        w.write_all(&[NULL_BYTE])
    }

    pub fn encode_unsigned<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
        if v <= 0x7F {
            w.write_all(&[v as u8])
        } else if v <= 0x3FFF {
            w.write_all(&[((v & 0x3F) as u8) | 0x80, (v >> 6) as u8])
        } else {
            let n = unsigned_len(v);
            let bytes = v.to_le_bytes();
            w.write_all(&[0xC0 | n])?;
            w.write_all(&bytes[..n as usize])
        }
    }

    pub fn encode_unsigned_opt<W: Write>(w: &mut W, v: Option<u64>) -> io::Result<()> {
        match v {
            None => encode_null(w),
            Some(v) => encode_unsigned(w, v),
        }
    }

    /// Returns `Ok(None)` when the wire form is the null marker.
    pub fn decode_unsigned<R: Read>(r: &mut R) -> Result<Option<u64>> {
        let b0 = read_byte(r)?;
        if b0 & 0x80 == 0 {
            Ok(Some(b0 as u64))
        } else if b0 & 0xC0 == 0x80 {
            let b1 = read_byte(r)?;
            Ok(Some(((b0 & 0x3F) as u64) | ((b1 as u64) << 6)))
        } else {
            let n = b0 & 0x3F;
            if n == 0 {
                return Ok(None);
            }
            if n > 8 {
                return Err(DecodingError::Overflow {
                    declared: n as usize,
                    max: 8,
                }
                .into());
            }
            let mut buf = [0u8; 8];
            read_bytes(r, &mut buf[..n as usize])?;
            Ok(Some(u64::from_le_bytes(buf)))
        }
    }

    pub fn encode_signed<W: Write>(w: &mut W, v: i64) -> io::Result<()> {
        if (-64..=63).contains(&v) {
            w.write_all(&[(v as u64 & 0x7F) as u8])
        } else if (-8192..=8191).contains(&v) {
            let raw = v as u64 & 0x3FFF;
            w.write_all(&[((raw & 0x3F) as u8) | 0x80, ((raw >> 6) & 0xFF) as u8])
        } else {
            let bytes = trim_signed_le(v.to_le_bytes().to_vec());
            let n = bytes.len() as u8;
            w.write_all(&[0xC0 | n])?;
            w.write_all(&bytes)
        }
    }

    pub fn encode_signed_opt<W: Write>(w: &mut W, v: Option<i64>) -> io::Result<()> {
        match v {
            None => encode_null(w),
            Some(v) => encode_signed(w, v),
        }
    }

    pub fn decode_signed<R: Read>(r: &mut R) -> Result<Option<i64>> {
        let b0 = read_byte(r)?;
        if b0 & 0x80 == 0 {
            Ok(Some(sign_extend(b0 as u64, 7)))
        } else if b0 & 0xC0 == 0x80 {
            let b1 = read_byte(r)?;
            let raw = ((b0 & 0x3F) as u64) | ((b1 as u64) << 6);
            Ok(Some(sign_extend(raw, 14)))
        } else {
            let n = b0 & 0x3F;
            if n == 0 {
                return Ok(None);
            }
            if n > 8 {
                return Err(DecodingError::Overflow {
                    declared: n as usize,
                    max: 8,
                }
                .into());
            }
            let mut raw = [0u8; 8];
            read_bytes(r, &mut raw[..n as usize])?;
            let negative = raw[n as usize - 1] & 0x80 != 0;
            let mut buf = if negative { [0xFFu8; 8] } else { [0u8; 8] };
            buf[..n as usize].copy_from_slice(&raw[..n as usize]);
            Ok(Some(i64::from_le_bytes(buf)))
        }
    }

    /// Arbitrary-width signed VLC, used for `BigInt`/`BigDecimal` mantissas.
    /// Reuses the compact one/two-byte forms but does not cap the
    /// length-prefixed form at 8 bytes, short of the VLC length field's own
    /// 6-bit limit (63 bytes, 504 bits).
    pub fn encode_signed_bigint<W: Write>(w: &mut W, v: &BigInt) -> Result<()> {
        if let Some(small) = i64::try_from(v).ok() {
            encode_signed(w, small)?;
            return Ok(());
        }
        let bytes = v.to_signed_bytes_le();
        let n = bytes.len();
        if n > 0x3F {
            let value = i128::try_from(v).unwrap_or(match v.sign() {
                Sign::Minus => i128::MIN,
                _ => i128::MAX,
            });
            return Err(EncodingError::ValueOutOfRange {
                value,
                width: (n * 8) as u32,
                signed: "bigint",
            }
            .into());
        }
        w.write_all(&[0xC0 | n as u8])?;
        w.write_all(&bytes)?;
        Ok(())
    }

    pub fn decode_signed_bigint<R: Read>(r: &mut R) -> Result<Option<BigInt>> {
        let b0 = read_byte(r)?;
        if b0 & 0x80 == 0 {
            Ok(Some(BigInt::from(sign_extend(b0 as u64, 7))))
        } else if b0 & 0xC0 == 0x80 {
            let b1 = read_byte(r)?;
            let raw = ((b0 & 0x3F) as u64) | ((b1 as u64) << 6);
            Ok(Some(BigInt::from(sign_extend(raw, 14))))
        } else {
            let n = (b0 & 0x3F) as usize;
            if n == 0 {
                return Ok(None);
            }
            let mut bytes = vec![0u8; n];
            read_bytes(r, &mut bytes)?;
            Ok(Some(BigInt::from_signed_bytes_le(&bytes)))
        }
    }
}

pub fn encode_bool<W: Write>(w: &mut W, v: Option<bool>) -> io::Result<()> {
    vlc::encode_unsigned_opt(w, v.map(|b| b as u64))
}

pub fn decode_bool<R: Read>(r: &mut R) -> Result<Option<bool>> {
    Ok(vlc::decode_unsigned(r)?.map(|v| v != 0))
}

pub fn encode_float32<W: Write>(w: &mut W, v: Option<f32>) -> io::Result<()> {
    match v {
        None => vlc::encode_null(w),
        Some(v) => {
            vlc::encode_unsigned(w, 4)?;
            w.write_all(&v.to_be_bytes())
        }
    }
}

pub fn decode_float32<R: Read>(r: &mut R) -> Result<Option<f32>> {
    match vlc::decode_unsigned(r)? {
        None => Ok(None),
        Some(4) => {
            let mut buf = [0u8; 4];
            read_bytes(r, &mut buf)?;
            Ok(Some(f32::from_be_bytes(buf)))
        }
        Some(n) => Err(DecodingError::Overflow {
            declared: n as usize,
            max: 4,
        }
        .into()),
    }
}

pub fn encode_float64<W: Write>(w: &mut W, v: Option<f64>) -> io::Result<()> {
    match v {
        None => vlc::encode_null(w),
        Some(v) => {
            vlc::encode_unsigned(w, 8)?;
            w.write_all(&v.to_be_bytes())
        }
    }
}

pub fn decode_float64<R: Read>(r: &mut R) -> Result<Option<f64>> {
    match vlc::decode_unsigned(r)? {
        None => Ok(None),
        Some(8) => {
            let mut buf = [0u8; 8];
            read_bytes(r, &mut buf)?;
            Ok(Some(f64::from_be_bytes(buf)))
        }
        Some(n) => Err(DecodingError::Overflow {
            declared: n as usize,
            max: 8,
        }
        .into()),
    }
}

/// `{ mantissa: i64, exponent: i8 }`, exponent carries the null marker.
pub fn encode_decimal<W: Write>(w: &mut W, v: Option<(i64, i8)>) -> io::Result<()> {
    match v {
        None => vlc::encode_null(w),
        Some((mantissa, exponent)) => {
            vlc::encode_signed(w, exponent as i64)?;
            vlc::encode_signed(w, mantissa)
        }
    }
}

pub fn decode_decimal<R: Read>(r: &mut R) -> Result<Option<(i64, i8)>> {
    let Some(exponent) = vlc::decode_signed(r)? else {
        return Ok(None);
    };
    let exponent = i8::try_from(exponent).map_err(|_| DecodingError::Overflow {
        declared: 8,
        max: 1,
    })?;
    let mantissa = vlc::decode_signed(r)?.ok_or(DecodingError::Truncated)?;
    Ok(Some((mantissa, exponent)))
}

pub fn encode_bigint<W: Write>(w: &mut W, v: Option<&BigInt>) -> Result<()> {
    match v {
        None => Ok(vlc::encode_null(w)?),
        Some(v) => vlc::encode_signed_bigint(w, v),
    }
}

pub fn decode_bigint<R: Read>(r: &mut R) -> Result<Option<BigInt>> {
    vlc::decode_signed_bigint(r)
}

/// `BigDecimal`: same shape as `Decimal`, generalized to an arbitrary-width
/// mantissa. Null uses the same single-byte marker on the exponent slot.
pub fn encode_bigdecimal<W: Write>(w: &mut W, v: Option<(&BigInt, i64)>) -> Result<()> {
    match v {
        None => Ok(vlc::encode_null(w)?),
        Some((mantissa, exponent)) => {
            vlc::encode_signed(w, exponent)?;
            vlc::encode_signed_bigint(w, mantissa)
        }
    }
}

pub fn decode_bigdecimal<R: Read>(r: &mut R) -> Result<Option<(BigInt, i64)>> {
    let Some(exponent) = vlc::decode_signed(r)? else {
        return Ok(None);
    };
    let mantissa = vlc::decode_signed_bigint(r)?.ok_or(DecodingError::Truncated)?;
    Ok(Some((mantissa, exponent)))
}

pub fn encode_string<W: Write>(w: &mut W, v: Option<&str>) -> io::Result<()> {
    match v {
        None => vlc::encode_null(w),
        Some(s) => {
            vlc::encode_unsigned(w, s.len() as u64)?;
            w.write_all(s.as_bytes())
        }
    }
}

pub fn decode_string<R: Read>(r: &mut R) -> Result<Option<String>> {
    match vlc::decode_unsigned(r)? {
        None => Ok(None),
        Some(len) => {
            let mut buf = vec![0u8; len as usize];
            read_bytes(r, &mut buf)?;
            Ok(Some(
                String::from_utf8(buf).map_err(|e| DecodingError::InvalidUtf8(e.utf8_error()))?,
            ))
        }
    }
}

pub fn encode_binary<W: Write>(w: &mut W, v: Option<&[u8]>) -> io::Result<()> {
    match v {
        None => vlc::encode_null(w),
        Some(b) => {
            vlc::encode_unsigned(w, b.len() as u64)?;
            w.write_all(b)
        }
    }
}

pub fn decode_binary<R: Read>(r: &mut R) -> Result<Option<Vec<u8>>> {
    match vlc::decode_unsigned(r)? {
        None => Ok(None),
        Some(len) => {
            let mut buf = vec![0u8; len as usize];
            read_bytes(r, &mut buf)?;
            Ok(Some(buf))
        }
    }
}

/// Unsigned VLC count of declared `unit`s since the declared `epoch`.
pub fn encode_time<W: Write>(w: &mut W, v: Option<u64>) -> io::Result<()> {
    vlc::encode_unsigned_opt(w, v)
}

pub fn decode_time<R: Read>(r: &mut R) -> Result<Option<u64>> {
    vlc::decode_unsigned(r)
}

/// An enum symbol's `i32` value, as signed VLC.
pub fn encode_enum<W: Write>(w: &mut W, v: Option<i32>) -> io::Result<()> {
    vlc::encode_signed_opt(w, v.map(|v| v as i64))
}

pub fn decode_enum<R: Read>(r: &mut R) -> Result<Option<i32>> {
    match vlc::decode_signed(r)? {
        None => Ok(None),
        Some(v) => i32::try_from(v).map(Some).map_err(|_| {
            DecodingError::Overflow {
                declared: 8,
                max: 4,
            }
            .into()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_unsigned(v: u64, expected: &[u8]) {
        let mut buf = Vec::new();
        vlc::encode_unsigned(&mut buf, v).unwrap();
        assert_eq!(buf, expected);
        let mut slice = &buf[..];
        assert_eq!(vlc::decode_unsigned(&mut slice).unwrap(), Some(v));
    }

    #[test]
    fn unsigned_concrete_scenarios() {
        roundtrip_unsigned(0, &[0x00]);
        roundtrip_unsigned(127, &[0x7F]);
        roundtrip_unsigned(128, &[0x80, 0x02]);
        roundtrip_unsigned(16384, &[0xC2, 0x00, 0x40]);
        roundtrip_unsigned(1u64 << 32, &[0xC5, 0x00, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn unsigned_roundtrip_is_canonical() {
        for v in [0u64, 1, 63, 64, 0x3FFF, 0x4000, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            vlc::encode_unsigned(&mut buf, v).unwrap();
            let mut slice = &buf[..];
            assert_eq!(vlc::decode_unsigned(&mut slice).unwrap(), Some(v));
            assert!(slice.is_empty());
        }
    }

    #[test]
    fn unsigned_null_is_single_byte() {
        let mut buf = Vec::new();
        vlc::encode_unsigned_opt(&mut buf, None).unwrap();
        assert_eq!(buf, [NULL_BYTE]);
        let mut slice = &buf[..];
        assert_eq!(vlc::decode_unsigned(&mut slice).unwrap(), None);
    }

    #[test]
    fn decoder_accepts_noncanonical_wider_forms() {
        // 0 re-encoded in the two-byte form.
        let mut slice: &[u8] = &[0x80, 0x00];
        assert_eq!(vlc::decode_unsigned(&mut slice).unwrap(), Some(0));
    }

    #[test]
    fn signed_roundtrip() {
        for v in [0i64, -1, 63, -64, 64, -65, 8191, -8192, 8192, i64::MIN, i64::MAX] {
            let mut buf = Vec::new();
            vlc::encode_signed(&mut buf, v).unwrap();
            let mut slice = &buf[..];
            assert_eq!(vlc::decode_signed(&mut slice).unwrap(), Some(v));
        }
    }

    #[test]
    fn bool_scenarios() {
        let mut buf = Vec::new();
        encode_bool(&mut buf, None).unwrap();
        assert_eq!(buf, [0xC0]);

        let mut buf = Vec::new();
        encode_bool(&mut buf, Some(true)).unwrap();
        assert_eq!(buf, [0x01]);

        let mut buf = Vec::new();
        encode_bool(&mut buf, Some(false)).unwrap();
        assert_eq!(buf, [0x00]);
    }

    #[test]
    fn string_scenarios() {
        let mut buf = Vec::new();
        encode_string(&mut buf, Some("abc")).unwrap();
        assert_eq!(buf, [0x03, b'a', b'b', b'c']);

        let mut buf = Vec::new();
        encode_string(&mut buf, None).unwrap();
        assert_eq!(buf, [0xC0]);

        let mut buf = Vec::new();
        encode_string(&mut buf, Some("")).unwrap();
        assert_eq!(buf, [0x00]);
    }

    #[test]
    fn bigint_roundtrip() {
        for v in [
            BigInt::from(0),
            BigInt::from(-1),
            BigInt::from(i64::MAX) + BigInt::from(1),
            BigInt::from(i64::MIN) - BigInt::from(1),
        ] {
            let mut buf = Vec::new();
            encode_bigint(&mut buf, Some(&v)).unwrap();
            let mut slice = &buf[..];
            assert_eq!(decode_bigint(&mut slice).unwrap(), Some(v));
        }
    }

    #[test]
    fn truncated_buffer_fails_cleanly() {
        let mut slice: &[u8] = &[0xC2, 0x01];
        let err = vlc::decode_unsigned(&mut slice).unwrap_err();
        assert!(matches!(err, Error::Decoding(DecodingError::Truncated)));
    }

    #[test]
    fn oversized_bigint_is_a_range_error_not_a_panic() {
        use crate::result::EncodingError;

        // 64 bytes of magnitude, one past the VLC length field's 63-byte
        // (504-bit) ceiling.
        let huge = BigInt::from_signed_bytes_le(&[0x7Fu8; 64]);
        let mut buf = Vec::new();
        let err = vlc::encode_signed_bigint(&mut buf, &huge).unwrap_err();
        assert!(matches!(
            err,
            Error::Encoding(EncodingError::ValueOutOfRange { .. })
        ));
    }
}

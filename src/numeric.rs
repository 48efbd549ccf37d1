// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The numeric leaf codecs shared by the parser and the generator:
//! Marshal's variable-length "long", Bignum word packing, and the canonical
//! float text format.
//!
//! Decoding is strict: any encoding a conforming writer would not have
//! produced (a wider tier than necessary, a padded bignum word, a float
//! spelling outside the canonical grammar) is an error, never silently
//! normalized.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;

/// Smallest value the Fixnum wire form may carry.
pub(crate) const FIXNUM_MIN: i64 = -0x4000_0000;
/// Largest value the Fixnum wire form may carry.
pub(crate) const FIXNUM_MAX: i64 = 0x3FFF_FFFF;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub(crate) enum NumericError {
    #[error("end of input")]
    Eof,
    #[error("long encoding is not canonical")]
    NonCanonicalLong,
    #[error("bignum encoding is not canonical")]
    NonCanonicalBignum,
    #[error("invalid bignum sign byte 0x{0:02X}")]
    BignumSign(u8),
    #[error("malformed float text {0:?}")]
    MalformedFloat(String),
}

type Result<T> = std::result::Result<T, NumericError>;

/// Whether `value` belongs on the wire as a Fixnum rather than a Bignum.
pub(crate) fn fits_fixnum(value: &BigInt) -> bool {
    use num_traits::ToPrimitive;
    value
        .to_i64()
        .is_some_and(|v| (FIXNUM_MIN..=FIXNUM_MAX).contains(&v))
}

/// Encode a long. The caller is responsible for range checking; every value
/// in `[-2^31, 2^31 - 1]` has exactly one encoding.
pub(crate) fn encode_long(out: &mut Vec<u8>, value: i64) {
    match value {
        0 => out.push(0),
        1..=122 => out.push(value as u8 + 5),
        -123..=-1 => out.push((value - 5) as u8),
        mut v => {
            let mut buf = [0u8; 4];
            let mut len = 0;
            loop {
                buf[len] = v as u8;
                v >>= 8;
                len += 1;
                if v == 0 {
                    out.push(len as u8);
                    break;
                }
                if v == -1 {
                    out.push((256 - len) as u8);
                    break;
                }
            }
            out.extend_from_slice(&buf[..len]);
        }
    }
}

/// Decode a long from the front of `input`, returning the value and the
/// number of bytes consumed. Rejects every non-minimal tier.
pub(crate) fn decode_long(input: &[u8]) -> Result<(i64, usize)> {
    let &first = input.first().ok_or(NumericError::Eof)?;
    match first as i8 {
        0 => Ok((0, 1)),
        // 0x05 / 0xFB would re-encode zero; zero is a bare zero byte.
        5 | -5 => Err(NumericError::NonCanonicalLong),
        c @ 6..=127 => Ok((i64::from(c) - 5, 1)),
        c @ -128..=-6 => Ok((i64::from(c) + 5, 1)),
        c @ 1..=4 => {
            let count = c as usize;
            let bytes = input.get(1..1 + count).ok_or(NumericError::Eof)?;
            let mut value: i64 = 0;
            for (i, &b) in bytes.iter().enumerate() {
                value |= i64::from(b) << (8 * i);
            }
            let tier_min = if count == 1 { 123 } else { 1i64 << (8 * (count - 1)) };
            if value < tier_min {
                return Err(NumericError::NonCanonicalLong);
            }
            Ok((value, 1 + count))
        }
        c @ -4..=-1 => {
            let count = (-c) as usize;
            let bytes = input.get(1..1 + count).ok_or(NumericError::Eof)?;
            let mut value: i64 = -1;
            for (i, &b) in bytes.iter().enumerate() {
                value = (value & !(0xFF << (8 * i))) | (i64::from(b) << (8 * i));
            }
            let tier_max = if count == 1 {
                -124
            } else {
                -(1i64 << (8 * (count - 1))) - 1
            };
            if value > tier_max {
                return Err(NumericError::NonCanonicalLong);
            }
            Ok((value, 1 + count))
        }
    }
}

/// Append the Bignum payload for `value`: sign byte, 16-bit word count, then
/// the little-endian words. `value` must be outside the Fixnum range.
pub(crate) fn encode_bignum(out: &mut Vec<u8>, value: &BigInt) {
    out.push(if value.sign() == Sign::Minus { b'-' } else { b'+' });
    let mut bytes = value.magnitude().to_bytes_le();
    if bytes.len() % 2 != 0 {
        bytes.push(0);
    }
    encode_long(out, (bytes.len() / 2) as i64);
    out.extend_from_slice(&bytes);
}

/// Rebuild a Bignum from its sign byte and word bytes, enforcing canonical
/// form: no zero-padding in the most significant word, and a magnitude that
/// could not have been a Fixnum.
pub(crate) fn decode_bignum(sign_byte: u8, words: &[u8]) -> Result<BigInt> {
    let sign = match sign_byte {
        b'+' => Sign::Plus,
        b'-' => Sign::Minus,
        other => return Err(NumericError::BignumSign(other)),
    };
    debug_assert!(words.len() % 2 == 0);
    if words.len() < 2 || words[words.len() - 2..] == [0, 0] {
        return Err(NumericError::NonCanonicalBignum);
    }
    let magnitude = BigUint::from_bytes_le(words);
    let value = BigInt::from_biguint(sign, magnitude);
    if fits_fixnum(&value) {
        return Err(NumericError::NonCanonicalBignum);
    }
    Ok(value)
}

/// Render `value` the way Ruby's `Marshal` spells floats: shortest
/// round-tripping digits, fixed-point when the decimal point lands within
/// the first 16 places, scientific otherwise.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // LowerExp gives the shortest digits that round-trip, normalized to
    // d.ddd e X. Re-layout per w_float: `decpt` is the position of the
    // decimal point within the digit string.
    let exp_form = format!("{value:e}");
    let (mantissa, exp) = exp_form
        .split_once('e')
        .expect("LowerExp output always contains an exponent");
    let exp: i32 = exp.parse().expect("LowerExp exponent is an integer");
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let decpt = exp + 1;

    let mut out = String::from(sign);
    if !(-3..=16).contains(&decpt) {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push_str(&(decpt - 1).to_string());
    } else if decpt > 0 {
        let decpt = decpt as usize;
        if decpt >= digits.len() {
            out.push_str(&digits);
            out.extend(std::iter::repeat('0').take(decpt - digits.len()));
        } else {
            out.push_str(&digits[..decpt]);
            out.push('.');
            out.push_str(&digits[decpt..]);
        }
    } else {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take(-decpt as usize));
        out.push_str(&digits);
    }
    out
}

/// Parse float text, accepting exactly the canonical grammar of
/// [`format_float`] plus the Ruby 1.8 spellings (`infinity`, `-infinity`,
/// `-nan`, `nan(...)`).
pub(crate) fn parse_float(bytes: &[u8]) -> Result<f64> {
    let malformed = || NumericError::MalformedFloat(String::from_utf8_lossy(bytes).into_owned());
    let text = std::str::from_utf8(bytes).map_err(|_| malformed())?;
    match text {
        "nan" | "-nan" => return Ok(f64::NAN),
        "inf" | "infinity" => return Ok(f64::INFINITY),
        "-inf" | "-infinity" => return Ok(f64::NEG_INFINITY),
        "0" => return Ok(0.0),
        "-0" => return Ok(-0.0),
        _ => {}
    }
    if text.starts_with("nan(") && text.ends_with(')') {
        return Ok(f64::NAN);
    }
    if !is_canonical_float_text(text) {
        return Err(malformed());
    }
    text.parse::<f64>().map_err(|_| malformed())
}

fn is_canonical_float_text(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    if let Some((mantissa, exp)) = body.split_once('e') {
        // Scientific: single non-zero leading digit, optional fraction with
        // no trailing zero, exponent with no sign noise or leading zeros.
        let mantissa_ok = match mantissa.split_once('.') {
            Some((int, frac)) => {
                int.len() == 1
                    && int.as_bytes()[0].is_ascii_digit()
                    && int != "0"
                    && !frac.is_empty()
                    && frac.bytes().all(|b| b.is_ascii_digit())
                    && !frac.ends_with('0')
            }
            None => mantissa.len() == 1 && mantissa.as_bytes()[0].is_ascii_digit() && mantissa != "0",
        };
        let exp_body = exp.strip_prefix('-').unwrap_or(exp);
        let exp_ok = !exp_body.is_empty()
            && exp_body.bytes().all(|b| b.is_ascii_digit())
            && !exp_body.starts_with('0');
        mantissa_ok && exp_ok
    } else {
        // Fixed point: no leading zeros except a lone "0." integer part, a
        // non-empty fraction with no trailing zero when a point is present.
        match body.split_once('.') {
            Some((int, frac)) => {
                let int_ok = !int.is_empty()
                    && int.bytes().all(|b| b.is_ascii_digit())
                    && (int == "0" || !int.starts_with('0'));
                int_ok
                    && !frac.is_empty()
                    && frac.bytes().all(|b| b.is_ascii_digit())
                    && !frac.ends_with('0')
            }
            None => {
                !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) && !body.starts_with('0')
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn enc(value: i64) -> Vec<u8> {
        let mut out = Vec::new();
        encode_long(&mut out, value);
        out
    }

    #[test]
    fn long_tiers() {
        assert_eq!(enc(0), [0x00]);
        assert_eq!(enc(1), [0x06]);
        assert_eq!(enc(122), [0x7F]);
        assert_eq!(enc(123), [0x01, 0x7B]);
        assert_eq!(enc(255), [0x01, 0xFF]);
        assert_eq!(enc(256), [0x02, 0x00, 0x01]);
        assert_eq!(enc(-1), [0xFA]);
        assert_eq!(enc(-123), [0x80]);
        assert_eq!(enc(-124), [0xFF, 0x84]);
        assert_eq!(enc(-256), [0xFF, 0x00]);
        assert_eq!(enc(-257), [0xFE, 0xFF, 0xFE]);
        assert_eq!(enc(0x3FFF_FFFF), [0x04, 0xFF, 0xFF, 0xFF, 0x3F]);
        assert_eq!(enc(-0x4000_0000), [0xFC, 0x00, 0x00, 0x00, 0xC0]);
    }

    #[test]
    fn long_round_trip() {
        for v in [
            0, 1, -1, 5, -5, 122, 123, -123, -124, 255, 256, 65535, 65536, -65536, -65537,
            0x3FFF_FFFF, -0x4000_0000, 1_000_000, -1_000_000,
        ] {
            let bytes = enc(v);
            assert_eq!(decode_long(&bytes), Ok((v, bytes.len())), "value {v}");
        }
    }

    #[test]
    fn long_rejects_wider_tiers() {
        // zero spelled through the short form
        assert_eq!(decode_long(&[0x05]), Err(NumericError::NonCanonicalLong));
        assert_eq!(decode_long(&[0xFB]), Err(NumericError::NonCanonicalLong));
        // 1 spelled as a one-byte magnitude
        assert_eq!(
            decode_long(&[0x01, 0x01]),
            Err(NumericError::NonCanonicalLong)
        );
        // 200 fits one magnitude byte but spelled with two
        assert_eq!(
            decode_long(&[0x02, 0xC8, 0x00]),
            Err(NumericError::NonCanonicalLong)
        );
        // -1 spelled as a one-byte two's complement
        assert_eq!(
            decode_long(&[0xFF, 0xFF]),
            Err(NumericError::NonCanonicalLong)
        );
    }

    #[test]
    fn long_eof() {
        assert_eq!(decode_long(&[]), Err(NumericError::Eof));
        assert_eq!(decode_long(&[0x02, 0x00]), Err(NumericError::Eof));
    }

    #[test]
    fn bignum_round_trip() {
        for v in [
            BigInt::from(0x4000_0000i64),
            BigInt::from(-0x4000_0001i64),
            BigInt::from(u64::MAX),
            BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap(),
        ] {
            let mut out = Vec::new();
            encode_bignum(&mut out, &v);
            // out[1] is the one-byte word count for these magnitudes
            let decoded = decode_bignum(out[0], &out[2..]).unwrap();
            assert_eq!(decoded, v);
        }
    }

    #[test]
    fn bignum_wire_form() {
        let mut out = Vec::new();
        encode_bignum(&mut out, &BigInt::from(0x4000_0000i64));
        assert_eq!(out, [b'+', 0x02, 0x00, 0x00, 0x00, 0x40]);
    }

    #[test]
    fn bignum_rejects_fixnum_range() {
        // 1 as a bignum
        assert_eq!(
            decode_bignum(b'+', &[0x01, 0x00]),
            Err(NumericError::NonCanonicalBignum)
        );
        // -0x40000000 is still a fixnum
        assert_eq!(
            decode_bignum(b'-', &[0x00, 0x00, 0x00, 0x40]),
            Err(NumericError::NonCanonicalBignum)
        );
        // but -0x40000001 is not
        assert!(decode_bignum(b'-', &[0x01, 0x00, 0x00, 0x40]).is_ok());
    }

    #[test]
    fn bignum_rejects_padding_word() {
        assert_eq!(
            decode_bignum(b'+', &[0x00, 0x00, 0x00, 0x40, 0x00, 0x00]),
            Err(NumericError::NonCanonicalBignum)
        );
    }

    #[test]
    fn bignum_rejects_bad_sign() {
        assert_eq!(
            decode_bignum(b'*', &[0x00, 0x40]),
            Err(NumericError::BignumSign(b'*'))
        );
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(-1.0), "-1");
        assert_eq!(format_float(100.0), "100");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(123.456), "123.456");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(0.00001), "1e-5");
        assert_eq!(format_float(1e15), "1000000000000000");
        assert_eq!(format_float(1e16), "1e16");
        assert_eq!(format_float(1e100), "1e100");
        assert_eq!(format_float(1.25e20), "1.25e20");
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(-0.0), "-0");
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn float_format_parses_back() {
        for v in [
            1.0,
            -1.0,
            0.1,
            123.456,
            20870.15,
            1e15,
            1e16,
            -2.5e-9,
            f64::MAX,
            f64::MIN_POSITIVE,
        ] {
            let text = format_float(v);
            assert_eq!(parse_float(text.as_bytes()), Ok(v), "text {text:?}");
        }
    }

    #[test]
    fn float_legacy_spellings() {
        assert_eq!(parse_float(b"infinity"), Ok(f64::INFINITY));
        assert_eq!(parse_float(b"-infinity"), Ok(f64::NEG_INFINITY));
        assert!(parse_float(b"-nan").unwrap().is_nan());
        assert!(parse_float(b"nan(0x7ff)").unwrap().is_nan());
    }

    #[test]
    fn float_rejects_noncanonical_spellings() {
        for text in [
            "+1", "01", "1.0", "1.", ".5", "1e+5", "1e05", "1E5", "0.50", "1.50e3", "0e0", "",
            "Infinity", "NaN", "1_000",
        ] {
            assert!(
                parse_float(text.as_bytes()).is_err(),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn fixnum_bounds() {
        assert!(fits_fixnum(&BigInt::from(FIXNUM_MAX)));
        assert!(fits_fixnum(&BigInt::from(FIXNUM_MIN)));
        assert!(!fits_fixnum(&BigInt::from(FIXNUM_MAX + 1)));
        assert!(!fits_fixnum(&BigInt::from(FIXNUM_MIN - 1)));
        assert!(fits_fixnum(&BigInt::zero()));
    }
}

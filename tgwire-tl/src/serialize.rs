//! Primitive TL wire encoders.
//!
//! Encoding follows the [MTProto Binary Serialization] spec: everything is
//! little-endian and strings are length-prefixed with 4-byte alignment.
//! The schema-directed layer on top lives in [`crate::serializer`].
//!
//! [MTProto Binary Serialization]: https://core.telegram.org/mtproto/serialize

use num_traits::ToPrimitive;

use crate::errors::{Error, Result};
use crate::value::Value;

/// Append a 32-bit signed integer.
pub fn write_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend(v.to_le_bytes());
}

/// Append a 32-bit unsigned integer (`#` bitfields, constructor IDs).
pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend(v.to_le_bytes());
}

/// Append a 64-bit signed integer.
pub fn write_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend(v.to_le_bytes());
}

/// Append an IEEE-754 double.
pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend(v.to_le_bytes());
}

/// Append a TL-framed byte string.
///
/// * If `len ≤ 253`: `[len as u8][data][0-padding to align to 4 bytes]`
/// * If `len ≥ 254`: `[0xfe][len as 3 LE bytes][data][0-padding]`
pub fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    let header_len = if len <= 253 {
        buf.push(len as u8);
        1
    } else {
        buf.push(0xfe);
        buf.push((len & 0xff) as u8);
        buf.push(((len >> 8) & 0xff) as u8);
        buf.push(((len >> 16) & 0xff) as u8);
        4
    };

    buf.extend_from_slice(data);

    let padding = (4 - (header_len + len) % 4) % 4;
    buf.extend(std::iter::repeat(0u8).take(padding));
}

/// Interpret `value` as a `long`, accepting the alternate input forms:
/// host `int`/`long`, a raw 8-byte blob, a 9-byte blob with a leading `b'a'`
/// sentinel, a `[lo, hi]` two-element vector (32-bit host convention), or an
/// arbitrary-precision integer.
pub fn write_long(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Int(v) => write_i64(buf, i64::from(*v)),
        Value::Long(v) => write_i64(buf, *v),
        Value::Bytes(b) if b.len() == 8 => buf.extend_from_slice(b),
        Value::Bytes(b) if b.len() == 9 && b[0] == b'a' => buf.extend_from_slice(&b[1..]),
        Value::Vector(parts) if parts.len() == 2 => {
            let lo = parts[0].as_i64().ok_or(Error::NotNumeric)? as u32;
            let hi = parts[1].as_i64().ok_or(Error::NotNumeric)? as u32;
            write_i64(buf, ((u64::from(hi) << 32) | u64::from(lo)) as i64);
        }
        Value::BigInt(v) => write_i64(buf, v.to_i64().ok_or(Error::NotNumeric)?),
        _ => return Err(Error::NotNumeric),
    }
    Ok(())
}

/// Append a fixed-width opaque blob (`int128`/`int256`/`int512`).
///
/// A byte value of the wrong length is re-tried as base64 before failing
/// with `BadLength` — schemas shipped as JSON often carry these fields
/// base64-encoded.
pub fn write_blob(buf: &mut Vec<u8>, value: &Value, bits: u32) -> Result<()> {
    let want = (bits / 8) as usize;

    let direct: Option<&[u8]> = match value {
        Value::Int128(b) if bits == 128 => Some(b),
        Value::Int256(b) if bits == 256 => Some(b),
        Value::Int512(b) if bits == 512 => Some(b),
        Value::Bytes(b) => Some(b.as_slice()),
        Value::Str(s) => Some(s.as_bytes()),
        _ => None,
    };
    let direct = direct.ok_or(Error::BadLength { bits, found: 0 })?;

    if direct.len() == want {
        buf.extend_from_slice(direct);
        return Ok(());
    }

    use base64::prelude::*;
    if let Ok(decoded) = BASE64_STANDARD.decode(direct) {
        if decoded.len() == want {
            buf.extend_from_slice(&decoded);
            return Ok(());
        }
    }

    Err(Error::BadLength { bits, found: direct.len() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_little_endian() {
        let mut buf = Vec::new();
        write_i32(&mut buf, 1);
        assert_eq!(buf, [0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn short_string_framing() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, b"abc");
        assert_eq!(buf, [0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn fourteen_bytes_pad_to_sixteen() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, &[0xAA; 14]);
        assert_eq!(buf.len(), 16);
        assert_eq!(buf[0], 0x0E);
        assert_eq!(&buf[1..15], &[0xAA; 14]);
        assert_eq!(buf[15], 0x00);
    }

    #[test]
    fn long_string_framing() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, &[0x55; 300]);
        assert_eq!(buf[0], 0xFE);
        assert_eq!(buf[1], 0x2C); // 300 = 0x012c
        assert_eq!(buf[2], 0x01);
        assert_eq!(buf[3], 0x00);
        assert_eq!(buf.len() % 4, 0);
    }

    #[test]
    fn long_alternate_forms_agree() {
        let n = 0x0102030405060708i64;
        let forms = [
            Value::Long(n),
            Value::Bytes(n.to_le_bytes().to_vec()),
            Value::Bytes([b"a".as_slice(), &n.to_le_bytes()].concat()),
            Value::Vector(vec![Value::Long(0x05060708), Value::Long(0x01020304)]),
            Value::BigInt(n.into()),
        ];
        for form in &forms {
            let mut buf = Vec::new();
            write_long(&mut buf, form).unwrap();
            assert_eq!(buf, n.to_le_bytes(), "form {form:?}");
        }
    }

    #[test]
    fn blob_base64_fallback() {
        use base64::prelude::*;
        let nonce = [7u8; 16];
        let encoded = BASE64_STANDARD.encode(nonce);

        let mut buf = Vec::new();
        write_blob(&mut buf, &Value::Str(encoded), 128).unwrap();
        assert_eq!(buf, nonce);

        let mut buf = Vec::new();
        let err = write_blob(&mut buf, &Value::Bytes(vec![0; 5]), 128).unwrap_err();
        assert_eq!(err, Error::BadLength { bits: 128, found: 5 });
    }
}

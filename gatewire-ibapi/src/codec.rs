//! Wire codec.
//!
//! Fields are ASCII text terminated by a NUL byte; a message payload is the
//! concatenation of its fields, and a frame is the payload prefixed with its
//! length as a 4-byte big-endian integer.
//!
//! ```text
//! frame   := u32_be(len(payload)) || payload
//! payload := field_0 \0 field_1 \0 ... field_n \0
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use crate::errors::{ClientError, Result};
use crate::models::common::TagValue;
use crate::protocol::{HEADER_LEN, MAX_MSG_LEN};

// ============================================================================
// Helpers
// ============================================================================

/// ASCII printable (32-126) plus tab, LF and CR.
fn is_ascii_printable(s: &str) -> bool {
    s.bytes()
        .all(|b| (32..127).contains(&b) || b == 9 || b == 10 || b == 13)
}

// ============================================================================
// FieldEncoder
// ============================================================================

/// Builds a message payload one field at a time.
///
/// Every `encode_*` call appends the value's text form followed by NUL.
#[derive(Debug, Default)]
pub struct FieldEncoder {
    buf: BytesMut,
}

impl FieldEncoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(128),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the encoder and return the payload (without length header).
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    // ========================================================================
    // Core field encoders
    // ========================================================================

    /// Encode a string field.
    ///
    /// Non-printable text is sent anyway but logged; an embedded NUL would
    /// split the field on the server side.
    pub fn encode_str(&mut self, value: &str) -> &mut Self {
        if !value.is_empty() && !is_ascii_printable(value) {
            tracing::warn!(value, "non-ASCII-printable string in field encoding");
        }
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.put_u8(0);
        self
    }

    pub fn encode_i32(&mut self, value: i32) -> &mut Self {
        self.write_display(value);
        self.buf.put_u8(0);
        self
    }

    pub fn encode_i64(&mut self, value: i64) -> &mut Self {
        self.write_display(value);
        self.buf.put_u8(0);
        self
    }

    /// Encode a float with fixed six decimals (`1.5` → `"1.500000"`).
    pub fn encode_f64(&mut self, value: f64) -> &mut Self {
        if value.is_infinite() && value.is_sign_positive() {
            self.buf.extend_from_slice(b"Infinity");
        } else {
            self.write_display(format_args!("{value:.6}"));
        }
        self.buf.put_u8(0);
        self
    }

    /// `"1"` for true, `"0"` for false.
    pub fn encode_bool(&mut self, value: bool) -> &mut Self {
        self.buf.extend_from_slice(if value { b"1" } else { b"0" });
        self.buf.put_u8(0);
        self
    }

    pub fn encode_decimal(&mut self, value: &Decimal) -> &mut Self {
        self.write_display(value);
        self.buf.put_u8(0);
        self
    }

    /// Encode any value by its `Display` form (wire enums).
    pub fn encode_display<T: fmt::Display>(&mut self, value: &T) -> &mut Self {
        self.write_display(value);
        self.buf.put_u8(0);
        self
    }

    /// `None` becomes an empty field.
    pub fn encode_opt_display<T: fmt::Display>(&mut self, value: Option<&T>) -> &mut Self {
        match value {
            Some(v) => self.encode_display(v),
            None => {
                self.buf.put_u8(0);
                self
            }
        }
    }

    /// Encode a TagValue list as `"key1=val1;key2=val2;"`.
    pub fn encode_tag_values(&mut self, tags: &[TagValue]) -> &mut Self {
        let mut combined = String::new();
        for tv in tags {
            combined.push_str(&tv.tag);
            combined.push('=');
            combined.push_str(&tv.value);
            combined.push(';');
        }
        self.encode_str(&combined)
    }

    fn write_display<T: fmt::Display>(&mut self, value: T) {
        use std::fmt::Write;
        let mut s = String::new();
        // Writing into a String cannot fail.
        let _ = write!(s, "{value}");
        self.buf.extend_from_slice(s.as_bytes());
    }
}

// ============================================================================
// Framing
// ============================================================================

/// Prefix a payload with its 4-byte big-endian length.
pub fn frame(payload: &[u8]) -> Result<BytesMut> {
    if payload.len() > MAX_MSG_LEN {
        return Err(ClientError::Encoding(format!(
            "message too long: {} bytes (max {MAX_MSG_LEN})",
            payload.len()
        )));
    }
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(payload);
    Ok(buf)
}

fn declared_len(header: &[u8]) -> Result<usize> {
    let mut header = header;
    let len = header.get_u32() as usize;
    if len > MAX_MSG_LEN {
        return Err(ClientError::Protocol(format!("invalid message length: {len}")));
    }
    Ok(len)
}

/// Strip the length header from a complete frame.
///
/// Returns the payload and the number of bytes the frame occupied.
pub fn unframe(data: &[u8]) -> Result<(&[u8], usize)> {
    if data.len() < HEADER_LEN {
        return Err(ClientError::TruncatedFrame {
            needed: HEADER_LEN,
            available: data.len(),
        });
    }
    let len = declared_len(&data[..HEADER_LEN])?;
    let total = HEADER_LEN + len;
    if data.len() < total {
        return Err(ClientError::TruncatedFrame {
            needed: total,
            available: data.len(),
        });
    }
    Ok((&data[HEADER_LEN..total], total))
}

/// Take one frame off the front of an accumulating read buffer.
///
/// `Ok(None)` means more bytes are needed; the buffer is left untouched.
pub fn try_unframe(buf: &mut BytesMut) -> Result<Option<Bytes>> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let len = declared_len(&buf[..HEADER_LEN])?;
    if buf.len() < HEADER_LEN + len {
        buf.reserve(HEADER_LEN + len - buf.len());
        return Ok(None);
    }
    buf.advance(HEADER_LEN);
    Ok(Some(buf.split_to(len).freeze()))
}

// ============================================================================
// Field sequences
// ============================================================================

/// Split a payload into its fields.
///
/// The final NUL is dropped before splitting, so `b"a\0b\0"` yields
/// `["a", "b"]` and an empty payload yields no fields.
pub fn split_fields(payload: &[u8]) -> Vec<String> {
    if payload.is_empty() {
        return Vec::new();
    }
    let body = payload.strip_suffix(&[0]).unwrap_or(payload);
    body.split(|&b| b == 0)
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect()
}

/// Encode a sequence of text fields as a payload.
pub fn encode_fields<S: AsRef<str>>(fields: &[S]) -> Bytes {
    let mut enc = FieldEncoder::new();
    for f in fields {
        enc.encode_str(f.as_ref());
    }
    enc.finish()
}

/// Message code of a field sequence (its first field).
pub fn message_id(fields: &[String]) -> Result<i32> {
    let first = fields
        .first()
        .ok_or_else(|| ClientError::Protocol("empty message".into()))?;
    if first.is_empty() {
        return Err(ClientError::Protocol("blank message code".into()));
    }
    first.parse::<i32>().map_err(|_| ClientError::MalformedField {
        kind: "message code",
        value: first.clone(),
    })
}

// ============================================================================
// FieldDecoder
// ============================================================================

/// Cursor over a field sequence.
///
/// Each `decode_*` call consumes exactly one field. Empty numeric fields
/// decode as zero; running out of fields is a `Decode` error.
pub struct FieldDecoder<'a> {
    fields: &'a [String],
    pos: usize,
    server_version: i32,
}

impl<'a> FieldDecoder<'a> {
    pub fn new(fields: &'a [String], server_version: i32) -> Self {
        Self {
            fields,
            pos: 0,
            server_version,
        }
    }

    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.fields.len()
    }

    pub fn remaining(&self) -> &'a [String] {
        &self.fields[self.pos.min(self.fields.len())..]
    }

    fn next_field(&mut self) -> Result<&'a str> {
        let field = self.fields.get(self.pos).ok_or_else(|| {
            ClientError::Decode(format!(
                "field sequence exhausted at position {} of {}",
                self.pos,
                self.fields.len()
            ))
        })?;
        self.pos += 1;
        Ok(field.as_str())
    }

    fn parse<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
        s.parse::<T>().map_err(|_| ClientError::MalformedField {
            kind,
            value: s.to_string(),
        })
    }

    // ========================================================================
    // Type-specific decoders
    // ========================================================================

    pub fn decode_string(&mut self) -> Result<String> {
        self.next_field().map(str::to_string)
    }

    pub fn decode_i32(&mut self) -> Result<i32> {
        match self.next_field()? {
            "" => Ok(0),
            s => Self::parse("i32", s),
        }
    }

    pub fn decode_i64(&mut self) -> Result<i64> {
        match self.next_field()? {
            "" => Ok(0),
            s => Self::parse("i64", s),
        }
    }

    /// Accepts `"Infinity"` as well as decimal text.
    pub fn decode_f64(&mut self) -> Result<f64> {
        match self.next_field()? {
            "" => Ok(0.0),
            "Infinity" => Ok(f64::INFINITY),
            s => Self::parse("f64", s),
        }
    }

    /// Non-zero integers are true.
    pub fn decode_bool(&mut self) -> Result<bool> {
        self.decode_i32().map(|v| v != 0)
    }

    pub fn decode_decimal(&mut self) -> Result<Decimal> {
        self.decode_decimal_max().map(|d| d.unwrap_or(Decimal::ZERO))
    }

    // ========================================================================
    // "Max" decoders: empty string → None
    // ========================================================================

    pub fn decode_i32_max(&mut self) -> Result<Option<i32>> {
        match self.next_field()? {
            "" => Ok(None),
            s => Self::parse("i32", s).map(Some),
        }
    }

    pub fn decode_decimal_max(&mut self) -> Result<Option<Decimal>> {
        let s = self.next_field()?;
        if s.is_empty() {
            return Ok(None);
        }
        Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .map(Some)
            .map_err(|_| ClientError::MalformedField {
                kind: "decimal",
                value: s.to_string(),
            })
    }

    /// Parse a wire enum; empty means `None`.
    pub fn decode_enum_opt<T: FromStr>(&mut self) -> Result<Option<T>> {
        match self.next_field()? {
            "" => Ok(None),
            s => Self::parse("enum", s).map(Some),
        }
    }

    pub fn skip_field(&mut self) -> Result<()> {
        self.next_field().map(|_| ())
    }

    pub fn skip_fields(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.skip_field()?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_body(f: impl FnOnce(&mut FieldEncoder)) -> Vec<u8> {
        let mut enc = FieldEncoder::new();
        f(&mut enc);
        enc.finish().to_vec()
    }

    fn fields(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn encode_scalars() {
        assert_eq!(encode_body(|e| { e.encode_i32(-7); }), b"-7\0");
        assert_eq!(encode_body(|e| { e.encode_i64(1234567890123); }), b"1234567890123\0");
        assert_eq!(encode_body(|e| { e.encode_bool(true); }), b"1\0");
        assert_eq!(encode_body(|e| { e.encode_bool(false); }), b"0\0");
        assert_eq!(encode_body(|e| { e.encode_str(""); }), b"\0");
    }

    #[test]
    fn encode_f64_fixed_six_decimals() {
        assert_eq!(encode_body(|e| { e.encode_f64(0.0); }), b"0.000000\0");
        assert_eq!(encode_body(|e| { e.encode_f64(4512.25); }), b"4512.250000\0");
        assert_eq!(encode_body(|e| { e.encode_f64(f64::INFINITY); }), b"Infinity\0");
    }

    #[test]
    fn encode_tag_values_and_options() {
        let tags = vec![TagValue::new("a", "1"), TagValue::new("b", "2")];
        assert_eq!(encode_body(|e| { e.encode_tag_values(&tags); }), b"a=1;b=2;\0");
        assert_eq!(encode_body(|e| { e.encode_tag_values(&[]); }), b"\0");
        assert_eq!(
            encode_body(|e| { e.encode_opt_display::<i32>(None).encode_opt_display(Some(&5)); }),
            b"\x005\0"
        );
    }

    #[test]
    fn frame_round_trip_including_empty() {
        for payload in [&b""[..], b"\0", b"50\x003\x009000\0", &[7u8; 1000][..]] {
            let framed = frame(payload).unwrap();
            assert_eq!(&framed[..4], &(payload.len() as u32).to_be_bytes());
            let (body, used) = unframe(&framed).unwrap();
            assert_eq!(body, payload);
            assert_eq!(used, framed.len());
        }
    }

    #[test]
    fn unframe_truncated() {
        match unframe(&[0, 0]) {
            Err(ClientError::TruncatedFrame { needed: 4, available: 2 }) => {}
            other => panic!("unexpected {other:?}"),
        }
        let mut framed = frame(b"hello\0").unwrap();
        framed.truncate(7);
        match unframe(&framed) {
            Err(ClientError::TruncatedFrame { needed: 10, available: 7 }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unframe_rejects_oversized_length() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0];
        assert!(matches!(unframe(&data), Err(ClientError::Protocol(_))));
    }

    #[test]
    fn try_unframe_incremental() {
        let mut buf = BytesMut::new();
        let framed = frame(b"9\x001\x00100\0").unwrap();
        buf.extend_from_slice(&framed[..3]);
        assert!(try_unframe(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&framed[3..8]);
        assert!(try_unframe(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&framed[8..]);
        buf.extend_from_slice(&frame(b"").unwrap());
        assert_eq!(&try_unframe(&mut buf).unwrap().unwrap()[..], b"9\x001\x00100\0");
        assert_eq!(&try_unframe(&mut buf).unwrap().unwrap()[..], b"");
        assert!(buf.is_empty());
    }

    #[test]
    fn split_drops_final_separator() {
        assert_eq!(split_fields(b"a\0b\0"), fields(&["a", "b"]));
        assert_eq!(split_fields(b"a\0\0c\0"), fields(&["a", "", "c"]));
        assert_eq!(split_fields(b"\0"), fields(&[""]));
        assert_eq!(split_fields(b"v100..176"), fields(&["v100..176"]));
        assert!(split_fields(b"").is_empty());
    }

    #[test]
    fn field_sequence_round_trip() {
        let cases: Vec<Vec<String>> = vec![
            fields(&["50", "3", "9000", "", "ES"]),
            fields(&[""]),
            fields(&["", "", ""]),
            fields(&["20240102 09:30:00 EST"]),
        ];
        for f in cases {
            assert_eq!(split_fields(&encode_fields(&f)), f);
        }
    }

    #[test]
    fn message_id_parsing() {
        assert_eq!(message_id(&fields(&["52", "1", "9000"])).unwrap(), 52);
        assert!(matches!(message_id(&[]), Err(ClientError::Protocol(_))));
        assert!(matches!(message_id(&fields(&[""])), Err(ClientError::Protocol(_))));
        assert!(matches!(
            message_id(&fields(&["x"])),
            Err(ClientError::MalformedField { .. })
        ));
    }

    #[test]
    fn decode_empty_numerics_are_zero() {
        let f = fields(&["", "", "", "", ""]);
        let mut dec = FieldDecoder::new(&f, 176);
        assert_eq!(dec.decode_i32().unwrap(), 0);
        assert_eq!(dec.decode_i64().unwrap(), 0);
        assert_eq!(dec.decode_f64().unwrap(), 0.0);
        assert!(!dec.decode_bool().unwrap());
        assert_eq!(dec.decode_decimal().unwrap(), Decimal::ZERO);
        assert!(!dec.has_remaining());
    }

    #[test]
    fn decode_values() {
        let f = fields(&["42", "-1", "1.25", "Infinity", "1", "AAPL", "100.5", "", "STK"]);
        let mut dec = FieldDecoder::new(&f, 176);
        assert_eq!(dec.decode_i32().unwrap(), 42);
        assert_eq!(dec.decode_i64().unwrap(), -1);
        assert_eq!(dec.decode_f64().unwrap(), 1.25);
        assert_eq!(dec.decode_f64().unwrap(), f64::INFINITY);
        assert!(dec.decode_bool().unwrap());
        assert_eq!(dec.decode_string().unwrap(), "AAPL");
        assert_eq!(dec.decode_decimal().unwrap(), Decimal::new(1005, 1));
        assert_eq!(dec.decode_i32_max().unwrap(), None);
        assert_eq!(
            dec.decode_enum_opt::<crate::models::enums::SecType>().unwrap(),
            Some(crate::models::enums::SecType::Stock)
        );
        assert_eq!(dec.position(), 9);
    }

    #[test]
    fn decode_malformed_numeric() {
        let f = fields(&["12a"]);
        let mut dec = FieldDecoder::new(&f, 176);
        match dec.decode_i32() {
            Err(ClientError::MalformedField { kind: "i32", value }) => assert_eq!(value, "12a"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_exhaustion_is_decode_error() {
        let f = fields(&["1"]);
        let mut dec = FieldDecoder::new(&f, 176);
        dec.skip_field().unwrap();
        assert!(matches!(dec.decode_string(), Err(ClientError::Decode(_))));
        assert!(matches!(dec.skip_fields(2), Err(ClientError::Decode(_))));
    }
}

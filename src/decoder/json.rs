//! Conversion of plain JSON values: the value dispatcher, object and array
//! builders, string escape decoding, and number classification.

use std::io::Read;

use super::{Decoder, ARRAY_INDEX_KEYS, CANONICAL_NAN_BITS, DOUBLE_PEEK_WIDTH, EMPTY_DOC, EMPTY_LENGTH, EMPTY_TYPE};
use crate::{
    error::{Error, Result},
    spec,
};

// Strings are copied through the output in windows of this size.
const STRING_PEEK_WIDTH: usize = 64;

/// Writes `tag` into the type slot a parent recorded, if any. `None` means
/// "no tag owed": top-level documents and staged scratch documents.
pub(crate) fn set_type_byte(out: &mut [u8], type_pos: Option<usize>, tag: u8) {
    if let Some(pos) = type_pos {
        out[pos] = tag;
    }
}

/// Patches the 4-byte little-endian length slot at `pos`.
pub(crate) fn overwrite_length(out: &mut [u8], pos: usize, len: usize) {
    out[pos..pos + 4].copy_from_slice(&(len as u32).to_le_bytes());
}

pub(crate) fn parse_str_bytes<T: std::str::FromStr>(buf: &[u8]) -> Option<T> {
    std::str::from_utf8(buf).ok()?.parse().ok()
}

/// Appends `n` as a little-endian float64, canonicalizing NaN.
pub(crate) fn append_f64(out: &mut Vec<u8>, n: f64) {
    let bits = if n.is_nan() {
        CANONICAL_NAN_BITS
    } else {
        n.to_bits()
    };
    out.extend_from_slice(&bits.to_le_bytes());
}

fn append_array_index_key(out: &mut Vec<u8>, index: usize) {
    match ARRAY_INDEX_KEYS.get(index) {
        Some(key) => out.extend_from_slice(key.as_bytes()),
        None => out.extend_from_slice(index.to_string().as_bytes()),
    }
    out.push(0);
}

// Outcome of scanning one peeked window of a string.
enum StringStep {
    // Re-peek from the first unconsumed byte, requiring this many bytes.
    Repeek { consumed: usize, needed: usize },
    // Closing quote reached (and included in `consumed`).
    Done { consumed: usize },
    Fail { consumed: usize, message: String },
}

impl<R: Read> Decoder<R> {
    /// Starts before any bytes of a value have been read: detects the value
    /// type and dispatches. `type_pos` is where the parent expects this
    /// value's type tag.
    pub(crate) fn convert_value(&mut self, out: &mut Vec<u8>, type_pos: Option<usize>) -> Result<()> {
        let ch = self.read_after_ws()?;
        match ch {
            // Type byte deferred: extended JSON can turn the object into a
            // non-document value determined later from key inspection.
            b'{' => self.convert_object(out, type_pos),
            b'[' => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_ARRAY);
                self.convert_array(out)
            }
            b'"' => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_UTF8_STRING);
                self.convert_string(out)
            }
            b't' => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_BOOLEAN);
                self.convert_literal(b"rue", "expecting true")?;
                out.push(1);
                Ok(())
            }
            b'f' => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_BOOLEAN);
                self.convert_literal(b"alse", "expecting false")?;
                out.push(0);
                Ok(())
            }
            b'n' => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_NULL_VALUE);
                self.convert_literal(b"ull", "expecting null")
            }
            // The number type (int32, int64, double) is determined by the
            // number converter, so the type slot is passed along.
            b'-' | b'0'..=b'9' => {
                self.source.unread_byte();
                self.convert_number(out, type_pos)
            }
            _ => Err(self.parse_error_at(ch, "invalid character")),
        }
    }

    // The first character of the literal has already been read.
    pub(crate) fn convert_literal(&mut self, rest: &[u8], message: &str) -> Result<()> {
        let matched = {
            let buf = self.source.peek(rest.len())?;
            if buf.len() < rest.len() {
                None
            } else {
                Some(&buf[..rest.len()] == rest)
            }
        };
        match matched {
            None => Err(Error::unexpected_eof()),
            Some(false) => Err(self.parse_error(message)),
            Some(true) => {
                self.source.discard(rest.len());
                Ok(())
            }
        }
    }

    /// Starts after the opening brace of an object.
    pub(crate) fn convert_object(&mut self, out: &mut Vec<u8>, outer_type_pos: Option<usize>) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(Error::max_depth_exceeded(self.max_depth));
        }
        let result = self.convert_object_body(out, outer_type_pos);
        self.depth -= 1;
        result
    }

    fn convert_object_body(&mut self, out: &mut Vec<u8>, outer_type_pos: Option<usize>) -> Result<()> {
        // Position of the length that is not written yet, in case this turns
        // out to be extended JSON.
        let length_pos = out.len();

        let ch = self.read_after_ws()?;
        match ch {
            b'}' => {
                set_type_byte(out, outer_type_pos, spec::ELEMENT_TYPE_EMBEDDED_DOCUMENT);
                out.extend_from_slice(&EMPTY_DOC);
                return Ok(());
            }
            b'"' => {
                if self.ext_json && outer_type_pos.is_some() {
                    // Put the quote back so the extended handler sees a valid
                    // object start; some types reparse into a scratch buffer.
                    self.source.unread_byte();
                    if self.handle_ext_json(out, outer_type_pos)? {
                        return Ok(());
                    }
                    // Not extended JSON: re-read the quote we put back.
                    self.source.read_byte()?;
                }

                out.extend_from_slice(&EMPTY_LENGTH);
                set_type_byte(out, outer_type_pos, spec::ELEMENT_TYPE_EMBEDDED_DOCUMENT);

                let type_pos = out.len();
                out.push(EMPTY_TYPE);
                self.convert_cstring(out, false)?;
                self.read_name_separator()?;
                self.convert_value(out, Some(type_pos))?;
            }
            _ => return Err(self.parse_error_at(ch, "expecting key or end of object")),
        }

        loop {
            let ch = self.read_after_ws()?;
            match ch {
                b',' => {
                    let ch = self.read_after_ws()?;
                    if ch != b'"' {
                        return Err(self.parse_error_at(ch, "expecting opening quote of key"));
                    }
                    let type_pos = out.len();
                    out.push(EMPTY_TYPE);
                    self.convert_cstring(out, false)?;
                    self.read_name_separator()?;
                    self.convert_value(out, Some(type_pos))?;
                }
                b'}' => break,
                _ => {
                    return Err(
                        self.parse_error_at(ch, "expecting value-separator or end of object")
                    )
                }
            }
        }

        out.push(0);
        let out_len = out.len();
        overwrite_length(out, length_pos, out_len - length_pos);
        Ok(())
    }

    /// Starts after the opening bracket of an array.
    pub(crate) fn convert_array(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(Error::max_depth_exceeded(self.max_depth));
        }
        let result = self.convert_array_body(out);
        self.depth -= 1;
        result
    }

    fn convert_array_body(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let length_pos = out.len();
        out.extend_from_slice(&EMPTY_LENGTH);

        let ch = self.read_after_ws()?;
        if ch == b']' {
            out.push(0);
            let out_len = out.len();
            overwrite_length(out, length_pos, out_len - length_pos);
            return Ok(());
        }
        self.source.unread_byte();

        let type_pos = out.len();
        out.push(EMPTY_TYPE);
        append_array_index_key(out, 0);
        self.convert_value(out, Some(type_pos))?;

        let mut index = 0usize;
        loop {
            let ch = self.read_after_ws()?;
            match ch {
                b',' => {
                    index += 1;
                    let type_pos = out.len();
                    out.push(EMPTY_TYPE);
                    append_array_index_key(out, index);
                    self.convert_value(out, Some(type_pos))?;
                }
                b']' => break,
                _ => {
                    return Err(
                        self.parse_error_at(ch, "expecting value-separator or end of array")
                    )
                }
            }
        }

        out.push(0);
        let out_len = out.len();
        overwrite_length(out, length_pos, out_len - length_pos);
        Ok(())
    }

    /// Starts after the opening quote. Copies the string as a NUL-terminated
    /// cstring, decoding escape sequences, peeking in 64-byte windows and
    /// consuming input as it is copied. Escapes may straddle window
    /// boundaries; the window is re-peeked from the backslash in that case.
    ///
    /// `allow_interior_nul` is false for keys and regular expression fields,
    /// whose BSON encoding cannot represent NUL.
    pub(crate) fn convert_cstring(&mut self, out: &mut Vec<u8>, allow_interior_nul: bool) -> Result<()> {
        let mut chars_needed = 1usize;
        loop {
            let step = {
                let buf = self.source.peek(STRING_PEEK_WIDTH)?;
                if buf.len() < chars_needed {
                    return Err(Error::unexpected_eof());
                }
                scan_string_window(buf, out, allow_interior_nul)
            };
            match step {
                StringStep::Repeek { consumed, needed } => {
                    self.source.discard(consumed);
                    chars_needed = needed;
                }
                StringStep::Done { consumed } => {
                    self.source.discard(consumed);
                    break;
                }
                StringStep::Fail { consumed, message } => {
                    self.source.discard(consumed);
                    return Err(self.parse_error(message));
                }
            }
        }
        out.push(0);
        Ok(())
    }

    /// Starts after the opening quote. Works like `convert_cstring` but
    /// prepends the length of the string.
    pub(crate) fn convert_string(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let length_pos = out.len();
        out.extend_from_slice(&EMPTY_LENGTH);

        self.convert_cstring(out, true)?;

        let out_len = out.len();
        overwrite_length(out, length_pos, out_len - length_pos - 4);
        Ok(())
    }

    /// Scans the upcoming number without consuming it, validating its shape.
    /// Returns its byte length and whether it is floating point.
    pub(crate) fn peek_number(&mut self) -> Result<(usize, bool)> {
        let scanned = {
            let buf = self.source.peek(DOUBLE_PEEK_WIDTH)?;
            scan_number(buf, buf.len() == DOUBLE_PEEK_WIDTH)
        };
        match scanned {
            Ok(result) => Ok(result),
            Err(NumberScanError::UnexpectedEof) => Err(Error::unexpected_eof()),
            Err(NumberScanError::Parse(message)) => Err(self.parse_error(message)),
        }
    }

    /// Starts before any of the number has been read; consumes it when
    /// finished.
    pub(crate) fn convert_number(&mut self, out: &mut Vec<u8>, type_pos: Option<usize>) -> Result<()> {
        let (len, is_float) = self.peek_number()?;
        if is_float {
            self.convert_float(out, type_pos, len)?;
        } else {
            // Still don't know if the type is int32 or int64, so delegate.
            self.convert_int(out, type_pos, len)?;
        }
        self.source.discard(len);
        Ok(())
    }

    // Converts the float at the head of the input without consuming it.
    fn convert_float(&mut self, out: &mut Vec<u8>, type_pos: Option<usize>, len: usize) -> Result<()> {
        let parsed: Option<f64> = {
            let buf = self.source.peek(len)?;
            parse_str_bytes(&buf[..len])
        };
        match parsed {
            Some(n) => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_DOUBLE);
                append_f64(out, n);
                Ok(())
            }
            None => Err(self.parse_error("float conversion: invalid float literal")),
        }
    }

    // Converts the integer at the head of the input without consuming it.
    fn convert_int(&mut self, out: &mut Vec<u8>, type_pos: Option<usize>, len: usize) -> Result<()> {
        enum Int {
            Value(i64),
            Overflow,
            Invalid,
        }
        let parsed = {
            let buf = self.source.peek(len)?;
            let token = &buf[..len];
            match parse_str_bytes::<i64>(token) {
                Some(n) => Int::Value(n),
                None => {
                    let digits = match token.first() {
                        Some(b'-') => &token[1..],
                        _ => token,
                    };
                    if digits.iter().all(u8::is_ascii_digit) {
                        Int::Overflow
                    } else {
                        Int::Invalid
                    }
                }
            }
        };
        match parsed {
            Int::Value(n) if i32::try_from(n).is_ok() => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_32BIT_INTEGER);
                out.extend_from_slice(&(n as i32).to_le_bytes());
                Ok(())
            }
            Int::Value(n) => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_64BIT_INTEGER);
                out.extend_from_slice(&n.to_le_bytes());
                Ok(())
            }
            // Doesn't fit in int64, so treat as float.
            Int::Overflow => self.convert_float(out, type_pos, len),
            Int::Invalid => Err(self.parse_error("int conversion: invalid integer literal")),
        }
    }
}

// Copies string bytes from one peeked window into `out`, decoding escapes.
fn scan_string_window(buf: &[u8], out: &mut Vec<u8>, allow_interior_nul: bool) -> StringStep {
    // A full window means more input may exist beyond it; a short window
    // means the stream ends where it does.
    let window_full = buf.len() == STRING_PEEK_WIDTH;
    let mut i = 0usize;
    while i < buf.len() {
        match buf[i] {
            b'"' => return StringStep::Done { consumed: i + 1 },
            b'\\' => {
                if buf.len() - i < 2 {
                    return StringStep::Repeek { consumed: i, needed: 2 };
                }
                match buf[i + 1] {
                    b'"' | b'\\' | b'/' => {
                        out.push(buf[i + 1]);
                        i += 2;
                    }
                    b'b' => {
                        out.push(0x08);
                        i += 2;
                    }
                    b'f' => {
                        out.push(0x0C);
                        i += 2;
                    }
                    b'n' => {
                        out.push(b'\n');
                        i += 2;
                    }
                    b'r' => {
                        out.push(b'\r');
                        i += 2;
                    }
                    b't' => {
                        out.push(b'\t');
                        i += 2;
                    }
                    b'u' => match scan_unicode_escape(&buf[i..], window_full, out, allow_interior_nul) {
                        Ok(Some(advanced)) => i += advanced,
                        Ok(None) => return StringStep::Repeek { consumed: i, needed: 6 },
                        Err(message) => return StringStep::Fail { consumed: i, message },
                    },
                    other => {
                        return StringStep::Fail {
                            consumed: i,
                            message: format!("unknown escape '{}'", other as char),
                        }
                    }
                }
            }
            byte if byte < 0x20 => {
                return StringStep::Fail {
                    consumed: i,
                    message: "control characters not allowed in strings".to_string(),
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    // Window exhausted mid-string; at least the closing quote is missing.
    StringStep::Repeek { consumed: i, needed: 1 }
}

// Decodes a `\uXXXX` escape at the start of `buf` (which begins at the
// backslash). Returns the number of bytes consumed, or `None` when the
// window is too short and must be re-peeked from the backslash. A high
// surrogate followed by a `\u` low surrogate forms a supplementary code
// point; lone or unpaired surrogates become U+FFFD.
fn scan_unicode_escape(
    buf: &[u8],
    window_full: bool,
    out: &mut Vec<u8>,
    allow_interior_nul: bool,
) -> std::result::Result<Option<usize>, String> {
    const PAIR_LEN: usize = 12;

    if buf.len() < 6 {
        return Ok(None);
    }
    let unit = parse_hex4(&buf[2..6])
        .ok_or_else(|| "converting unicode escape: invalid hex digits".to_string())?;

    if (0xD800..0xDC00).contains(&unit) {
        if buf.len() < PAIR_LEN && window_full {
            // The pair may exist but not in this window.
            return Ok(None);
        }
        let low = if buf.len() >= PAIR_LEN && buf[6] == b'\\' && buf[7] == b'u' {
            parse_hex4(&buf[8..12])
        } else {
            None
        };
        match low {
            Some(low) if (0xDC00..0xE000).contains(&low) => {
                let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                push_utf8(out, combined);
                Ok(Some(PAIR_LEN))
            }
            // Unpaired: emit the replacement character for the high
            // surrogate only; whatever follows is decoded on its own.
            _ => {
                push_utf8(out, 0xFFFD);
                Ok(Some(6))
            }
        }
    } else if (0xDC00..0xE000).contains(&unit) {
        push_utf8(out, 0xFFFD);
        Ok(Some(6))
    } else {
        if unit == 0 && !allow_interior_nul {
            return Err("null bytes not allowed in this string".to_string());
        }
        push_utf8(out, unit);
        Ok(Some(6))
    }
}

fn parse_hex4(buf: &[u8]) -> Option<u32> {
    let mut value = 0u32;
    for &b in buf {
        value = value * 16 + (b as char).to_digit(16)?;
    }
    Some(value)
}

fn push_utf8(out: &mut Vec<u8>, code_point: u32) {
    let ch = char::from_u32(code_point).unwrap_or('\u{FFFD}');
    let mut utf8 = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
}

enum NumberScanError {
    UnexpectedEof,
    Parse(&'static str),
}

// Finds the extent of the number at the head of `buf` and validates its
// shape. `window_full` distinguishes a too-long number from one truncated by
// end of input.
fn scan_number(buf: &[u8], window_full: bool) -> std::result::Result<(usize, bool), NumberScanError> {
    let mut end = None;
    let mut is_float = false;
    for (i, &b) in buf.iter().enumerate() {
        match b {
            b',' | b']' | b'}' | b' ' | b'\t' | b'\n' | b'\r' => {
                end = Some(i);
                break;
            }
            b'.' | b'e' | b'E' => is_float = true,
            b'_' => return Err(NumberScanError::Parse("invalid character '_' in number")),
            _ => {}
        }
    }
    let len = match end {
        Some(0) => return Err(NumberScanError::Parse("number not found")),
        Some(len) => len,
        None if window_full => return Err(NumberScanError::Parse("number too long")),
        None => return Err(NumberScanError::UnexpectedEof),
    };

    let token = &buf[..len];
    let digits = match token[0] {
        b'-' => &token[1..],
        _ => token,
    };
    if digits.is_empty() {
        return Err(NumberScanError::Parse("number not found"));
    }
    if !digits[0].is_ascii_digit() {
        return Err(NumberScanError::Parse("invalid character in number"));
    }
    if digits[0] == b'0' && digits.len() > 1 && digits[1].is_ascii_digit() {
        return Err(NumberScanError::Parse("leading zeros not allowed"));
    }
    for (i, &b) in digits.iter().enumerate() {
        if b == b'.' && !digits.get(i + 1).is_some_and(u8::is_ascii_digit) {
            return Err(NumberScanError::Parse("decimal must be followed by digit"));
        }
    }

    Ok((len, is_float))
}

//! Streaming JSON to BSON conversion.
//!
//! The [`Decoder`] reads JSON objects from a buffered byte stream and appends
//! their BSON encodings to a caller-supplied output buffer, writing the
//! output as the input is read. Objects may be separated by optional white
//! space or may be the members of one well-formed JSON array.

mod extjson;
mod json;

use std::io::Read;

use once_cell::sync::Lazy;

use crate::{
    error::{Error, Result},
    reader::PeekReader,
};

// Widest peek issued for a plain number: enough for the longest finite
// double literal written out in full.
pub(crate) const DOUBLE_PEEK_WIDTH: usize = 310;
// $numberDecimal literals can pad many zeros around their 34 significant
// digits; still far below the reader's capacity.
pub(crate) const DECIMAL_PEEK_WIDTH: usize = 1024;
// Quiet NaN with an empty payload, the only NaN emitted.
pub(crate) const CANONICAL_NAN_BITS: u64 = 0x7FF8_0000_0000_0000;
// Input bytes echoed back as context in parse errors.
const PARSE_ERROR_CONTEXT_LEN: usize = 20;

pub(crate) const EMPTY_DOC: [u8; 5] = [5, 0, 0, 0, 0];
pub(crate) const EMPTY_LENGTH: [u8; 4] = [0; 4];
pub(crate) const EMPTY_TYPE: u8 = 0;

const DEFAULT_MAX_DEPTH: usize = 200;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];
const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF32_BE_BOM: [u8; 4] = [0x00, 0x00, 0xFE, 0xFF];
const UTF32_LE_BOM: [u8; 4] = [0xFF, 0xFE, 0x00, 0x00];

// Array element keys below this table's length avoid formatting.
pub(crate) static ARRAY_INDEX_KEYS: Lazy<Vec<String>> =
    Lazy::new(|| (0..100).map(|i| i.to_string()).collect());

/// Reads and decodes JSON objects to BSON from a buffered input stream.
///
/// See the [crate-level documentation](crate) for usage.
#[derive(Debug)]
pub struct Decoder<R> {
    source: PeekReader<R>,
    array_started: bool,
    array_finished: bool,
    depth: usize,
    max_depth: usize,
    ext_json: bool,
    scratch: Option<Vec<u8>>,
}

impl<R: Read> Decoder<R> {
    /// Creates a decoder over `reader`, buffering it with at least 8 KiB of
    /// lookahead.
    ///
    /// Construction strips a UTF-8 byte-order mark and fails on UTF-16/32
    /// marks, then consumes leading white space to check whether the stream
    /// is wrapped in a JSON array. An empty stream is not an error here; the
    /// first [`decode_document`](Self::decode_document) call reports the
    /// clean end of stream.
    pub fn new(reader: R) -> Result<Self> {
        let mut source = PeekReader::new(reader);
        handle_bom(&mut source)?;
        let mut decoder = Decoder {
            source,
            array_started: false,
            array_finished: false,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            ext_json: false,
            scratch: Some(Vec::new()),
        };
        match decoder.read_after_ws_opt()? {
            Some(b'[') => decoder.array_started = true,
            Some(_) => decoder.source.unread_byte(),
            None => {}
        }
        Ok(decoder)
    }

    /// Toggles extended JSON interpretation. Defaults to off.
    pub fn with_extended_json(mut self, enabled: bool) -> Self {
        self.ext_json = enabled;
        self
    }

    /// Sets the maximum allowed nesting depth of a JSON object. Defaults to
    /// 200.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Converts a single JSON object from the input stream into a BSON
    /// document appended to `out`, and returns `Ok(true)`.
    ///
    /// Returns `Ok(false)` once no objects remain in the stream (and on
    /// every subsequent call).
    pub fn decode_document(&mut self, out: &mut Vec<u8>) -> Result<bool> {
        if self.array_finished {
            return Ok(false);
        }

        let ch = match self.read_after_ws_opt()? {
            Some(ch) => ch,
            // Between documents a clean end of stream is valid, but an open
            // array must be closed first.
            None if self.array_started => return Err(Error::unexpected_eof()),
            None => return Ok(false),
        };
        match ch {
            b'{' => self.source.unread_byte(),
            b']' if self.array_started => {
                self.array_finished = true;
                return Ok(false);
            }
            _ => return Err(self.parse_error_at(ch, "only top-level objects are supported")),
        }

        self.convert_value(out, None)?;

        if self.array_started {
            let ch = self.read_after_ws()?;
            match ch {
                b',' => {}
                b']' => self.array_finished = true,
                _ => {
                    return Err(
                        self.parse_error_at(ch, "expecting value-separator or end of array")
                    )
                }
            }
        }

        Ok(true)
    }

    /// Consumes the decoder, returning an iterator over the remaining
    /// documents. Each document is decoded into a fresh buffer.
    pub fn documents(self) -> Documents<R> {
        Documents { decoder: self }
    }

    // ----- lexical helpers -----

    fn read_after_ws_opt(&mut self) -> Result<Option<u8>> {
        loop {
            match self.source.read_byte()? {
                None => return Ok(None),
                Some(b' ' | b'\t' | b'\n' | b'\r') => continue,
                Some(ch) => return Ok(Some(ch)),
            }
        }
    }

    pub(crate) fn read_after_ws(&mut self) -> Result<u8> {
        self.read_after_ws_opt()?.ok_or_else(Error::unexpected_eof)
    }

    pub(crate) fn read_char_after_ws(&mut self, want: u8) -> Result<()> {
        let ch = self.read_after_ws()?;
        if ch != want {
            return Err(self.parse_error_at(ch, &format!("expecting '{}'", want as char)));
        }
        Ok(())
    }

    // Like `read_char_after_ws` but the very next byte must match.
    pub(crate) fn read_next_char(&mut self, want: u8) -> Result<()> {
        let ch = self.source.read_byte()?.ok_or_else(Error::unexpected_eof)?;
        if ch != want {
            return Err(self.parse_error_at(ch, &format!("expecting '{}'", want as char)));
        }
        Ok(())
    }

    pub(crate) fn read_name_separator(&mut self) -> Result<()> {
        self.read_char_after_ws(b':')
    }

    pub(crate) fn read_object_terminator(&mut self) -> Result<()> {
        self.read_char_after_ws(b'}')
    }

    pub(crate) fn read_quote_start(&mut self) -> Result<()> {
        self.read_char_after_ws(b'"')
    }

    pub(crate) fn skip_ws(&mut self) -> Result<()> {
        loop {
            match self.source.read_byte()? {
                Some(b' ' | b'\t' | b'\n' | b'\r') => continue,
                Some(_) => {
                    self.source.unread_byte();
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    /// Peeks ahead for a closing quote, looking at most `max` bytes. The
    /// quote must appear at index `min - 1` or later; the returned value is
    /// the length of the quoted text.
    pub(crate) fn peek_bounded_quote(&mut self, min: usize, max: usize, what: &str) -> Result<usize> {
        let (peeked, quote_pos) = {
            let buf = self.source.peek(max)?;
            (buf.len(), buf.iter().position(|&b| b == b'"'))
        };
        match quote_pos {
            Some(pos) if pos + 1 < min => Err(self.parse_error(format!(
                "{what}: string falls short of expected length {min}"
            ))),
            Some(pos) => Ok(pos),
            None if peeked < max => Err(Error::unexpected_eof()),
            None => Err(self.parse_error(format!(
                "{what}: string exceeds expected length {max}"
            ))),
        }
    }

    // Consumes an exact key plus its closing quote; the opening quote must
    // already be consumed.
    pub(crate) fn read_specific_key(&mut self, expected: &[u8]) -> Result<()> {
        let len = self.peek_bounded_quote(1, expected.len() + 1, "key")?;
        let matches = {
            let buf = self.source.peek(len)?;
            &buf[..len] == expected
        };
        if !matches {
            return Err(self.parse_error(format!(
                "expected {:?}",
                String::from_utf8_lossy(expected)
            )));
        }
        self.source.discard(len + 1);
        Ok(())
    }

    // Copies `len` peeked bytes out of the buffer, releasing the borrow.
    pub(crate) fn peek_copy(&mut self, len: usize) -> Result<Vec<u8>> {
        let buf = self.source.peek(len)?;
        Ok(buf[..len.min(buf.len())].to_vec())
    }

    /// Reads a JSON integer literal as an i64, consuming it.
    pub(crate) fn read_int64(&mut self) -> Result<i64> {
        let (len, is_float) = self.peek_number()?;
        if is_float {
            return Err(self.parse_error("expecting integer"));
        }
        let parsed: Option<i64> = {
            let buf = self.source.peek(len)?;
            json::parse_str_bytes(&buf[..len])
        };
        match parsed {
            Some(n) => {
                self.source.discard(len);
                Ok(n)
            }
            None => Err(self.parse_error("int conversion: out of range for int64")),
        }
    }

    /// Reads a JSON integer literal as a u32, consuming it.
    pub(crate) fn read_uint32(&mut self) -> Result<u32> {
        let (len, is_float) = self.peek_number()?;
        if is_float {
            return Err(self.parse_error("expecting unsigned integer"));
        }
        let parsed: Option<u32> = {
            let buf = self.source.peek(len)?;
            json::parse_str_bytes(&buf[..len])
        };
        match parsed {
            Some(n) => {
                self.source.discard(len);
                Ok(n)
            }
            None => Err(self.parse_error("int conversion: out of range for uint32")),
        }
    }

    // ----- error construction -----

    pub(crate) fn parse_error(&mut self, message: impl Into<String>) -> Error {
        let context = self
            .source
            .peek(PARSE_ERROR_CONTEXT_LEN)
            .ok()
            .filter(|buf| !buf.is_empty())
            .map(<[u8]>::to_vec);
        let error = Error::parse(message);
        match context {
            Some(context) => error.with_context(&context),
            None => error,
        }
    }

    pub(crate) fn parse_error_at(&mut self, ch: u8, message: &str) -> Error {
        self.parse_error(format!("{message} on char {:?}", ch as char))
    }

    // ----- scratch pool -----

    // Runs `f` with the pooled scratch buffer checked out, returning it on
    // every exit path.
    pub(crate) fn with_scratch<T>(
        &mut self,
        f: impl FnOnce(&mut Self, &mut Vec<u8>) -> Result<T>,
    ) -> Result<T> {
        let mut scratch = self.scratch.take().unwrap_or_default();
        scratch.clear();
        let result = f(self, &mut scratch);
        self.scratch = Some(scratch);
        result
    }

    #[cfg(test)]
    fn scratch_pool_size(&self) -> usize {
        usize::from(self.scratch.is_some())
    }
}

/// Iterator over the documents of a stream; see [`Decoder::documents`].
pub struct Documents<R> {
    decoder: Decoder<R>,
}

impl<R: Read> Iterator for Documents<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut out = Vec::new();
        match self.decoder.decode_document(&mut out) {
            Ok(true) => Some(Ok(out)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Converts a single JSON object to a BSON document appended to `out`.
///
/// Empty input is an [unexpected end of input](crate::ErrorKind::UnexpectedEof)
/// error here, since exactly one document is required.
pub fn decode_one(json: impl AsRef<[u8]>, out: &mut Vec<u8>) -> Result<()> {
    let mut decoder = Decoder::new(json.as_ref())?;
    if decoder.decode_document(out)? {
        Ok(())
    } else {
        Err(Error::unexpected_eof())
    }
}

/// Converts a single Extended JSON object to a BSON document appended to
/// `out`. Otherwise works like [`decode_one`].
pub fn decode_one_extended(json: impl AsRef<[u8]>, out: &mut Vec<u8>) -> Result<()> {
    let mut decoder = Decoder::new(json.as_ref())?.with_extended_json(true);
    if decoder.decode_document(out)? {
        Ok(())
    } else {
        Err(Error::unexpected_eof())
    }
}

// Detect and discard a UTF-8 BOM; error on UTF-16/32 BOMs. Short peeks mean
// "no BOM" and are handled by the normal parser.
fn handle_bom<R: Read>(source: &mut PeekReader<R>) -> Result<()> {
    let two = {
        let buf = source.peek(2)?;
        <[u8; 2]>::try_from(buf).ok()
    };
    if let Some(preamble) = two {
        if preamble == UTF16_BE_BOM || preamble == UTF16_LE_BOM {
            return Err(Error::unsupported_bom("UTF-16"));
        }
    }

    let three = {
        let buf = source.peek(3)?;
        <[u8; 3]>::try_from(buf).ok()
    };
    if three == Some(UTF8_BOM) {
        source.discard(3);
    }

    let four = {
        let buf = source.peek(4)?;
        <[u8; 4]>::try_from(buf).ok()
    };
    if let Some(preamble) = four {
        if preamble == UTF32_BE_BOM || preamble == UTF32_LE_BOM {
            return Err(Error::unsupported_bom("UTF-32"));
        }
    }

    Ok(())
}

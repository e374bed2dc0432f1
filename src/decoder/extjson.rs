//! Extended JSON recognition and conversion.
//!
//! Efficient detection: the longest extended JSON key is
//! `$regularExpression` at 18 letters and the shortest is `$oid` at 4. Any
//! `$`-prefixed key outside those lengths isn't extended JSON, so dispatch
//! switches on key length instead of scanning every candidate.
//!
//! Three keys are ambiguous. `{"$type": ...}` may be a legacy binary
//! envelope or a query operator; `$regex`/`$options` may be a legacy regular
//! expression or a query operator. Those paths materialize the object into a
//! scratch buffer as a plain document, inspect its shape, and either rewrite
//! it into the specialized form or hand the scratch bytes back under the
//! document tag.

use std::io::Read;

use super::{
    json::{append_f64, overwrite_length, parse_str_bytes, set_type_byte},
    Decoder, DECIMAL_PEEK_WIDTH, DOUBLE_PEEK_WIDTH, EMPTY_LENGTH, EMPTY_TYPE,
};
use crate::{
    datetime,
    error::{Error, Result},
    oid::ObjectId,
    raw,
    spec,
    Decimal128,
};

const KEY_OID: &[u8] = b"$oid";
const KEY_CODE: &[u8] = b"$code";
const KEY_DATE: &[u8] = b"$date";
const KEY_TYPE: &[u8] = b"$type";
const KEY_SCOPE: &[u8] = b"$scope";
const KEY_REGEX: &[u8] = b"$regex";
const KEY_BINARY: &[u8] = b"$binary";
const KEY_MAX_KEY: &[u8] = b"$maxKey";
const KEY_MIN_KEY: &[u8] = b"$minKey";
const KEY_SYMBOL: &[u8] = b"$symbol";
const KEY_OPTIONS: &[u8] = b"$options";
const KEY_DB_POINTER: &[u8] = b"$dbPointer";
const KEY_NUMBER_INT: &[u8] = b"$numberInt";
const KEY_TIMESTAMP: &[u8] = b"$timestamp";
const KEY_UNDEFINED: &[u8] = b"$undefined";
const KEY_NUMBER_LONG: &[u8] = b"$numberLong";
const KEY_NUMBER_DOUBLE: &[u8] = b"$numberDouble";
const KEY_NUMBER_DECIMAL: &[u8] = b"$numberDecimal";
const KEY_REGULAR_EXPRESSION: &[u8] = b"$regularExpression";

const KEY_BASE64: &[u8] = b"base64";
const KEY_SUB_TYPE: &[u8] = b"subType";
const KEY_REF: &[u8] = b"$ref";
const KEY_ID: &[u8] = b"$id";
const KEY_PATTERN: &[u8] = b"pattern";
const KEY_RE_OPTIONS: &[u8] = b"options";

// `"$regularExpression` plus the closing quote.
const KEY_PEEK_WIDTH: usize = 20;

enum ExtKey {
    Oid,
    Code,
    Date,
    Type,
    Scope,
    Regex,
    Binary,
    MaxKey,
    MinKey,
    Symbol,
    Options,
    DbPointer,
    NumberInt,
    Timestamp,
    Undefined,
    NumberLong,
    NumberDouble,
    NumberDecimal,
    RegularExpression,
}

impl<R: Read> Decoder<R> {
    /// Called from the object builder with the stream at the opening quote
    /// of the first key of a nested object. When the object is an extended
    /// JSON value, consumes it entirely, writes its binary form (patching
    /// the parent's type slot), and returns `true`. Otherwise returns
    /// `false` with the input untouched.
    pub(crate) fn handle_ext_json(&mut self, out: &mut Vec<u8>, type_pos: Option<usize>) -> Result<bool> {
        let (key, key_len) = {
            let buf = self.source.peek(KEY_PEEK_WIDTH)?;
            // Skip the opening quote (it brought us here).
            let rest = &buf[1..];
            // Common case: no `$` after the quote means not extended JSON.
            if rest.first() != Some(&b'$') {
                return Ok(false);
            }
            let quote_pos = match rest.iter().position(|&b| b == b'"') {
                Some(pos) => pos,
                // Longer than `$regularExpression"`: not extended JSON.
                None => return Ok(false),
            };
            let key = &rest[..quote_pos];
            let matched = match key.len() {
                4 if key == KEY_OID => ExtKey::Oid,
                5 if key == KEY_CODE => ExtKey::Code,
                5 if key == KEY_DATE => ExtKey::Date,
                5 if key == KEY_TYPE => ExtKey::Type,
                6 if key == KEY_SCOPE => ExtKey::Scope,
                6 if key == KEY_REGEX => ExtKey::Regex,
                7 if key == KEY_BINARY => ExtKey::Binary,
                7 if key == KEY_MAX_KEY => ExtKey::MaxKey,
                7 if key == KEY_MIN_KEY => ExtKey::MinKey,
                7 if key == KEY_SYMBOL => ExtKey::Symbol,
                8 if key == KEY_OPTIONS => ExtKey::Options,
                10 if key == KEY_DB_POINTER => ExtKey::DbPointer,
                10 if key == KEY_NUMBER_INT => ExtKey::NumberInt,
                10 if key == KEY_TIMESTAMP => ExtKey::Timestamp,
                10 if key == KEY_UNDEFINED => ExtKey::Undefined,
                11 if key == KEY_NUMBER_LONG => ExtKey::NumberLong,
                13 if key == KEY_NUMBER_DOUBLE => ExtKey::NumberDouble,
                14 if key == KEY_NUMBER_DECIMAL => ExtKey::NumberDecimal,
                18 if key == KEY_REGULAR_EXPRESSION => ExtKey::RegularExpression,
                _ => return Ok(false),
            };
            (matched, key.len())
        };

        // Once the key is recognized, most types can write their tag and
        // consume the key (with both quotes) immediately. The ambiguous
        // types consume nothing until their sub-parser decides.
        let discard = key_len + 2;
        match key {
            ExtKey::Oid => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_OBJECT_ID);
                self.source.discard(discard);
                self.convert_oid(out)?;
            }
            ExtKey::Code => {
                // Could still be code or code-with-scope; the tag is decided
                // by what follows the code string.
                self.source.discard(discard);
                self.convert_code(out, type_pos)?;
            }
            ExtKey::Date => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_UTC_DATETIME);
                self.source.discard(discard);
                self.convert_date(out)?;
            }
            ExtKey::Type => self.convert_type(out, type_pos)?,
            ExtKey::Scope => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_JAVASCRIPT_CODE_WITH_SCOPE);
                self.source.discard(discard);
                self.convert_scope(out)?;
            }
            ExtKey::Regex => return self.convert_regex(out, type_pos),
            ExtKey::Binary => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_BINARY);
                self.source.discard(discard);
                self.convert_binary(out)?;
            }
            ExtKey::MaxKey => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_MAXKEY);
                self.source.discard(discard);
                self.convert_min_max_key()?;
            }
            ExtKey::MinKey => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_MINKEY);
                self.source.discard(discard);
                self.convert_min_max_key()?;
            }
            ExtKey::Symbol => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_SYMBOL);
                self.source.discard(discard);
                self.convert_symbol(out)?;
            }
            ExtKey::Options => return self.convert_options(out, type_pos),
            ExtKey::DbPointer => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_DBPOINTER);
                self.source.discard(discard);
                self.convert_db_pointer(out)?;
            }
            ExtKey::NumberInt => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_32BIT_INTEGER);
                self.source.discard(discard);
                self.convert_number_int(out)?;
            }
            ExtKey::Timestamp => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_TIMESTAMP);
                self.source.discard(discard);
                self.convert_timestamp(out)?;
            }
            ExtKey::Undefined => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_UNDEFINED);
                self.source.discard(discard);
                self.convert_undefined()?;
            }
            ExtKey::NumberLong => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_64BIT_INTEGER);
                self.source.discard(discard);
                self.convert_number_long(out)?;
            }
            ExtKey::NumberDouble => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_DOUBLE);
                self.source.discard(discard);
                self.convert_number_double(out)?;
            }
            ExtKey::NumberDecimal => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_DECIMAL128);
                self.source.discard(discard);
                self.convert_number_decimal(out)?;
            }
            ExtKey::RegularExpression => {
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_REGULAR_EXPRESSION);
                self.source.discard(discard);
                self.convert_regular_expression(out)?;
            }
        }
        Ok(true)
    }

    // Starts after the `"$oid"` key.
    fn convert_oid(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;
        self.read_quote_start()?;

        // Exactly 24 hex characters before the closing quote.
        let len = self.peek_bounded_quote(25, 25, "$oid")?;
        let parsed = {
            let buf = self.source.peek(len)?;
            std::str::from_utf8(&buf[..len])
                .ok()
                .and_then(|s| ObjectId::parse_str(s).ok())
        };
        match parsed {
            Some(oid) => out.extend_from_slice(&oid.bytes()),
            None => return Err(self.parse_error("ill-formed $oid")),
        }
        self.source.discard(len + 1);

        self.read_object_terminator()?;
        Ok(())
    }

    // Starts after the `"$code"` key. BSON code is just a string while code
    // with scope is a length, then the string, then the scope document, so
    // the code text is staged until the byte after it reveals whether a
    // `$scope` follows.
    fn convert_code(&mut self, out: &mut Vec<u8>, type_pos: Option<usize>) -> Result<()> {
        // Either form starts with a 4-byte length.
        let length_pos = out.len();
        out.extend_from_slice(&EMPTY_LENGTH);

        self.read_name_separator()?;
        self.read_quote_start()?;

        let mut code = Vec::with_capacity(256);
        self.convert_cstring(&mut code, true)?;

        let ch = self.read_after_ws()?;
        match ch {
            b'}' => {
                // Just $code.
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_JAVASCRIPT_CODE);
                out.extend_from_slice(&code);
                // BSON code length is the cstring length, not including the
                // length bytes themselves.
                let out_len = out.len();
                overwrite_length(out, length_pos, out_len - length_pos - 4);
            }
            b',' => {
                self.read_quote_start()?;
                self.read_specific_key(KEY_SCOPE)?;
                self.read_name_separator()?;

                // Code with scope: the staged cstring gains its own length
                // prefix, then the scope document follows.
                set_type_byte(out, type_pos, spec::ELEMENT_TYPE_JAVASCRIPT_CODE_WITH_SCOPE);
                let str_length_pos = out.len();
                out.extend_from_slice(&EMPTY_LENGTH);
                out.extend_from_slice(&code);
                let out_len = out.len();
                overwrite_length(out, str_length_pos, out_len - str_length_pos - 4);

                self.read_char_after_ws(b'{')?;
                self.convert_object(out, None)?;

                // Code-with-scope length includes the length bytes.
                let out_len = out.len();
                overwrite_length(out, length_pos, out_len - length_pos);

                self.read_object_terminator()?;
            }
            _ => return Err(self.parse_error_at(ch, "expected value separator or end of object")),
        }
        Ok(())
    }

    // Starts after the `"$date"` key. The value may be an ISO-8601 string, a
    // `$numberLong` object, or a bare integer literal in milliseconds.
    fn convert_date(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;

        let ch = self.read_after_ws()?;
        match ch {
            b'"' => {
                // Shortest ISO-8601 is `YYYY-MM-DDTHH:MM:SSZ` (20 chars);
                // the longest spec form is 29, peeked a little further in
                // case extra precision is given.
                let len = self.peek_bounded_quote(21, 48, "ISO 8601 datetime")?;
                let millis = {
                    let buf = self.source.peek(len)?;
                    datetime::parse_iso8601_epoch_millis(&buf[..len])
                };
                match millis {
                    Ok(millis) => out.extend_from_slice(&millis.to_le_bytes()),
                    Err(_) => return Err(self.parse_error("invalid $date value string")),
                }
                self.source.discard(len + 1);
            }
            b'{' => {
                self.read_quote_start()?;
                self.read_specific_key(KEY_NUMBER_LONG)?;
                self.convert_number_long(out)?;
            }
            b'-' | b'0'..=b'9' => {
                self.source.unread_byte();
                let millis = self.read_int64()?;
                out.extend_from_slice(&millis.to_le_bytes());
            }
            _ => return Err(self.parse_error_at(ch, "invalid value for $date")),
        }

        self.read_object_terminator()?;
        Ok(())
    }

    // Starts at the opening quote of the `"$type"` key, nothing consumed.
    // The object is either a legacy binary envelope (exactly `$binary` and
    // `$type`, both strings) or an ordinary document holding a query
    // operator; only its complete shape can tell.
    fn convert_type(&mut self, out: &mut Vec<u8>, type_pos: Option<usize>) -> Result<()> {
        self.with_scratch(|this, scratch| {
            this.convert_object(scratch, None)?;

            let mut saw_binary = 0u32;
            let mut saw_type = 0u32;
            let mut saw_other = 0u32;
            let mut payload_text: Option<Vec<u8>> = None;
            let mut subtype_text: Option<Vec<u8>> = None;
            for element in raw::elements(scratch) {
                let element = element?;
                if element.key == KEY_BINARY {
                    saw_binary += 1;
                    payload_text = element.str_bytes().map(<[u8]>::to_vec);
                } else if element.key == KEY_TYPE {
                    saw_type += 1;
                    subtype_text = element.str_bytes().map(<[u8]>::to_vec);
                } else {
                    saw_other += 1;
                }
            }

            // A lone string-valued $type must still name a plausible binary
            // subtype, even though the object passes through as a document.
            if saw_type == 1 && saw_binary == 0 && saw_other == 0 {
                if let Some(text) = subtype_text.as_deref() {
                    if let Err(message) = decode_binary_subtype(text) {
                        return Err(this.parse_error(format!("error decoding binary $type: {message}")));
                    }
                }
            }

            let (payload_text, subtype_text) = match (saw_binary, saw_type, saw_other, payload_text, subtype_text) {
                (1, 1, 0, Some(payload), Some(subtype)) => (payload, subtype),
                _ => {
                    // Not the envelope: the scratch bytes are already a
                    // well-formed document.
                    set_type_byte(out, type_pos, spec::ELEMENT_TYPE_EMBEDDED_DOCUMENT);
                    out.extend_from_slice(scratch);
                    return Ok(());
                }
            };

            set_type_byte(out, type_pos, spec::ELEMENT_TYPE_BINARY);
            let length_pos = out.len();
            out.extend_from_slice(&EMPTY_LENGTH);

            let sub_type = match decode_binary_subtype(&subtype_text) {
                Ok(sub_type) => sub_type,
                Err(message) => {
                    return Err(this.parse_error(format!("error decoding binary $type: {message}")))
                }
            };
            out.push(sub_type);

            let payload = match crate::base64::decode(&payload_text) {
                Ok(payload) => payload,
                Err(e) => return Err(this.parse_error(format!("error parsing base64 data: {e}"))),
            };
            let mut bin_length = payload.len();
            if sub_type == spec::BINARY_SUBTYPE_BINARY_OLD {
                out.extend_from_slice(&(bin_length as u32).to_le_bytes());
                bin_length += 4;
            }
            out.extend_from_slice(&payload);
            overwrite_length(out, length_pos, bin_length);

            // The object terminator was consumed while reading into scratch.
            Ok(())
        })
    }

    // Starts after the `"$scope"` key. A leading $scope means code with
    // scope, but the scope document must be buffered and written after the
    // $code string that follows it.
    fn convert_scope(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;

        let cws_length_pos = out.len();
        out.extend_from_slice(&EMPTY_LENGTH);

        let mut scope_doc = Vec::with_capacity(256);
        self.read_char_after_ws(b'{')?;
        self.convert_object(&mut scope_doc, None)?;

        self.read_char_after_ws(b',')?;
        self.read_quote_start()?;
        self.read_specific_key(KEY_CODE)?;
        self.read_name_separator()?;
        self.read_quote_start()?;
        self.convert_string(out)?;

        out.extend_from_slice(&scope_doc);
        let out_len = out.len();
        overwrite_length(out, cws_length_pos, out_len - cws_length_pos);

        self.read_object_terminator()?;
        Ok(())
    }

    // Starts at the opening quote of the `"$regex"` key, nothing consumed.
    //
    // Both the query operator and legacy extended JSON allow
    // `{"$regex": "...", "$options": "..."}`; that form converts as extended
    // JSON, which a server accepts either way. A `$regex` whose value is an
    // object (a translated `{"$regex": /abc/}` query) must stay a query.
    fn convert_regex(&mut self, out: &mut Vec<u8>, type_pos: Option<usize>) -> Result<bool> {
        // Fast path: 16 bytes is enough to see `"$regex" : {` even with a
        // little white space.
        let is_query = {
            let buf = self.source.peek(16)?;
            regex_query_fast_path(buf)
        };
        if is_query {
            return Ok(false);
        }
        self.convert_regex_options_slow_path(out, type_pos)?;
        Ok(true)
    }

    // Starts at the opening quote of the `"$options"` key, nothing consumed.
    // Like `convert_regex`, but the fast path must look past the $options
    // string to find the $regex that makes it a query.
    fn convert_options(&mut self, out: &mut Vec<u8>, type_pos: Option<usize>) -> Result<bool> {
        // 48 bytes is enough for `"$options" : "islmux", "$regex" : {` with
        // a little white space; anything longer falls through to the slow
        // path, which classifies the same way.
        let is_query = {
            let buf = self.source.peek(48)?;
            options_query_fast_path(buf)
        };
        if is_query {
            return Ok(false);
        }
        self.convert_regex_options_slow_path(out, type_pos)?;
        Ok(true)
    }

    // Materializes the object into scratch as a plain document. Exactly two
    // string-valued keys `$regex` and `$options` make it a BSON regular
    // expression; anything else passes through as the document itself.
    fn convert_regex_options_slow_path(&mut self, out: &mut Vec<u8>, type_pos: Option<usize>) -> Result<()> {
        self.with_scratch(|this, scratch| {
            this.convert_object(scratch, None)?;

            let mut saw_regex = 0u32;
            let mut saw_options = 0u32;
            let mut saw_other = 0u32;
            let mut pattern: Option<Vec<u8>> = None;
            let mut options: Option<Vec<u8>> = None;
            for element in raw::elements(scratch) {
                let element = element?;
                if element.key == KEY_REGEX {
                    saw_regex += 1;
                    pattern = element.str_bytes().map(<[u8]>::to_vec);
                } else if element.key == KEY_OPTIONS {
                    saw_options += 1;
                    options = element.str_bytes().map(<[u8]>::to_vec);
                } else {
                    saw_other += 1;
                }
            }

            let (pattern, mut options) = match (saw_regex, saw_options, saw_other, pattern, options) {
                (1, 1, 0, Some(pattern), Some(options)) => (pattern, options),
                _ => {
                    set_type_byte(out, type_pos, spec::ELEMENT_TYPE_EMBEDDED_DOCUMENT);
                    out.extend_from_slice(scratch);
                    return Ok(());
                }
            };

            // The regex form is two cstrings, which cannot carry NUL.
            if pattern.contains(&0) || options.contains(&0) {
                return Err(this.parse_error("null bytes not allowed in regular expression"));
            }
            if let Err(message) = sort_options(&mut options) {
                return Err(this.parse_error(message));
            }

            set_type_byte(out, type_pos, spec::ELEMENT_TYPE_REGULAR_EXPRESSION);
            out.extend_from_slice(&pattern);
            out.push(0);
            out.extend_from_slice(&options);
            out.push(0);

            // The object terminator was consumed while reading into scratch.
            Ok(())
        })
    }

    // Starts after the `"$binary"` key: either the v2 form (an object with
    // base64/subType) or the legacy v1 form (a string followed by $type).
    fn convert_binary(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;

        let ch = self.read_after_ws()?;
        match ch {
            b'{' => self.convert_v2_binary(out)?,
            b'"' => self.convert_v1_binary(out)?,
            _ => return Err(self.parse_error_at(ch, "expected object or string")),
        }

        self.read_object_terminator()?;
        Ok(())
    }

    // After the opening brace: exactly the keys `base64` and `subType`, in
    // either order.
    fn convert_v2_binary(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let length_pos = out.len();
        out.extend_from_slice(&EMPTY_LENGTH);
        let sub_type_pos = out.len();
        out.push(EMPTY_TYPE);

        let mut saw_base64 = false;
        let mut saw_sub_type = false;
        let mut sub_type = 0u8;
        loop {
            self.read_quote_start()?;
            let key_len = self.peek_bounded_quote(7, 8, "valid $binary document keys")?;
            let key = self.peek_copy(key_len)?;

            if key == KEY_SUB_TYPE {
                if saw_sub_type {
                    return Err(self.parse_error("subType repeated"));
                }
                saw_sub_type = true;
                self.source.discard(key_len + 1);
                self.read_name_separator()?;
                self.read_quote_start()?;
                sub_type = self.convert_binary_subtype(out, sub_type_pos)?;
                if !saw_base64 {
                    self.read_char_after_ws(b',')?;
                }
            } else if key == KEY_BASE64 {
                if saw_base64 {
                    return Err(self.parse_error("base64 repeated"));
                }
                saw_base64 = true;
                self.source.discard(key_len + 1);
                self.read_name_separator()?;
                self.read_quote_start()?;
                self.convert_base64(out)?;
                if !saw_sub_type {
                    self.read_char_after_ws(b',')?;
                }
            } else {
                return Err(self.parse_error("invalid key for $binary document"));
            }
            if saw_base64 && saw_sub_type {
                break;
            }
        }

        let mut bin_length = out.len() - length_pos - 5;
        if sub_type == spec::BINARY_SUBTYPE_BINARY_OLD {
            insert_legacy_length(out, length_pos, bin_length);
            bin_length += 4;
        }
        overwrite_length(out, length_pos, bin_length);

        self.read_object_terminator()?;
        Ok(())
    }

    // After the opening quote of the base64 payload: the payload string,
    // then `$type` and nothing else.
    fn convert_v1_binary(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let length_pos = out.len();
        out.extend_from_slice(&EMPTY_LENGTH);
        let sub_type_pos = out.len();
        out.push(EMPTY_TYPE);

        self.convert_base64(out)?;

        self.read_char_after_ws(b',')?;
        self.read_quote_start()?;
        self.read_specific_key(KEY_TYPE)?;
        self.read_name_separator()?;
        self.read_quote_start()?;
        let sub_type = self.convert_binary_subtype(out, sub_type_pos)?;

        let mut bin_length = out.len() - length_pos - 5;
        if sub_type == spec::BINARY_SUBTYPE_BINARY_OLD {
            insert_legacy_length(out, length_pos, bin_length);
            bin_length += 4;
        }
        overwrite_length(out, length_pos, bin_length);
        Ok(())
    }

    // After the opening quote of the 1-2 hex characters naming the subtype.
    fn convert_binary_subtype(&mut self, out: &mut [u8], sub_type_pos: usize) -> Result<u8> {
        let len = self.peek_bounded_quote(2, 3, "binary subtype")?;
        let decoded = {
            let buf = self.source.peek(len)?;
            decode_binary_subtype(&buf[..len])
        };
        match decoded {
            Ok(sub_type) => {
                out[sub_type_pos] = sub_type;
                self.source.discard(len + 1);
                Ok(sub_type)
            }
            Err(message) => Err(self.parse_error(message)),
        }
    }

    // After the opening quote of the payload; consumes the string and its
    // closing quote, decoding in windows. Windows are a multiple of four
    // bytes so no base64 quad straddles a boundary.
    fn convert_base64(&mut self, out: &mut Vec<u8>) -> Result<()> {
        const WINDOW: usize = 64;
        loop {
            let (decoded, consumed, terminated) = {
                let buf = self.source.peek(WINDOW)?;
                if buf.is_empty() {
                    return Err(Error::unexpected_eof());
                }
                let chunk = match buf.iter().position(|&b| b == b'"') {
                    Some(quote_pos) => &buf[..quote_pos],
                    None => buf,
                };
                let decoded = if chunk.is_empty() {
                    Ok(Vec::new())
                } else {
                    crate::base64::decode(chunk)
                };
                (decoded, chunk.len(), chunk.len() < buf.len())
            };
            match decoded {
                Ok(bytes) => out.extend_from_slice(&bytes),
                Err(e) => return Err(self.parse_error(format!("error parsing base64 data: {e}"))),
            }
            self.source.discard(consumed + usize::from(terminated));
            if terminated {
                return Ok(());
            }
        }
    }

    // Starts after the `"$minKey"` or `"$maxKey"` key. The tag is already
    // set and no value bytes are written; the only valid value is `1`.
    fn convert_min_max_key(&mut self) -> Result<()> {
        self.read_name_separator()?;
        self.read_char_after_ws(b'1')?;
        self.read_object_terminator()?;
        Ok(())
    }

    // Starts after the `"$symbol"` key.
    fn convert_symbol(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;
        self.read_quote_start()?;
        self.convert_string(out)?;
        self.read_object_terminator()?;
        Ok(())
    }

    // Starts after the `"$undefined"` key; the only valid value is `true`.
    fn convert_undefined(&mut self) -> Result<()> {
        self.read_name_separator()?;
        self.read_char_after_ws(b't')?;
        self.convert_literal(b"rue", "expected 'true'")?;
        self.read_object_terminator()?;
        Ok(())
    }

    // Starts after the `"$dbPointer"` key. The value must be an object with
    // the keys `$ref` (a string) and `$id` (an extended JSON object id), in
    // either order.
    fn convert_db_pointer(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;
        self.read_char_after_ws(b'{')?;

        let mut namespace = Vec::new();
        let mut id = Vec::new();
        let mut saw_ref = false;
        let mut saw_id = false;
        loop {
            self.read_quote_start()?;
            let key_len = self.peek_bounded_quote(4, 5, "valid $dbPointer document keys")?;
            let key = self.peek_copy(key_len)?;

            if key == KEY_REF {
                if saw_ref {
                    return Err(self.parse_error("key '$ref' repeated"));
                }
                saw_ref = true;
                self.source.discard(key_len + 1);
                self.read_name_separator()?;
                self.read_quote_start()?;
                namespace.reserve(256);
                self.convert_string(&mut namespace)?;
                if !saw_id {
                    self.read_char_after_ws(b',')?;
                }
            } else if key == KEY_ID {
                if saw_id {
                    return Err(self.parse_error("key '$id' repeated"));
                }
                saw_id = true;
                self.source.discard(key_len + 1);
                self.read_name_separator()?;
                // The value must be of object id type; stage it with a type
                // slot in front to find out what it converted to.
                id.push(EMPTY_TYPE);
                self.convert_value(&mut id, Some(0))?;
                if id[0] != spec::ELEMENT_TYPE_OBJECT_ID {
                    return Err(self.parse_error(format!(
                        "$dbPointer.$id must be BSON type {:#04x}, not type {:#04x}",
                        spec::ELEMENT_TYPE_OBJECT_ID,
                        id[0]
                    )));
                }
                if !saw_ref {
                    self.read_char_after_ws(b',')?;
                }
            } else {
                return Err(self.parse_error("invalid key for $dbPointer document"));
            }
            if saw_ref && saw_id {
                break;
            }
        }

        // Namespace then id, skipping the staged type byte.
        out.extend_from_slice(&namespace);
        out.extend_from_slice(&id[1..]);

        self.read_object_terminator()?;
        self.read_object_terminator()?;
        Ok(())
    }

    // Starts after the `"$numberInt"` key.
    fn convert_number_int(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;
        self.read_quote_start()?;

        // Up to 11 chars for `-2147483648` plus the closing quote.
        let len = self.peek_bounded_quote(2, 12, "int32")?;
        let parsed: Option<i32> = {
            let buf = self.source.peek(len)?;
            parse_str_bytes(&buf[..len])
        };
        match parsed {
            Some(n) => out.extend_from_slice(&n.to_le_bytes()),
            None => return Err(self.parse_error("int conversion: invalid int32 literal")),
        }
        self.source.discard(len + 1);

        self.read_object_terminator()?;
        Ok(())
    }

    // Starts after the `"$numberLong"` key.
    fn convert_number_long(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;
        self.read_quote_start()?;

        // Up to 20 chars for `-9223372036854775808` plus the closing quote.
        let len = self.peek_bounded_quote(2, 21, "int64")?;
        let parsed: Option<i64> = {
            let buf = self.source.peek(len)?;
            parse_str_bytes(&buf[..len])
        };
        match parsed {
            Some(n) => out.extend_from_slice(&n.to_le_bytes()),
            None => return Err(self.parse_error("int conversion: invalid int64 literal")),
        }
        self.source.discard(len + 1);

        self.read_object_terminator()?;
        Ok(())
    }

    // Starts after the `"$numberDouble"` key.
    fn convert_number_double(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;
        self.read_quote_start()?;

        let len = self.peek_bounded_quote(2, DOUBLE_PEEK_WIDTH, "float64")?;
        let parsed: Option<f64> = {
            let buf = self.source.peek(len)?;
            parse_str_bytes(&buf[..len])
        };
        match parsed {
            Some(n) => append_f64(out, n),
            None => return Err(self.parse_error("float conversion: invalid float64 literal")),
        }
        self.source.discard(len + 1);

        self.read_object_terminator()?;
        Ok(())
    }

    // Starts after the `"$numberDecimal"` key.
    fn convert_number_decimal(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;
        self.read_quote_start()?;

        let len = self.peek_bounded_quote(2, DECIMAL_PEEK_WIDTH, "decimal128")?;
        let parsed: Option<Decimal128> = {
            let buf = self.source.peek(len)?;
            std::str::from_utf8(&buf[..len]).ok().and_then(|s| s.parse().ok())
        };
        match parsed {
            Some(decimal) => out.extend_from_slice(&decimal.bytes()),
            None => return Err(self.parse_error("can't parse Decimal128")),
        }
        self.source.discard(len + 1);

        self.read_object_terminator()?;
        Ok(())
    }

    // Starts after the `"$timestamp"` key. The value must be an object with
    // the keys `t` and `i`, in either order, each a u32.
    fn convert_timestamp(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;
        self.read_char_after_ws(b'{')?;

        let mut timestamp = 0u32;
        let mut increment = 0u32;
        let mut saw_t = false;
        let mut saw_i = false;
        loop {
            self.read_quote_start()?;
            // Both keys are a single letter, so the key can be read rather
            // than peeked.
            let ch = self.source.read_byte()?.ok_or_else(Error::unexpected_eof)?;
            match ch {
                b't' => {
                    if saw_t {
                        return Err(self.parse_error("key 't' repeated"));
                    }
                    saw_t = true;
                    self.read_next_char(b'"')?;
                    self.read_name_separator()?;
                    self.skip_ws()?;
                    timestamp = self.read_uint32()?;
                    if !saw_i {
                        self.read_char_after_ws(b',')?;
                    }
                }
                b'i' => {
                    if saw_i {
                        return Err(self.parse_error("key 'i' repeated"));
                    }
                    saw_i = true;
                    self.read_next_char(b'"')?;
                    self.read_name_separator()?;
                    self.skip_ws()?;
                    increment = self.read_uint32()?;
                    if !saw_t {
                        self.read_char_after_ws(b',')?;
                    }
                }
                _ => return Err(self.parse_error_at(ch, "invalid key for $timestamp document")),
            }
            if saw_t && saw_i {
                break;
            }
        }

        // Increment first, timestamp second.
        out.extend_from_slice(&increment.to_le_bytes());
        out.extend_from_slice(&timestamp.to_le_bytes());

        self.read_object_terminator()?;
        self.read_object_terminator()?;
        Ok(())
    }

    // Starts after the `"$regularExpression"` key. The value must be an
    // object with the string keys `pattern` and `options`, in either order.
    fn convert_regular_expression(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_name_separator()?;
        self.read_char_after_ws(b'{')?;

        let mut pattern = Vec::new();
        let mut options = Vec::new();
        let mut saw_pattern = false;
        let mut saw_options = false;
        loop {
            self.read_quote_start()?;
            let key_len = self.peek_bounded_quote(8, 8, "valid $regularExpression keys")?;
            let key = self.peek_copy(key_len)?;

            if key == KEY_PATTERN {
                if saw_pattern {
                    return Err(self.parse_error("key 'pattern' repeated"));
                }
                saw_pattern = true;
                self.source.discard(key_len + 1);
                self.read_name_separator()?;
                self.read_quote_start()?;
                pattern.reserve(256);
                self.convert_cstring(&mut pattern, false)?;
                if !saw_options {
                    self.read_char_after_ws(b',')?;
                }
            } else if key == KEY_RE_OPTIONS {
                if saw_options {
                    return Err(self.parse_error("key 'options' repeated"));
                }
                saw_options = true;
                self.source.discard(key_len + 1);
                self.read_name_separator()?;
                self.read_quote_start()?;
                options.reserve(16);
                self.convert_cstring(&mut options, false)?;
                // Validate and sort everything before the NUL terminator.
                let end = options.len() - 1;
                if let Err(message) = sort_options(&mut options[..end]) {
                    return Err(self.parse_error(message));
                }
                if !saw_pattern {
                    self.read_char_after_ws(b',')?;
                }
            } else {
                return Err(self.parse_error("invalid key for $regularExpression document"));
            }
            if saw_pattern && saw_options {
                break;
            }
        }

        // Pattern then options, both already NUL-terminated.
        out.extend_from_slice(&pattern);
        out.extend_from_slice(&options);

        self.read_object_terminator()?;
        self.read_object_terminator()?;
        Ok(())
    }
}

// Sorts regular expression options ascending by byte value and validates
// them against the allowed alphabet.
fn sort_options(options: &mut [u8]) -> std::result::Result<(), String> {
    options.sort_unstable();
    for &b in options.iter() {
        match b {
            b'i' | b'l' | b'm' | b's' | b'u' | b'x' => {}
            _ => {
                return Err(format!(
                    "invalid regular expression option '{}'",
                    b as char
                ))
            }
        }
    }
    Ok(())
}

// Converts 1-2 hex characters into a subtype byte.
fn decode_binary_subtype(input: &[u8]) -> std::result::Result<u8, String> {
    let decoded = match input.len() {
        1 => hex::decode([b'0', input[0]]),
        2 => hex::decode(input),
        _ => return Err("binary subtype must be 1 or 2 hex characters".to_string()),
    };
    match decoded {
        Ok(bytes) => Ok(bytes[0]),
        Err(e) => Err(format!("error parsing subtype: {e}")),
    }
}

// Shifts the payload right by four bytes and writes its own length prefix in
// front, as the legacy 0x02 subtype requires. This is the decoder's only
// in-place move.
fn insert_legacy_length(out: &mut Vec<u8>, length_pos: usize, bin_length: usize) {
    let payload_pos = length_pos + 5;
    let old_len = out.len();
    out.extend_from_slice(&EMPTY_LENGTH);
    out.copy_within(payload_pos..old_len, payload_pos + 4);
    overwrite_length(out, payload_pos, bin_length);
}

// Matches `^"\$regex"\s*:\s*\{`, the shape that marks a query operator.
fn regex_query_fast_path(buf: &[u8]) -> bool {
    let matched = buf
        .strip_prefix(&b"\"$regex\""[..])
        .and_then(|rest| match_after_ws(rest, b':'))
        .and_then(|rest| match_after_ws(rest, b'{'));
    matched.is_some()
}

// Matches `^"\$options"\s*:\s*"[^"]*"\s*,\s*"\$regex"\s*:\s*\{`.
fn options_query_fast_path(buf: &[u8]) -> bool {
    let matched = buf
        .strip_prefix(&b"\"$options\""[..])
        .and_then(|rest| match_after_ws(rest, b':'))
        .and_then(match_quoted)
        .and_then(|rest| match_after_ws(rest, b','))
        .map(skip_ws_prefix)
        .and_then(|rest| rest.strip_prefix(&b"\"$regex\""[..]))
        .and_then(|rest| match_after_ws(rest, b':'))
        .and_then(|rest| match_after_ws(rest, b'{'));
    matched.is_some()
}

fn skip_ws_prefix(buf: &[u8]) -> &[u8] {
    let start = buf
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        .unwrap_or(buf.len());
    &buf[start..]
}

fn match_after_ws(buf: &[u8], want: u8) -> Option<&[u8]> {
    let rest = skip_ws_prefix(buf);
    match rest.first() {
        Some(&b) if b == want => Some(&rest[1..]),
        _ => None,
    }
}

// Skips a leading quoted string (no escape awareness, like the pattern it
// replaces).
fn match_quoted(buf: &[u8]) -> Option<&[u8]> {
    let rest = skip_ws_prefix(buf).strip_prefix(&b"\""[..])?;
    let end = rest.iter().position(|&b| b == b'"')?;
    Some(&rest[end + 1..])
}

#[cfg(test)]
mod tests {
    use super::{
        decode_binary_subtype, options_query_fast_path, regex_query_fast_path, sort_options,
    };

    #[test]
    fn sorts_and_validates_options() {
        let mut options = *b"mi";
        sort_options(&mut options).unwrap();
        assert_eq!(&options, b"im");

        let mut single = *b"s";
        sort_options(&mut single).unwrap();
        assert_eq!(&single, b"s");

        assert!(sort_options(&mut *b"i0".to_vec()).is_err());
        assert!(sort_options(&mut *b"a".to_vec()).is_err());
        assert!(sort_options(&mut []).is_ok());
    }

    #[test]
    fn subtype_decoding() {
        assert_eq!(decode_binary_subtype(b"3").unwrap(), 0x03);
        assert_eq!(decode_binary_subtype(b"03").unwrap(), 0x03);
        assert_eq!(decode_binary_subtype(b"F0").unwrap(), 0xF0);
        assert!(decode_binary_subtype(b"").is_err());
        assert!(decode_binary_subtype(b"123").is_err());
        assert!(decode_binary_subtype(b"zz").is_err());
    }

    #[test]
    fn regex_fast_path_shapes() {
        assert!(regex_query_fast_path(br#""$regex": {"#));
        assert!(regex_query_fast_path(br#""$regex"  :  {"#));
        assert!(!regex_query_fast_path(br#""$regex": "abc""#));
        assert!(!regex_query_fast_path(br#""$regexx": {"#));
    }

    #[test]
    fn options_fast_path_shapes() {
        assert!(options_query_fast_path(br#""$options": "im", "$regex": {"#));
        assert!(options_query_fast_path(br#""$options":"","$regex":{"#));
        assert!(!options_query_fast_path(br#""$options": "im", "$regex": "a""#));
        assert!(!options_query_fast_path(br#""$options": "im", "other": {"#));
    }
}

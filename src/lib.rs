// The MIT License (MIT)

// Copyright (c) 2015 Y. T. Chung <zonyitoo@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! `tobson` is a high-performance, streaming JSON-to-BSON decoder. It converts
//! successive JSON objects from a buffered input byte stream into BSON
//! documents while minimizing memory copies: the output buffer is written as
//! the input is read, with length prefixes and type tags patched in place.
//! Only UTF-8 input is supported (a UTF-8 byte-order mark is stripped; other
//! BOMs are errors).
//!
//! ```text
//! // JSON input
//! {"hello": "world"}
//!
//! // BSON output
//! \x16\x00\x00\x00                   // total document size
//! \x02                               // 0x02 = type String
//! hello\x00                          // field name
//! \x06\x00\x00\x00world\x00          // field value
//! \x00                               // 0x00 = type EOO ('end of object')
//! ```
//!
//! For more information about the output format, see [bsonspec.org](http://bsonspec.org).
//!
//! # Decoding a stream
//!
//! A [`Decoder`] reads from any [`std::io::Read`] source. The stream may hold
//! whitespace-separated JSON objects or one well-formed JSON array of objects;
//! each call to [`Decoder::decode_document`] appends one BSON document to a
//! caller-supplied buffer, so buffers can be reused across documents.
//!
//! ```rust
//! use tobson::Decoder;
//!
//! # fn main() -> tobson::Result<()> {
//! let mut decoder = Decoder::new(&br#"{"a": 1} {"b": 2}"#[..])?;
//! let mut buf = Vec::new();
//! while decoder.decode_document(&mut buf)? {
//!     // `buf` now ends with one more complete BSON document.
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Extended JSON
//!
//! With [`Decoder::with_extended_json`], the decoder recognizes the
//! [MongoDB Extended JSON v2](https://www.mongodb.com/docs/manual/reference/mongodb-extended-json/)
//! key set (`$oid`, `$date`, `$numberLong`, `$binary`, ...) plus limited v1
//! compatibility (`$type`, `$regex`, `$options`), and emits the corresponding
//! specialized BSON types instead of plain documents:
//!
//! ```rust
//! # fn main() -> tobson::Result<()> {
//! let mut out = Vec::new();
//! tobson::decode_one_extended(
//!     r#"{"a": {"$oid": "56e1fc72e0c917e9c4714161"}}"#,
//!     &mut out,
//! )?;
//! assert_eq!(out[4], 0x07); // ObjectId element
//! # Ok(())
//! # }
//! ```
//!
//! Escape sequences are not supported inside extended JSON keys or number
//! strings, only in naturally textual fields like `$symbol` or `$code`. In
//! practice, extended JSON generators never escape those fields anyway.

pub use self::{
    decimal128::Decimal128,
    decoder::{decode_one, decode_one_extended, Decoder, Documents},
    error::{Error, ErrorKind, Result},
    oid::ObjectId,
    spec::ElementType,
};

mod base64;
mod datetime;
pub mod decimal128;
pub mod decoder;
pub mod error;
pub mod oid;
mod raw;
mod reader;
pub mod spec;

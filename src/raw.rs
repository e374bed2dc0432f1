//! Minimal raw BSON reading, used to classify buffered subdocuments whose
//! extended JSON interpretation depends on their overall shape.

use crate::{
    error::{Error, Result},
    spec,
};

/// One element of a raw BSON document.
pub(crate) struct Element<'a> {
    pub(crate) key: &'a [u8],
    pub(crate) tag: u8,
    pub(crate) value: &'a [u8],
}

impl<'a> Element<'a> {
    /// For string elements, the text without its length prefix and trailing
    /// NUL; `None` for any other type.
    pub(crate) fn str_bytes(&self) -> Option<&'a [u8]> {
        if self.tag != spec::ELEMENT_TYPE_UTF8_STRING || self.value.len() < 5 {
            return None;
        }
        Some(&self.value[4..self.value.len() - 1])
    }
}

/// Iterates the elements of a complete document (length prefix through
/// trailing NUL).
pub(crate) fn elements(doc: &[u8]) -> Elements<'_> {
    Elements { doc, offset: 4 }
}

pub(crate) struct Elements<'a> {
    doc: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Elements<'a> {
    type Item = Result<Element<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.doc.get(self.offset).copied() {
            None => return Some(Err(malformed())),
            Some(0) => return None,
            Some(_) => {}
        }
        let result = read_element(self.doc, self.offset);
        match &result {
            Ok(element) => {
                // tag + key + NUL + value
                self.offset += 1 + element.key.len() + 1 + element.value.len();
            }
            Err(_) => self.offset = self.doc.len(),
        }
        Some(result)
    }
}

fn read_element(doc: &[u8], offset: usize) -> Result<Element<'_>> {
    let tag = *doc.get(offset).ok_or_else(malformed)?;
    let rest = doc.get(offset + 1..).ok_or_else(malformed)?;
    let key_len = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(malformed)?;
    let key = &rest[..key_len];
    let data = &rest[key_len + 1..];
    let value_len = value_length(tag, data)?;
    if value_len > data.len() {
        return Err(malformed());
    }
    Ok(Element {
        key,
        tag,
        value: &data[..value_len],
    })
}

// Byte length of a value of the given type, including any internal length
// prefixes and terminators.
fn value_length(tag: u8, data: &[u8]) -> Result<usize> {
    let len = match tag {
        spec::ELEMENT_TYPE_DOUBLE
        | spec::ELEMENT_TYPE_UTC_DATETIME
        | spec::ELEMENT_TYPE_TIMESTAMP
        | spec::ELEMENT_TYPE_64BIT_INTEGER => 8,
        spec::ELEMENT_TYPE_32BIT_INTEGER => 4,
        spec::ELEMENT_TYPE_DECIMAL128 => 16,
        spec::ELEMENT_TYPE_OBJECT_ID => 12,
        spec::ELEMENT_TYPE_BOOLEAN => 1,
        spec::ELEMENT_TYPE_UNDEFINED
        | spec::ELEMENT_TYPE_NULL_VALUE
        | spec::ELEMENT_TYPE_MINKEY
        | spec::ELEMENT_TYPE_MAXKEY => 0,
        spec::ELEMENT_TYPE_UTF8_STRING
        | spec::ELEMENT_TYPE_JAVASCRIPT_CODE
        | spec::ELEMENT_TYPE_SYMBOL => 4 + i32_from_slice(data)? as usize,
        spec::ELEMENT_TYPE_EMBEDDED_DOCUMENT
        | spec::ELEMENT_TYPE_ARRAY
        | spec::ELEMENT_TYPE_JAVASCRIPT_CODE_WITH_SCOPE => i32_from_slice(data)? as usize,
        spec::ELEMENT_TYPE_BINARY => 4 + 1 + i32_from_slice(data)? as usize,
        spec::ELEMENT_TYPE_REGULAR_EXPRESSION => {
            let pattern_end = data.iter().position(|&b| b == 0).ok_or_else(malformed)?;
            let options = &data[pattern_end + 1..];
            let options_end = options.iter().position(|&b| b == 0).ok_or_else(malformed)?;
            pattern_end + 1 + options_end + 1
        }
        spec::ELEMENT_TYPE_DBPOINTER => 4 + i32_from_slice(data)? as usize + 12,
        _ => return Err(malformed()),
    };
    Ok(len)
}

// Little-endian i32 from the first four bytes of the slice.
fn i32_from_slice(data: &[u8]) -> Result<i32> {
    let bytes: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(malformed)?;
    let len = i32::from_le_bytes(bytes);
    if len < 0 {
        return Err(malformed());
    }
    Ok(len)
}

fn malformed() -> Error {
    Error::parse("malformed document in scratch buffer")
}

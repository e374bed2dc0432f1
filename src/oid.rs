//! ObjectId

use std::fmt;

use crate::error::{Error, Result};

/// A wrapper around a raw 12-byte ObjectId value.
///
/// This crate only parses and formats ObjectIds; it never generates them.
/// While BSON itself is little-endian, the fields inside an ObjectId are
/// big-endian, with the most significant bytes appearing first.
#[derive(Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct ObjectId {
    id: [u8; 12],
}

impl ObjectId {
    /// Constructs a new ObjectId wrapper around the raw byte representation.
    pub fn from_bytes(bytes: [u8; 12]) -> ObjectId {
        ObjectId { id: bytes }
    }

    /// Creates an ObjectId from a 24-character hexadecimal string.
    pub fn parse_str(s: &str) -> Result<ObjectId> {
        let bytes = hex::decode(s.as_bytes())
            .map_err(|e| Error::parse(format!("objectID conversion: {e}")))?;
        if bytes.len() != 12 {
            return Err(Error::parse(
                "objectID conversion: expected a 24-character hexadecimal string",
            ));
        }
        let mut id = [0u8; 12];
        id.copy_from_slice(&bytes);
        Ok(ObjectId { id })
    }

    /// Returns the raw byte representation of this ObjectId.
    pub fn bytes(&self) -> [u8; 12] {
        self.id
    }

    /// Converts the ObjectId to its hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

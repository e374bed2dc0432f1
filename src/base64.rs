use base64::{engine::general_purpose::STANDARD, DecodeError, Engine};

pub(crate) fn decode<T: AsRef<[u8]>>(input: T) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(input)
}

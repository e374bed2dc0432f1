use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while converting JSON to BSON.
#[derive(Debug, Error)]
#[non_exhaustive]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,

    /// Input text immediately following the point of failure, if available.
    pub context: Option<String>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(context) = self.context.as_deref() {
            write!(f, ", followed by \"{context}\"")?;
        }
        Ok(())
    }
}

/// The types of errors that can occur while converting JSON to BSON.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A [`std::io::Error`] occurred while reading the input stream.
    #[error("An IO error occurred: {0}")]
    Io(std::io::Error),

    /// The input ended where the grammar required at least one more byte.
    ///
    /// Distinct from a clean end of stream, which
    /// [`decode_document`](crate::Decoder::decode_document) reports by
    /// returning `Ok(false)`.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Malformed JSON or extended JSON was encountered.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The input begins with a byte-order mark for an unsupported encoding.
    #[error("unsupported {encoding} byte order mark")]
    UnsupportedByteOrderMark { encoding: &'static str },

    /// Object/array nesting exceeded the configured maximum depth.
    #[error("maximum depth of {max_depth} exceeded")]
    MaxDepthExceeded { max_depth: usize },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        ErrorKind::Io(value).into()
    }
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        ErrorKind::Parse {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn unexpected_eof() -> Self {
        ErrorKind::UnexpectedEof.into()
    }

    pub(crate) fn unsupported_bom(encoding: &'static str) -> Self {
        ErrorKind::UnsupportedByteOrderMark { encoding }.into()
    }

    pub(crate) fn max_depth_exceeded(max_depth: usize) -> Self {
        ErrorKind::MaxDepthExceeded { max_depth }.into()
    }

    pub(crate) fn with_context(mut self, bytes: &[u8]) -> Self {
        self.context = Some(String::from_utf8_lossy(bytes).into_owned());
        self
    }

    /// Whether this error reports an unsupported (UTF-16 or UTF-32)
    /// byte-order mark.
    pub fn is_unsupported_byte_order_mark(&self) -> bool {
        matches!(self.kind, ErrorKind::UnsupportedByteOrderMark { .. })
    }

    /// Whether this error reports input that ended mid-document.
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self.kind, ErrorKind::UnexpectedEof)
    }

    #[cfg(test)]
    pub(crate) fn is_parse(&self) -> bool {
        matches!(self.kind, ErrorKind::Parse { .. })
    }

    #[cfg(test)]
    pub(crate) fn is_max_depth_exceeded(&self) -> bool {
        matches!(self.kind, ErrorKind::MaxDepthExceeded { .. })
    }
}

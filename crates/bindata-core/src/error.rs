use std::fmt;

pub type IoResult<T> = Result<T, IoError>;
pub type IoError = bindata_error::Error<IoErrorKind>;

/// The two error kinds a byte/bit stream can raise on its own, independent of
/// any schema-level validation (`ValidityError`, `AssertError`, ...), which
/// live one layer up in `bindata-schema`.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum IoErrorKind {
    /// Stream exhausted during a sized read.
    EndOfStream { received: usize, expected: usize },
    /// An unsupported seek was requested: backward on an unseekable stream,
    /// or past the end of a seekable one.
    SeekError { reason: &'static str },
}

impl fmt::Display for IoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfStream { received, expected } => {
                write!(f, "end of stream: received {received} bytes, expected {expected}")
            }
            Self::SeekError { reason } => write!(f, "seek error: {reason}"),
        }
    }
}

impl std::error::Error for IoErrorKind {}

pub(crate) fn end_of_stream(context: &'static str, received: usize, expected: usize) -> IoError {
    IoError::new(context, IoErrorKind::EndOfStream { received, expected })
}

pub(crate) fn seek_error(context: &'static str, reason: &'static str) -> IoError {
    IoError::new(context, IoErrorKind::SeekError { reason })
}

//! Schema-level error kind.

use std::fmt;

use bindata_core::IoErrorKind;
use bindata_error::Error;

#[derive(Debug)]
pub enum SchemaErrorKind {
    /// `Registry::lookup` found no factory for a name/endian combination.
    UnRegisteredType { name: String },
    /// A `ParamSpec` rejected the parameters given to a node (unknown name,
    /// missing mandatory param, mutually-exclusive params both set).
    ArgumentError { reason: String },
    /// An identifier used in an expression doesn't resolve in any enclosing
    /// scope frame.
    NameError { name: String },
    /// A schema was assembled in a structurally invalid way (e.g. a `Choice`
    /// declared with no children).
    SyntaxError { reason: String },
    /// Propagated from the underlying cursor when a read runs past the end
    /// of the available bytes.
    EndOfStream { received: usize, expected: usize },
    /// Propagated from the underlying cursor when an offset-based seek
    /// can't be satisfied.
    SeekError { reason: String },
    /// `check_offset`/`check_value` found the stream in an unexpected state.
    ValidityError { reason: String },
    /// An `assert` field evaluated to `false`.
    AssertError { reason: String },
    /// A `Choice` selector evaluated to a key with no matching child and no
    /// default.
    UnexpectedChoiceKey { key: String },
    /// The evaluator detected a dependency cycle while resolving a `:value`
    /// expression.
    RecursiveEvaluation { path: String },
}

impl fmt::Display for SchemaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnRegisteredType { name } => write!(f, "no registered type named `{name}`"),
            Self::ArgumentError { reason } => write!(f, "argument error: {reason}"),
            Self::NameError { name } => write!(f, "name `{name}` does not resolve in any enclosing scope"),
            Self::SyntaxError { reason } => write!(f, "syntax error: {reason}"),
            Self::EndOfStream { received, expected } => {
                write!(f, "end of stream: received {received} byte(s), expected {expected}")
            }
            Self::SeekError { reason } => write!(f, "seek error: {reason}"),
            Self::ValidityError { reason } => write!(f, "validity error: {reason}"),
            Self::AssertError { reason } => write!(f, "assertion failed: {reason}"),
            Self::UnexpectedChoiceKey { key } => write!(f, "unexpected choice key `{key}`"),
            Self::RecursiveEvaluation { path } => write!(f, "recursive evaluation detected at `{path}`"),
        }
    }
}

impl From<IoErrorKind> for SchemaErrorKind {
    fn from(kind: IoErrorKind) -> Self {
        match kind {
            IoErrorKind::EndOfStream { received, expected } => Self::EndOfStream { received, expected },
            IoErrorKind::SeekError { reason } => Self::SeekError { reason: reason.to_string() },
        }
    }
}

pub type SchemaError = Error<SchemaErrorKind>;
pub type SchemaResult<T> = Result<T, SchemaError>;

pub(crate) fn arg_err(context: &'static str, reason: impl Into<String>) -> SchemaError {
    SchemaError::new(context, SchemaErrorKind::ArgumentError { reason: reason.into() })
}

pub(crate) fn name_err(context: &'static str, name: impl Into<String>) -> SchemaError {
    SchemaError::new(context, SchemaErrorKind::NameError { name: name.into() })
}

pub(crate) fn assert_err(context: &'static str, reason: impl Into<String>) -> SchemaError {
    SchemaError::new(context, SchemaErrorKind::AssertError { reason: reason.into() })
}

pub(crate) fn validity_err(context: &'static str, reason: impl Into<String>) -> SchemaError {
    SchemaError::new(context, SchemaErrorKind::ValidityError { reason: reason.into() })
}

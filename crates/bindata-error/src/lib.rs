//! Generic error type shared by every `bindata-*` crate.
//!
//! Each crate defines its own `Kind` enum (`IoErrorKind`, `SchemaErrorKind`,
//! ...) and wraps it in [`Error<Kind>`] rather than hand-rolling a fresh
//! error struct per layer.

use std::boxed::Box;
use std::fmt;

pub trait Source: std::error::Error + Sync + Send + 'static {}
impl<T> Source for T where T: std::error::Error + Sync + Send + 'static {}

/// An error with a fixed `context` (the operation that failed, usually
/// `module::function`), a `kind` describing what went wrong, and an
/// optional chained `source`.
#[derive(Debug)]
pub struct Error<Kind> {
    pub context: &'static str,
    pub kind: Kind,
    source: Option<Box<dyn std::error::Error + Sync + Send>>,
}

impl<Kind> Error<Kind> {
    #[cold]
    #[must_use]
    pub fn new(context: &'static str, kind: Kind) -> Self {
        Self {
            context,
            kind,
            source: None,
        }
    }

    #[cold]
    #[must_use]
    pub fn with_source<E: Source>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn into_other_kind<OtherKind>(self) -> Error<OtherKind>
    where
        Kind: Into<OtherKind>,
    {
        Error {
            context: self.context,
            kind: self.kind.into(),
            source: self.source,
        }
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn report(&self) -> ErrorReport<'_, Kind> {
        ErrorReport(self)
    }
}

impl<Kind> fmt::Display for Error<Kind>
where
    Kind: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.context, self.kind)
    }
}

impl<Kind> std::error::Error for Error<Kind>
where
    Kind: fmt::Display + fmt::Debug,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// A longer, multi-line rendering of an [`Error`] including its source chain.
pub struct ErrorReport<'a, Kind>(&'a Error<Kind>);

impl<Kind> fmt::Display for ErrorReport<'_, Kind>
where
    Kind: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {}", self.0.context, self.0.kind)?;
        let mut next = self.0.source.as_deref().map(|e| e as &dyn std::error::Error);
        while let Some(source) = next {
            writeln!(f, "  caused by: {source}")?;
            next = source.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestKind {
        Oops(u32),
    }

    impl fmt::Display for TestKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Oops(n) => write!(f, "oops #{n}"),
            }
        }
    }

    #[test]
    fn display_includes_context_and_kind() {
        let err = Error::new("layer::op", TestKind::Oops(3));
        assert_eq!(err.to_string(), "[layer::op] oops #3");
    }

    #[test]
    fn report_walks_source_chain() {
        #[derive(Debug)]
        struct Inner;
        impl fmt::Display for Inner {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "inner failure")
            }
        }
        impl std::error::Error for Inner {}

        let err = Error::new("layer::op", TestKind::Oops(1)).with_source(Inner);
        let report = err.report().to_string();
        assert!(report.contains("oops #1"));
        assert!(report.contains("inner failure"));
    }
}

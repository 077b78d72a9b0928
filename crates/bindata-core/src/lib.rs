//! Bit-aware I/O primitives shared by the bindata schema engine.
//!
//! A small, dependency-light layer of cursors, error kinds and marker
//! traits that every higher layer builds on, with no knowledge of the
//! schema DSL itself (that lives in `bindata-schema`).

#[macro_use]
mod macros;

mod as_any;
mod bitio;
mod cursor;
mod error;
mod into_owned;
mod padding;
mod transform;

pub use self::as_any::*;
pub use self::bitio::*;
pub use self::cursor::*;
pub use self::error::*;
pub use self::into_owned::*;
pub use self::padding::*;
pub use self::transform::*;

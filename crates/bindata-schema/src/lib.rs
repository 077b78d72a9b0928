//! The schema tree: node contract, lazy evaluator, parameter sanitization,
//! type registry, and the concrete node kinds.
//!
//! This crate owns everything that knows what a *schema* is, built
//! entirely on `bindata-core`'s bit-aware I/O, and has no opinion on how a
//! schema gets assembled by an application (that convenience layer is
//! `bindata`, one level up).

mod array;
mod buffer;
mod choice;
mod error;
mod evaluator;
mod node;
mod paramspec;
mod primitive;
mod registry;
mod struct_node;
mod value;

pub use array::{ArrayNode, LengthMode as ArrayLengthMode};
pub use buffer::{Buffer, DelayedIo, Section};
pub use choice::{ChoiceKey, ChoiceNode};
pub use error::{SchemaError, SchemaErrorKind, SchemaResult};
pub use evaluator::{CycleGuard, Expr, Frame, Scope};
pub use node::{finalize_tree, new_node_ref, num_bytes_by_encoding, Node, NodeCommon};
pub use paramspec::{ParamSpec, Params, SanitizedParams};
pub use primitive::{CountBytesRemaining, FixedString, FloatNode, Integer, Rest, Skip, SkipMode, ZString};
pub use registry::{normalize_name, Factory, Registry};
pub use struct_node::{StructBuilder, StructNode};
pub use value::{NodeRef, Value, WeakNodeRef};

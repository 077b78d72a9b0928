//! Top-level convenience layer over `bindata-schema`: read/write entry
//! points against a byte slice or `std::io` stream, and an explicit opt-in
//! trace sink kept separate from the ambient `tracing` calls the engine
//! itself makes for diagnostics.
//!
//! This crate re-exports the schema engine's public surface and adds one
//! genuinely new top-level concern: tracing.

pub use bindata_core::{
    BitReader, BitWriter, DynReader, DynWriter, Endian, IdentityTransform, IoError, IoErrorKind, SliceSource, Transform, VecSink,
};
pub use bindata_schema::{
    finalize_tree, new_node_ref, normalize_name, ArrayLengthMode, ArrayNode, Buffer, ChoiceKey, ChoiceNode, CountBytesRemaining,
    CycleGuard, DelayedIo, Expr, Factory, FixedString, FloatNode, Frame, Integer, Node, NodeCommon, NodeRef, ParamSpec, Params,
    Registry, Rest, SanitizedParams, SchemaError, SchemaErrorKind, SchemaResult, Scope, Section, Skip, SkipMode, StructBuilder,
    StructNode, Value, WeakNodeRef, ZString,
};

mod read_write;
mod trace;

pub use read_write::{read_from_slice, write_to_vec};
pub use trace::{trace_tree, TraceSink, VecTraceSink};

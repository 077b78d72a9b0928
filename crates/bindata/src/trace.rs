//! Opt-in, data-carrying trace output: one `path => value` line per leaf
//! field, truncated to keep large buffers from flooding the sink.
//!
//! Deliberately separate from the ambient `tracing` calls `bindata-schema`
//! makes for its own diagnostics (registry overrides, ...): those are
//! operational logs an operator enables globally, while a [`TraceSink`] is
//! requested per-read by the caller and carries the parsed data itself.

use bindata_schema::{NodeRef, Value};

const MAX_VALUE_WIDTH: usize = 30;

/// Receives one notification per leaf value produced by a traced read.
pub trait TraceSink {
    fn trace(&mut self, path: &str, value: &Value);
}

/// Collects trace lines into memory, truncating each rendered value to
/// [`MAX_VALUE_WIDTH`] characters with a trailing ellipsis.
#[derive(Default)]
pub struct VecTraceSink {
    lines: Vec<String>,
}

impl VecTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl TraceSink for VecTraceSink {
    fn trace(&mut self, path: &str, value: &Value) {
        let rendered = render_value(value);
        let rendered = if rendered.chars().count() > MAX_VALUE_WIDTH {
            let truncated: String = rendered.chars().take(MAX_VALUE_WIDTH).collect();
            format!("{truncated}...")
        } else {
            rendered
        };
        self.lines.push(format!("{path} => {rendered}"));
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Unset => "<unset>".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Bytes(b) => format!("{b:02x?}"),
        Value::Str(s) => s.clone(),
        Value::List(items) => format!("[{} items]", items.len()),
        Value::Map(m) => format!("{{{} fields}}", m.len()),
        Value::Node(_) => "<node>".to_owned(),
    }
}

/// Walks `root`'s subtree, emitting one [`TraceSink::trace`] call per leaf
/// (anything whose snapshot isn't a `Map`/`List`), using dotted paths
/// (`header.length`, `items[2]`).
pub fn trace_tree(root: &NodeRef, sink: &mut dyn TraceSink) {
    walk(root, "$", sink);
}

fn walk(node: &NodeRef, path: &str, sink: &mut dyn TraceSink) {
    let snapshot = node.borrow().snapshot();
    match snapshot {
        Value::Map(fields) => {
            for (name, _) in fields {
                if let Some(child) = node.borrow().field_node(&name) {
                    walk(&child, &format!("{path}.{name}"), sink);
                }
            }
        }
        Value::List(items) => {
            for (index, _) in items.iter().enumerate() {
                let children = node.borrow().children();
                if let Some(child) = children.get(index) {
                    walk(child, &format!("{path}[{index}]"), sink);
                }
            }
        }
        leaf => sink.trace(path, &leaf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindata_core::Endian;
    use bindata_schema::{finalize_tree, new_node_ref, Integer, StructBuilder};

    use crate::read_write::read_from_slice;

    #[test]
    fn traces_one_line_per_leaf_field() {
        let a = new_node_ref(Integer::u8());
        let b = new_node_ref(Integer::u16(Endian::Big));
        let root = new_node_ref(StructBuilder::new().field("a", a).field("b", b).build());
        finalize_tree(&root);
        read_from_slice(&root, &[0x05, 0x00, 0x2A]).unwrap();

        let mut sink = VecTraceSink::new();
        trace_tree(&root, &mut sink);
        assert_eq!(sink.lines().to_vec(), vec!["$.a => 5".to_owned(), "$.b => 42".to_owned()]);
    }

    #[test]
    fn truncates_long_values_with_an_ellipsis() {
        let mut sink = VecTraceSink::new();
        let long = Value::Str("x".repeat(50));
        sink.trace("$.blob", &long);
        assert!(sink.lines()[0].ends_with("..."));
        assert_eq!(sink.lines()[0].len(), "$.blob => ".len() + MAX_VALUE_WIDTH + 3);
    }
}

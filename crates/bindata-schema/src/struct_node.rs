//! `Struct`/`Record`: an ordered collection of named fields.

use std::collections::BTreeMap;

use bindata_core::{AsAny, DynReader, DynWriter, Endian};

use crate::error::{assert_err, validity_err, SchemaResult};
use crate::evaluator::{Expr, Scope};
use crate::node::{Node, NodeCommon};
use crate::paramspec::{ParamSpec, Params, SanitizedParams};
use crate::value::{NodeRef, Value, WeakNodeRef};

struct FieldSpec {
    name: String,
    node: NodeRef,
    onlyif: Option<Expr>,
    byte_align: Option<u64>,
    hidden: bool,
}

/// A named, ordered sequence of fields read/written in declaration order.
pub struct StructNode {
    common: NodeCommon,
    fields: Vec<FieldSpec>,
    assert_expr: Option<Expr>,
    check_offset: Option<Expr>,
    adjust_offset: Option<Expr>,
    params: Option<SanitizedParams>,
}

/// Builds a [`StructNode`], tracking a default endian new integer/float
/// fields inherit unless built with an explicit one.
pub struct StructBuilder {
    default_endian: Option<Endian>,
    fields: Vec<FieldSpec>,
    assert_expr: Option<Expr>,
    check_offset: Option<Expr>,
    adjust_offset: Option<Expr>,
    param_spec: ParamSpec,
}

impl StructBuilder {
    pub fn new() -> Self {
        Self {
            default_endian: None,
            fields: Vec::new(),
            assert_expr: None,
            check_offset: None,
            adjust_offset: None,
            param_spec: ParamSpec::new(),
        }
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.default_endian = Some(endian);
        self
    }

    pub fn default_endian(&self) -> Option<Endian> {
        self.default_endian
    }

    pub fn field(mut self, name: impl Into<String>, node: NodeRef) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            node,
            onlyif: None,
            byte_align: None,
            hidden: false,
        });
        self
    }

    pub fn field_onlyif(mut self, name: impl Into<String>, node: NodeRef, onlyif: Expr) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            node,
            onlyif: Some(onlyif),
            byte_align: None,
            hidden: false,
        });
        self
    }

    pub fn hidden_field(mut self, name: impl Into<String>, node: NodeRef) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            node,
            onlyif: None,
            byte_align: None,
            hidden: true,
        });
        self
    }

    pub fn anonymous_field(mut self, node: NodeRef) -> Self {
        let name = format!("_anon{}", self.fields.len());
        self.fields.push(FieldSpec {
            name,
            node,
            onlyif: None,
            byte_align: None,
            hidden: true,
        });
        self
    }

    pub fn byte_aligned_field(mut self, name: impl Into<String>, node: NodeRef, align: u64) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            node,
            onlyif: None,
            byte_align: Some(align),
            hidden: false,
        });
        self
    }

    pub fn assert(mut self, expr: Expr) -> Self {
        self.assert_expr = Some(expr);
        self
    }

    /// Requires the stream position to equal `expr` once every field has
    /// been read, raising `ValidityError` otherwise. Mutually exclusive
    /// with [`StructBuilder::adjust_offset`].
    pub fn check_offset(mut self, expr: Expr) -> Self {
        self.check_offset = Some(expr);
        self
    }

    /// Seeks the stream to `expr` once every field has been read, instead
    /// of just validating the position. Mutually exclusive with
    /// [`StructBuilder::check_offset`].
    pub fn adjust_offset(mut self, expr: Expr) -> Self {
        self.adjust_offset = Some(expr);
        self
    }

    /// Declares a construction parameter this struct requires to be
    /// instantiated. Use [`StructBuilder::build_with_params`] to supply it.
    pub fn mandatory_parameter(mut self, name: &'static str) -> Self {
        self.param_spec = self.param_spec.mandatory(name);
        self
    }

    /// Declares a construction parameter with a fallback value used when
    /// the caller of [`StructBuilder::build_with_params`] omits it.
    pub fn default_parameter(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.param_spec = self.param_spec.default_value(name, value);
        self
    }

    /// Builds a struct with no declared construction parameters. Panics
    /// only if [`StructBuilder::mandatory_parameter`] was used without a
    /// matching [`StructBuilder::build_with_params`] call — a struct with
    /// no mandatory parameters can never fail sanitization against an
    /// empty parameter set.
    pub fn build(self) -> StructNode {
        self.build_with_params(Params::new())
            .expect("a struct built via `build()` must not declare mandatory parameters; use `build_with_params` instead")
    }

    /// Sanitizes `raw` against this struct's declared parameter set, then
    /// instantiates it — the two-phase "sanitize then instantiate"
    /// construction path. The sanitized result is exposed through
    /// [`Node::params`] and becomes visible in the evaluator scope for
    /// this struct's fields, so a child `:value` can reference a parameter
    /// the same way it references a sibling field (a parameter hides a
    /// same-named field).
    pub fn build_with_params(self, raw: Params) -> SchemaResult<StructNode> {
        let params = self.param_spec.sanitize("StructBuilder::build_with_params", raw)?;
        Ok(StructNode {
            common: NodeCommon::default(),
            fields: self.fields,
            assert_expr: self.assert_expr,
            check_offset: self.check_offset,
            adjust_offset: self.adjust_offset,
            params: Some(params),
        })
    }
}

impl Default for StructBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StructNode {
    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn node(&self, name: &str) -> Option<NodeRef> {
        self.field_index(name).map(|i| self.fields[i].node.clone())
    }

    fn active(&self, field: &FieldSpec, scope: &Scope) -> SchemaResult<bool> {
        match &field.onlyif {
            Some(expr) => Ok(expr.eval(scope)?.as_bool().unwrap_or(true)),
            None => Ok(true),
        }
    }

    fn align_reader(io: &mut dyn DynReader, align: u64) -> SchemaResult<()> {
        let rem = io.offset() % align;
        if rem != 0 {
            io.skip((align - rem) as i64).map_err(|e| e.into_other_kind())?;
        }
        Ok(())
    }

    fn align_writer(io: &mut dyn DynWriter, written_so_far: u64, align: u64) -> SchemaResult<()> {
        let rem = written_so_far % align;
        if rem != 0 {
            io.write_bytes(&vec![0u8; (align - rem) as usize]).map_err(|e| e.into_other_kind())?;
        }
        Ok(())
    }

    /// The body of `read`: reads every active field in order, then runs
    /// the struct-level `:check_offset`/`:adjust_offset`/`:assert` checks.
    /// Split out so `read` can wrap it with a reading-window sweep over
    /// the field subtree regardless of which return path is taken.
    fn read_fields_and_checks(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        for index in 0..self.fields.len() {
            let (active, align) = {
                let field = &self.fields[index];
                (self.active(field, scope)?, field.byte_align)
            };
            if !active {
                continue;
            }
            if let Some(align) = align {
                Self::align_reader(io, align)?;
            }
            let child = self.fields[index].node.clone();
            let child_scope = Scope::from_node(child.clone());
            child.borrow_mut().read(io, &child_scope)?;
        }

        if self.check_offset.is_some() && self.adjust_offset.is_some() {
            return Err(validity_err("StructNode::read", "check_offset and adjust_offset are mutually exclusive"));
        }
        if let Some(expr) = &self.check_offset {
            let expected = expr.eval(scope)?.as_u64().unwrap_or(0);
            let actual = io.offset();
            if actual != expected {
                return Err(validity_err("StructNode::read", format!("expected stream offset {expected}, found {actual}")));
            }
        } else if let Some(expr) = &self.adjust_offset {
            let target = expr.eval(scope)?.as_u64().unwrap_or(0);
            io.seek_to_abs_offset(target).map_err(|e| e.into_other_kind())?;
        }

        if let Some(expr) = &self.assert_expr {
            if !expr.eval(scope)?.as_bool().unwrap_or(true) {
                return Err(assert_err("StructNode::read", "struct-level assertion failed"));
            }
        }
        Ok(())
    }
}

impl AsAny for StructNode {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Node for StructNode {
    fn read(&mut self, io: &mut dyn DynReader, scope: &Scope) -> SchemaResult<()> {
        self.common.set_abs_offset(Some(io.offset()));
        for field in &self.fields {
            crate::node::set_reading_recursive(&field.node, true);
        }
        let outcome = self.read_fields_and_checks(io, scope);
        for field in &self.fields {
            crate::node::set_reading_recursive(&field.node, false);
        }
        outcome
    }

    fn write(&self, io: &mut dyn DynWriter, scope: &Scope) -> SchemaResult<()> {
        let mut written: u64 = 0;
        for field in &self.fields {
            if !self.active(field, scope)? {
                continue;
            }
            if let Some(align) = field.byte_align {
                Self::align_writer(io, written, align)?;
                written += (align - written % align) % align;
            }
            let child_scope = Scope::from_node(field.node.clone());
            field.node.borrow().write(io, &child_scope)?;
            written += field.node.borrow().num_bytes(&child_scope)?;
        }
        Ok(())
    }

    fn num_bytes(&self, scope: &Scope) -> SchemaResult<u64> {
        let mut total = 0u64;
        for field in &self.fields {
            if !self.active(field, scope)? {
                continue;
            }
            let child_scope = Scope::from_node(field.node.clone());
            if let Some(align) = field.byte_align {
                let rem = total % align;
                if rem != 0 {
                    total += align - rem;
                }
            }
            total += field.node.borrow().num_bytes(&child_scope)?;
        }
        Ok(total)
    }

    fn snapshot(&self) -> Value {
        let mut map = BTreeMap::new();
        for field in &self.fields {
            if field.hidden {
                continue;
            }
            map.insert(field.name.clone(), field.node.borrow().snapshot());
        }
        Value::Map(map)
    }

    fn clear(&mut self) {
        for field in &self.fields {
            field.node.borrow_mut().clear();
        }
    }

    fn is_clear(&self) -> bool {
        self.fields.iter().all(|f| f.node.borrow().is_clear())
    }

    fn assign(&mut self, value: Value) -> SchemaResult<()> {
        let map = match value {
            Value::Map(m) => m,
            _ => return Err(validity_err("StructNode::assign", "expected a map")),
        };
        for field in &self.fields {
            if let Some(v) = map.get(&field.name) {
                field.node.borrow_mut().assign(v.clone())?;
            }
        }
        Ok(())
    }

    fn parent(&self) -> Option<NodeRef> {
        self.common.parent()
    }

    fn set_parent(&mut self, parent: WeakNodeRef) {
        self.common.set_parent(parent);
    }

    fn child_index(&self) -> Option<usize> {
        self.common.child_index()
    }

    fn set_child_index(&mut self, index: Option<usize>) {
        self.common.set_child_index(index);
    }

    fn abs_offset(&self) -> Option<u64> {
        self.common.abs_offset()
    }

    fn params(&self) -> Option<SanitizedParams> {
        self.params.clone()
    }

    fn field(&self, name: &str) -> Option<Value> {
        let index = self.field_index(name)?;
        self.fields[index].node.borrow().evaluated_value(&Scope::from_node(self.fields[index].node.clone())).ok()
    }

    fn field_node(&self, name: &str) -> Option<NodeRef> {
        self.node(name)
    }

    fn children(&self) -> Vec<NodeRef> {
        self.fields.iter().map(|f| f.node.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{finalize_tree, new_node_ref};
    use crate::primitive::Integer;
    use bindata_core::{BitReader, SliceSource};

    #[test]
    fn reads_fields_in_declaration_order_and_skips_onlyif_false() {
        let flag = new_node_ref(Integer::u8());
        let optional = new_node_ref(Integer::u8());
        let tail = new_node_ref(Integer::u8());

        let built = StructBuilder::new()
            .field("flag", flag.clone())
            .field_onlyif("optional", optional.clone(), Expr::closure(|scope| scope.resolve("flag")))
            .field("tail", tail.clone())
            .build();
        let root = new_node_ref(built);
        finalize_tree(&root);

        let mut r = BitReader::new(SliceSource::new(&[0x00, 0xAA]));
        let scope = Scope::from_node(root.clone());
        root.borrow_mut().read(&mut r, &scope).unwrap();

        assert!(optional.borrow().is_clear());
        assert_eq!(tail.borrow().snapshot(), Value::UInt(0xAA));
    }

    #[test]
    fn cross_field_value_cycle_raises_recursive_evaluation() {
        // Each field's `:value` reads its sibling's live node and asks for
        // *its* evaluated value, so resolving `a` walks into `b` and back
        // into `a` again rather than returning a flattened value directly.
        let a = new_node_ref(Integer::u8().with_value(Expr::closure(|scope| {
            let b = scope.resolve_node("b")?;
            b.borrow().evaluated_value(scope)
        })));
        let b = new_node_ref(Integer::u8().with_value(Expr::closure(|scope| {
            let a = scope.resolve_node("a")?;
            a.borrow().evaluated_value(scope)
        })));
        let built = StructBuilder::new().field("a", a.clone()).field("b", b.clone()).build();
        let root = new_node_ref(built);
        finalize_tree(&root);

        let scope = Scope::from_node(a.clone());
        let err = a.borrow().evaluated_value(&scope).unwrap_err();
        assert!(matches!(err.kind(), crate::error::SchemaErrorKind::RecursiveEvaluation { .. }));
    }

    #[test]
    fn mandatory_parameter_hides_a_same_named_field_and_flows_into_a_child_value() {
        let inner = new_node_ref(Integer::u8().with_value(Expr::reference("len")));
        let len_field = new_node_ref(Integer::u8());
        let built = StructBuilder::new()
            .mandatory_parameter("len")
            .field("len", len_field.clone())
            .field("payload", inner.clone())
            .build_with_params({
                let mut raw = Params::new();
                raw.insert("len".into(), Expr::literal(9u64));
                raw
            })
            .unwrap();
        let root = new_node_ref(built);
        finalize_tree(&root);

        len_field.borrow_mut().assign(Value::UInt(3)).unwrap();
        let scope = Scope::from_node(inner.clone());
        assert_eq!(inner.borrow().evaluated_value(&scope).unwrap(), Value::UInt(9));
    }

    #[test]
    fn snapshot_hides_anonymous_fields() {
        let visible = new_node_ref(Integer::u8());
        let hidden = new_node_ref(Integer::u8());
        let built = StructBuilder::new().field("visible", visible).anonymous_field(hidden).build();
        let root = new_node_ref(built);
        finalize_tree(&root);

        let mut r = BitReader::new(SliceSource::new(&[1, 2]));
        let scope = Scope::from_node(root.clone());
        root.borrow_mut().read(&mut r, &scope).unwrap();

        match root.borrow().snapshot() {
            Value::Map(m) => assert_eq!(m.len(), 1),
            _ => panic!("expected a map"),
        }
    }
}

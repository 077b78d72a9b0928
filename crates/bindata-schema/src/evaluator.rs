//! Lazy expression evaluation and lexical scope walking.
//!
//! A [`Scope`] is a stack of frames, one per ancestor node on the path from
//! the node currently being evaluated up to the root. Name lookup walks the
//! stack innermost-first; within a single frame, a locally-injected variable
//! (array `index`/`element`/`array`) hides a same-named parameter, which in
//! turn hides a same-named sibling field. Parent navigation is
//! `Scope::parent_scope`, dropping the innermost frame.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::{name_err, SchemaError, SchemaErrorKind, SchemaResult};
use crate::node::Node;
use crate::paramspec::SanitizedParams;
use crate::value::{NodeRef, Value};

/// A lazily-evaluated expression: a literal, a plain identifier reference
/// (flattened to its value), or an arbitrary Rust closure with full access
/// to the current [`Scope`] (used when a closure needs a live node, not
/// just its flattened value — e.g. `next.is_clear()` in a recursive list).
#[derive(Clone)]
pub enum Expr {
    Literal(Value),
    Ref(String),
    Closure(Rc<dyn Fn(&Scope) -> SchemaResult<Value>>),
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Expr::Ref(name.into())
    }

    pub fn closure<F>(f: F) -> Self
    where
        F: Fn(&Scope) -> SchemaResult<Value> + 'static,
    {
        Expr::Closure(Rc::new(f))
    }

    pub fn eval(&self, scope: &Scope) -> SchemaResult<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Ref(name) => scope.resolve(name),
            Expr::Closure(f) => f(scope),
        }
    }
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "Literal({v:?})"),
            Expr::Ref(name) => write!(f, "Ref({name:?})"),
            Expr::Closure(_) => write!(f, "Closure(..)"),
        }
    }
}

/// One level of the scope stack: the node owning this frame, plus any
/// locally-injected variables (array element context) and the sanitized
/// construction parameters the node was built with, if any.
#[derive(Clone)]
pub struct Frame {
    pub node: NodeRef,
    pub locals: BTreeMap<String, Value>,
    pub params: Option<SanitizedParams>,
}

impl Frame {
    pub fn new(node: NodeRef) -> Self {
        let params = node.borrow().params();
        Self {
            node,
            locals: BTreeMap::new(),
            params,
        }
    }

    pub fn with_local(mut self, name: impl Into<String>, value: Value) -> Self {
        self.locals.insert(name.into(), value);
        self
    }
}

/// The lexical scope visible from one point in the tree: innermost frame
/// first, root frame last.
#[derive(Clone)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new(frames: Vec<Frame>) -> Self {
        assert!(!frames.is_empty(), "a scope must have at least one frame");
        Self { frames }
    }

    pub fn from_node(node: NodeRef) -> Self {
        let mut frames = vec![Frame::new(node.clone())];
        let mut current = node;
        loop {
            let parent = current.borrow().parent();
            match parent {
                Some(p) => {
                    frames.push(Frame::new(p.clone()));
                    current = p;
                }
                None => break,
            }
        }
        Self { frames }
    }

    pub fn push_locals(&self, locals: BTreeMap<String, Value>) -> Self {
        let mut frames = self.frames.clone();
        frames[0].locals.extend(locals);
        Self { frames }
    }

    pub fn current_node(&self) -> &NodeRef {
        &self.frames[0].node
    }

    /// Consumes the scope, returning its frame stack — used to splice an
    /// extra innermost frame (e.g. an array element's `index`/`element`
    /// locals) in front of an existing scope.
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Frame `n` outward from the current one, dropping the innermost `n`
    /// frames; errors past the root.
    pub fn parent_scope(&self) -> SchemaResult<Scope> {
        self.ancestor_scope(1)
    }

    pub fn ancestor_scope(&self, levels: usize) -> SchemaResult<Scope> {
        if levels >= self.frames.len() {
            return Err(name_err("Scope::ancestor_scope", "parent"));
        }
        Ok(Scope {
            frames: self.frames[levels..].to_vec(),
        })
    }

    /// Resolves `name` to a flattened value by walking frames
    /// innermost-to-outermost; within a frame, locals beat params beat
    /// fields. A parameter expression is evaluated against the scope
    /// starting at its own frame and widening outward, so it can
    /// reference its own node's siblings/ancestors but never an inner
    /// frame (e.g. an array element's locals) it wasn't given in.
    pub fn resolve(&self, name: &str) -> SchemaResult<Value> {
        for (i, frame) in self.frames.iter().enumerate() {
            if let Some(v) = frame.locals.get(name) {
                return Ok(v.clone());
            }
            if let Some(params) = &frame.params {
                if let Some(expr) = params.get(name) {
                    let from_here = Scope {
                        frames: self.frames[i..].to_vec(),
                    };
                    return expr.eval(&from_here);
                }
            }
            let node = frame.node.borrow();
            if let Some(v) = node.field(name) {
                return Ok(v);
            }
        }
        Err(name_err("Scope::resolve", name))
    }

    /// Like [`Scope::resolve`] but returns the live node handle for a
    /// sibling field rather than its flattened value.
    pub fn resolve_node(&self, name: &str) -> SchemaResult<NodeRef> {
        for frame in &self.frames {
            let node = frame.node.borrow();
            if let Some(n) = node.field_node(name) {
                return Ok(n);
            }
        }
        Err(name_err("Scope::resolve_node", name))
    }
}

/// Raised when the evaluator detects that evaluating a `:value` expression
/// would require re-entering its own evaluation.
pub struct CycleGuard {
    path: Vec<usize>,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self { path: Vec::new() }
    }

    pub fn enter(&mut self, context: &'static str, node_id: usize) -> SchemaResult<()> {
        if self.path.contains(&node_id) {
            return Err(SchemaError::new(
                context,
                SchemaErrorKind::RecursiveEvaluation {
                    path: format!("{:?}", self.path),
                },
            ));
        }
        self.path.push(node_id);
        Ok(())
    }

    pub fn exit(&mut self) {
        self.path.pop();
    }
}

impl Default for CycleGuard {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static VALUE_EVAL_GUARD: RefCell<CycleGuard> = RefCell::new(CycleGuard::new());
}

/// Wraps evaluation of a node's own `:value` expression with cycle
/// detection, keyed by the node's identity. A `:value` expression that
/// (directly or through a chain of siblings) ends up reading its own
/// node again raises `RecursiveEvaluation` instead of recursing forever.
pub fn guard_value_eval<F>(node_id: usize, context: &'static str, f: F) -> SchemaResult<Value>
where
    F: FnOnce() -> SchemaResult<Value>,
{
    VALUE_EVAL_GUARD.with(|guard| guard.borrow_mut().enter(context, node_id))?;
    let result = f();
    VALUE_EVAL_GUARD.with(|guard| guard.borrow_mut().exit());
    result
}

//! Owned translation-unit model.
//!
//! The analysis passes never touch libclang directly; they walk this
//! arena, which the C++ frontend (or a test fixture) fills in once. Node
//! links that matter to the tool are resolved at build time: the
//! `definition` cross-link for call targets, and the fully qualified
//! names derived from semantic parents.

use std::io::{self, Write};
use std::path::PathBuf;

use crate::core::model::CodeRange;

pub type NodeId = usize;

/// Enumerated cursor kinds the passes filter on; everything else is
/// lowered as `Other` so the tree shape is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    TranslationUnit,
    Namespace,
    ClassDecl,
    StructDecl,
    FunctionDecl,
    Method,
    FunctionTemplate,
    ParmDecl,
    CallExpr,
    DeclRefExpr,
    AnnotateAttr,
    Other,
}

/// 1-based location of a token start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePos {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: CursorKind,
    pub spelling: String,
    pub mangled_name: Option<String>,
    pub location: Option<SourcePos>,
    /// Source extent; zero-width for some references, `None` when the
    /// parser could not attribute the node to a single file.
    pub extent: Option<CodeRange>,
    pub fq_name: String,
    /// Fully qualified name of the owning scope (class or namespace).
    pub scope_name: Option<String>,
    pub result_type: Option<String>,
    pub type_spelling: Option<String>,
    pub is_definition: bool,
    pub definition: Option<NodeId>,
    pub arguments: Vec<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn new(kind: CursorKind, spelling: impl Into<String>) -> Self {
        let spelling = spelling.into();
        Self {
            kind,
            fq_name: spelling.clone(),
            spelling,
            mangled_name: None,
            location: None,
            extent: None,
            scope_name: None,
            result_type: None,
            type_spelling: None,
            is_definition: false,
            definition: None,
            arguments: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_location(mut self, file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        self.location = Some(SourcePos {
            file: file.into(),
            line,
            column,
        });
        self
    }

    pub fn with_extent(mut self, extent: CodeRange) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn with_mangled(mut self, mangled: impl Into<String>) -> Self {
        self.mangled_name = Some(mangled.into());
        self
    }

    pub fn with_fq_name(mut self, fq: impl Into<String>) -> Self {
        self.fq_name = fq.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope_name = Some(scope.into());
        self
    }

    pub fn with_result_type(mut self, ty: impl Into<String>) -> Self {
        self.result_type = Some(ty.into());
        self
    }

    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.type_spelling = Some(ty.into());
        self
    }

    pub fn defining(mut self) -> Self {
        self.is_definition = true;
        self
    }
}

/// Whether the visitor should keep walking below the current node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    Children,
    Skip,
}

/// The lowered unit: a flat arena with node 0 as the root.
#[derive(Debug)]
pub struct TranslationUnit {
    nodes: Vec<Node>,
}

impl TranslationUnit {
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order walk below `from`. The callback fires for children whose
    /// kind matches the filter (or for all children without one) and
    /// receives the ancestor stack, innermost last; unmatched nodes are
    /// descended into unconditionally.
    pub fn visit<F>(&self, from: NodeId, filter: Option<&[CursorKind]>, callback: &mut F)
    where
        F: FnMut(&TranslationUnit, NodeId, &[NodeId]) -> Descend,
    {
        let mut stack = Vec::new();
        self.visit_inner(from, filter, callback, &mut stack);
    }

    fn visit_inner<F>(
        &self,
        from: NodeId,
        filter: Option<&[CursorKind]>,
        callback: &mut F,
        stack: &mut Vec<NodeId>,
    ) where
        F: FnMut(&TranslationUnit, NodeId, &[NodeId]) -> Descend,
    {
        stack.push(from);
        // Children are cloned ids, so the callback may borrow the unit.
        let children = self.nodes[from].children.clone();
        for child in children {
            let matched = filter.is_none_or(|kinds| kinds.contains(&self.nodes[child].kind));
            let descend = if matched {
                callback(self, child, stack)
            } else {
                Descend::Children
            };
            if descend == Descend::Children {
                self.visit_inner(child, filter, callback, stack);
            }
        }
        stack.pop();
    }

    /// Render the cursor tree for exploration dumps.
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.dump_node(w, self.root(), 0)
    }

    fn dump_node<W: Write>(&self, w: &mut W, id: NodeId, depth: usize) -> io::Result<()> {
        let node = &self.nodes[id];
        let loc = node
            .location
            .as_ref()
            .map(|l| format!("{}:{}:{}", l.file.display(), l.line, l.column))
            .unwrap_or_else(|| "<no location>".to_string());
        writeln!(
            w,
            "{:indent$}{:?}: spelling: {}, location: {}",
            "",
            node.kind,
            node.spelling,
            loc,
            indent = depth * 2
        )?;
        for &child in &node.children {
            self.dump_node(w, child, depth + 1)?;
        }
        Ok(())
    }
}

/// Grows the arena; used by the libclang frontend and by tests.
#[derive(Debug)]
pub struct TuBuilder {
    nodes: Vec<Node>,
}

impl TuBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(CursorKind::TranslationUnit, "")],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn add(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn add_argument(&mut self, function: NodeId, argument: NodeId) {
        self.nodes[function].arguments.push(argument);
    }

    pub fn set_definition(&mut self, reference: NodeId, definition: NodeId) {
        self.nodes[reference].definition = Some(definition);
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn finish(self) -> TranslationUnit {
        TranslationUnit { nodes: self.nodes }
    }
}

impl Default for TuBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_unit() -> TranslationUnit {
        let mut b = TuBuilder::new();
        let ns = b.add(b.root(), Node::new(CursorKind::Namespace, "ImGui"));
        let f = b.add(
            ns,
            Node::new(CursorKind::FunctionDecl, "Foo").defining(),
        );
        let call = b.add(f, Node::new(CursorKind::CallExpr, "Bar"));
        let _inner = b.add(call, Node::new(CursorKind::DeclRefExpr, "Bar"));
        b.finish()
    }

    #[test]
    fn filtered_visit_sees_through_unmatched_nodes() {
        let tu = small_unit();
        let mut seen = Vec::new();
        tu.visit(
            tu.root(),
            Some(&[CursorKind::CallExpr]),
            &mut |unit, id, stack| {
                seen.push((unit.node(id).spelling.clone(), stack.len()));
                Descend::Children
            },
        );
        // The call sits under namespace -> function, both unmatched but
        // transparently descended.
        assert_eq!(seen, vec![("Bar".to_string(), 3)]);
    }

    #[test]
    fn skip_stops_descent() {
        let tu = small_unit();
        let mut count = 0usize;
        tu.visit(tu.root(), None, &mut |unit, id, _| {
            count += 1;
            if unit.node(id).kind == CursorKind::CallExpr {
                Descend::Skip
            } else {
                Descend::Children
            }
        });
        // Root's namespace, the function, and the call; the ref under the
        // call is skipped.
        assert_eq!(count, 3);
    }

    #[test]
    fn ancestor_stack_names_the_enclosing_function() {
        let tu = small_unit();
        let mut enclosing = None;
        tu.visit(
            tu.root(),
            Some(&[CursorKind::CallExpr]),
            &mut |unit, _, stack| {
                enclosing = stack
                    .iter()
                    .rev()
                    .map(|&a| unit.node(a))
                    .find(|n| n.kind == CursorKind::FunctionDecl)
                    .map(|n| n.spelling.clone());
                Descend::Skip
            },
        );
        assert_eq!(enclosing.as_deref(), Some("Foo"));
    }
}

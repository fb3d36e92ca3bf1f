//! Indexed store of declarations, definitions, and call relations, plus
//! the closure solver that decides which functions gain the explicit
//! context parameter.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use petgraph::dot::{Config as DotConfig, Dot};
use petgraph::graph::DiGraph;
use tracing::{debug, warn};

use crate::core::error::EngineError;
use crate::core::model::{
    CallEntry, CallKey, CodeRange, FunctionEntry, FunctionId, FunctionKind, LogCall,
};
use crate::infra::io::normalize_path;

#[derive(Debug, Default)]
pub struct FunctionDatabase {
    /// At most one declaration per id; non-demo locations win.
    declarations: IndexMap<FunctionId, FunctionEntry>,
    /// Exactly one definition per id.
    definitions: IndexMap<FunctionId, FunctionEntry>,
    calls: IndexMap<CallKey, CallEntry>,
    caller_calls: IndexMap<FunctionId, Vec<CallKey>>,
    callee_calls: IndexMap<FunctionId, Vec<CallKey>>,
    log_calls: Vec<LogCall>,
}

impl FunctionDatabase {
    /// Index the discovered entries. Duplicate definitions are fatal;
    /// duplicate declarations resolve to the non-demo location with a
    /// warning; declaration-only functions are assumed external and
    /// dropped.
    pub fn build(entries: Vec<FunctionEntry>, demo_unit: &Path) -> Result<Self, EngineError> {
        let demo = normalize_path(demo_unit);
        let mut db = Self::default();

        let (definitions, declarations): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| e.is_definition);

        for entry in definitions {
            if let Some(prev) = db.definitions.get(&entry.id) {
                return Err(EngineError::DuplicateDefinition(format!(
                    "{} at {} and {}",
                    entry.fq_name, prev.code_range, entry.code_range
                )));
            }
            db.definitions.insert(entry.id.clone(), entry);
        }

        for entry in declarations {
            match db.declarations.get(&entry.id) {
                Some(prev) => {
                    warn!(
                        "{} is declared at {} and at {}",
                        entry.fq_name, prev.code_range, entry.code_range
                    );
                    if normalize_path(&entry.code_range.file) != demo {
                        db.declarations.insert(entry.id.clone(), entry);
                    }
                }
                None => {
                    db.declarations.insert(entry.id.clone(), entry);
                }
            }
        }

        // Functions with only a declaration in the unit are external to
        // the rewrite.
        db.declarations.retain(|id, entry| {
            let keep = db.definitions.contains_key(id);
            if !keep {
                debug!("dropping {}: declared but never defined in scope", entry.fq_name);
            }
            keep
        });

        // Every definition answers for its own declaration when none was
        // seen separately.
        let missing: Vec<FunctionId> = db
            .definitions
            .keys()
            .filter(|id| !db.declarations.contains_key(id.as_str()))
            .cloned()
            .collect();
        for id in missing {
            let entry = db.definitions[&id].clone();
            db.declarations.insert(id, entry);
        }

        for id in db.definitions.keys() {
            db.caller_calls.insert(id.clone(), Vec::new());
            db.callee_calls.insert(id.clone(), Vec::new());
        }

        Ok(db)
    }

    /// Record a resolved call site. Calls whose endpoints are not both
    /// defined in scope are silently skipped; two calls with one identity
    /// are a fatal merge error.
    pub fn add_call(
        &mut self,
        caller: &FunctionId,
        callee: &FunctionId,
        code_range: CodeRange,
        call_name: String,
        has_args: bool,
    ) -> Result<(), EngineError> {
        if !self.definitions.contains_key(caller) || !self.definitions.contains_key(callee) {
            return Ok(());
        }

        let key = CallKey::from(&code_range);
        if let Some(prev) = self.calls.get(&key) {
            return Err(EngineError::InvariantViolation(format!(
                "calls to {} and {} share the location {}",
                prev.callee, callee, code_range
            )));
        }

        self.caller_calls
            .entry(caller.clone())
            .or_default()
            .push(key.clone());
        self.callee_calls
            .entry(callee.clone())
            .or_default()
            .push(key.clone());
        self.calls.insert(
            key,
            CallEntry {
                caller: caller.clone(),
                callee: callee.clone(),
                code_range,
                call_name,
                has_args,
            },
        );
        Ok(())
    }

    pub fn add_log_call(&mut self, log_call: LogCall) {
        self.log_calls.push(log_call);
    }

    /// Mark every function that needs the context parameter: seeds are the
    /// definitions that reference the global directly; marks flow from
    /// callee to caller. Methods of classes that already carry the context
    /// in a member are a propagation boundary.
    pub fn compute_context_need(&mut self, classes_with_context: &[String]) {
        let mut visited: HashSet<FunctionId> = HashSet::new();
        let mut stack: Vec<FunctionId> = self
            .definitions
            .values()
            .filter(|f| !f.implicit_contexts.is_empty())
            .map(|f| f.id.clone())
            .collect();

        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let def = &self.definitions[&id];
            if def.is_ctx_class_method(classes_with_context) {
                debug!("{} takes the context from its owning class", def.fq_name);
                continue;
            }
            self.definitions[&id].need_context_param = true;
            if let Some(decl) = self.declarations.get_mut(&id) {
                decl.need_context_param = true;
            }
            debug!("{} needs an explicit context parameter", self.definitions[&id].fq_name);

            if let Some(keys) = self.callee_calls.get(&id) {
                for key in keys {
                    stack.push(self.calls[key].caller.clone());
                }
            }
        }
    }

    pub fn definitions(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.definitions.values()
    }

    pub fn declarations(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.declarations.values()
    }

    pub fn definition(&self, id: &FunctionId) -> Option<&FunctionEntry> {
        self.definitions.get(id)
    }

    pub fn declaration(&self, id: &FunctionId) -> Option<&FunctionEntry> {
        self.declarations.get(id)
    }

    pub fn calls(&self) -> impl Iterator<Item = &CallEntry> {
        self.calls.values()
    }

    pub fn log_calls(&self) -> &[LogCall] {
        &self.log_calls
    }

    pub fn is_known(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// Declaration (when textually separate) followed by definition, per
    /// function, in definition order. These are the sites the planner
    /// rewrites.
    pub fn rewrite_targets(&self) -> Vec<&FunctionEntry> {
        let mut out = Vec::with_capacity(self.definitions.len() * 2);
        for (id, def) in &self.definitions {
            if let Some(decl) = self.declarations.get(id)
                && decl.code_range != def.code_range
            {
                out.push(decl);
            }
            out.push(def);
        }
        out
    }

    /// Public API surface: non-member functions declared with the API
    /// marker in the public header, in header order.
    pub fn public_apis(&self, public_header: &Path) -> Vec<&FunctionEntry> {
        let header = normalize_path(public_header);
        let mut apis: Vec<&FunctionEntry> = self
            .declarations
            .values()
            .filter(|e| {
                e.is_api
                    && e.kind != FunctionKind::Method
                    && normalize_path(&e.code_range.file) == header
            })
            .collect();
        apis.sort_by_key(|e| (e.code_range.start_line, e.code_range.start_column));
        apis
    }

    /// Caller -> callee edges in Graphviz DOT form.
    pub fn to_dot(&self) -> String {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes = IndexMap::new();
        for (id, def) in &self.definitions {
            nodes.insert(id.clone(), graph.add_node(def.fq_name.as_str()));
        }
        for call in self.calls.values() {
            if let (Some(&a), Some(&b)) = (nodes.get(&call.caller), nodes.get(&call.callee)) {
                graph.add_edge(a, b, ());
            }
        }
        format!("{:?}", Dot::with_config(&graph, &[DotConfig::EdgeNoLabel]))
    }
}

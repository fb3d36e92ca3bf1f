//! libclang frontend: parse the whole library as one synthetic
//! translation unit and lower the cursor graph into the owned arena.
//!
//! The project's `IM_FMTARGS` / `IM_FMTLIST` / `IM_STATIC_ASSERT` macros
//! are invisible to the parser, so they are temporarily commented out in
//! the headers and re-defined by the synthetic unit as annotate
//! attributes carrying their integer argument; the API marker becomes an
//! `imgui_api` annotation the same way. The header patch is scoped to
//! the parse and restored on every exit path, unwinding included.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clang::diagnostic::Severity;
use clang::{Clang, Entity, EntityKind, Index, Unsaved};
use tracing::debug;

use crate::core::error::EngineError;
use crate::core::model::CodeRange;
use crate::infra::config::RepoLayout;
use crate::infra::io::{read_file, write_text};
use crate::parsers::tu::{CursorKind, Node, NodeId, SourcePos, TranslationUnit, TuBuilder};

/// Marker prefix used to comment macros out; restore is a plain reversal.
const SHIM_MARK: &str = "//TMP";

const SHIMMED_MACROS: &[(&str, &[&str])] = &[
    ("imgui.h", &["#define IM_FMTARGS", "#define IM_FMTLIST"]),
    ("imgui_internal.h", &["#define IM_STATIC_ASSERT"]),
];

/// Scoped patch of the headers; the original bytes come back when this
/// guard goes away, panic or not.
pub struct MacroShim {
    originals: Vec<(PathBuf, String)>,
    restored: bool,
}

impl MacroShim {
    pub fn install(layout: &RepoLayout) -> Result<Self> {
        let mut originals = Vec::new();
        for (file, defines) in SHIMMED_MACROS {
            let path = layout.root.join(file);
            let original = read_file(&path)?;
            let mut patched = original.clone();
            for define in *defines {
                patched = patched.replace(define, &format!("{SHIM_MARK}{define}"));
            }
            if patched != original {
                write_text(&path, &patched)?;
                originals.push((path, original));
            }
        }
        Ok(Self {
            originals,
            restored: false,
        })
    }

    pub fn restore(mut self) -> Result<()> {
        self.restore_inner()
    }

    fn restore_inner(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        for (path, original) in &self.originals {
            write_text(path, original)
                .with_context(|| format!("Failed to restore {}", path.display()))?;
        }
        Ok(())
    }
}

impl Drop for MacroShim {
    fn drop(&mut self) {
        let _ = self.restore_inner();
    }
}

/// The synthetic unit: annotate-attribute macro definitions followed by
/// every implementation file.
fn synthetic_unit_text() -> String {
    concat!(
        "#define IM_FMTARGS(IDX) __attribute__((annotate(\"IM_FMTARGS(\" #IDX \")\")))\n",
        "#define IM_FMTLIST(IDX) __attribute__((annotate(\"IM_FMTLIST(\" #IDX \")\")))\n",
        "#define IM_STATIC_ASSERT(_COND)\n",
        "#define IMGUI_API __attribute__((annotate(\"imgui_api\")))\n",
        "#include \"imgui.cpp\"\n",
        "#include \"imgui_draw.cpp\"\n",
        "#include \"imgui_tables.cpp\"\n",
        "#include \"imgui_widgets.cpp\"\n",
        "#include \"imgui_demo.cpp\"\n",
    )
    .to_string()
}

/// Parse the repository and return the lowered arena.
pub fn parse_repo(layout: &RepoLayout) -> Result<TranslationUnit> {
    let shim = MacroShim::install(layout)?;
    let lowered = parse_and_lower(layout);
    let restored = shim.restore();
    let unit = lowered?;
    restored?;
    Ok(unit)
}

fn parse_and_lower(layout: &RepoLayout) -> Result<TranslationUnit> {
    let clang = Clang::new().map_err(|e| anyhow!("libclang is unavailable: {e}"))?;
    let index = Index::new(&clang, false, false);

    let synthetic_path = layout.synthetic_unit();
    let synthetic = synthetic_unit_text();
    let include_dir = format!("-I{}", layout.root.display());
    let arguments = ["-x", "c++", "-std=c++17", include_dir.as_str()];
    let unsaved = [Unsaved::new(&synthetic_path, &synthetic)];

    let mut parser = index.parser(&synthetic_path);
    parser.arguments(&arguments).unsaved(&unsaved);
    let tu = parser
        .parse()
        .map_err(|e| EngineError::ParseDiagnostic(format!("{e:?}")))?;

    // Non-fatal diagnostics are informational; a fatal one aborts before
    // discovery sees anything.
    let mut fatal = None;
    for diagnostic in tu.get_diagnostics() {
        eprintln!("{diagnostic}");
        if diagnostic.get_severity() == Severity::Fatal && fatal.is_none() {
            fatal = Some(diagnostic.get_text());
        }
    }
    if let Some(text) = fatal {
        return Err(EngineError::ParseDiagnostic(text).into());
    }

    Ok(lower(tu.get_entity()))
}

/// Lower the cursor graph into the arena, then resolve the
/// `get_definition` cross-links by cursor identity.
fn lower(root: Entity<'_>) -> TranslationUnit {
    let mut builder = TuBuilder::new();
    let mut memo: HashMap<Entity<'_>, NodeId> = HashMap::new();
    let mut definition_links: Vec<(NodeId, Entity<'_>)> = Vec::new();

    let parent = builder.root();
    for child in root.get_children() {
        lower_entity(child, parent, &mut builder, &mut memo, &mut definition_links);
    }

    let mut unresolved = 0usize;
    for (id, target) in definition_links {
        match memo.get(&target) {
            Some(&definition) => builder.set_definition(id, definition),
            None => unresolved += 1,
        }
    }
    if unresolved > 0 {
        debug!("{unresolved} references resolve outside the lowered unit");
    }

    builder.finish()
}

fn lower_entity<'tu>(
    entity: Entity<'tu>,
    parent: NodeId,
    builder: &mut TuBuilder,
    memo: &mut HashMap<Entity<'tu>, NodeId>,
    definition_links: &mut Vec<(NodeId, Entity<'tu>)>,
) {
    // Nothing in a system header matters to the rewrite.
    if entity
        .get_location()
        .is_some_and(|l| l.is_in_system_header())
    {
        return;
    }

    let id = builder.add(parent, convert(entity));
    memo.insert(entity, id);

    if let Some(definition) = entity.get_definition()
        && definition != entity
    {
        definition_links.push((id, definition));
    }

    for child in entity.get_children() {
        lower_entity(child, id, builder, memo, definition_links);
    }

    // Arguments are lowered as children; link them up afterwards.
    if let Some(arguments) = entity.get_arguments() {
        for argument in arguments {
            if let Some(&arg_id) = memo.get(&argument) {
                builder.add_argument(id, arg_id);
            }
        }
    }
}

fn convert(entity: Entity<'_>) -> Node {
    let kind = map_kind(entity.get_kind());
    let mut node = Node::new(kind, entity.get_name().unwrap_or_default());
    node.mangled_name = entity.get_mangled_name();
    node.is_definition = entity.is_definition();
    node.fq_name = qualified_name(entity);
    node.scope_name = scope_name(entity);

    if let Some(location) = entity.get_location() {
        let loc = location.get_file_location();
        if let Some(file) = loc.file {
            node.location = Some(SourcePos {
                file: file.get_path(),
                line: loc.line,
                column: loc.column,
            });
        }
    }
    node.extent = extent_of(entity);

    match kind {
        CursorKind::FunctionDecl | CursorKind::Method | CursorKind::FunctionTemplate => {
            node.result_type = entity
                .get_type()
                .and_then(|t| t.get_result_type())
                .map(|t| t.get_display_name());
        }
        CursorKind::ParmDecl => {
            node.type_spelling = entity.get_type().map(|t| t.get_display_name());
        }
        _ => {}
    }

    node
}

fn map_kind(kind: EntityKind) -> CursorKind {
    match kind {
        EntityKind::FunctionDecl => CursorKind::FunctionDecl,
        EntityKind::Method => CursorKind::Method,
        EntityKind::FunctionTemplate => CursorKind::FunctionTemplate,
        EntityKind::ParmDecl => CursorKind::ParmDecl,
        EntityKind::CallExpr => CursorKind::CallExpr,
        EntityKind::DeclRefExpr => CursorKind::DeclRefExpr,
        EntityKind::AnnotateAttr => CursorKind::AnnotateAttr,
        EntityKind::Namespace => CursorKind::Namespace,
        EntityKind::ClassDecl => CursorKind::ClassDecl,
        EntityKind::StructDecl => CursorKind::StructDecl,
        _ => CursorKind::Other,
    }
}

/// A single-file extent, or `None` when the parser spreads the range
/// over multiple files (macro-heavy corners).
fn extent_of(entity: Entity<'_>) -> Option<CodeRange> {
    let range = entity.get_range()?;
    let start = range.get_start().get_file_location();
    let end = range.get_end().get_file_location();
    let start_file = start.file?.get_path();
    let end_file = end.file?.get_path();
    if start_file != end_file {
        return None;
    }
    Some(CodeRange::new(
        start_file,
        start.line,
        start.column,
        end.line,
        end.column,
    ))
}

fn qualified_name(entity: Entity<'_>) -> String {
    let mut parts = vec![entity.get_name().unwrap_or_default()];
    let mut current = entity.get_semantic_parent();
    while let Some(parent) = current {
        if parent.get_kind() == EntityKind::TranslationUnit {
            break;
        }
        if let Some(name) = parent.get_name() {
            parts.push(name);
        }
        current = parent.get_semantic_parent();
    }
    parts.reverse();
    parts.join("::")
}

fn scope_name(entity: Entity<'_>) -> Option<String> {
    let parent = entity.get_semantic_parent()?;
    if parent.get_kind() == EntityKind::TranslationUnit {
        return None;
    }
    parent.get_name()?;
    Some(qualified_name(parent))
}

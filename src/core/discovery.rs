//! Discovery pass: walk the parsed unit and build a validated
//! `FunctionEntry` for every in-scope function declaration, method, or
//! function template.
//!
//! Every textual extent an entry depends on is copied out of the ledger
//! and read back for validation here, so later edits cannot invalidate
//! the analysis.

use tracing::{debug, warn};

use crate::core::error::EngineError;
use crate::core::ledger::SourceLedger;
use crate::core::locator::SymbolLocator;
use crate::core::model::{
    CodeRange, FunctionEntry, FunctionId, FunctionKind, FunctionParameter, format_type_name,
};
use crate::infra::config::{Config, RepoLayout};
use crate::parsers::tu::{CursorKind, Descend, Node, NodeId, TranslationUnit};

/// Cursor kinds that introduce a function.
pub const FUNCTION_KINDS: &[CursorKind] = &[
    CursorKind::FunctionDecl,
    CursorKind::Method,
    CursorKind::FunctionTemplate,
];

/// The stable identity of a function node: its mangled name, or the
/// qualified name for the special templates that have none.
pub fn function_id(node: &Node, config: &Config) -> Option<FunctionId> {
    if let Some(mangled) = &node.mangled_name
        && !mangled.is_empty()
    {
        return Some(FunctionId::new(mangled.clone()));
    }
    if config.is_special_template(&node.fq_name) {
        return Some(FunctionId::new(node.fq_name.clone()));
    }
    None
}

/// Collect one entry per declaration or definition. Cursors outside the
/// target sources, blacklisted names, and unaddressable instantiations
/// are dropped.
pub fn discover(
    tu: &TranslationUnit,
    ledger: &SourceLedger,
    config: &Config,
    layout: &RepoLayout,
) -> Result<Vec<FunctionEntry>, EngineError> {
    let locator = SymbolLocator::new(ledger);
    let mut entries = Vec::new();
    let mut failure: Option<EngineError> = None;

    tu.visit(tu.root(), Some(FUNCTION_KINDS), &mut |unit, id, _stack| {
        if failure.is_some() {
            return Descend::Skip;
        }
        let node = unit.node(id);
        let Some(location) = &node.location else {
            return Descend::Skip;
        };
        if !layout.is_source(&location.file) {
            return Descend::Skip;
        }
        if config.is_blacklisted(&node.spelling) {
            return Descend::Skip;
        }
        let Some(function_id) = function_id(node, config) else {
            debug!(
                "no mangled name for {} at {}:{}",
                node.spelling,
                location.file.display(),
                location.line
            );
            return Descend::Skip;
        };

        match build_entry(unit, id, function_id, ledger, &locator) {
            Ok(entry) => entries.push(entry),
            Err(e) => failure = Some(e),
        }
        Descend::Skip
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(entries),
    }
}

fn build_entry(
    tu: &TranslationUnit,
    id: NodeId,
    function_id: FunctionId,
    ledger: &SourceLedger,
    locator: &SymbolLocator<'_>,
) -> Result<FunctionEntry, EngineError> {
    let node = tu.node(id);
    let location = node.location.as_ref().ok_or_else(|| {
        EngineError::InvariantViolation(format!("{} has no location", node.spelling))
    })?;

    let annotations = read_annotations(tu, id, locator);
    let params = read_params(tu, id, ledger)?;
    let imgui_context_arg = params.iter().position(|p| p.ty == "ImGuiContext*");

    let kind = match node.kind {
        CursorKind::Method => FunctionKind::Method,
        CursorKind::FunctionTemplate => FunctionKind::Template,
        _ => FunctionKind::Free,
    };
    let method_class = if kind == FunctionKind::Method {
        node.scope_name.clone()
    } else {
        None
    };

    let code_range = CodeRange::from_token(
        location.file.clone(),
        location.line,
        location.column,
        node.spelling.len(),
    );

    let (fmtargs, fmtargs_range) = annotations.fmtargs.map_or((0, None), |(n, r)| (n, r));
    let (fmtlist, fmtlist_range) = annotations.fmtlist.map_or((0, None), |(n, r)| (n, r));

    let entry = FunctionEntry {
        id: function_id,
        name: node.spelling.clone(),
        fq_name: node.fq_name.clone(),
        return_type: format_type_name(node.result_type.as_deref().unwrap_or("")),
        params,
        code_range,
        kind,
        method_class,
        is_api: annotations.is_api,
        is_definition: node.is_definition,
        fmtargs,
        fmtlist,
        fmtargs_range,
        fmtlist_range,
        implicit_contexts: find_implicit_contexts(tu, id, locator)?,
        imgui_context_arg,
        need_context_param: false,
    };

    validate_entry(&entry, ledger)?;
    Ok(entry)
}

#[derive(Default)]
struct Annotations {
    is_api: bool,
    fmtargs: Option<(u32, Option<CodeRange>)>,
    fmtlist: Option<(u32, Option<CodeRange>)>,
}

/// Read the annotate-attribute children injected by the macro shim:
/// the API marker and the `IM_FMTARGS(n)` / `IM_FMTLIST(n)` indices,
/// together with where `n` lives in the source.
fn read_annotations(tu: &TranslationUnit, id: NodeId, locator: &SymbolLocator<'_>) -> Annotations {
    let mut out = Annotations::default();
    for &child in &tu.node(id).children {
        let node = tu.node(child);
        if node.kind != CursorKind::AnnotateAttr {
            continue;
        }
        if node.spelling == "imgui_api" {
            out.is_api = true;
        } else if let Some(rest) = node.spelling.strip_prefix("IM_FMTARGS") {
            out.fmtargs = parse_fmt_annotation(rest, "IM_FMTARGS", node, locator);
        } else if let Some(rest) = node.spelling.strip_prefix("IM_FMTLIST") {
            out.fmtlist = parse_fmt_annotation(rest, "IM_FMTLIST", node, locator);
        }
    }
    out
}

fn parse_fmt_annotation(
    rest: &str,
    macro_name: &str,
    node: &Node,
    locator: &SymbolLocator<'_>,
) -> Option<(u32, Option<CodeRange>)> {
    let n: u32 = rest
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim()
        .parse()
        .ok()?;
    Some((n, find_fmt_number(macro_name, n, node, locator)))
}

/// Recover the source range of the integer inside `IM_FMTARGS(n)` by
/// scanning from the attribute's expansion site.
fn find_fmt_number(
    macro_name: &str,
    n: u32,
    node: &Node,
    locator: &SymbolLocator<'_>,
) -> Option<CodeRange> {
    let loc = node.location.as_ref()?;
    let open = locator.find_symbol(&loc.file, loc.line, loc.column, &format!("{macro_name}("))?;
    let mut range = locator.find_until(&loc.file, loc.line, open.end_column, ')')?;
    range.end_column -= 1; // keep the digits, drop the ')'
    if range.width() != n.to_string().len() {
        warn!(
            "could not pin the {macro_name} index at {}:{}; renumbering skipped",
            loc.file.display(),
            loc.line
        );
        return None;
    }
    Some(range)
}

/// Copy the exact declaration text of every parameter out of the ledger.
fn read_params(
    tu: &TranslationUnit,
    id: NodeId,
    ledger: &SourceLedger,
) -> Result<Vec<FunctionParameter>, EngineError> {
    let node = tu.node(id);
    let mut params = Vec::with_capacity(node.arguments.len());
    for &arg in &node.arguments {
        let arg_node = tu.node(arg);
        let extent = arg_node.extent.as_ref().ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "parameter {} of {} has no extent",
                arg_node.spelling, node.spelling
            ))
        })?;
        let declaration = ledger.get_text(extent)?.to_string();
        let ty = arg_node.type_spelling.as_deref().unwrap_or("");
        params.push(
            FunctionParameter::new(arg_node.spelling.clone(), ty, Some(declaration))
                .with_range(extent.clone()),
        );
    }
    Ok(params)
}

/// Scan the body for references named `GImGui`, recovering a width via
/// the locator whenever the parser reports a zero-width extent.
fn find_implicit_contexts(
    tu: &TranslationUnit,
    id: NodeId,
    locator: &SymbolLocator<'_>,
) -> Result<Vec<CodeRange>, EngineError> {
    let mut ranges = Vec::new();
    let mut failure: Option<EngineError> = None;

    tu.visit(id, None, &mut |unit, child, _stack| {
        let node = unit.node(child);
        if node.spelling != "GImGui" {
            return Descend::Children;
        }
        match resolve_gimgui_range(node, locator) {
            Ok(range) => ranges.push(range),
            Err(e) => failure = Some(e),
        }
        Descend::Skip
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(ranges),
    }
}

fn resolve_gimgui_range(
    node: &Node,
    locator: &SymbolLocator<'_>,
) -> Result<CodeRange, EngineError> {
    if let Some(extent) = &node.extent
        && extent.is_single_line()
        && extent.width() > 0
    {
        return Ok(extent.clone());
    }
    let loc = node.location.as_ref().ok_or_else(|| {
        EngineError::InvariantViolation("global context reference without a location".to_string())
    })?;
    locator
        .find_symbol(&loc.file, loc.line, loc.column, "GImGui")
        .ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "GImGui reported at {}:{}:{} but not found in the line",
                loc.file.display(),
                loc.line,
                loc.column
            ))
        })
}

/// The recovered name token and every context reference must read back to
/// their expected literal text.
fn validate_entry(entry: &FunctionEntry, ledger: &SourceLedger) -> Result<(), EngineError> {
    let name = ledger.get_text(&entry.code_range)?;
    if name != entry.name {
        return Err(EngineError::InvariantViolation(format!(
            "name token of {} at {} reads `{name}`",
            entry.fq_name, entry.code_range
        )));
    }
    for range in &entry.implicit_contexts {
        let text = ledger.get_text(range)?;
        if text != "GImGui" {
            return Err(EngineError::InvariantViolation(format!(
                "context reference at {range} reads `{text}`"
            )));
        }
    }
    Ok(())
}

//! Call-graph pass: resolve every call expression inside the discovered
//! function bodies to a database entry, recovering the exact call-site
//! name token from the ledger.

use aho_corasick::{AhoCorasick, MatchKind};
use tracing::{debug, warn};

use crate::core::database::FunctionDatabase;
use crate::core::discovery::{FUNCTION_KINDS, function_id};
use crate::core::error::EngineError;
use crate::core::ledger::SourceLedger;
use crate::core::locator::SymbolLocator;
use crate::core::model::{CodeRange, FunctionId, LogCall};
use crate::infra::config::{Config, RepoLayout};
use crate::parsers::tu::{CursorKind, Descend, Node, NodeId, TranslationUnit};

/// Record one `CallEntry` per resolvable call site, plus the parallel set
/// of debug-log macro invocations.
pub fn collect_calls(
    tu: &TranslationUnit,
    ledger: &SourceLedger,
    config: &Config,
    layout: &RepoLayout,
    db: &mut FunctionDatabase,
) -> Result<(), EngineError> {
    let locator = SymbolLocator::new(ledger);
    let log_scan = AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(&config.log_macros)
        .map_err(|e| EngineError::InvariantViolation(format!("log macro set: {e}")))?;

    // Two passes keep the borrows simple: gather the function nodes, then
    // walk each body.
    let mut functions: Vec<NodeId> = Vec::new();
    tu.visit(tu.root(), Some(FUNCTION_KINDS), &mut |_, id, _| {
        functions.push(id);
        Descend::Skip
    });

    for function in functions {
        let node = tu.node(function);
        let Some(location) = &node.location else {
            continue;
        };
        if !layout.is_source(&location.file) || config.is_blacklisted(&node.spelling) {
            continue;
        }
        let Some(caller) = function_id(node, config) else {
            continue;
        };
        if !db.is_known(caller.as_str()) {
            continue;
        }

        let mut failure: Option<EngineError> = None;
        tu.visit(function, Some(&[CursorKind::CallExpr]), &mut |unit, id, _| {
            if failure.is_none()
                && let Err(e) =
                    record_call(unit, id, &caller, ledger, config, layout, db, &locator, &log_scan)
            {
                failure = Some(e);
            }
            // Nested calls live inside argument lists; keep walking.
            Descend::Children
        });
        if let Some(e) = failure {
            return Err(e);
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn record_call(
    tu: &TranslationUnit,
    id: NodeId,
    caller: &FunctionId,
    ledger: &SourceLedger,
    config: &Config,
    layout: &RepoLayout,
    db: &mut FunctionDatabase,
    locator: &SymbolLocator<'_>,
    log_scan: &AhoCorasick,
) -> Result<(), EngineError> {
    let node = tu.node(id);
    let Some(location) = &node.location else {
        return Ok(());
    };
    if !layout.is_source(&location.file) {
        return Ok(());
    }

    // The debug-log macros expand to a DebugLog call; the macro name on
    // the line is what actually gets rewritten.
    if node.spelling == "DebugLog" {
        record_log_call(node, caller, ledger, db, locator, log_scan);
        return Ok(());
    }

    if config.is_blacklisted(&node.spelling) {
        return Ok(());
    }
    let Some(definition) = node.definition.map(|d| tu.node(d)) else {
        debug!(
            "cannot resolve the callee of {} at {}:{}",
            node.spelling,
            location.file.display(),
            location.line
        );
        return Ok(());
    };
    let in_scope = definition
        .location
        .as_ref()
        .is_some_and(|l| layout.is_source(&l.file));
    if !in_scope || config.is_blacklisted(&definition.spelling) {
        return Ok(());
    }
    let Some(callee) = function_id(definition, config) else {
        return Ok(());
    };

    let range = if config.is_special_template(&definition.fq_name) {
        // The call name includes the template-argument brackets; scan to
        // the opening parenthesis.
        let Some(mut r) =
            locator.find_until(&location.file, location.line, location.column, '(')
        else {
            debug!(
                "{} cannot be found at {}:{}:{}",
                node.spelling,
                location.file.display(),
                location.line,
                location.column
            );
            return Ok(());
        };
        r.end_column -= 1;
        r
    } else {
        let needle = format!("{}(", node.spelling);
        let Some(mut r) =
            locator.find_symbol(&location.file, location.line, location.column, &needle)
        else {
            debug!(
                "{} cannot be found at {}:{}:{}",
                node.spelling,
                location.file.display(),
                location.line,
                location.column
            );
            return Ok(());
        };
        r.end_column -= 1;
        let text = ledger.get_text(&r)?;
        if text != node.spelling {
            return Err(EngineError::InvariantViolation(format!(
                "call token at {r} reads `{text}`, expected `{}`",
                node.spelling
            )));
        }
        r
    };
    let call_name = ledger.get_text(&range)?.to_string();

    let has_args = peek_arguments(&range, locator)?;
    db.add_call(caller, &callee, range, call_name, has_args)
}

/// The two characters after the name decide between `()` and `( …`.
fn peek_arguments(range: &CodeRange, locator: &SymbolLocator<'_>) -> Result<bool, EngineError> {
    let peeked = locator.peek(&range.file, range.start_line, range.end_column, 2);
    if !peeked.starts_with('(') {
        return Err(EngineError::InvariantViolation(format!(
            "call at {range} is not followed by an argument list (found `{peeked}`)"
        )));
    }
    Ok(peeked != "()")
}

fn record_log_call(
    node: &Node,
    caller: &FunctionId,
    ledger: &SourceLedger,
    db: &mut FunctionDatabase,
    locator: &SymbolLocator<'_>,
    log_scan: &AhoCorasick,
) {
    let Some(location) = &node.location else {
        return;
    };
    let Ok(line) = ledger.line(&location.file, location.line) else {
        return;
    };
    let Some(hit) = log_scan.find(line) else {
        warn!(
            "DebugLog expansion at {}:{} without a known macro name",
            location.file.display(),
            location.line
        );
        return;
    };
    let name = &line[hit.start()..hit.end()];
    let range = CodeRange::from_token(
        location.file.clone(),
        location.line,
        hit.start() as u32 + 1,
        name.len(),
    );
    let has_args = locator
        .peek(&range.file, range.start_line, range.end_column, 2)
        .strip_prefix('(')
        .is_some_and(|rest| rest != ")");
    db.add_log_call(LogCall {
        caller: caller.clone(),
        code_range: range,
        name: name.to_string(),
        has_args,
    });
}

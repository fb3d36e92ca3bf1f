//! Edit planner: turn the closure result into typed per-line edit
//! requests against the ledger.
//!
//! Three families of edits, in the same order the analysis produced
//! them: global-context replacements in bodies, prototype/parameter
//! rewrites at declaration and definition sites, and call-site forwards
//! (including the debug-log macros, which always need the context).

use serde::Serialize;
use tracing::debug;

use crate::core::database::FunctionDatabase;
use crate::core::error::EngineError;
use crate::core::ledger::{EditRequest, SourceLedger};
use crate::core::model::FunctionEntry;
use crate::infra::config::Config;

/// Counters for the run summary.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PlanStats {
    pub context_replacements: usize,
    pub prototype_rewrites: usize,
    pub parameter_rewrites: usize,
    pub fmt_renumbers: usize,
    pub call_forwards: usize,
    pub log_forwards: usize,
}

impl PlanStats {
    pub fn total(&self) -> usize {
        self.context_replacements
            + self.prototype_rewrites
            + self.parameter_rewrites
            + self.fmt_renumbers
            + self.call_forwards
            + self.log_forwards
    }
}

/// The variable a function body forwards: methods of context-carrying
/// classes use their `Ctx` member, everything else the new `ctx`
/// parameter.
fn forward_var(entry: &FunctionEntry, config: &Config) -> &'static str {
    if entry.is_ctx_class_method(&config.classes_with_context) {
        "Ctx"
    } else {
        "ctx"
    }
}

pub fn plan_edits(
    db: &FunctionDatabase,
    config: &Config,
    ledger: &mut SourceLedger,
) -> Result<PlanStats, EngineError> {
    let mut stats = PlanStats::default();

    // Remove the global context from bodies.
    for def in db.definitions() {
        let var = forward_var(def, config);
        for range in &def.implicit_contexts {
            ledger.request_edit(
                &range.file,
                range.start_line,
                EditRequest::context_replace(range, var),
            )?;
            debug!("replace `GImGui` with `{var}` in {} at {range}", def.fq_name);
            stats.context_replacements += 1;
        }
    }

    // Add the context parameter at every declaration and definition site.
    for entry in db.rewrite_targets() {
        if !entry.need_context_param {
            continue;
        }
        match entry.imgui_context_arg {
            Some(index) => {
                // Already takes a context; only its name may need fixing.
                let param = &entry.params[index];
                if param.name != "ctx"
                    && let Some(range) = &param.code_range
                {
                    ledger.request_edit(
                        &range.file,
                        range.start_line,
                        EditRequest::parameter(range, &param.declaration),
                    )?;
                    debug!("rename context parameter of {} at {range}", entry.fq_name);
                    stats.parameter_rewrites += 1;
                }
            }
            None => {
                let range = &entry.code_range;
                ledger.request_edit(
                    &range.file,
                    range.start_line,
                    EditRequest::prototype(range, &entry.name, entry.param_count() > 0),
                )?;
                debug!("add `ImGuiContext* ctx` to {} at {range}", entry.fq_name);
                stats.prototype_rewrites += 1;
            }
        }

        // The added parameter shifts the variadic argument index on
        // annotated declarations.
        if !entry.is_definition {
            for (n, range) in [
                (entry.fmtargs, &entry.fmtargs_range),
                (entry.fmtlist, &entry.fmtlist_range),
            ] {
                if n > 0
                    && let Some(range) = range
                {
                    ledger.request_edit(
                        &range.file,
                        range.start_line,
                        EditRequest::renumber(range, n),
                    )?;
                    stats.fmt_renumbers += 1;
                }
            }
        }
    }

    // Forward the context through every call whose callee gained it.
    for call in db.calls() {
        let Some(callee) = db.definition(&call.callee) else {
            continue;
        };
        if !callee.need_context_param || callee.imgui_context_arg.is_some() {
            continue;
        }
        let Some(caller) = db.definition(&call.caller) else {
            continue;
        };
        let var = forward_var(caller, config);
        let range = &call.code_range;
        ledger.request_edit(
            &range.file,
            range.start_line,
            EditRequest::call(range, &call.call_name, var, call.has_args),
        )?;
        debug!("forward `{var}` to {} at {range}", callee.fq_name);
        stats.call_forwards += 1;
    }

    // The log macros always expand to a context-needing call.
    for log_call in db.log_calls() {
        let var = db
            .definition(&log_call.caller)
            .map_or("ctx", |caller| forward_var(caller, config));
        let range = &log_call.code_range;
        ledger.request_edit(
            &range.file,
            range.start_line,
            EditRequest::call(range, &log_call.name, var, log_call.has_args),
        )?;
        stats.log_forwards += 1;
    }

    Ok(stats)
}

//! The `convert` subcommand: parse, analyze, plan, emit, and optionally
//! commit, strictly in that order.

use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::debug;

use crate::cli::{AppContext, ConvertArgs};
use crate::core::callgraph::collect_calls;
use crate::core::database::FunctionDatabase;
use crate::core::discovery::discover;
use crate::core::emitter::{EmitOptions, EmitReport, emit};
use crate::core::ledger::SourceLedger;
use crate::core::planner::{PlanStats, plan_edits};
use crate::core::{compat, git};
use crate::infra::config::{RepoLayout, load_config};
use crate::parsers::cpp_parser;

/// Run summary, printed human-readable or as one JSON line.
#[derive(Debug, Serialize)]
struct ConvertReport {
    functions: usize,
    calls: usize,
    #[serde(flatten)]
    stats: PlanStats,
    #[serde(flatten)]
    emit: EmitReport,
}

pub fn run(args: ConvertArgs, ctx: &AppContext) -> Result<()> {
    // 1) Resolve and sanity-check the checkout
    let repository = shellexpand::full(&args.repository.to_string_lossy())
        .context("Failed to expand the repository path")?
        .into_owned();
    let layout = RepoLayout::new(std::path::Path::new(&repository));
    layout.ensure_inputs()?;
    let config = load_config(&layout.root)?;

    // 2) Parse the synthetic unit (headers shimmed for the duration)
    if !ctx.quiet {
        println!("Parsing {} ...", layout.root.display());
    }
    let tu = cpp_parser::parse_repo(&layout)?;
    debug!("lowered {} cursors", tu.len());

    if args.dump_test_ast {
        let dump_path = layout.root.join("test_ast_dump.txt");
        let mut out = BufWriter::new(
            File::create(&dump_path)
                .with_context(|| format!("Failed to create {}", dump_path.display()))?,
        );
        tu.dump(&mut out)?;
        if !ctx.quiet {
            println!("Wrote cursor tree to {}", dump_path.display());
        }
    }

    // 3) Load the sources and run the passes in dependency order
    let mut ledger = SourceLedger::load(&layout.source_set())?;
    let entries = discover(&tu, &ledger, &config, &layout)?;
    let mut db = FunctionDatabase::build(entries, &layout.demo_unit)?;
    collect_calls(&tu, &ledger, &config, &layout, &mut db)?;
    db.compute_context_need(&config.classes_with_context);

    if args.dump_callgraph {
        println!("{}", db.to_dot());
        return Ok(());
    }

    // 4) Plan every edit, then generate the compatibility layer
    let stats = plan_edits(&db, &config, &mut ledger)?;
    let apis = db.public_apis(&layout.public_header);
    let header_block = compat::render_header_block(&apis);
    let implicit_unit = compat::render_implicit_unit(&apis);

    // 5) Single flush phase; a dry run only prints diffs
    let options = EmitOptions {
        apply: args.apply,
        include_demo: args.include_demo,
    };
    let emit_report = emit(&ledger, &layout, &options, &header_block, &implicit_unit, ctx)?;

    let report = ConvertReport {
        functions: db.definitions().count(),
        calls: db.calls().count(),
        stats,
        emit: emit_report,
    };

    if args.json {
        println!("{}", serde_json::to_string(&report)?);
    } else if !ctx.quiet {
        print_summary(&report, ctx);
    }

    // 6) Optional commit, only after a real apply
    if args.apply && args.commit {
        git::commit_generated(&layout.root, ctx)?;
    }

    Ok(())
}

fn print_summary(report: &ConvertReport, ctx: &AppContext) {
    let headline = format!(
        "{} functions, {} calls in scope",
        report.functions, report.calls
    );
    if ctx.no_color {
        println!("{headline}");
    } else {
        println!("{}", headline.bold());
    }
    println!(
        "  context replacements: {}",
        report.stats.context_replacements
    );
    println!("  prototype rewrites:   {}", report.stats.prototype_rewrites);
    println!("  parameter rewrites:   {}", report.stats.parameter_rewrites);
    println!("  fmt renumberings:     {}", report.stats.fmt_renumbers);
    println!("  call forwards:        {}", report.stats.call_forwards);
    println!("  log-macro forwards:   {}", report.stats.log_forwards);

    let verb = if report.emit.applied {
        "wrote"
    } else {
        "would write"
    };
    println!(
        "{} {} files ({} unchanged)",
        verb,
        report.emit.written.len(),
        report.emit.unchanged.len()
    );
}

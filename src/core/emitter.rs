//! Emitter: replay the planned edits, rewrite the namespace spellings,
//! append the generated compatibility artifacts, and write everything
//! back in one deterministic flush.
//!
//! Nothing is opened for writing on a dry run; files whose bytes would
//! not change are skipped, which is what makes a rerun over an already
//! converted tree report zero writes.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use regex::Regex;
use serde::Serialize;
use similar::TextDiff;
use xxhash_rust::xxh64::xxh64;

use crate::cli::AppContext;
use crate::core::compat::IMPLICIT_API_GUARD;
use crate::core::ledger::SourceLedger;
use crate::infra::config::RepoLayout;
use crate::infra::io::write_text;

/// Rewrites `namespace ImGui` and `ImGui::` to the explicit-context
/// namespace. Word boundaries keep a second pass from touching the
/// already rewritten spellings.
pub struct NamespaceRewriter {
    namespace_decl: Regex,
    qualifier: Regex,
}

impl NamespaceRewriter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            namespace_decl: Regex::new(r"\bnamespace ImGui\b").context("namespace pattern")?,
            qualifier: Regex::new(r"\bImGui::").context("qualifier pattern")?,
        })
    }

    pub fn rewrite(&self, content: &str) -> String {
        let pass = self.namespace_decl.replace_all(content, "namespace ImGuiEx");
        self.qualifier.replace_all(&pass, "ImGuiEx::").into_owned()
    }

    /// Like `rewrite`, but leaves a previously appended implicit-API
    /// block untouched: the wrappers in there are deliberately declared
    /// in the original namespace.
    fn rewrite_outside_implicit_block(&self, content: &str) -> String {
        match content.find(IMPLICIT_API_GUARD) {
            Some(guard) => {
                let head = content[..guard].rfind('\n').map_or(0, |nl| nl + 1);
                let mut out = self.rewrite(&content[..head]);
                out.push_str(&content[head..]);
                out
            }
            None => self.rewrite(content),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct EmitReport {
    /// Files written (or, on a dry run, that would be written).
    pub written: Vec<PathBuf>,
    /// Files whose content came out byte-identical.
    pub unchanged: Vec<PathBuf>,
    pub applied: bool,
}

pub struct EmitOptions {
    pub apply: bool,
    pub include_demo: bool,
}

/// Flush the ledger into the repository. The public header additionally
/// receives the guarded implicit-API block; the generated definitions
/// unit is written next to it.
pub fn emit(
    ledger: &SourceLedger,
    layout: &RepoLayout,
    options: &EmitOptions,
    header_block: &str,
    implicit_unit: &str,
    ctx: &AppContext,
) -> Result<EmitReport> {
    let rewriter = NamespaceRewriter::new()?;
    let mut report = EmitReport {
        applied: options.apply,
        ..EmitReport::default()
    };

    for path in layout.write_set(options.include_demo) {
        let mut content =
            rewriter.rewrite_outside_implicit_block(&ledger.transform_file(&path)?);
        if path == layout.public_header && !content.contains(IMPLICIT_API_GUARD) {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(header_block);
        }

        if xxh64(content.as_bytes(), 0) == ledger.fingerprint(&path)? {
            report.unchanged.push(path);
            continue;
        }

        if options.apply {
            write_text(&path, &content)?;
        } else if !ctx.quiet {
            print_diff(&ledger.original_file(&path)?, &content, &path, ctx);
        }
        report.written.push(path);
    }

    // The compatibility unit is generated wholesale; compare against what
    // is on disk so converged reruns stay silent.
    let implicit_path = layout.implicit_unit();
    let existing = fs::read_to_string(&implicit_path).ok();
    if existing.as_deref() == Some(implicit_unit) {
        report.unchanged.push(implicit_path);
    } else {
        if options.apply {
            write_text(&implicit_path, implicit_unit)?;
        } else if !ctx.quiet {
            print_diff(
                existing.as_deref().unwrap_or(""),
                implicit_unit,
                &implicit_path,
                ctx,
            );
        }
        report.written.push(implicit_path);
    }

    Ok(report)
}

fn print_diff(old: &str, new: &str, path: &std::path::Path, ctx: &AppContext) {
    let diff = TextDiff::from_lines(old, new);
    let header = format!("--- a/{0}\n+++ b/{0}", path.display());
    if ctx.no_color {
        println!("{header}");
    } else {
        println!("{}", header.bold());
    }
    print!(
        "{}",
        diff.unified_diff()
            .context_radius(3)
            .missing_newline_hint(false)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_rewrite_is_word_bounded_and_idempotent() {
        let rewriter = NamespaceRewriter::new().unwrap();
        let input = "namespace ImGui\n{\nvoid Foo() { ImGui::Text(\"x\"); }\n}\n";
        let once = rewriter.rewrite(input);
        assert_eq!(
            once,
            "namespace ImGuiEx\n{\nvoid Foo() { ImGuiEx::Text(\"x\"); }\n}\n"
        );

        // A second application must leave the rewritten spellings alone.
        assert_eq!(rewriter.rewrite(&once), once);
    }

    #[test]
    fn the_appended_implicit_block_is_exempt_from_rewriting() {
        let rewriter = NamespaceRewriter::new().unwrap();
        let converted = "\
namespace ImGuiEx\n{\nvoid NewFrame(ImGuiContext* ctx);\n}\n\n\
#ifndef IMGUI_DISABLE_IMPLICIT_API\nnamespace ImGui\n{\nvoid NewFrame();\n}\n\
#endif // #ifndef IMGUI_DISABLE_IMPLICIT_API\n";
        // A rerun over the converted header must not touch the block's
        // deliberate `namespace ImGui`.
        assert_eq!(rewriter.rewrite_outside_implicit_block(converted), converted);

        let fresh = "namespace ImGui\n{\nvoid NewFrame();\n}\n";
        assert_eq!(
            rewriter.rewrite_outside_implicit_block(fresh),
            "namespace ImGuiEx\n{\nvoid NewFrame();\n}\n"
        );
    }

    #[test]
    fn unrelated_identifiers_survive() {
        let rewriter = NamespaceRewriter::new().unwrap();
        let input = "ImGuiContext* ctx; ImGuiWindow* w; // ImGuiEx::Text stays\n";
        assert_eq!(rewriter.rewrite(input), input);
    }

    #[test]
    fn flush_skips_untouched_files_and_appends_the_header_block() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RepoLayout::new(dir.path());
        for path in layout.source_set() {
            fs::write(&path, "// placeholder\n").unwrap();
        }
        fs::write(
            &layout.public_header,
            "namespace ImGui\n{\nvoid Foo();\n}\n",
        )
        .unwrap();

        let ledger = SourceLedger::load(&layout.source_set()).unwrap();
        let ctx = AppContext {
            quiet: true,
            no_color: true,
        };
        let options = EmitOptions {
            apply: true,
            include_demo: false,
        };
        let header_block = "\n#ifndef IMGUI_DISABLE_IMPLICIT_API\n#endif\n";
        let report = emit(&ledger, &layout, &options, header_block, "// unit\n", &ctx).unwrap();

        // Only the header (namespace + block) and the generated unit
        // change; the placeholder sources are untouched.
        assert!(report.written.contains(&layout.public_header));
        assert!(report.written.contains(&layout.implicit_unit()));
        assert_eq!(report.written.len(), 2);
        assert!(!report.unchanged.is_empty());

        let header = fs::read_to_string(&layout.public_header).unwrap();
        assert!(header.starts_with("namespace ImGuiEx\n"));
        assert!(header.ends_with(header_block));
        assert_eq!(
            fs::read_to_string(layout.implicit_unit()).unwrap(),
            "// unit\n"
        );

        // Second emission over the converted tree is a no-op.
        let ledger = SourceLedger::load(&layout.source_set()).unwrap();
        let report = emit(&ledger, &layout, &options, header_block, "// unit\n", &ctx).unwrap();
        assert!(report.written.is_empty());
    }

    #[test]
    fn dry_run_never_writes() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RepoLayout::new(dir.path());
        for path in layout.source_set() {
            fs::write(&path, "namespace ImGui { }\n").unwrap();
        }

        let ledger = SourceLedger::load(&layout.source_set()).unwrap();
        let ctx = AppContext {
            quiet: true,
            no_color: true,
        };
        let options = EmitOptions {
            apply: false,
            include_demo: false,
        };
        let report = emit(&ledger, &layout, &options, "\n#ifndef X\n", "// unit\n", &ctx).unwrap();

        assert!(!report.written.is_empty());
        assert!(!layout.implicit_unit().exists());
        for path in layout.source_set() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "namespace ImGui { }\n");
        }
    }
}

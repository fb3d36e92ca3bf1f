//! Git integration: the `[generated]` conversion commit, the rebase
//! driver that re-runs the converter in place of old generated commits,
//! and the todo-list transformer the rebase hooks in as sequence editor.

use std::io::Read;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use regex::Regex;

use crate::cli::{AppContext, RebaseArgs, RtransformArgs};
use crate::core::error::EngineError;
use crate::infra::io::normalize_path;

/// First line of the generated commit; the rebase transform matches on
/// this prefix.
pub const GENERATED_MARKER: &str = "[generated]";

const COMMIT_SUBJECT: &str =
    "[generated] Convert Dear ImGui API to use an explicit ImGuiContext.";

fn commit_message() -> String {
    format!(
        "{COMMIT_SUBJECT}\n\n\
         Produced by `imex convert --apply --commit`: every function that\n\
         read the global context now takes ImGuiContext* as its first\n\
         parameter, and the previous signatures live on in the generated\n\
         implicit-context layer. Re-running the converter on this tree is\n\
         a no-op."
    )
}

fn run_git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("Failed to spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(EngineError::GitFailure {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Commit the converted tree with the fixed marker message.
pub fn commit_generated(root: &Path, ctx: &AppContext) -> Result<()> {
    run_git(root, &["add", "-A"])?;
    run_git(root, &["commit", "-m", &commit_message()])?;
    if !ctx.quiet {
        println!("Created commit: {COMMIT_SUBJECT}");
    }
    Ok(())
}

/// Drive `git rebase -i`, replacing every generated commit by an `exec`
/// that re-runs the converter on the checked-out tree. On failure the
/// rebase is aborted so the branch is left where it started.
pub fn rebase_run(args: RebaseArgs, ctx: &AppContext) -> Result<()> {
    let root = normalize_path(&args.repository);
    let exe = std::env::current_exe().context("Failed to locate the running binary")?;
    let convert_line = format!(
        "{} convert {} --apply --commit",
        exe.display(),
        root.display()
    );
    // git hands the sequence editor the todo path as its last argument;
    // rtransform rewrites that file in place.
    let sequence_editor = format!("{} rtransform --exec '{}'", exe.display(), convert_line);

    let mut rebase: Vec<&str> = vec!["rebase", "-i"];
    if let Some(onto) = &args.onto {
        rebase.extend(["--onto", onto.as_str()]);
    }
    match &args.base {
        Some(base) => rebase.push(base.as_str()),
        None => rebase.push("--root"),
    }
    rebase.push(args.branch.as_str());

    let status = Command::new("git")
        .args(&rebase)
        .env("GIT_SEQUENCE_EDITOR", &sequence_editor)
        .current_dir(&root)
        .status()
        .context("Failed to spawn git rebase")?;

    if !status.success() {
        let _ = run_git(&root, &["rebase", "--abort"]);
        return Err(EngineError::GitFailure {
            command: rebase.join(" "),
            stderr: "interactive rebase failed; aborted".to_string(),
        }
        .into());
    }

    if !ctx.quiet {
        println!("Rebased {} with regenerated conversion commits", args.branch);
    }
    Ok(())
}

/// Rewrite a rebase todo list: picks of `[generated]` commits become an
/// `exec` of the given command; everything else passes through verbatim.
pub fn transform_todo(todo: &str, exec_line: &str) -> String {
    let pick = Regex::new(r"^(?:p|pick)\s+\S+\s+(.*)$").expect("static todo pattern");
    let mut out = String::with_capacity(todo.len());
    for line in todo.lines() {
        let replaced = pick
            .captures(line)
            .is_some_and(|c| c[1].starts_with(GENERATED_MARKER));
        if replaced {
            out.push_str("exec ");
            out.push_str(exec_line);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// The internal sequence-editor entry point: rewrite the todo file in
/// place, or act as a stdin-to-stdout filter when no file is given.
pub fn rtransform_run(args: RtransformArgs, _ctx: &AppContext) -> Result<()> {
    match &args.todo_file {
        Some(path) => {
            let todo = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read todo file {}", path.display()))?;
            let rewritten = transform_todo(&todo, &args.exec);
            std::fs::write(path, rewritten)
                .with_context(|| format!("Failed to rewrite {}", path.display()))?;
        }
        None => {
            let mut todo = String::new();
            std::io::stdin()
                .read_to_string(&mut todo)
                .context("Failed to read the todo list from stdin")?;
            print!("{}", transform_todo(&todo, &args.exec));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_picks_become_execs() {
        let todo = "\
pick 1a2b3c4 [generated] Convert Dear ImGui API to use an explicit ImGuiContext.
pick 5d6e7f8 Fix docking regression
p 9a8b7c6 [generated] Convert Dear ImGui API to use an explicit ImGuiContext.

# Rebase 123..456 onto 789 (3 commands)
";
        let out = transform_todo(todo, "imex convert /repo --apply --commit");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "exec imex convert /repo --apply --commit");
        assert_eq!(lines[1], "pick 5d6e7f8 Fix docking regression");
        assert_eq!(lines[2], "exec imex convert /repo --apply --commit");
        assert_eq!(lines[3], "");
        assert!(lines[4].starts_with("# Rebase"));
    }

    #[test]
    fn non_generated_picks_pass_through() {
        let todo = "pick abc123 [wip] not generated\nsquash def456 tweak\n";
        assert_eq!(transform_todo(todo, "x"), todo);
    }

    #[test]
    fn commit_message_leads_with_the_marker() {
        let message = commit_message();
        assert!(message.starts_with(GENERATED_MARKER));
        assert_eq!(message.lines().next().unwrap(), COMMIT_SUBJECT);
        assert_eq!(message.lines().nth(1).unwrap(), "");
    }
}

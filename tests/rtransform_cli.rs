//! CLI-level tests of the rebase todo transformer.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

const TODO: &str = "\
pick 1a2b3c4 [generated] Convert Dear ImGui API to use an explicit ImGuiContext.
pick 5d6e7f8 Fix docking regression
# Rebase 1a2b3c4..5d6e7f8 onto 0f0f0f0 (2 commands)
";

#[test]
fn filters_stdin_to_stdout() {
    Command::cargo_bin("imex")
        .unwrap()
        .args(["rtransform", "--exec", "imex convert /repo --apply --commit"])
        .write_stdin(TODO)
        .assert()
        .success()
        .stdout(
            predicate::str::starts_with("exec imex convert /repo --apply --commit\n")
                .and(predicate::str::contains("pick 5d6e7f8 Fix docking regression"))
                .and(predicate::str::contains("# Rebase")),
        );
}

#[test]
fn rewrites_a_todo_file_in_place() {
    let dir = assert_fs::TempDir::new().unwrap();
    let todo = dir.child("git-rebase-todo");
    todo.write_str(TODO).unwrap();

    Command::cargo_bin("imex")
        .unwrap()
        .args(["rtransform", "--exec", "reconvert"])
        .arg(todo.path())
        .assert()
        .success();

    todo.assert(predicate::str::starts_with("exec reconvert\n"));
    todo.assert(predicate::str::contains("pick 5d6e7f8 Fix docking regression"));
}

#[test]
fn exec_flag_is_required() {
    Command::cargo_bin("imex")
        .unwrap()
        .arg("rtransform")
        .write_stdin(TODO)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--exec"));
}

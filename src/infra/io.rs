//! Shared file I/O: path normalization and the flush-phase text writer.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Canonicalize when possible so ledger keys, layout paths, and parser
/// locations all agree on one spelling; fall back to the input verbatim
/// for paths that do not exist (yet).
pub fn normalize_path(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Write one rewritten translation unit or header in a single step.
///
/// Every output is whole-file UTF-8 text produced during the flush
/// phase, so the writer only needs one shape: stage the text in a
/// sibling temp file, carry over the mode of any file being replaced,
/// and rename onto the target.
pub fn write_text(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to stage a rewrite of {}", path.display()))?;
    staged.write_all(text.as_bytes())?;
    staged.as_file().sync_all()?;

    // Temp files come up owner-only; a converted imgui.h should keep the
    // mode the checkout already had.
    if let Ok(meta) = fs::metadata(path) {
        let _ = fs::set_permissions(staged.path(), meta.permissions());
    }

    staged
        .persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Read a whole file with a path-bearing error.
pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_text_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgui.h");
        fs::write(&path, "namespace ImGui { }\n").unwrap();

        write_text(&path, "namespace ImGuiEx { }\n").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "namespace ImGuiEx { }\n"
        );
    }

    #[test]
    fn write_text_creates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgui_implicit.cpp");

        write_text(&path, "// generated\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "// generated\n");
    }

    #[cfg(unix)]
    #[test]
    fn write_text_keeps_the_target_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgui.cpp");
        fs::write(&path, "old\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o664)).unwrap();

        write_text(&path, "new\n").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
    }

    #[test]
    fn normalize_falls_back_for_missing_paths() {
        let ghost = Path::new("no/such/file.cpp");
        assert_eq!(normalize_path(ghost), ghost.to_path_buf());
    }
}

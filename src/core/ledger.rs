//! Source ledger: faithful storage and editing of every file the tool
//! touches.
//!
//! Files are loaded once into line arrays with their terminators kept
//! verbatim, mutated only through typed per-line edit requests, and
//! replayed into output buffers during the final flush. Requests on one
//! line must not overlap after merging; the flush walks the line once,
//! emitting each replacement at its start column and skipping the length
//! of the text it replaces.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use memchr::memchr_iter;
use smallvec::SmallVec;
use xxhash_rust::xxh64::xxh64;

use crate::core::error::EngineError;
use crate::core::model::CodeRange;
use crate::infra::io::normalize_path;

/// An in-place text replacement within one line.
/// `start` is a 0-based byte index; the replaced text must equal `before`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub start: usize,
    pub before: String,
    pub after: String,
}

impl Splice {
    pub fn end(&self) -> usize {
        self.start + self.before.len()
    }
}

/// Typed edit request. The variants carry identical payloads; the type
/// encodes the per-line slot rules (at most one context replacement and
/// one prototype rewrite per line, any number of the rest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditRequest {
    ContextReplace(Splice),
    PrototypeRewrite(Splice),
    CallRewrite(Splice),
    ParameterRewrite(Splice),
    NumericRewrite(Splice),
}

impl EditRequest {
    /// Rewrite an exact `GImGui` occurrence into the forwarding variable.
    pub fn context_replace(range: &CodeRange, var: &str) -> Self {
        Self::ContextReplace(Splice {
            start: range.start_column as usize - 1,
            before: "GImGui".to_string(),
            after: var.to_string(),
        })
    }

    /// Rewrite `name(` into `name(ImGuiContext* ctx, ` at a declaration or
    /// definition site (no trailing comma when the function had no
    /// parameters).
    pub fn prototype(range: &CodeRange, name: &str, has_params: bool) -> Self {
        let sep = if has_params { ", " } else { "" };
        Self::PrototypeRewrite(Splice {
            start: range.start_column as usize - 1,
            before: format!("{name}("),
            after: format!("{name}(ImGuiContext* ctx{sep}"),
        })
    }

    /// Rewrite `name(` into `name(<var>, ` at a call site.
    pub fn call(range: &CodeRange, name: &str, var: &str, has_args: bool) -> Self {
        let sep = if has_args { ", " } else { "" };
        Self::CallRewrite(Splice {
            start: range.start_column as usize - 1,
            before: format!("{name}("),
            after: format!("{name}({var}{sep}"),
        })
    }

    /// Replace a full parameter declaration with `ImGuiContext* ctx`.
    pub fn parameter(range: &CodeRange, declaration: &str) -> Self {
        Self::ParameterRewrite(Splice {
            start: range.start_column as usize - 1,
            before: declaration.to_string(),
            after: "ImGuiContext* ctx".to_string(),
        })
    }

    /// Renumber a format-annotation integer from `n` to `n + 1`.
    pub fn renumber(range: &CodeRange, n: u32) -> Self {
        Self::NumericRewrite(Splice {
            start: range.start_column as usize - 1,
            before: n.to_string(),
            after: (n + 1).to_string(),
        })
    }

    pub fn splice(&self) -> &Splice {
        match self {
            Self::ContextReplace(s)
            | Self::PrototypeRewrite(s)
            | Self::CallRewrite(s)
            | Self::ParameterRewrite(s)
            | Self::NumericRewrite(s) => s,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::ContextReplace(_) => "context replacement",
            Self::PrototypeRewrite(_) => "prototype rewrite",
            Self::CallRewrite(_) => "call rewrite",
            Self::ParameterRewrite(_) => "parameter rewrite",
            Self::NumericRewrite(_) => "numeric rewrite",
        }
    }
}

/// One line of one source file plus its pending edits.
#[derive(Debug, Clone, Default)]
struct SourceLine {
    /// Line text including its terminator, verbatim.
    text: String,
    requests: SmallVec<[EditRequest; 4]>,
}

impl SourceLine {
    fn new(text: String) -> Self {
        Self {
            text,
            requests: SmallVec::new(),
        }
    }

    fn push(&mut self, request: EditRequest, at: &str) -> Result<(), EngineError> {
        // One context replacement and one prototype rewrite per line; the
        // rest may repeat.
        let exclusive = matches!(
            request,
            EditRequest::ContextReplace(_) | EditRequest::PrototypeRewrite(_)
        );
        if exclusive
            && self
                .requests
                .iter()
                .any(|r| std::mem::discriminant(r) == std::mem::discriminant(&request))
        {
            return Err(EngineError::InvariantViolation(format!(
                "second {} requested on {at}",
                request.label()
            )));
        }
        self.requests.push(request);
        Ok(())
    }

    /// Replay the merged requests left to right into a fresh line.
    fn transform(&self, file: &Path, line_no: u32) -> Result<String, EngineError> {
        if self.requests.is_empty() {
            return Ok(self.text.clone());
        }

        let mut ordered: Vec<&EditRequest> = self.requests.iter().collect();
        ordered.sort_by_key(|r| r.splice().start);

        for pair in ordered.windows(2) {
            let (a, b) = (pair[0].splice(), pair[1].splice());
            if b.start < a.end() {
                return Err(EngineError::OverlappingEdits {
                    file: file.to_path_buf(),
                    line: line_no,
                    a_start: a.start,
                    a_end: a.end(),
                    b_start: b.start,
                    b_end: b.end(),
                });
            }
        }

        let mut out = String::with_capacity(self.text.len() + ordered.len() * 8);
        let mut cursor = 0usize;
        for request in ordered {
            let splice = request.splice();
            let found = self.text.get(splice.start..splice.end()).ok_or_else(|| {
                EngineError::InvariantViolation(format!(
                    "{} at {}:{line_no} column {} runs past the line",
                    request.label(),
                    file.display(),
                    splice.start + 1
                ))
            })?;
            if found != splice.before {
                return Err(EngineError::InvariantViolation(format!(
                    "{} at {}:{line_no} expected `{}`, found `{found}`",
                    request.label(),
                    file.display(),
                    splice.before
                )));
            }
            out.push_str(&self.text[cursor..splice.start]);
            out.push_str(&splice.after);
            cursor = splice.end();
        }
        out.push_str(&self.text[cursor..]);
        Ok(out)
    }
}

#[derive(Debug)]
struct LedgerFile {
    lines: Vec<SourceLine>,
    /// xxh64 of the original content; lets the flush skip unchanged files.
    fingerprint: u64,
}

/// In-memory copies of the target sources, indexed by normalized path.
#[derive(Debug, Default)]
pub struct SourceLedger {
    files: IndexMap<PathBuf, LedgerFile>,
}

impl SourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every path once; terminators are preserved verbatim.
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut ledger = Self::new();
        for path in paths {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            ledger.add_source(path, &content);
        }
        Ok(ledger)
    }

    /// Register in-memory content under a path (also used by tests).
    pub fn add_source(&mut self, path: &Path, content: &str) {
        let lines = split_lines_keep_ends(content)
            .into_iter()
            .map(SourceLine::new)
            .collect();
        self.files.insert(
            normalize_path(path),
            LedgerFile {
                lines,
                fingerprint: xxh64(content.as_bytes(), 0),
            },
        );
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    fn file(&self, path: &Path) -> Result<&LedgerFile, EngineError> {
        self.files.get(&normalize_path(path)).ok_or_else(|| {
            EngineError::InvariantViolation(format!("{} is not in the ledger", path.display()))
        })
    }

    /// Read-only access to one 1-based line (terminator included).
    pub fn line(&self, path: &Path, line_no: u32) -> Result<&str, EngineError> {
        let file = self.file(path)?;
        file.lines
            .get(line_no as usize - 1)
            .map(|l| l.text.as_str())
            .ok_or_else(|| {
                EngineError::InvariantViolation(format!(
                    "line {line_no} is out of bounds for {}",
                    path.display()
                ))
            })
    }

    pub fn line_count(&self, path: &Path) -> Result<usize, EngineError> {
        Ok(self.file(path)?.lines.len())
    }

    /// Substring covered by a single-line range.
    pub fn get_text(&self, range: &CodeRange) -> Result<&str, EngineError> {
        if !range.is_single_line() {
            return Err(EngineError::UnsupportedMultilineRange(range.to_string()));
        }
        let line = self.line(&range.file, range.start_line)?;
        line.get(range.start_column as usize - 1..range.end_column as usize - 1)
            .ok_or_else(|| {
                EngineError::InvariantViolation(format!("range {range} is outside its line"))
            })
    }

    /// Enqueue a typed edit against one line.
    pub fn request_edit(
        &mut self,
        path: &Path,
        line_no: u32,
        request: EditRequest,
    ) -> Result<(), EngineError> {
        let key = normalize_path(path);
        let file = self.files.get_mut(&key).ok_or_else(|| {
            EngineError::InvariantViolation(format!("{} is not in the ledger", path.display()))
        })?;
        let at = format!("{}:{line_no}", path.display());
        let line = file.lines.get_mut(line_no as usize - 1).ok_or_else(|| {
            EngineError::InvariantViolation(format!("edit requested past the end of {at}"))
        })?;
        line.push(request, &at)
    }

    pub fn total_edits(&self) -> usize {
        self.files
            .values()
            .map(|f| f.lines.iter().map(|l| l.requests.len()).sum::<usize>())
            .sum()
    }

    /// Reconstruct one file with every pending edit applied.
    pub fn transform_file(&self, path: &Path) -> Result<String, EngineError> {
        let file = self.file(path)?;
        let mut out = String::new();
        for (i, line) in file.lines.iter().enumerate() {
            out.push_str(&line.transform(path, i as u32 + 1)?);
        }
        Ok(out)
    }

    /// The file as loaded, before any edit.
    pub fn original_file(&self, path: &Path) -> Result<String, EngineError> {
        let file = self.file(path)?;
        Ok(file.lines.iter().map(|l| l.text.as_str()).collect())
    }

    pub fn fingerprint(&self, path: &Path) -> Result<u64, EngineError> {
        Ok(self.file(path)?.fingerprint)
    }
}

/// Split into lines keeping each terminator attached to its line.
fn split_lines_keep_ends(content: &str) -> Vec<String> {
    let bytes = content.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0usize;
    for nl in memchr_iter(b'\n', bytes) {
        lines.push(content[start..=nl].to_string());
        start = nl + 1;
    }
    if start < content.len() {
        lines.push(content[start..].to_string());
    }
    lines
}

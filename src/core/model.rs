//! Normalized records for functions, parameters, and call sites.
//!
//! Identity rules mirror how the symbol database is keyed: a `CodeRange`
//! is identified by the position of its first character (two references to
//! the same token at the same position are the same reference), and a
//! function is identified by its mangled name, falling back to the fully
//! qualified name for templates that have none.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// A half-open region in one source file. Lines and columns are 1-based;
/// `end_column` is exclusive. Every range the planner accepts covers a
/// single line.
#[derive(Debug, Clone)]
pub struct CodeRange {
    pub file: PathBuf,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl CodeRange {
    pub fn new(
        file: impl Into<PathBuf>,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Self {
        Self {
            file: file.into(),
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Range covering a token of `len` bytes starting at a location.
    pub fn from_token(file: impl Into<PathBuf>, line: u32, column: u32, len: usize) -> Self {
        Self::new(file, line, column, line, column + len as u32)
    }

    pub fn is_single_line(&self) -> bool {
        self.start_line == self.end_line
    }

    /// Width in bytes; only meaningful for single-line ranges.
    pub fn width(&self) -> usize {
        self.end_column.saturating_sub(self.start_column) as usize
    }
}

// Identity is (file, start_line, start_column); the end of the range is
// derived data and must not split identities.
impl PartialEq for CodeRange {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file
            && self.start_line == other.start_line
            && self.start_column == other.start_column
    }
}

impl Eq for CodeRange {}

impl Hash for CodeRange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file.hash(state);
        self.start_line.hash(state);
        self.start_column.hash(state);
    }
}

impl fmt::Display for CodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_line() {
            write!(
                f,
                "{}:{}:{}-{}",
                self.file.display(),
                self.start_line,
                self.start_column,
                self.end_column
            )
        } else {
            write!(
                f,
                "{}:{}:{}-{}:{}",
                self.file.display(),
                self.start_line,
                self.start_column,
                self.end_line,
                self.end_column
            )
        }
    }
}

/// Key type for function identity: the mangled symbol name, or the fully
/// qualified name for function templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(String);

impl FunctionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FunctionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Removes the space before `*` and `&` in a type spelling (house style).
pub fn format_type_name(type_name: &str) -> String {
    let mut result = String::with_capacity(type_name.len());
    let mut chars = type_name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' && matches!(chars.peek(), Some('*') | Some('&')) {
            continue;
        }
        result.push(c);
    }
    result
}

/// One declared parameter, with the exact source substring covering it
/// (default value included).
#[derive(Debug, Clone)]
pub struct FunctionParameter {
    pub name: String,
    pub ty: String,
    pub declaration: String,
    pub code_range: Option<CodeRange>,
}

impl FunctionParameter {
    pub fn new(name: impl Into<String>, ty: &str, declaration: Option<String>) -> Self {
        let name = name.into();
        let formatted = format_type_name(ty);
        let declaration = declaration.unwrap_or_else(|| format!("{ty} {name}"));
        Self {
            name,
            ty: formatted,
            declaration,
            code_range: None,
        }
    }

    pub fn with_range(mut self, range: CodeRange) -> Self {
        self.code_range = Some(range);
        self
    }
}

impl fmt::Display for FunctionParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declaration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Free,
    Method,
    Template,
}

/// A function declaration or definition observed in the unit.
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub id: FunctionId,
    pub name: String,
    pub fq_name: String,
    pub return_type: String,
    pub params: Vec<FunctionParameter>,
    /// Range of the name token at the declaration/definition site.
    pub code_range: CodeRange,
    pub kind: FunctionKind,
    /// Fully qualified owning class for methods.
    pub method_class: Option<String>,
    pub is_api: bool,
    pub is_definition: bool,
    /// 1-based index of the printf-style format argument, 0 if absent.
    pub fmtargs: u32,
    pub fmtlist: u32,
    /// Where the annotation integer lives, for renumbering.
    pub fmtargs_range: Option<CodeRange>,
    pub fmtlist_range: Option<CodeRange>,
    /// Body references to the global context.
    pub implicit_contexts: Vec<CodeRange>,
    /// Index of a parameter already typed `ImGuiContext*`, if any.
    pub imgui_context_arg: Option<usize>,
    /// Output of the closure solver.
    pub need_context_param: bool,
}

impl FunctionEntry {
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// True when this is a method of a class whose instances already hold
    /// the context in a `Ctx` member.
    pub fn is_ctx_class_method(&self, classes_with_context: &[String]) -> bool {
        self.kind == FunctionKind::Method
            && self
                .method_class
                .as_deref()
                .is_some_and(|c| classes_with_context.iter().any(|k| k == c))
    }
}

/// Identity of a call site: position of the callee name token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl From<&CodeRange> for CallKey {
    fn from(range: &CodeRange) -> Self {
        Self {
            file: range.file.clone(),
            line: range.start_line,
            column: range.start_column,
        }
    }
}

/// One resolved call-site reference.
#[derive(Debug, Clone)]
pub struct CallEntry {
    pub caller: FunctionId,
    pub callee: FunctionId,
    /// Covers the callee name token at the call site (template argument
    /// brackets included for special templates).
    pub code_range: CodeRange,
    pub call_name: String,
    pub has_args: bool,
}

/// A debug-log macro invocation; these always expand to a call that needs
/// the context, so they are tracked separately from database calls.
#[derive(Debug, Clone)]
pub struct LogCall {
    pub caller: FunctionId,
    pub code_range: CodeRange,
    pub name: String,
    pub has_args: bool,
}

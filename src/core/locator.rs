//! Lexical recovery of textual extents the parser does not report.
//!
//! Many reference cursors come back with zero-width extents or without
//! trailing qualifiers; these line-oriented primitives re-find the exact
//! bytes in the ledger. Both searches return `None` when nothing matches
//! and leave it to the caller to decide whether that is fatal.

use std::path::Path;

use crate::core::ledger::SourceLedger;
use crate::core::model::CodeRange;

pub struct SymbolLocator<'a> {
    ledger: &'a SourceLedger,
}

impl<'a> SymbolLocator<'a> {
    pub fn new(ledger: &'a SourceLedger) -> Self {
        Self { ledger }
    }

    /// Forward search for `needle` in one line, starting at 1-based
    /// `column`. Returns the range covering the first occurrence.
    pub fn find_symbol(
        &self,
        path: &Path,
        line_no: u32,
        column: u32,
        needle: &str,
    ) -> Option<CodeRange> {
        let line = self.ledger.line(path, line_no).ok()?;
        let from = column.saturating_sub(1) as usize;
        if from > line.len() {
            return None;
        }
        let offset = line[from..].find(needle)? + from;
        Some(CodeRange::from_token(
            path,
            line_no,
            offset as u32 + 1,
            needle.len(),
        ))
    }

    /// Forward search for `terminator` in one line, starting at 1-based
    /// `column`. Returns the range from `column` through the terminator
    /// inclusive.
    pub fn find_until(
        &self,
        path: &Path,
        line_no: u32,
        column: u32,
        terminator: char,
    ) -> Option<CodeRange> {
        let line = self.ledger.line(path, line_no).ok()?;
        let from = column.saturating_sub(1) as usize;
        if from > line.len() {
            return None;
        }
        let offset = line[from..].find(terminator)? + from;
        Some(CodeRange::new(
            path,
            line_no,
            column,
            line_no,
            offset as u32 + 2,
        ))
    }

    /// Up to `len` bytes following 1-based `column`, clamped to the line.
    pub fn peek(&self, path: &Path, line_no: u32, column: u32, len: usize) -> &'a str {
        let Ok(line) = self.ledger.line(path, line_no) else {
            return "";
        };
        let from = (column.saturating_sub(1) as usize).min(line.len());
        let to = (from + len).min(line.len());
        line.get(from..to).unwrap_or("")
    }
}

//! detectors/ast/spans.rs
//!
//! Recovers the exact text of every test function in a Python test file,
//! module-level or a method of a module-level class, including decorators and
//! the comment/docstring block sitting on top of it.
//!
//! The backward scan is a line heuristic layered on the syntax tree. It is
//! isolated in `recover_span` so it can be tested on its own.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::detectors::ast::ast::{class_name, function_name, function_sites, parse_python};
use crate::error::{Error, Result};

pub const TEST_PREFIX: &str = "test_";

/// Lines assumed for a function whose end the parser could not report.
/// A known approximation: bodies longer than this are truncated.
pub const FALLBACK_SPAN_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpan {
    pub name: String,
    pub source_text: String,
    /// Zero-based, inclusive.
    pub start_line: usize,
    /// Zero-based, inclusive.
    pub end_line: usize,
    /// Enclosing class for test methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl TestSpan {
    /// `Class.method` for methods, the bare name otherwise. Reviews are keyed
    /// by this.
    pub fn key(&self) -> String {
        match &self.class_name {
            Some(class) => format!("{class}.{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn is_method(&self) -> bool {
        self.class_name.is_some()
    }
}

pub fn extract_test_spans_from_file(path: &Path) -> Result<Vec<TestSpan>> {
    let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    extract_test_spans(&source)
}

/// Every function named `test_*` at module level or directly inside a
/// module-level class, in file order.
pub fn extract_test_spans(source: &str) -> Result<Vec<TestSpan>> {
    let tree = parse_python(source)?;
    let root = tree.root_node();
    let lines: Vec<&str> = source.split('\n').collect();

    let mut spans = Vec::new();
    for site in function_sites(root) {
        let Some(name) = function_name(site.def, source) else {
            continue;
        };
        if !name.starts_with(TEST_PREFIX) {
            continue;
        }

        let (start, end) = recover_span(site.outer, site.def, &lines);
        spans.push(TestSpan {
            name: name.to_string(),
            source_text: lines[start..=end].join("\n"),
            start_line: start,
            end_line: end,
            class_name: site
                .class
                .and_then(|c| class_name(c, source))
                .map(str::to_owned),
        });
    }

    Ok(spans)
}

/// Line range `(start, end)` of one function, both zero-based and inclusive.
///
/// `outer` is the decorator wrapper (or the def itself), `def` the
/// function node. The start walks upward from the first decorator over blank,
/// comment, decorator and docstring-delimiter lines, never crossing the end of
/// the previous code statement.
pub fn recover_span(outer: Node, def: Node, lines: &[&str]) -> (usize, usize) {
    let first = outer.start_position().row;
    let floor = previous_code_end(outer).map_or(0, |row| row + 1);

    let mut start = first;
    while start > floor {
        if !belongs_to_next_function(lines[start - 1]) {
            break;
        }
        start -= 1;
    }

    let reported = reported_end(def);
    (start, span_end(first, reported, lines.len()))
}

/// Last row of the nearest preceding sibling that is real code.
///
/// A docstring (the first statement of a module or class body) counts as
/// code, so it stays with the header or the class.
fn previous_code_end(node: Node) -> Option<usize> {
    let mut prev = node.prev_sibling();
    while let Some(p) = prev {
        if !is_attachable(p) || is_docstring(p) {
            return Some(p.end_position().row);
        }
        prev = p.prev_sibling();
    }
    None
}

/// Comments and bare string statements may be absorbed into the next span.
fn is_attachable(node: Node) -> bool {
    node.kind() == "comment" || is_string_statement(node)
}

fn is_string_statement(node: Node) -> bool {
    node.kind() == "expression_statement"
        && node.named_child_count() == 1
        && node.named_child(0).is_some_and(|c| c.kind() == "string")
}

fn is_docstring(node: Node) -> bool {
    if !is_string_statement(node) {
        return false;
    }
    let mut prev = node.prev_sibling();
    while let Some(p) = prev {
        if p.kind() != "comment" {
            return false;
        }
        prev = p.prev_sibling();
    }
    true
}

fn belongs_to_next_function(line: &str) -> bool {
    let line = line.trim();
    line.is_empty()
        || line.starts_with('@')
        || line.starts_with('#')
        || line.starts_with("\"\"\"")
        || line.starts_with("'''")
        || line.ends_with("\"\"\"")
        || line.ends_with("'''")
}

fn reported_end(def: Node) -> Option<usize> {
    if def.is_missing() {
        return None;
    }
    let start = def.start_position().row;
    let end = def.end_position();

    // An end at column 0 points just past the last line.
    let row = if end.column == 0 && end.row > start {
        end.row - 1
    } else {
        end.row
    };

    (row >= start).then_some(row)
}

/// Inclusive end line, falling back to `FALLBACK_SPAN_LINES` past the
/// first line when the parser gave nothing usable.
pub fn span_end(first_line: usize, reported: Option<usize>, line_count: usize) -> usize {
    let last = line_count.saturating_sub(1);
    reported
        .unwrap_or(first_line + FALLBACK_SPAN_LINES)
        .min(last)
}

/// Everything before the first decorator, def or class line: module
/// docstring, imports, constants. Also cut short at the first span, so a
/// comment block the first test absorbed is not repeated.
pub fn header_before(source: &str, spans: &[TestSpan]) -> String {
    source
        .split_inclusive('\n')
        .take(header_line_count(source, spans))
        .collect()
}

/// Number of lines `header_before` returns.
pub fn header_line_count(source: &str, spans: &[TestSpan]) -> usize {
    let cap = spans.iter().map(|s| s.start_line).min().unwrap_or(usize::MAX);
    source
        .split_inclusive('\n')
        .take(cap)
        .take_while(|line| !starts_definition(line))
        .count()
}

fn starts_definition(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("def ")
        || line.starts_with("async def ")
        || line.starts_with("class ")
        || line.starts_with('@')
}

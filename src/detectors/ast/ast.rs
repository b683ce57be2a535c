//! detectors/ast/ast.rs
//!
//! Tree-sitter helpers for Python test sources.

use std::cell::RefCell;

use tree_sitter::{Node, Parser, Tree};

use crate::error::{Error, Result};

thread_local! {
    static PY_PARSER: RefCell<Parser> = RefCell::new(make_python_parser());
}

fn make_python_parser() -> Parser {
    let mut p = Parser::new();
    p.set_language(&tree_sitter_python::language())
        .expect("bundled python grammar matches tree-sitter ABI");
    p
}

/// Parse Python source. Any error or missing node fails the whole parse.
pub fn parse_python(source: &str) -> Result<Tree> {
    let tree = PY_PARSER
        .with(|p| p.borrow_mut().parse(source, None))
        .ok_or(Error::Syntax { line: 0, column: 0 })?;

    let root = tree.root_node();
    if root.has_error() {
        let (line, column) = first_error(root)
            .map(|n| {
                let pos = n.start_position();
                (pos.row + 1, pos.column + 1)
            })
            .unwrap_or((0, 0));
        return Err(Error::Syntax { line, column });
    }

    Ok(tree)
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(n) = first_error(child) {
            return Some(n);
        }
    }

    Some(node)
}

pub fn function_name<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    if node.kind() != "function_definition" {
        return None;
    }
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
}

/// Module-level function definitions, with their decorator wrapper if any.
///
/// Yields `(outer, def)` where `outer` is the `decorated_definition` node when
/// the function is decorated and the `function_definition` itself otherwise.
pub fn top_level_functions<'t>(root: Node<'t>) -> Vec<(Node<'t>, Node<'t>)> {
    let mut cursor = root.walk();
    root.children(&mut cursor).filter_map(unwrap_function).collect()
}

fn unwrap_function(node: Node) -> Option<(Node, Node)> {
    match node.kind() {
        "function_definition" => Some((node, node)),
        "decorated_definition" => node
            .child_by_field_name("definition")
            .filter(|d| d.kind() == "function_definition")
            .map(|def| (node, def)),
        _ => None,
    }
}

fn unwrap_class(node: Node) -> Option<Node> {
    match node.kind() {
        "class_definition" => Some(node),
        "decorated_definition" => node
            .child_by_field_name("definition")
            .filter(|d| d.kind() == "class_definition"),
        _ => None,
    }
}

/// A function found at module level or directly inside a module-level class.
#[derive(Debug, Clone, Copy)]
pub struct FunctionSite<'t> {
    pub outer: Node<'t>,
    pub def: Node<'t>,
    pub class: Option<Node<'t>>,
}

/// Module-level functions and the methods of module-level classes, in file
/// order. Nested classes and functions inside functions are not visited.
pub fn function_sites<'t>(root: Node<'t>) -> Vec<FunctionSite<'t>> {
    let mut out = Vec::new();
    let mut cursor = root.walk();

    for node in root.children(&mut cursor) {
        if let Some((outer, def)) = unwrap_function(node) {
            out.push(FunctionSite { outer, def, class: None });
            continue;
        }

        let Some(class) = unwrap_class(node) else {
            continue;
        };
        let Some(body) = class.child_by_field_name("body") else {
            continue;
        };

        let mut body_cursor = body.walk();
        for member in body.children(&mut body_cursor) {
            if let Some((outer, def)) = unwrap_function(member) {
                out.push(FunctionSite {
                    outer,
                    def,
                    class: Some(class),
                });
            }
        }
    }

    out
}

/// Name of a `class_definition`.
pub fn class_name<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    if node.kind() != "class_definition" {
        return None;
    }
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
}

/// Names of every module-level function defined in `source`.
pub fn defined_function_names(source: &str) -> Result<Vec<String>> {
    let tree = parse_python(source)?;
    let root = tree.root_node();

    Ok(top_level_functions(root)
        .into_iter()
        .filter_map(|(_, def)| function_name(def, source))
        .map(str::to_owned)
        .collect())
}

pub mod imports;
pub mod languages;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tree_sitter::{Node, Parser, Query, Tree};

use crate::error::PatchError;

pub use languages::Grammar;

/// A source file together with its syntax tree.
///
/// Unlike an index that only keeps extracted facts, the tree is retained: the
/// scanner visits every file twice (export discovery, then local resolution) and the
/// patcher needs byte ranges into the original text.
pub struct ParsedFile {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
    pub grammar: Grammar,
}

impl ParsedFile {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn text<'a>(&'a self, node: Node<'a>) -> &'a str {
        node_text(node, self.source.as_bytes())
    }
}

/// Parse `source` with the grammar selected by `path`'s extension.
///
/// # Errors
/// - [`PatchError::UnsupportedFile`] if the extension has no grammar
/// - [`PatchError::Parse`] if tree-sitter gives up on the input
pub fn parse_source(path: &Path, source: String) -> Result<ParsedFile, PatchError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let grammar =
        Grammar::for_extension(ext).ok_or_else(|| PatchError::UnsupportedFile(path.to_path_buf()))?;

    let mut parser = Parser::new();
    parser
        .set_language(&grammar.language())
        .map_err(|_| PatchError::Parse(path.to_path_buf()))?;
    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| PatchError::Parse(path.to_path_buf()))?;

    Ok(ParsedFile {
        path: path.to_path_buf(),
        source,
        tree,
        grammar,
    })
}

/// Read and parse a file from disk.
pub fn parse_path(path: &Path) -> Result<ParsedFile, PatchError> {
    let source = std::fs::read_to_string(path).map_err(|e| PatchError::io(path, e))?;
    parse_source(path, source)
}

/// Visit `root` and all of its descendants in pre-order (source order).
pub fn visit_descendants<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// First named child that is not a comment.
pub fn first_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    found
}

pub fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Strip one pair of matching-or-not surrounding quotes (`"`, `'` or backtick).
///
/// `"Todo"` → `Todo`, `Todo` → `Todo`.
pub fn strip_quotes(text: &str) -> &str {
    let is_quote = |c: char| matches!(c, '"' | '\'' | '`');
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if is_quote(first) && is_quote(last) => {
            &text[first.len_utf8()..text.len() - last.len_utf8()]
        }
        _ => text,
    }
}

/// Skip parentheses and TypeScript-only wrappers (`x!`, `x as T`, `x satisfies T`).
pub fn unwrap_expression(mut node: Node<'_>) -> Node<'_> {
    loop {
        match node.kind() {
            "parenthesized_expression" | "non_null_expression" | "as_expression"
            | "satisfies_expression" => match node.named_child(0) {
                Some(inner) => node = inner,
                None => return node,
            },
            _ => return node,
        }
    }
}

/// A query compiled lazily, once per grammar.
///
/// Queries compiled for one grammar cannot run against another grammar's tree, so each
/// grammar gets its own slot. Predicates like `#eq?` are not applied by the streaming
/// match iterator; callers filter captures in code instead.
pub struct GrammarQuery {
    source: &'static str,
    typescript: OnceLock<Query>,
    tsx: OnceLock<Query>,
    javascript: OnceLock<Query>,
}

impl GrammarQuery {
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            typescript: OnceLock::new(),
            tsx: OnceLock::new(),
            javascript: OnceLock::new(),
        }
    }

    pub fn get(&self, grammar: Grammar) -> &Query {
        let cell = match grammar {
            Grammar::TypeScript => &self.typescript,
            Grammar::Tsx => &self.tsx,
            Grammar::JavaScript => &self.javascript,
        };
        cell.get_or_init(|| Query::new(&grammar.language(), self.source).expect("invalid query"))
    }
}

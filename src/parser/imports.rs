use tree_sitter::{Node, QueryCursor, StreamingIterator};

use super::{GrammarQuery, ParsedFile, node_text};

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Exported name used for `export default` / `import x from`.
pub const DEFAULT_EXPORT: &str = "default";

/// A single binding brought into scope by an ESM import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    /// The local name used in this file.
    pub local: String,
    /// The name exported by the source module (`default` for default imports).
    pub imported: String,
}

/// An ESM static import extracted from a source file.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    /// The raw module specifier string, e.g. `"./amplify-client.js"` or `"@/lib/client"`.
    pub module_path: String,
    /// Named and default bindings. Namespace imports are not recorded.
    pub specifiers: Vec<ImportSpecifier>,
}

/// A local binding made visible to other modules by an export statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpecifier {
    /// The binding name inside this file.
    pub local: String,
    /// The name other modules import it under.
    pub exported: String,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// ESM static imports: `import { X } from 'm'`, `import X from 'm'`, `import type { X } from 'm'`.
static IMPORTS: GrammarQuery = GrammarQuery::new(
    r#"
    (import_statement
      source: (string (string_fragment) @module_path)) @import
"#,
);

static EXPORTS: GrammarQuery = GrammarQuery::new(
    r#"
    (export_statement) @export_stmt
"#,
);

// ---------------------------------------------------------------------------
// Import extraction
// ---------------------------------------------------------------------------

/// Extract all ESM imports of a parsed file.
pub fn extract_imports(file: &ParsedFile) -> Vec<ImportInfo> {
    let source = file.bytes();
    let query = IMPORTS.get(file.grammar);
    let (Some(module_path_idx), Some(import_idx)) = (
        query.capture_index_for_name("module_path"),
        query.capture_index_for_name("import"),
    ) else {
        return Vec::new();
    };

    let mut imports = Vec::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, file.root(), source);

    while let Some(m) = matches.next() {
        let mut import_node: Option<Node> = None;
        let mut module_path: Option<String> = None;

        for capture in m.captures {
            if capture.index == import_idx {
                import_node = Some(capture.node);
            } else if capture.index == module_path_idx {
                module_path = Some(node_text(capture.node, source).to_owned());
            }
        }

        if let (Some(node), Some(module_path)) = (import_node, module_path) {
            imports.push(ImportInfo {
                module_path,
                specifiers: extract_specifiers(node, source),
            });
        }
    }

    imports
}

/// Collect default and named bindings from an `import_statement`.
fn extract_specifiers(import_node: Node, source: &[u8]) -> Vec<ImportSpecifier> {
    let mut specifiers = Vec::new();
    let mut cursor = import_node.walk();
    for child in import_node.children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for part in child.children(&mut clause_cursor) {
            match part.kind() {
                "identifier" => specifiers.push(ImportSpecifier {
                    local: node_text(part, source).to_owned(),
                    imported: DEFAULT_EXPORT.to_owned(),
                }),
                "named_imports" => extract_named_imports(part, source, &mut specifiers),
                _ => {}
            }
        }
    }
    specifiers
}

/// In `import { foo as bar }` tree-sitter puts `foo` in the `name` field and `bar` in `alias`.
fn extract_named_imports(named: Node, source: &[u8], specifiers: &mut Vec<ImportSpecifier>) {
    let mut cursor = named.walk();
    for child in named.children(&mut cursor) {
        if child.kind() != "import_specifier" {
            continue;
        }
        let Some(name) = child.child_by_field_name("name") else {
            continue;
        };
        let imported = node_text(name, source).to_owned();
        let local = child
            .child_by_field_name("alias")
            .map(|a| node_text(a, source).to_owned())
            .unwrap_or_else(|| imported.clone());
        specifiers.push(ImportSpecifier { local, imported });
    }
}

// ---------------------------------------------------------------------------
// Export extraction
// ---------------------------------------------------------------------------

/// Extract local bindings exported by `export { a, b as c }` and `export default a`.
///
/// Inline declarations (`export const x = ...`) are not listed here; callers inspect the
/// statement's `declaration` field directly. Re-exports from other modules
/// (`export { x } from './m'`) are skipped.
pub fn extract_export_specifiers(file: &ParsedFile) -> Vec<ExportSpecifier> {
    let source = file.bytes();
    let query = EXPORTS.get(file.grammar);
    let Some(stmt_idx) = query.capture_index_for_name("export_stmt") else {
        return Vec::new();
    };

    let mut exports = Vec::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, file.root(), source);

    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index == stmt_idx {
                classify_export(capture.node, source, &mut exports);
            }
        }
    }

    exports
}

fn classify_export(node: Node, source: &[u8], exports: &mut Vec<ExportSpecifier>) {
    if node.child_by_field_name("source").is_some() {
        return;
    }

    if let Some(value) = node.child_by_field_name("value") {
        // `export default client;`
        if value.kind() == "identifier" {
            exports.push(ExportSpecifier {
                local: node_text(value, source).to_owned(),
                exported: DEFAULT_EXPORT.to_owned(),
            });
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "export_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for spec in child.children(&mut clause_cursor) {
            if spec.kind() != "export_specifier" {
                continue;
            }
            let Some(name) = spec.child_by_field_name("name") else {
                continue;
            };
            let local = node_text(name, source).to_owned();
            let exported = spec
                .child_by_field_name("alias")
                .map(|a| node_text(a, source).to_owned())
                .unwrap_or_else(|| local.clone());
            exports.push(ExportSpecifier { local, exported });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

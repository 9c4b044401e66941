//! Client-reference resolution.
//!
//! Decides, per file, which local identifiers denote a generated data client. Identity
//! is inferred from syntax alone: a call to the client factory, a function returning
//! such a call, or an import of something another file exports as one of those. No
//! types are resolved, so a parameter typed as the client (`client: V6Client<Schema>`)
//! is not recognised.
//!
//! Resolution runs in two phases. [`ExportTable::build`] visits every file once and
//! records what it exports; [`resolve_client_references`] then resolves each file's
//! imports against that table. The split avoids visiting files recursively when an
//! importer is seen before its exporter.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use oxc_resolver::Resolver;
use tree_sitter::Node;

use crate::parser::imports::{DEFAULT_EXPORT, extract_export_specifiers, extract_imports};
use crate::parser::{ParsedFile, node_text, unwrap_expression, visit_descendants};
use crate::resolver::{ResolutionOutcome, resolve_import};

/// What kind of binding produces a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientBinding {
    /// The binding holds a client value.
    Variable,
    /// Calling the binding returns a client (possibly through a promise).
    Function,
}

/// A client-producing binding that a file makes available to importers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedClient {
    pub file: PathBuf,
    pub local: String,
    pub exported: String,
    pub kind: ClientBinding,
}

/// Client variables and client functions visible in one file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClientReferences {
    pub variables: BTreeSet<String>,
    pub functions: BTreeSet<String>,
}

impl ClientReferences {
    fn insert(&mut self, name: String, kind: ClientBinding) {
        match kind {
            ClientBinding::Variable => self.variables.insert(name),
            ClientBinding::Function => self.functions.insert(name),
        };
    }

    fn kind_of(&self, name: &str) -> Option<ClientBinding> {
        if self.variables.contains(name) {
            Some(ClientBinding::Variable)
        } else if self.functions.contains(name) {
            Some(ClientBinding::Function)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Phase 1: export discovery
// ---------------------------------------------------------------------------

/// Every [`ExportedClient`] in the project, keyed by defining file.
#[derive(Debug, Default)]
pub struct ExportTable {
    by_file: HashMap<PathBuf, Vec<ExportedClient>>,
}

impl ExportTable {
    pub fn build(files: &[ParsedFile], factory: &str) -> Self {
        let mut by_file = HashMap::new();
        for file in files {
            let exports = discover_exports(file, factory);
            if !exports.is_empty() {
                tracing::debug!(
                    "{} exports client binding(s): {}",
                    file.path.display(),
                    exports
                        .iter()
                        .map(|e| e.exported.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                by_file.insert(file.path.clone(), exports);
            }
        }
        Self { by_file }
    }

    pub fn lookup(&self, file: &Path, exported: &str) -> Option<&ExportedClient> {
        self.by_file
            .get(file)?
            .iter()
            .find(|entry| entry.exported == exported)
    }

    pub fn len(&self) -> usize {
        self.by_file.values().map(Vec::len).sum()
    }
}

/// Find the client bindings a single file exports.
///
/// Covers `export const x = factory()`, `export function f() { return factory() }`,
/// `export { x as y }` / `export default x` forwarding a local match, and
/// `export default factory()`.
pub fn discover_exports(file: &ParsedFile, factory: &str) -> Vec<ExportedClient> {
    let local = local_clients(file, factory);
    let source = file.bytes();
    let mut exports = Vec::new();
    let mut push = |local_name: &str, exported: &str, kind: ClientBinding| {
        exports.push(ExportedClient {
            file: file.path.clone(),
            local: local_name.to_owned(),
            exported: exported.to_owned(),
            kind,
        });
    };

    visit_descendants(file.root(), |node| {
        if node.kind() != "export_statement" {
            return;
        }
        let is_default = has_child_kind(node, "default");

        if let Some(decl) = node.child_by_field_name("declaration") {
            match decl.kind() {
                "lexical_declaration" | "variable_declaration" => {
                    let mut cursor = decl.walk();
                    for declarator in decl.named_children(&mut cursor) {
                        if declarator.kind() != "variable_declarator" {
                            continue;
                        }
                        let Some(name) = binding_name(declarator, source) else {
                            continue;
                        };
                        if let Some(kind) = local.kind_of(name) {
                            push(name, name, kind);
                        }
                    }
                }
                "function_declaration" | "generator_function_declaration" => {
                    if let Some(name) = decl.child_by_field_name("name") {
                        let name = node_text(name, source);
                        if local.functions.contains(name) {
                            let exported = if is_default { DEFAULT_EXPORT } else { name };
                            push(name, exported, ClientBinding::Function);
                        }
                    }
                }
                _ => {}
            }
        } else if let Some(value) = node.child_by_field_name("value") {
            if is_factory_call(value, source, factory) {
                push(DEFAULT_EXPORT, DEFAULT_EXPORT, ClientBinding::Variable);
            } else if function_returns_client(value, source, factory) {
                push(DEFAULT_EXPORT, DEFAULT_EXPORT, ClientBinding::Function);
            }
        }
    });

    for spec in extract_export_specifiers(file) {
        if let Some(kind) = local.kind_of(&spec.local) {
            push(&spec.local, &spec.exported, kind);
        }
    }

    exports
}

// ---------------------------------------------------------------------------
// Phase 2: per-file resolution
// ---------------------------------------------------------------------------

/// Resolve the complete set of client references for `file`.
///
/// Seeds with the file's own matches, adds imports that resolve to an entry of `table`,
/// then adds every variable initialised by calling (optionally awaiting) a client
/// function. Imports that do not resolve to a project file are skipped.
pub fn resolve_client_references(
    file: &ParsedFile,
    table: &ExportTable,
    resolver: &Resolver,
    factory: &str,
) -> ClientReferences {
    let mut refs = local_clients(file, factory);

    for import in extract_imports(file) {
        if import.specifiers.is_empty() {
            continue;
        }
        let target = match resolve_import(resolver, &file.path, &import.module_path) {
            ResolutionOutcome::Resolved(target) => target,
            ResolutionOutcome::BuiltinModule(name) => {
                tracing::debug!("{}: skipping builtin '{name}'", file.path.display());
                continue;
            }
            ResolutionOutcome::Unresolved(reason) => {
                tracing::debug!(
                    "{}: cannot resolve '{}': {reason}",
                    file.path.display(),
                    import.module_path
                );
                continue;
            }
        };
        for spec in import.specifiers {
            if let Some(entry) = table.lookup(&target, &spec.imported) {
                tracing::debug!(
                    "{}: '{}' is client binding '{}' of {}",
                    file.path.display(),
                    spec.local,
                    entry.local,
                    entry.file.display()
                );
                refs.insert(spec.local, entry.kind);
            }
        }
    }

    let source = file.bytes();
    visit_descendants(file.root(), |node| {
        if node.kind() != "variable_declarator" {
            return;
        }
        let (Some(name), Some(value)) = (
            binding_name(node, source),
            node.child_by_field_name("value"),
        ) else {
            return;
        };
        if let Some(callee) = called_identifier(value, source)
            && refs.functions.contains(callee)
        {
            refs.variables.insert(name.to_owned());
        }
    });

    refs
}

/// Client variables and functions defined directly in `file`, at any depth.
fn local_clients(file: &ParsedFile, factory: &str) -> ClientReferences {
    let source = file.bytes();
    let mut refs = ClientReferences::default();

    visit_descendants(file.root(), |node| match node.kind() {
        "variable_declarator" => {
            let (Some(name), Some(value)) = (
                binding_name(node, source),
                node.child_by_field_name("value"),
            ) else {
                return;
            };
            if is_factory_call(value, source, factory) {
                refs.variables.insert(name.to_owned());
            } else if function_returns_client(value, source, factory) {
                refs.functions.insert(name.to_owned());
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = node.child_by_field_name("name")
                && function_returns_client(node, source, factory)
            {
                refs.functions.insert(node_text(name, source).to_owned());
            }
        }
        _ => {}
    });

    refs
}

// ---------------------------------------------------------------------------
// Syntax predicates
// ---------------------------------------------------------------------------

/// The declarator's name when it is a plain identifier (destructuring is ignored).
fn binding_name<'a>(declarator: Node<'a>, source: &'a [u8]) -> Option<&'a str> {
    let name = declarator.child_by_field_name("name")?;
    (name.kind() == "identifier").then(|| node_text(name, source))
}

/// Name of the identifier called by `expr`, looking through `await` and parentheses.
///
/// `await createClient('prod')` → `createClient`; `client.models.Todo.list()` → `None`.
fn called_identifier<'a>(expr: Node<'a>, source: &'a [u8]) -> Option<&'a str> {
    let mut node = unwrap_expression(expr);
    if node.kind() == "await_expression" {
        node = unwrap_expression(node.named_child(0)?);
    }
    if node.kind() != "call_expression" {
        return None;
    }
    let callee = node.child_by_field_name("function")?;
    (callee.kind() == "identifier").then(|| node_text(callee, source))
}

fn is_factory_call(expr: Node, source: &[u8], factory: &str) -> bool {
    called_identifier(expr, source) == Some(factory)
}

/// True if `node` is a function whose body returns a direct factory call.
///
/// Any `return` anywhere in the body counts, nested blocks and nested functions included.
/// An arrow function with an expression body returns that expression.
fn function_returns_client(node: Node, source: &[u8], factory: &str) -> bool {
    let node = unwrap_expression(node);
    match node.kind() {
        "function_declaration"
        | "generator_function_declaration"
        | "function_expression"
        | "function"
        | "generator_function"
        | "arrow_function" => {}
        _ => return false,
    }
    let Some(body) = node.child_by_field_name("body") else {
        return false;
    };
    if body.kind() != "statement_block" {
        return is_factory_call(body, source, factory);
    }

    let mut found = false;
    visit_descendants(body, |inner| {
        if found || inner.kind() != "return_statement" {
            return;
        }
        if let Some(expr) = inner.named_child(0)
            && is_factory_call(expr, source, factory)
        {
            found = true;
        }
    });
    found
}

fn has_child_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| child.kind() == kind);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::resolver::{build_resolver, canonical};
    use std::fs;

    const FACTORY: &str = "generateClient";

    fn parse(name: &str, source: &str) -> ParsedFile {
        parse_source(Path::new(name), source.to_owned()).unwrap()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_local_variable_and_function() {
        let file = parse(
            "app.ts",
            r#"
            import { generateClient } from 'aws-amplify/data';
            const client = generateClient<Schema>();
            const other = somethingElse();
            async function makeClient() {
              if (ready) { return generateClient<Schema>(); }
              return null;
            }
            const arrow = () => generateClient();
            "#,
        );
        let refs = local_clients(&file, FACTORY);
        assert_eq!(refs.variables, set(&["client"]));
        assert_eq!(refs.functions, set(&["arrow", "makeClient"]));
    }

    #[test]
    fn test_custom_factory_name() {
        let file = parse("app.ts", "const c = makeDataClient();");
        assert!(local_clients(&file, FACTORY).variables.is_empty());
        assert_eq!(local_clients(&file, "makeDataClient").variables, set(&["c"]));
    }

    #[test]
    fn test_typed_parameter_is_not_a_client() {
        let file = parse(
            "params.ts",
            "export async function del(client: V6Client<Schema>, id: string) { await client.models.Todo.delete({ id }); }",
        );
        assert_eq!(local_clients(&file, FACTORY), ClientReferences::default());
    }

    #[test]
    fn test_discover_inline_exports() {
        let file = parse(
            "amplify-client.ts",
            r#"
            export const client = generateClient<Schema>();
            export async function createAmplifyClient(env: string): Promise<any> {
              return generateClient<Schema>();
            }
            export const notAClient = 42;
            "#,
        );
        let exports = discover_exports(&file, FACTORY);
        let summary: Vec<_> = exports
            .iter()
            .map(|e| (e.local.as_str(), e.exported.as_str(), e.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("client", "client", ClientBinding::Variable),
                ("createAmplifyClient", "createAmplifyClient", ClientBinding::Function),
            ]
        );
    }

    #[test]
    fn test_discover_named_reexport_with_alias() {
        let file = parse(
            "client.ts",
            "const sharedClient = generateClient<Schema>();\nexport { sharedClient, sharedClient as dataClient };",
        );
        let exported: Vec<_> = discover_exports(&file, FACTORY)
            .into_iter()
            .map(|e| e.exported)
            .collect();
        assert_eq!(exported, vec!["sharedClient", "dataClient"]);
    }

    #[test]
    fn test_discover_default_exports() {
        let direct = parse("a.ts", "export default generateClient();");
        assert_eq!(
            discover_exports(&direct, FACTORY)[0].kind,
            ClientBinding::Variable
        );

        let function = parse(
            "b.ts",
            "export default function build() { return generateClient(); }",
        );
        let exports = discover_exports(&function, FACTORY);
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].exported, DEFAULT_EXPORT);
        assert_eq!(exports[0].kind, ClientBinding::Function);
    }

    #[test]
    fn test_resolve_imported_and_derived_clients() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical(dir.path());
        let client_path = root.join("amplify-client.ts");
        let service_path = root.join("service.ts");
        let client_src = r#"
            export const client = generateClient<Schema>();
            export async function createAmplifyClient() { return generateClient<Schema>(); }
        "#;
        let service_src = r#"
            import { client as amplifyClient, createAmplifyClient } from './amplify-client.js';
            import { unrelated } from './missing';
            export async function run() {
              const fresh = await createAmplifyClient();
              const plain = createAmplifyClient();
              const other = unrelated();
            }
        "#;
        fs::write(&client_path, client_src).unwrap();
        fs::write(&service_path, service_src).unwrap();

        let files = vec![
            parse_source(&client_path, client_src.to_owned()).unwrap(),
            parse_source(&service_path, service_src.to_owned()).unwrap(),
        ];
        let table = ExportTable::build(&files, FACTORY);
        assert_eq!(table.len(), 2);

        let resolver = build_resolver(None);
        let refs = resolve_client_references(&files[1], &table, &resolver, FACTORY);
        assert_eq!(refs.variables, set(&["amplifyClient", "fresh", "plain"]));
        assert_eq!(refs.functions, set(&["createAmplifyClient"]));
    }

    #[test]
    fn test_lookup_is_per_file() {
        let file = parse("x.ts", "export const client = generateClient();");
        let table = ExportTable::build(std::slice::from_ref(&file), FACTORY);
        assert!(table.lookup(Path::new("x.ts"), "client").is_some());
        assert!(table.lookup(Path::new("y.ts"), "client").is_none());
        assert!(table.lookup(Path::new("x.ts"), "default").is_none());
    }
}

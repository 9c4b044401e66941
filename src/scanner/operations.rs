use tree_sitter::{Node, QueryCursor, StreamingIterator};

use crate::parser::{GrammarQuery, ParsedFile, node_text, strip_quotes};
use crate::usage::OperationName;

use super::clients::ClientReferences;

/// `<client>.models.<Model>.<operation>(...)`, with the model written as a property
/// or as a string-literal subscript (`models["Todo"]`).
///
/// The `models` name and the client identifier are checked in code: streaming matches
/// do not apply `#eq?` predicates.
static OPERATION_CALLS: GrammarQuery = GrammarQuery::new(
    r#"
    (call_expression
      function: (member_expression
        object: (member_expression
          object: (member_expression
            object: (identifier) @client
            property: (property_identifier) @models)
          property: (_) @model)
        property: (property_identifier) @operation))

    (call_expression
      function: (member_expression
        object: (subscript_expression
          object: (member_expression
            object: (identifier) @client
            property: (property_identifier) @models)
          index: (_) @model)
        property: (property_identifier) @operation))
"#,
);

/// A single `(model, operation)` observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationCall {
    pub model: String,
    pub operation: OperationName,
    /// 1-based line of the call.
    pub line: usize,
}

/// Extract every operation call made through one of `clients.variables`.
pub fn extract_operation_calls(file: &ParsedFile, clients: &ClientReferences) -> Vec<OperationCall> {
    if clients.variables.is_empty() {
        return Vec::new();
    }

    let source = file.bytes();
    let query = OPERATION_CALLS.get(file.grammar);
    let (Some(client_idx), Some(models_idx), Some(model_idx), Some(operation_idx)) = (
        query.capture_index_for_name("client"),
        query.capture_index_for_name("models"),
        query.capture_index_for_name("model"),
        query.capture_index_for_name("operation"),
    ) else {
        return Vec::new();
    };

    let mut calls = Vec::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, file.root(), source);

    while let Some(m) = matches.next() {
        let mut client: Option<&str> = None;
        let mut models: Option<&str> = None;
        let mut model: Option<Node> = None;
        let mut operation: Option<Node> = None;

        for capture in m.captures {
            if capture.index == client_idx {
                client = Some(node_text(capture.node, source));
            } else if capture.index == models_idx {
                models = Some(node_text(capture.node, source));
            } else if capture.index == model_idx {
                model = Some(capture.node);
            } else if capture.index == operation_idx {
                operation = Some(capture.node);
            }
        }

        let (Some(client), Some("models"), Some(model), Some(operation)) =
            (client, models, model, operation)
        else {
            continue;
        };
        if !clients.variables.contains(client) {
            continue;
        }
        let Some(model_name) = model_name(model, source) else {
            continue;
        };

        calls.push(OperationCall {
            model: model_name.to_owned(),
            operation: OperationName::from(node_text(operation, source)),
            line: operation.start_position().row + 1,
        });
    }

    calls
}

/// The model name for a property or string-literal subscript; `None` for computed access.
fn model_name<'a>(node: Node<'a>, source: &'a [u8]) -> Option<&'a str> {
    match node.kind() {
        "property_identifier" | "private_property_identifier" => Some(node_text(node, source)),
        "string" => Some(strip_quotes(node_text(node, source))),
        "template_string" if !has_substitution(node) => Some(strip_quotes(node_text(node, source))),
        _ => None,
    }
}

fn has_substitution(template: Node) -> bool {
    let mut cursor = template.walk();
    let found = template
        .named_children(&mut cursor)
        .any(|child| child.kind() == "template_substitution");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::Path;

    fn clients(names: &[&str]) -> ClientReferences {
        ClientReferences {
            variables: names.iter().map(|s| s.to_string()).collect(),
            functions: Default::default(),
        }
    }

    fn pairs(calls: &[OperationCall]) -> Vec<(String, String)> {
        calls
            .iter()
            .map(|c| (c.model.clone(), c.operation.to_string()))
            .collect()
    }

    fn extract(name: &str, source: &str, names: &[&str]) -> Vec<(String, String)> {
        let file = parse_source(Path::new(name), source.to_owned()).unwrap();
        pairs(&extract_operation_calls(&file, &clients(names)))
    }

    #[test]
    fn test_matches_known_client_only() {
        let src = r#"
            await client.models.Todo.create({ content });
            await other.models.Post.delete({ id });
            const { data } = await client.models.Post.list();
        "#;
        assert_eq!(
            extract("app.ts", src, &["client"]),
            vec![
                ("Todo".to_owned(), "create".to_owned()),
                ("Post".to_owned(), "list".to_owned()),
            ]
        );
    }

    #[test]
    fn test_requires_models_property() {
        let src = "client.queries.Todo.list(); client.models.Todo.get({ id });";
        assert_eq!(
            extract("app.ts", src, &["client"]),
            vec![("Todo".to_owned(), "get".to_owned())]
        );
    }

    #[test]
    fn test_quoted_subscript_model() {
        let src = r#"
            client.models["Todo"].list();
            client.models['Post'].get({ id });
            client.models[name].delete({ id });
        "#;
        assert_eq!(
            extract("app.ts", src, &["client"]),
            vec![
                ("Todo".to_owned(), "list".to_owned()),
                ("Post".to_owned(), "get".to_owned()),
            ]
        );
    }

    #[test]
    fn test_tsx_and_chained_subscribe() {
        let src = r#"
            export function List() {
              React.useEffect(() => {
                amplifyClient.models.Todo.observeQuery().subscribe({ next: () => {} });
              }, []);
              return <div></div>;
            }
        "#;
        assert_eq!(
            extract("component.tsx", src, &["amplifyClient"]),
            vec![("Todo".to_owned(), "observeQuery".to_owned())]
        );
    }

    #[test]
    fn test_unknown_operation_passes_through() {
        assert_eq!(
            extract("app.ts", "client.models.Todo.listByOwner({ owner });", &["client"]),
            vec![("Todo".to_owned(), "listByOwner".to_owned())]
        );
    }

    #[test]
    fn test_destructured_access_is_ignored() {
        let src = "const { Todo } = client.models; Todo.list();";
        assert!(extract("app.ts", src, &["client"]).is_empty());
    }

    #[test]
    fn test_no_clients_short_circuits() {
        assert!(extract("app.ts", "client.models.Todo.list();", &[]).is_empty());
    }

    #[test]
    fn test_reports_line() {
        let file = parse_source(
            Path::new("app.ts"),
            "\n\nclient.models.Todo.list();".to_owned(),
        )
        .unwrap();
        let calls = extract_operation_calls(&file, &clients(&["client"]));
        assert_eq!(calls[0].line, 3);
    }
}

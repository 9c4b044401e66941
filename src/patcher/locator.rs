use tree_sitter::Node;

use crate::error::PatchError;
use crate::parser::{ParsedFile, first_named_child, node_text, strip_quotes, visit_descendants};

/// Name of the method that constructs the schema: `a.schema({ ... })`.
const SCHEMA_METHOD: &str = "schema";
/// Name of the method at the root of every model definition chain: `a.model({ ... })`.
const MODEL_METHOD: &str = "model";

/// One property of the schema object whose value is a model definition chain.
#[derive(Debug, Clone, Copy)]
pub struct ModelDefinition<'t> {
    /// The property value, e.g. `a.model({...}).authorization(...)`.
    pub expression: Node<'t>,
    /// The innermost `a.model({...})` call of that chain.
    pub root: Node<'t>,
}

/// A schema property, recognised as a model definition or not.
#[derive(Debug, Clone)]
pub struct SchemaProperty<'t> {
    /// Property key with surrounding quotes removed.
    pub name: String,
    pub definition: Option<ModelDefinition<'t>>,
}

/// Find the first `<x>.schema(...)` call and list the properties of its object argument.
///
/// # Errors
/// - [`PatchError::SchemaNotFound`] if no such call exists
/// - [`PatchError::SchemaArgNotObject`] if its first argument is missing or not an object literal
pub fn locate_models(file: &ParsedFile) -> Result<Vec<SchemaProperty<'_>>, PatchError> {
    let source = file.bytes();
    let call = find_schema_call(file).ok_or(PatchError::SchemaNotFound)?;
    let object = call
        .child_by_field_name("arguments")
        .and_then(first_named_child)
        .filter(|arg| arg.kind() == "object")
        .ok_or(PatchError::SchemaArgNotObject)?;

    let mut properties = Vec::new();
    let mut cursor = object.walk();
    for prop in object.named_children(&mut cursor) {
        // Shorthand properties, spreads and methods are not model definitions.
        if prop.kind() != "pair" {
            continue;
        }
        let (Some(key), Some(value)) = (
            prop.child_by_field_name("key"),
            prop.child_by_field_name("value"),
        ) else {
            continue;
        };
        if key.kind() == "computed_property_name" {
            continue;
        }
        properties.push(SchemaProperty {
            name: strip_quotes(file.text(key)).to_owned(),
            definition: model_root(value, source).map(|root| ModelDefinition {
                expression: value,
                root,
            }),
        });
    }

    Ok(properties)
}

fn find_schema_call(file: &ParsedFile) -> Option<Node<'_>> {
    let source = file.bytes();
    let mut found = None;
    visit_descendants(file.root(), |node| {
        if found.is_some() || node.kind() != "call_expression" {
            return;
        }
        if callee_method(node, source) == Some(SCHEMA_METHOD) {
            found = Some(node);
        }
    });
    found
}

/// Walk a chain of `.method(...)` calls inward until the `.model(...)` call.
///
/// Returns `None` when the chain bottoms out without one.
pub fn model_root<'t>(expression: Node<'t>, source: &[u8]) -> Option<Node<'t>> {
    let mut current = expression;
    loop {
        if current.kind() != "call_expression" {
            return None;
        }
        let callee = current.child_by_field_name("function")?;
        if callee.kind() != "member_expression" {
            return None;
        }
        if callee_method(current, source) == Some(MODEL_METHOD) {
            return Some(current);
        }
        current = callee.child_by_field_name("object")?;
    }
}

/// For `obj.method(...)`, the text of `method`.
pub fn callee_method<'a>(call: Node<'a>, source: &'a [u8]) -> Option<&'a str> {
    let callee = call.child_by_field_name("function")?;
    if callee.kind() != "member_expression" {
        return None;
    }
    let property = callee.child_by_field_name("property")?;
    Some(node_text(property, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::Path;

    fn parse(source: &str) -> ParsedFile {
        parse_source(Path::new("resource.ts"), source.to_owned()).unwrap()
    }

    fn summary(file: &ParsedFile) -> Vec<(String, bool)> {
        locate_models(file)
            .unwrap()
            .into_iter()
            .map(|p| (p.name, p.definition.is_some()))
            .collect()
    }

    #[test]
    fn test_finds_plain_and_chained_models() {
        let file = parse(
            r#"
const schema = a.schema({
  Todo: a.model({ content: a.string() }),
  Post: a
    .model({ title: a.string() })
    .authorization((allow) => [allow.owner()])
    .secondaryIndexes((index) => [index("title")]),
  Status: a.enum(["open", "closed"]),
  "Quoted": a.model({}),
  'Single': a.model({}),
  shorthand,
  ...rest,
});
"#,
        );
        assert_eq!(
            summary(&file),
            vec![
                ("Todo".to_owned(), true),
                ("Post".to_owned(), true),
                ("Status".to_owned(), false),
                ("Quoted".to_owned(), true),
                ("Single".to_owned(), true),
            ]
        );
    }

    #[test]
    fn test_root_is_innermost_model_call() {
        let file = parse(
            "const schema = a.schema({ Todo: a.model({ x: a.string() }).authorization((allow) => []) });",
        );
        let props = locate_models(&file).unwrap();
        let def = props[0].definition.unwrap();
        assert_eq!(file.text(def.root), "a.model({ x: a.string() })");
        assert!(file.text(def.expression).ends_with(".authorization((allow) => [])"));
    }

    #[test]
    fn test_missing_schema_call() {
        let file = parse("const schema = defineSchema({ Todo: a.model({}) });");
        assert!(matches!(locate_models(&file), Err(PatchError::SchemaNotFound)));
    }

    #[test]
    fn test_schema_argument_not_object() {
        let file = parse("const schema = a.schema(models);");
        assert!(matches!(locate_models(&file), Err(PatchError::SchemaArgNotObject)));

        let empty = parse("const schema = a.schema();");
        assert!(matches!(locate_models(&empty), Err(PatchError::SchemaArgNotObject)));
    }

    #[test]
    fn test_chain_without_model_root_is_not_a_definition() {
        let file = parse("const schema = a.schema({ Custom: build().authorization(x) });");
        assert_eq!(summary(&file), vec![("Custom".to_owned(), false)]);
    }
}

use std::fmt;
use std::ops::Range;

use indexmap::IndexSet;
use tree_sitter::Node;

use crate::parser::{first_named_child, node_text, strip_quotes};

use super::OnExisting;
use super::locator::{ModelDefinition, callee_method};

/// The chain method this tool writes.
pub const DISABLE_OPERATIONS: &str = "disableOperations";

/// What happened to one model definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelAction {
    /// A new `disableOperations` call was appended.
    Added(Vec<String>),
    /// Nothing to disable and nothing present; the text is untouched.
    Unchanged,
    /// An existing call was kept as-is.
    Skipped,
    /// An existing call was replaced by the computed list (empty means removed).
    Overwritten(Vec<String>),
    /// An existing call was merged with the computed list (empty means removed).
    Merged(Vec<String>),
    /// The property value is not a `.model(...)` chain.
    NotAModel,
}

impl fmt::Display for ModelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelAction::Added(list) => write!(f, "added [{}]", list.join(", ")),
            ModelAction::Unchanged => write!(f, "unchanged"),
            ModelAction::Skipped => write!(f, "skipped"),
            ModelAction::Overwritten(list) if list.is_empty() => write!(f, "removed"),
            ModelAction::Overwritten(list) => write!(f, "overwritten [{}]", list.join(", ")),
            ModelAction::Merged(list) if list.is_empty() => write!(f, "removed"),
            ModelAction::Merged(list) => write!(f, "merged [{}]", list.join(", ")),
            ModelAction::NotAModel => write!(f, "not a model"),
        }
    }
}

/// A replacement of a byte range of the original source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

/// One `.method(...)` call wrapped around the model root.
#[derive(Debug, Clone, Copy)]
struct ChainLink<'t> {
    call: Node<'t>,
    /// End of the receiver expression; the link's own text runs from here to `call`'s end.
    receiver_end: usize,
    /// Start of the `.` token.
    dot_start: usize,
}

/// Decide how a model definition changes under `policy`.
///
/// `disable` is the freshly computed list. Existing `disableOperations` calls are found
/// by walking the call chain, so they may sit anywhere between the root and the end.
pub fn rewrite_model(
    name: &str,
    definition: ModelDefinition<'_>,
    source: &[u8],
    disable: &[String],
    policy: OnExisting,
) -> (ModelAction, Option<Edit>) {
    let expression = definition.expression;
    let links = chain_links(definition, source);
    let separator = chain_separator(&links, source);
    let existing: Vec<ChainLink> = links
        .iter()
        .copied()
        .filter(|link| callee_method(link.call, source) == Some(DISABLE_OPERATIONS))
        .collect();

    if existing.is_empty() {
        if disable.is_empty() {
            return (ModelAction::Unchanged, None);
        }
        let text = format!(
            "{}{}",
            node_text(expression, source),
            disable_call(separator, disable)
        );
        return (ModelAction::Added(disable.to_vec()), Some(replace(expression, text)));
    }

    match policy {
        OnExisting::Skip => {
            tracing::warn!("[skip] already has {DISABLE_OPERATIONS}: {name}");
            (ModelAction::Skipped, None)
        }
        OnExisting::Overwrite => {
            let text = rebuilt(expression, &existing, source, separator, disable);
            tracing::info!("[overwrite] replaced {DISABLE_OPERATIONS} for {name}");
            (
                ModelAction::Overwritten(disable.to_vec()),
                Some(replace(expression, text)),
            )
        }
        OnExisting::Merge => {
            // `existing` runs outermost first; entries are collected in source order.
            let parsed: Vec<Vec<String>> = existing
                .iter()
                .rev()
                .filter_map(|link| literal_arguments(link.call, source))
                .collect();
            if parsed.is_empty() {
                tracing::warn!(
                    "[skip] cannot read existing {DISABLE_OPERATIONS} arguments for {name}"
                );
                return (ModelAction::Skipped, None);
            }

            let merged: Vec<String> = parsed
                .into_iter()
                .flatten()
                .chain(disable.iter().cloned())
                .collect::<IndexSet<String>>()
                .into_iter()
                .collect();
            let text = rebuilt(expression, &existing, source, separator, &merged);
            tracing::info!(
                "[merge] merged {DISABLE_OPERATIONS} for {name}: [{}]",
                merged.join(", ")
            );
            (ModelAction::Merged(merged), Some(replace(expression, text)))
        }
    }
}

/// Apply non-overlapping edits to `source`.
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| std::cmp::Reverse(edit.range.start));
    let mut out = source.to_owned();
    for edit in edits {
        out.replace_range(edit.range, &edit.replacement);
    }
    out
}

/// `.disableOperations(["queries","mutations"])`, preceded by `separator`.
fn disable_call(separator: &str, ops: &[String]) -> String {
    let args: Vec<String> = ops.iter().map(|op| format!("\"{op}\"")).collect();
    format!("{separator}.{DISABLE_OPERATIONS}([{}])", args.join(","))
}

fn replace(expression: Node, text: String) -> Edit {
    Edit {
        range: expression.byte_range(),
        replacement: text,
    }
}

/// The expression text with `remove` cut out, plus a fresh call when `ops` is non-empty.
fn rebuilt(
    expression: Node,
    remove: &[ChainLink],
    source: &[u8],
    separator: &str,
    ops: &[String],
) -> String {
    let base = expression.start_byte();
    let mut text = node_text(expression, source).to_owned();
    // Links are ordered outermost first, so ranges are removed back to front.
    for link in remove {
        text.replace_range(link.receiver_end - base..link.call.end_byte() - base, "");
    }
    if !ops.is_empty() {
        text.push_str(&disable_call(separator, ops));
    }
    text
}

/// Calls wrapped around the model root, outermost first. The root itself is excluded.
fn chain_links<'t>(definition: ModelDefinition<'t>, source: &[u8]) -> Vec<ChainLink<'t>> {
    let mut links = Vec::new();
    let mut current = definition.expression;
    while current != definition.root {
        let Some(callee) = current
            .child_by_field_name("function")
            .filter(|c| c.kind() == "member_expression")
        else {
            break;
        };
        let Some(receiver) = callee.child_by_field_name("object") else {
            break;
        };
        links.push(ChainLink {
            call: current,
            receiver_end: receiver.end_byte(),
            dot_start: dot_start(callee, receiver, source),
        });
        current = receiver;
    }
    links
}

fn dot_start(member: Node, receiver: Node, source: &[u8]) -> usize {
    let mut cursor = member.walk();
    let found = member
        .children(&mut cursor)
        .find(|child| matches!(node_text(*child, source), "." | "?."))
        .map(|dot| dot.start_byte())
        .unwrap_or_else(|| receiver.end_byte());
    found
}

/// Whitespace that puts the outermost link on its own line, reused for an appended call.
///
/// `a\n    .model({...})\n    .authorization(...)` → `"\n    "`; single-line chains get `""`.
fn chain_separator<'s>(links: &[ChainLink], source: &'s [u8]) -> &'s str {
    let Some(outermost) = links.first() else {
        return "";
    };
    let gap = std::str::from_utf8(&source[outermost.receiver_end..outermost.dot_start]).unwrap_or("");
    if gap.contains('\n') && gap.trim().is_empty() {
        gap
    } else {
        ""
    }
}

/// String literals of the call's array argument, or `None` if it is not an array literal.
fn literal_arguments(call: Node, source: &[u8]) -> Option<Vec<String>> {
    let array = call
        .child_by_field_name("arguments")
        .and_then(first_named_child)
        .filter(|arg| arg.kind() == "array")?;
    let mut cursor = array.walk();
    let values = array
        .named_children(&mut cursor)
        .filter(|element| matches!(element.kind(), "string" | "template_string"))
        .map(|element| strip_quotes(node_text(element, source)).to_owned())
        .filter(|value| !value.is_empty())
        .collect();
    Some(values)
}

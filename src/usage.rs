use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PatchError;

/// Name of an operation invoked on a model, e.g. `list` in `client.models.Todo.list()`.
///
/// The set of names is open: anything the scanner observes is kept verbatim so
/// newer client operations pass through untouched. Ordering is plain string order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationName(String);

impl OperationName {
    pub const GET: &'static str = "get";
    pub const LIST: &'static str = "list";
    pub const CREATE: &'static str = "create";
    pub const UPDATE: &'static str = "update";
    pub const DELETE: &'static str = "delete";
    pub const OBSERVE_QUERY: &'static str = "observeQuery";
    pub const ON_CREATE: &'static str = "onCreate";
    pub const ON_UPDATE: &'static str = "onUpdate";
    pub const ON_DELETE: &'static str = "onDelete";
}

impl From<&str> for OperationName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl Borrow<str> for OperationName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model name → sorted, duplicate-free list of operations used on it.
///
/// This is the only artifact shared by the scan and apply pipelines. On disk it
/// is a plain JSON object of string arrays, e.g. `{"Todo": ["create", "list"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageMap(BTreeMap<String, BTreeSet<OperationName>>);

impl UsageMap {
    /// Operations recorded for `model`, or `None` when the model was never seen.
    pub fn operations(&self, model: &str) -> Option<&BTreeSet<OperationName>> {
        self.0.get(model)
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Read a usage map from a JSON file.
    ///
    /// Malformed JSON (or anything that is not an object of string arrays) is fatal.
    pub fn load(path: &Path) -> Result<Self, PatchError> {
        let contents = std::fs::read_to_string(path).map_err(|e| PatchError::io(path, e))?;
        Self::from_json(&contents).map_err(|source| PatchError::UsageMap {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    pub fn to_json_pretty(&self) -> String {
        // A map of string sets always serialises.
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_owned())
    }

    /// Write the map as pretty JSON, creating missing parent directories.
    pub fn save(&self, path: &Path) -> Result<(), PatchError> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(|e| PatchError::io(dir, e))?;
        }
        std::fs::write(path, self.to_json_pretty()).map_err(|e| PatchError::io(path, e))
    }
}

impl FromIterator<(String, OperationName)> for UsageMap {
    fn from_iter<I: IntoIterator<Item = (String, OperationName)>>(iter: I) -> Self {
        let mut map: BTreeMap<String, BTreeSet<OperationName>> = BTreeMap::new();
        for (model, op) in iter {
            map.entry(model).or_default().insert(op);
        }
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(map: &UsageMap, model: &str) -> Vec<String> {
        map.operations(model)
            .map(|set| set.iter().map(|o| o.to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_collect_sorts_and_dedups() {
        let map: UsageMap = [
            ("Todo", "list"),
            ("Todo", "create"),
            ("Todo", "list"),
            ("Post", "delete"),
        ]
        .into_iter()
        .map(|(m, o)| (m.to_owned(), OperationName::from(o)))
        .collect();

        assert_eq!(ops(&map, "Todo"), vec!["create", "list"]);
        assert_eq!(ops(&map, "Post"), vec!["delete"]);
        assert!(map.operations("Comment").is_none());
    }

    #[test]
    fn test_json_shape() {
        let map: UsageMap = [("Todo".to_owned(), OperationName::from("observeQuery"))]
            .into_iter()
            .collect();
        let value: serde_json::Value = serde_json::from_str(&map.to_json_pretty()).unwrap();
        assert_eq!(value, serde_json::json!({ "Todo": ["observeQuery"] }));
    }

    #[test]
    fn test_unknown_operation_passes_through() {
        let map = UsageMap::from_json(r#"{"Todo": ["customQuery", "get"]}"#).unwrap();
        assert_eq!(ops(&map, "Todo"), vec!["customQuery", "get"]);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(UsageMap::from_json("{ not json").is_err());
        assert!(UsageMap::from_json(r#"{"Todo": "get"}"#).is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let err = UsageMap::load(&path).unwrap_err();
        assert!(matches!(err, PatchError::UsageMap { .. }));
        assert!(err.to_string().contains("usage.json"));
    }

    #[test]
    fn test_save_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("usage.json");
        let map: UsageMap = [("Post".to_owned(), OperationName::from("get"))]
            .into_iter()
            .collect();
        map.save(&path).unwrap();
        assert_eq!(UsageMap::load(&path).unwrap(), map);
    }
}

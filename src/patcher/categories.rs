use std::collections::BTreeSet;
use std::fmt;

use crate::usage::OperationName;

/// A group of model operations that can be disabled as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationCategory {
    Queries,
    Mutations,
    Subscriptions,
}

impl OperationCategory {
    /// All categories, in the order they are written into `disableOperations([...])`.
    pub const ALL: [Self; 3] = [Self::Queries, Self::Mutations, Self::Subscriptions];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queries => "queries",
            Self::Mutations => "mutations",
            Self::Subscriptions => "subscriptions",
        }
    }

    /// Operations that keep this category alive.
    ///
    /// `observeQuery` is both a query and a subscription, so it keeps both enabled.
    pub fn members(self) -> &'static [&'static str] {
        match self {
            Self::Queries => &[
                OperationName::GET,
                OperationName::LIST,
                OperationName::OBSERVE_QUERY,
            ],
            Self::Mutations => &[
                OperationName::CREATE,
                OperationName::UPDATE,
                OperationName::DELETE,
            ],
            Self::Subscriptions => &[
                OperationName::ON_CREATE,
                OperationName::ON_UPDATE,
                OperationName::ON_DELETE,
                OperationName::OBSERVE_QUERY,
            ],
        }
    }
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories to disable for a model given the operations it uses.
///
/// A category is disabled iff none of its members is used. Operation names outside
/// every category are ignored. No usage at all disables everything.
pub fn disabled_categories(used: Option<&BTreeSet<OperationName>>) -> Vec<OperationCategory> {
    let Some(used) = used.filter(|ops| !ops.is_empty()) else {
        return OperationCategory::ALL.to_vec();
    };

    OperationCategory::ALL
        .into_iter()
        .filter(|category| !category.members().iter().any(|op| used.contains(*op)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use OperationCategory::*;

    fn used(ops: &[&str]) -> BTreeSet<OperationName> {
        ops.iter().map(|op| OperationName::from(*op)).collect()
    }

    fn disabled(ops: &[&str]) -> Vec<OperationCategory> {
        disabled_categories(Some(&used(ops)))
    }

    #[test]
    fn test_absent_or_empty_usage_disables_everything() {
        assert_eq!(disabled_categories(None), vec![Queries, Mutations, Subscriptions]);
        assert_eq!(disabled(&[]), vec![Queries, Mutations, Subscriptions]);
    }

    #[test]
    fn test_observe_query_keeps_queries_and_subscriptions() {
        assert_eq!(disabled(&["observeQuery"]), vec![Mutations]);
    }

    #[test]
    fn test_grouping() {
        assert_eq!(disabled(&["create", "list"]), vec![Subscriptions]);
        assert_eq!(disabled(&["get"]), vec![Mutations, Subscriptions]);
        assert_eq!(disabled(&["create", "update", "delete"]), vec![Queries, Subscriptions]);
        assert_eq!(disabled(&["create", "delete", "onCreate"]), vec![Queries]);
        assert_eq!(disabled(&["onCreate"]), vec![Queries, Mutations]);
    }

    #[test]
    fn test_full_usage_disables_nothing() {
        assert!(disabled(&["get", "create", "onDelete"]).is_empty());
    }

    #[test]
    fn test_unknown_operations_do_not_count() {
        assert_eq!(
            disabled(&["listByOwner", "customMutation"]),
            vec![Queries, Mutations, Subscriptions]
        );
    }

    #[test]
    fn test_display() {
        let names: Vec<String> = OperationCategory::ALL.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["queries", "mutations", "subscriptions"]);
    }

    fn op_strategy() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("get"),
            Just("list"),
            Just("create"),
            Just("update"),
            Just("delete"),
            Just("observeQuery"),
            Just("onCreate"),
            Just("onUpdate"),
            Just("onDelete"),
            Just("somethingNew"),
        ]
    }

    proptest! {
        /// Using more operations never disables more categories.
        #[test]
        fn prop_monotone(
            base in proptest::collection::vec(op_strategy(), 0..6),
            extra in proptest::collection::vec(op_strategy(), 0..6),
        ) {
            let small = used(&base);
            let mut large = small.clone();
            large.extend(extra.iter().map(|op| OperationName::from(*op)));

            let disabled_small = disabled_categories(Some(&small));
            let disabled_large = disabled_categories(Some(&large));
            for category in &disabled_large {
                prop_assert!(disabled_small.contains(category));
            }
        }

        /// Output keeps the fixed queries/mutations/subscriptions order.
        #[test]
        fn prop_sorted(ops in proptest::collection::vec(op_strategy(), 0..6)) {
            let result = disabled(&ops);
            let mut sorted = result.clone();
            sorted.sort();
            prop_assert_eq!(result, sorted);
        }
    }
}

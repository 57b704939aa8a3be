//! Property-based test generators using proptest.

use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use shopsync_codec::{Record, Value};
use shopsync_core::{CategoryTree, RemoteId, TreeNode};

/// Strategy for Magento-style numeric remote ids.
pub fn remote_id_strategy() -> impl Strategy<Value = RemoteId> {
    (0u64..10_000_000).prop_map(|n| RemoteId::new(n.to_string()))
}

/// Strategy for local field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for scalar field values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[ -~]{0,24}".prop_map(Value::Text),
    ]
}

/// Strategy for flat records.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(field_name_strategy(), scalar_strategy(), 0..8).prop_map(Record::from)
}

/// Strategy for person names of one to four words.
pub fn person_name_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Z][a-z]{1,9}", 1..5).prop_map(|words| words.join(" "))
}

/// Shape of a category tree, before ids are assigned.
#[derive(Debug, Clone)]
pub struct TreeShape(pub Vec<TreeShape>);

/// Strategy for tree shapes at most `depth` levels below the root with at
/// most `breadth` children per node.
pub fn tree_shape_strategy(depth: u32, breadth: usize) -> impl Strategy<Value = TreeShape> {
    let leaf = Just(TreeShape(Vec::new()));
    leaf.prop_recursive(depth, 64, breadth as u32, move |inner| {
        prop::collection::vec(inner, 0..=breadth).prop_map(TreeShape)
    })
}

/// Strategy for single-rooted category trees, as Magento serves them,
/// with distinct ids numbered depth first from 1.
pub fn category_tree_strategy(depth: u32, breadth: usize) -> impl Strategy<Value = CategoryTree> {
    tree_shape_strategy(depth, breadth).prop_map(|root| {
        let mut next = 1u64;
        number(std::slice::from_ref(&root), &mut next)
    })
}

fn number(shapes: &[TreeShape], next: &mut u64) -> CategoryTree {
    let mut tree = CategoryTree::new();
    for shape in shapes {
        let id = next.to_string();
        *next += 1;
        let children = number(&shape.0, next);
        tree = tree.with_node(id, children);
    }
    tree
}

/// Converts the first root of a tree into the answer of
/// `catalog_category.tree`. An empty tree converts to null.
pub fn tree_to_value(tree: &CategoryTree) -> Value {
    tree.nodes().first().map_or(Value::Null, node_to_value)
}

fn node_to_value(node: &TreeNode) -> Value {
    Value::Map(
        [
            ("category_id".to_string(), Value::from(node.id.as_str())),
            (
                "children".to_string(),
                Value::Array(node.children.nodes().iter().map(node_to_value).collect()),
            ),
        ]
        .into_iter()
        .collect(),
    )
}

/// How hard property tests should try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thoroughness {
    /// Few cases, for the default test run.
    Quick,
    /// Many cases, for scheduled runs.
    Thorough,
}

impl Thoroughness {
    /// Proptest configuration at this level.
    pub fn config(self) -> ProptestConfig {
        let cases = match self {
            Thoroughness::Quick => 64,
            Thoroughness::Thorough => 2048,
        };
        ProptestConfig {
            cases,
            max_shrink_iters: 1000,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    proptest! {
        #[test]
        fn tree_ids_are_distinct(tree in category_tree_strategy(3, 3)) {
            let ids: BTreeSet<_> = tree.walk().into_iter().map(|(id, _)| id.clone()).collect();
            prop_assert_eq!(ids.len(), tree.len());
        }

        #[test]
        fn tree_value_converts_back(tree in category_tree_strategy(3, 3)) {
            let back = shopsync_magento::tree_from_value(&tree_to_value(&tree)).unwrap();
            prop_assert_eq!(back, tree);
        }
    }

    #[test]
    fn thorough_runs_more_cases() {
        assert!(Thoroughness::Thorough.config().cases > Thoroughness::Quick.config().cases);
    }
}

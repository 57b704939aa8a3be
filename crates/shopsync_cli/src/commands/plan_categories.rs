//! Plan-categories command implementation.
//!
//! Reads the answer of `catalog_category.tree` saved as JSON and prints
//! the import jobs a tree batch would enqueue.

use super::{read_file, CliResult, Format};
use serde::Serialize;
use shopsync_codec::Value;
use shopsync_core::RemoteId;
use shopsync_magento::tree_from_value;
use std::collections::BTreeSet;
use std::path::Path;

/// A planned category import.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct PlannedImport {
    /// Remote category id.
    pub id: String,
    /// Depth in the tree.
    pub depth: u32,
    /// Job priority.
    pub priority: u32,
}

/// Plans the import of the tree stored in `path`.
///
/// Only the categories of `changed` are planned when it is given.
pub fn plan(path: &Path, base_priority: u32, changed: Option<&[String]>) -> CliResult<Vec<PlannedImport>> {
    let bytes = read_file(path)?;
    let node: Value = serde_json::from_slice(&bytes)?;
    let tree = tree_from_value(&node)?;
    let changed: Option<BTreeSet<RemoteId>> =
        changed.map(|ids| ids.iter().map(|id| RemoteId::from(id.as_str())).collect());
    Ok(tree
        .plan(base_priority, changed.as_ref())
        .into_iter()
        .map(|(id, priority)| PlannedImport {
            id: id.to_string(),
            depth: priority.saturating_sub(base_priority),
            priority,
        })
        .collect())
}

/// Runs the plan-categories command.
pub fn run(path: &Path, base_priority: u32, changed: Option<&[String]>, format: Format) -> CliResult<()> {
    let planned = plan(path, base_priority, changed)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&planned)?),
        Format::Text => {
            for job in &planned {
                println!(
                    "{:>4}  {}{}",
                    job.priority,
                    "  ".repeat(job.depth as usize),
                    job.id
                );
            }
            println!("{} import job(s)", planned.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TREE: &str = r#"{
        "category_id": "1",
        "children": [
            {"category_id": "2", "children": []},
            {"category_id": "3", "children": [{"category_id": "4", "children": []}]}
        ]
    }"#;

    fn tree_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parents_come_first() {
        let file = tree_file(TREE);

        let planned = plan(file.path(), 10, None).unwrap();

        let ids: Vec<(&str, u32)> = planned.iter().map(|p| (p.id.as_str(), p.priority)).collect();
        assert_eq!(ids, vec![("1", 10), ("2", 11), ("3", 11), ("4", 12)]);
    }

    #[test]
    fn changed_categories_only() {
        let file = tree_file(TREE);
        let changed = vec!["4".to_string()];

        let planned = plan(file.path(), 20, Some(&changed)).unwrap();

        assert_eq!(
            planned,
            vec![PlannedImport {
                id: "4".into(),
                depth: 2,
                priority: 22
            }]
        );
    }

    #[test]
    fn node_without_id_is_rejected() {
        let file = tree_file(r#"{"children": []}"#);

        assert!(plan(file.path(), 10, None).is_err());
    }
}

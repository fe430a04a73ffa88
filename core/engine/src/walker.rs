//! Depth-first enumeration of a secret namespace.

use tracing::{debug, error, info, warn};

use kvbackup_common::{is_directory, join_path, SEPARATOR};
use kvbackup_store::SecretStore;

use crate::aggregate::Aggregate;
use crate::encoder::ValueEncoding;
use crate::reader::{LeafStatus, SecretReader};
use crate::report::{BackupReport, NodeFailure, NodeOperation};

/// Walks directories, reads every leaf and merges it into an aggregate.
///
/// Traversal uses an explicit stack, so depth is bounded only by memory.
/// The namespace is assumed to be a strict tree; there is no cycle
/// detection.
pub struct PathEnumerator<'a> {
    store: &'a dyn SecretStore,
    reader: SecretReader<'a>,
}

impl<'a> PathEnumerator<'a> {
    pub fn new(store: &'a dyn SecretStore, encoding: ValueEncoding) -> Self {
        Self {
            store,
            reader: SecretReader::new(store, encoding),
        }
    }

    /// Visit `parent + name` for every name, depth-first in the given
    /// order, descending into directories in the order the store lists
    /// them.
    ///
    /// A name ending in `/` (or the empty name, meaning the namespace
    /// root) is listed; anything else is read as a leaf. List and read
    /// failures are recorded in `report` and the walk moves on to the
    /// next sibling.
    pub async fn walk(
        &self,
        parent: &str,
        names: &[String],
        aggregate: &mut Aggregate,
        report: &mut BackupReport,
    ) {
        let mut pending: Vec<String> = names
            .iter()
            .rev()
            .map(|name| join_path(parent, name))
            .collect();

        while let Some(candidate) = pending.pop() {
            if is_directory(&candidate) {
                let children = self.list_directory(&candidate, report).await;
                for child in children.iter().rev() {
                    pending.push(join_path(&candidate, child));
                }
            } else {
                self.visit_leaf(&candidate, aggregate, report).await;
            }
        }
    }

    async fn list_directory(&self, path: &str, report: &mut BackupReport) -> Vec<String> {
        debug!(path = %path, "Listing directory");

        match self.store.list(path).await {
            Ok(Some(children)) => {
                report.directories_listed += 1;
                children
                    .into_iter()
                    .filter(|child| {
                        // An empty or bare-separator child would re-list its own parent.
                        let valid = !child.is_empty() && !child.starts_with(SEPARATOR);
                        if !valid {
                            warn!(path = %path, child = %child, "Ignoring invalid child name");
                        }
                        valid
                    })
                    .collect()
            }
            Ok(None) => {
                warn!(path = %path, "Directory not found");
                report.not_found.push(path.to_string());
                Vec::new()
            }
            Err(err) => {
                error!(path = %path, error = %err, "Unable to list directory");
                report
                    .failures
                    .push(NodeFailure::new(path, NodeOperation::List, &err));
                Vec::new()
            }
        }
    }

    async fn visit_leaf(&self, path: &str, aggregate: &mut Aggregate, report: &mut BackupReport) {
        info!(path = %path, "Reading secret");

        let leaf = match self.reader.read_leaf(path).await {
            Ok(leaf) => leaf,
            Err(err) => {
                error!(path = %path, error = %err, "Unable to read secret");
                report
                    .failures
                    .push(NodeFailure::new(path, NodeOperation::Read, &err));
                return;
            }
        };

        match leaf.status {
            LeafStatus::Found => report.leaves_read += 1,
            LeafStatus::NotFound => report.not_found.push(path.to_string()),
        }

        for (field, reason) in &leaf.rejected {
            report.failures.push(NodeFailure::new(
                format!("{}{}{}", path, SEPARATOR, field),
                NodeOperation::Flatten,
                reason,
            ));
        }

        let collisions = aggregate.merge(&leaf);
        report.collisions.extend(collisions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kvbackup_common::{Result, SecretData, SecretValue};
    use kvbackup_store::{MemoryStore, Operation};
    use std::sync::Mutex;

    fn data(pairs: &[(&str, &str)]) -> SecretData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), SecretValue::from(*v)))
            .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Store from the basic scenarios: leaf `b`, directory `a/` with leaf `a/c`.
    fn scenario_store() -> MemoryStore {
        MemoryStore::with_secrets([
            ("b".to_string(), data(&[("x", "1")])),
            ("a/c".to_string(), data(&[("y", "2")])),
        ])
    }

    /// Records the order of every store call.
    struct Recording {
        inner: MemoryStore,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SecretStore for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn list(&self, path: &str) -> Result<Option<Vec<String>>> {
            self.calls.lock().unwrap().push(format!("list:{}", path));
            self.inner.list(path).await
        }

        async fn read(&self, path: &str) -> Result<Option<SecretData>> {
            self.calls.lock().unwrap().push(format!("read:{}", path));
            self.inner.read(path).await
        }

        async fn write(&self, path: &str, data: &SecretData) -> Result<()> {
            self.inner.write(path, data).await
        }
    }

    #[tokio::test]
    async fn test_walk_plain() {
        let store = scenario_store();
        let walker = PathEnumerator::new(&store, ValueEncoding::Plain);
        let mut aggregate = Aggregate::new();
        let mut report = BackupReport::new();

        walker
            .walk("", &names(&["a/", "b"]), &mut aggregate, &mut report)
            .await;

        let entries = aggregate.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["b/x"], "1");
        assert_eq!(entries["a/c/y"], "2");
        assert!(report.is_complete());
        assert_eq!(report.leaves_read, 2);
        assert_eq!(report.directories_listed, 1);
    }

    #[tokio::test]
    async fn test_walk_base64() {
        let store = scenario_store();
        let walker = PathEnumerator::new(&store, ValueEncoding::Base64);
        let mut aggregate = Aggregate::new();
        let mut report = BackupReport::new();

        walker
            .walk("", &names(&["a/", "b"]), &mut aggregate, &mut report)
            .await;

        assert_eq!(aggregate.entries()["b/x"], "MQ==");
        assert_eq!(aggregate.entries()["a/c/y"], "Mg==");
    }

    #[tokio::test]
    async fn test_list_failure_continues() {
        let store = scenario_store();
        store.fail_on(Operation::List, "a/").unwrap();
        let walker = PathEnumerator::new(&store, ValueEncoding::Plain);
        let mut aggregate = Aggregate::new();
        let mut report = BackupReport::new();

        walker
            .walk("", &names(&["a/", "b"]), &mut aggregate, &mut report)
            .await;

        assert_eq!(aggregate.len(), 1);
        assert_eq!(aggregate.entries()["b/x"], "1");
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failures[0].path, "a/");
        assert_eq!(report.failures[0].operation, NodeOperation::List);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_read_failure_continues() {
        let store = scenario_store();
        store.fail_on(Operation::Read, "a/c").unwrap();
        let walker = PathEnumerator::new(&store, ValueEncoding::Plain);
        let mut aggregate = Aggregate::new();
        let mut report = BackupReport::new();

        walker
            .walk("", &names(&["a/", "b"]), &mut aggregate, &mut report)
            .await;

        assert_eq!(aggregate.len(), 1);
        assert_eq!(report.failures[0].operation, NodeOperation::Read);
        assert_eq!(report.failures[0].path, "a/c");
    }

    #[tokio::test]
    async fn test_empty_root_walks_whole_namespace() {
        let store = MemoryStore::with_secrets([
            ("b".to_string(), data(&[("x", "1")])),
            ("a/c".to_string(), data(&[("y", "2")])),
            ("a/d/e".to_string(), data(&[("z", "3")])),
        ]);
        let walker = PathEnumerator::new(&store, ValueEncoding::Plain);
        let mut aggregate = Aggregate::new();
        let mut report = BackupReport::new();

        walker.walk("", &names(&[""]), &mut aggregate, &mut report).await;

        assert_eq!(aggregate.len(), 3);
        assert_eq!(aggregate.entries()["a/d/e/z"], "3");
        assert_eq!(report.directories_listed, 3);
    }

    #[tokio::test]
    async fn test_not_found_nodes_are_not_failures() {
        let store = scenario_store();
        let walker = PathEnumerator::new(&store, ValueEncoding::Plain);
        let mut aggregate = Aggregate::new();
        let mut report = BackupReport::new();

        walker
            .walk("", &names(&["gone", "nothing/"]), &mut aggregate, &mut report)
            .await;

        assert!(aggregate.is_empty());
        assert!(report.is_complete());
        assert_eq!(report.not_found, names(&["gone", "nothing/"]));
        assert_eq!(report.leaves_read, 0);
    }

    #[tokio::test]
    async fn test_missing_leaf_not_counted_as_read() {
        let store = scenario_store();
        let walker = PathEnumerator::new(&store, ValueEncoding::Plain);
        let mut aggregate = Aggregate::new();
        let mut report = BackupReport::new();

        walker
            .walk("", &names(&["b", "gone"]), &mut aggregate, &mut report)
            .await;

        assert_eq!(report.leaves_read, 1);
        assert_eq!(report.not_found, names(&["gone"]));
    }

    #[tokio::test]
    async fn test_depth_first_in_listing_order() {
        let inner = MemoryStore::with_secrets([
            ("r/z".to_string(), data(&[("f", "1")])),
            ("r/a/leaf".to_string(), data(&[("f", "2")])),
            ("r/m".to_string(), data(&[("f", "3")])),
        ]);
        inner
            .set_listing("r/", names(&["z", "a/", "m"]))
            .unwrap();
        let store = Recording {
            inner,
            calls: Mutex::new(Vec::new()),
        };

        let walker = PathEnumerator::new(&store, ValueEncoding::Plain);
        let mut aggregate = Aggregate::new();
        let mut report = BackupReport::new();
        walker
            .walk("", &names(&["r/"]), &mut aggregate, &mut report)
            .await;

        let calls = store.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            names(&["list:r/", "read:r/z", "list:r/a/", "read:r/a/leaf", "read:r/m"])
        );
        assert_eq!(aggregate.len(), 3);
    }

    #[tokio::test]
    async fn test_rejected_fields_reported() {
        let store = MemoryStore::with_secrets([(
            "a".to_string(),
            data(&[("ok", "1"), ("b/c", "2")]),
        )]);
        let walker = PathEnumerator::new(&store, ValueEncoding::Plain);
        let mut aggregate = Aggregate::new();
        let mut report = BackupReport::new();

        walker.walk("", &names(&["a"]), &mut aggregate, &mut report).await;

        assert_eq!(aggregate.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "a/b/c");
        assert_eq!(report.failures[0].operation, NodeOperation::Flatten);
    }

    #[tokio::test]
    async fn test_nested_parent_prefix() {
        let store = scenario_store();
        let walker = PathEnumerator::new(&store, ValueEncoding::Plain);
        let mut aggregate = Aggregate::new();
        let mut report = BackupReport::new();

        walker.walk("a/", &names(&["c"]), &mut aggregate, &mut report).await;

        assert_eq!(aggregate.entries()["a/c/y"], "2");
        assert_eq!(report.directories_listed, 0);
    }
}

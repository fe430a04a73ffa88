//! Aggregate mapping built up during a backup.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::reader::LeafSecrets;
use crate::report::MergeCollision;

/// Flattened key to encoded value, the shape of every backup artifact.
pub type AggregateMap = BTreeMap<String, String>;

/// Single-writer accumulator for flattened leaf results.
///
/// Iteration order is the key order of the underlying map. Each key
/// remembers the leaf that produced it so collisions name both sides.
#[derive(Debug, Default)]
pub struct Aggregate {
    entries: AggregateMap,
    sources: BTreeMap<String, String>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one leaf result, last write wins.
    ///
    /// Every entry is applied independently. A key that already came from
    /// a different leaf is overwritten and returned as a collision;
    /// re-merging the same leaf is a plain overwrite.
    pub fn merge(&mut self, from: &LeafSecrets) -> Vec<MergeCollision> {
        let mut collisions = Vec::new();

        for (key, value) in &from.entries {
            if let Some(previous) = self.sources.get(key) {
                if previous != &from.source {
                    warn!(
                        key = %key,
                        previous_source = %previous,
                        new_source = %from.source,
                        "Flattened key collision, keeping the newer value"
                    );
                    collisions.push(MergeCollision {
                        key: key.clone(),
                        previous_source: previous.clone(),
                        new_source: from.source.clone(),
                    });
                }
            }

            self.entries.insert(key.clone(), value.clone());
            self.sources.insert(key.clone(), from.source.clone());
        }

        debug!(source = %from.source, merged = from.entries.len(), total = self.entries.len(), "Merged leaf");
        collisions
    }

    pub fn entries(&self) -> &AggregateMap {
        &self.entries
    }

    /// Leaf that produced a key.
    pub fn source_of(&self, key: &str) -> Option<&str> {
        self.sources.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand the finished mapping to a formatter.
    pub fn into_entries(self) -> AggregateMap {
        self.entries
    }
}

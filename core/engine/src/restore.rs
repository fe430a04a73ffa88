//! Regrouping flattened entries into per-path bundles and writing them back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use kvbackup_common::{Error, FlattenedKey, Result, SecretData};
use kvbackup_store::SecretStore;

use crate::encoder::ValueEncoding;
use crate::report::{NodeFailure, NodeOperation, RestoreReport, WrittenBundle};

/// How flattened entries are grouped into bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingStrategy {
    /// Stable-sort by owner path, then group. One bundle per path no
    /// matter how the input is ordered.
    #[default]
    Sorted,
    /// Group in input order, starting a new bundle whenever the owner path
    /// changes. Entries for one path that are not contiguous end up in
    /// several bundles, and each later write replaces the earlier one.
    /// Only for reproducing legacy behaviour.
    SinglePass,
}

impl FromStr for GroupingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sorted" => Ok(GroupingStrategy::Sorted),
            "single-pass" => Ok(GroupingStrategy::SinglePass),
            other => Err(Error::Config(format!(
                "Unsupported grouping strategy '{}'. Use: sorted, single-pass",
                other
            ))),
        }
    }
}

impl fmt::Display for GroupingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingStrategy::Sorted => write!(f, "sorted"),
            GroupingStrategy::SinglePass => write!(f, "single-pass"),
        }
    }
}

/// Fields that are written together to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretBundle {
    /// Owner path, before any restore prefix.
    pub path: String,
    /// Field name to encoded value.
    pub fields: BTreeMap<String, String>,
}

/// Bundles plus the entries that could not be assigned to one.
#[derive(Debug, Default)]
pub struct Grouping {
    pub bundles: Vec<SecretBundle>,
    pub invalid: Vec<NodeFailure>,
}

/// Split every key at its last separator and group fields by owner path.
pub fn group_entries<I>(entries: I, strategy: GroupingStrategy) -> Grouping
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut grouping = Grouping::default();
    let mut parsed: Vec<(FlattenedKey, String)> = Vec::new();

    for (key, value) in entries {
        match FlattenedKey::parse(&key) {
            Ok(flattened) => parsed.push((flattened, value)),
            Err(err) => {
                warn!(key = %key, error = %err, "Skipping entry");
                grouping
                    .invalid
                    .push(NodeFailure::new(key, NodeOperation::Flatten, err));
            }
        }
    }

    if strategy == GroupingStrategy::Sorted {
        parsed.sort_by(|(a, _), (b, _)| a.owner().cmp(b.owner()));
    }

    let mut current: Option<SecretBundle> = None;
    for (key, value) in parsed {
        let owner_changed = current.as_ref().is_some_and(|bundle| bundle.path != key.owner());
        if owner_changed {
            grouping.bundles.extend(current.take());
        }

        let bundle = current.get_or_insert_with(|| SecretBundle {
            path: key.owner().to_string(),
            fields: BTreeMap::new(),
        });
        if bundle.fields.insert(key.field().to_string(), value).is_some() {
            warn!(key = %key, "Duplicate field in bundle, keeping the later value");
        }
    }
    // The last bundle never sees an owner change.
    grouping.bundles.extend(current);

    grouping
}

/// Writes grouped bundles back to a store.
pub struct RestoreGrouper<'a> {
    store: &'a dyn SecretStore,
    strategy: GroupingStrategy,
    encoding: ValueEncoding,
    prefix: String,
}

impl<'a> RestoreGrouper<'a> {
    pub fn new(store: &'a dyn SecretStore) -> Self {
        Self {
            store,
            strategy: GroupingStrategy::default(),
            encoding: ValueEncoding::default(),
            prefix: String::new(),
        }
    }

    /// Set the grouping strategy.
    pub fn with_strategy(mut self, strategy: GroupingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the encoding the artifact values were written with.
    pub fn with_encoding(mut self, encoding: ValueEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set a prefix prepended to every owner path before writing.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Group the entries and issue one write per bundle.
    ///
    /// Failures are per bundle: a bundle with an undecodable value is
    /// skipped whole, a failed write is reported, and the remaining
    /// bundles are still written.
    pub async fn restore<I>(&self, entries: I) -> RestoreReport
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut report = RestoreReport::new();
        let grouping = group_entries(entries, self.strategy);
        report.failures.extend(grouping.invalid);

        info!(
            bundles = grouping.bundles.len(),
            strategy = %self.strategy,
            "Restoring secrets"
        );

        for bundle in grouping.bundles {
            let path = format!("{}{}", self.prefix, bundle.path);

            let data = match self.decode_bundle(&bundle) {
                Ok(data) => data,
                Err(failure) => {
                    error!(path = %path, key = %failure.path, "Unable to decode value, skipping bundle");
                    report.failures.push(failure);
                    continue;
                }
            };

            debug!(path = %path, fields = data.len(), "Writing bundle");
            match self.store.write(&path, &data).await {
                Ok(()) => report.written.push(WrittenBundle {
                    path,
                    fields: data.len(),
                }),
                Err(err) => {
                    error!(path = %path, error = %err, "Unable to write secret");
                    report
                        .failures
                        .push(NodeFailure::new(path, NodeOperation::Write, err));
                }
            }
        }

        report.finish();
        report
    }

    fn decode_bundle(&self, bundle: &SecretBundle) -> std::result::Result<SecretData, NodeFailure> {
        bundle
            .fields
            .iter()
            .map(|(field, encoded)| {
                self.encoding
                    .decode(encoded)
                    .map(|value| (field.clone(), value))
                    .map_err(|err| {
                        NodeFailure::new(
                            format!("{}/{}", bundle.path, field),
                            NodeOperation::Decode,
                            err,
                        )
                    })
            })
            .collect()
    }
}

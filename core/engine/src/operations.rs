//! End-to-end backup and restore runs.

use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use kvbackup_common::Result;
use kvbackup_store::SecretStore;

use crate::aggregate::Aggregate;
use crate::config::{BackupConfig, RestoreConfig};
use crate::encoder::ValueEncoding;
use crate::report::{BackupReport, RestoreReport};
use crate::restore::RestoreGrouper;
use crate::walker::PathEnumerator;

/// Walk every root and collect the flattened aggregate.
///
/// Never fails as a whole; per-node problems are in the report.
pub async fn collect_secrets(
    store: &dyn SecretStore,
    roots: &[String],
    encoding: ValueEncoding,
) -> (Aggregate, BackupReport) {
    let mut aggregate = Aggregate::new();
    let mut report = BackupReport::new();

    let walker = PathEnumerator::new(store, encoding);
    walker.walk("", roots, &mut aggregate, &mut report).await;

    report.finish(aggregate.len());
    (aggregate, report)
}

/// Run a backup and write the artifact.
///
/// The artifact is serialized only after the traversal completes and is
/// written in one go, so a serialization error leaves no file behind.
///
/// # Errors
/// - Invalid configuration (before any store access)
/// - Serialization or file I/O failure
pub async fn run_backup(store: &dyn SecretStore, config: &BackupConfig) -> Result<BackupReport> {
    config.validate()?;

    info!(
        store = store.name(),
        roots = ?config.roots,
        format = %config.format,
        encoding = %config.encoding,
        "Starting backup"
    );

    let (aggregate, report) = collect_secrets(store, &config.roots, config.encoding).await;
    let bytes = config.format.serialize(aggregate.entries())?;
    write_artifact(&config.output, &bytes).await?;

    if report.is_complete() {
        info!(keys = report.keys, output = %config.output.display(), "Backup complete");
    } else {
        warn!(
            keys = report.keys,
            failures = report.failure_count(),
            output = %config.output.display(),
            "Backup is partial"
        );
    }

    Ok(report)
}

/// Load an artifact and write its bundles back to the store.
///
/// # Errors
/// - Format cannot be restored (before reading the file)
/// - File I/O failure
/// - Malformed artifact (before any write)
pub async fn run_restore(store: &dyn SecretStore, config: &RestoreConfig) -> Result<RestoreReport> {
    config.validate()?;

    let bytes = tokio::fs::read(&config.input).await?;
    let entries = config.format.deserialize(&bytes)?;

    info!(
        store = store.name(),
        input = %config.input.display(),
        keys = entries.len(),
        "Starting restore"
    );

    let report = RestoreGrouper::new(store)
        .with_strategy(config.strategy)
        .with_encoding(config.encoding)
        .with_prefix(config.prefix.clone())
        .restore(entries)
        .await;

    if report.is_complete() {
        info!(bundles = report.written.len(), "Restore complete");
    } else {
        warn!(
            bundles = report.written.len(),
            failures = report.failure_count(),
            "Restore is partial"
        );
    }

    Ok(report)
}

/// Write an artifact readable only by its owner.
async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    // The creation mode is ignored when the file already exists.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    }
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

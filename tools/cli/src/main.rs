//! kvbackup CLI - back up and restore Vault KV secret trees.
//!
//! `backup` walks one or more root prefixes and writes every leaf field
//! to a single flat artifact; `restore` reads a JSON or YAML artifact and
//! writes each secret back to its path.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use kvbackup_engine::{
    parse_roots, run_backup, run_restore, BackupConfig, BackupReport, GroupingStrategy,
    OutputFormat, RestoreConfig, RestoreReport, ValueEncoding, DEFAULT_FILENAME,
};
use kvbackup_store::{create_default_registry, SecretStore};

/// Exit status of a run that finished with per-node failures.
const EXIT_PARTIAL: i32 = 2;

#[derive(Parser)]
#[command(name = "kvbackup")]
#[command(about = "Back up and restore Vault KV secret trees")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct StoreArgs {
    /// Secret store backend: "vault" or "memory".
    #[arg(long, global = true, default_value = "vault")]
    store: String,

    /// Vault server address.
    #[arg(long, global = true, env = "VAULT_ADDR", default_value = "http://127.0.0.1:8200")]
    vault_addr: String,

    /// Vault token.
    #[arg(long, global = true, env = "VAULT_TOKEN", hide_env_values = true)]
    vault_token: Option<String>,

    /// Vault Enterprise namespace.
    #[arg(long, global = true, env = "VAULT_NAMESPACE")]
    vault_namespace: Option<String>,

    /// KV engine mount path.
    #[arg(long, global = true, default_value = "secret")]
    mount: String,

    /// KV engine version: 1 or 2.
    #[arg(long, global = true, default_value = "2", value_parser = ["1", "2"])]
    kv_version: String,

    /// Skip TLS certificate verification.
    #[arg(
        long,
        global = true,
        env = "VAULT_SKIP_VERIFY",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    tls_skip_verify: bool,

    /// JSON file seeding the memory store: {"<path>": {"<field>": <value>}}.
    #[arg(long, global = true)]
    seed: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk root prefixes and write every secret to one artifact.
    Backup {
        /// Comma-separated root prefixes; directories end with '/'.
        #[arg(short, long, default_value = "")]
        paths: String,

        /// Output format: json, yaml, or kv.
        #[arg(short, long, default_value = "json")]
        output: OutputFormat,

        /// Value encoding: plain or base64.
        #[arg(short, long, default_value = "plain")]
        encoding: ValueEncoding,

        /// Shorthand for --encoding base64.
        #[arg(long, conflicts_with = "encoding")]
        base64: bool,

        /// Output filename.
        #[arg(short, long, default_value = DEFAULT_FILENAME)]
        filename: PathBuf,
    },

    /// Write secrets from an artifact back to the store.
    #[command(alias = "write")]
    Restore {
        /// Input filename.
        #[arg(short, long, default_value = DEFAULT_FILENAME)]
        filename: PathBuf,

        /// Artifact format: json or yaml.
        #[arg(long, default_value = "json")]
        format: OutputFormat,

        /// Encoding the artifact values were written with.
        #[arg(short, long, default_value = "plain")]
        encoding: ValueEncoding,

        /// Prefix prepended to every secret path.
        #[arg(long, default_value = "")]
        prefix: String,

        /// Bundle grouping: sorted or single-pass.
        #[arg(long, default_value = "sorted")]
        strategy: GroupingStrategy,
    },

    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let complete = match cli.command {
        Commands::Backup {
            paths,
            output,
            encoding,
            base64,
            filename,
        } => {
            let encoding = if base64 { ValueEncoding::Base64 } else { encoding };
            let config = BackupConfig {
                roots: parse_roots(&paths),
                format: output,
                encoding,
                output: filename,
            };
            let store = open_store(&cli.store)?;
            cmd_backup(store.as_ref(), &config).await?
        }

        Commands::Restore {
            filename,
            format,
            encoding,
            prefix,
            strategy,
        } => {
            let config = RestoreConfig {
                input: filename,
                format,
                encoding,
                strategy,
                prefix,
            };
            // Reject unreadable formats before connecting to anything.
            config.validate().context("Invalid restore configuration")?;
            let store = open_store(&cli.store)?;
            cmd_restore(store.as_ref(), &config).await?
        }

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "kvbackup", &mut std::io::stdout());
            true
        }
    };

    if !complete {
        std::process::exit(EXIT_PARTIAL);
    }

    Ok(())
}

/// Build the JSON configuration for the selected store.
fn store_config(args: &StoreArgs) -> Result<serde_json::Value> {
    match args.store.as_str() {
        "vault" => {
            let token = args
                .vault_token
                .as_deref()
                .context("A Vault token is required (--vault-token or VAULT_TOKEN)")?;
            Ok(serde_json::json!({
                "address": args.vault_addr,
                "token": token,
                "namespace": args.vault_namespace,
                "mount": args.mount,
                "kv_version": args.kv_version,
                "tls_skip_verify": args.tls_skip_verify,
            }))
        }
        "memory" => match &args.seed {
            Some(seed) => Ok(serde_json::json!({ "secrets": read_seed(seed)? })),
            None => Ok(serde_json::json!({})),
        },
        // Unknown names are reported by the registry.
        _ => Ok(serde_json::Value::Null),
    }
}

fn read_seed(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&text).context("Seed file is not valid JSON")
}

fn open_store(args: &StoreArgs) -> Result<Arc<dyn SecretStore>> {
    let config = store_config(args)?;
    let registry = create_default_registry();
    registry
        .resolve(&args.store, config)
        .with_context(|| format!("Failed to open store '{}'", args.store))
}

/// Run a backup. Returns whether it was complete.
async fn cmd_backup(store: &dyn SecretStore, config: &BackupConfig) -> Result<bool> {
    info!("Backing up {:?} to {}", config.roots, config.output.display());

    let report = run_backup(store, config).await.context("Backup failed")?;
    print_backup_summary(&report, config);

    Ok(report.is_complete())
}

/// Run a restore. Returns whether it was complete.
async fn cmd_restore(store: &dyn SecretStore, config: &RestoreConfig) -> Result<bool> {
    info!("Restoring from {}", config.input.display());

    let report = run_restore(store, config).await.context("Restore failed")?;
    print_restore_summary(&report);

    Ok(report.is_complete())
}

fn print_backup_summary(report: &BackupReport, config: &BackupConfig) {
    if report.is_complete() {
        println!("Backup complete!");
    } else {
        println!("Backup PARTIAL: {} failure(s)", report.failure_count());
    }
    println!("  Output: {} ({})", config.output.display(), config.format);
    println!("  Keys: {}", report.keys);
    println!("  Secrets read: {}", report.leaves_read);
    println!("  Directories listed: {}", report.directories_listed);

    if !report.not_found.is_empty() {
        println!("  Not found: {}", report.not_found.len());
    }

    if !report.collisions.is_empty() {
        println!("  Key collisions:");
        for collision in &report.collisions {
            println!(
                "    {} ({} overwritten by {})",
                collision.key, collision.previous_source, collision.new_source
            );
        }
    }

    print_failures(&report.failures);
}

fn print_restore_summary(report: &RestoreReport) {
    if report.is_complete() {
        println!("Restore complete!");
    } else {
        println!("Restore PARTIAL: {} failure(s)", report.failure_count());
    }
    println!("  Secrets written: {}", report.written.len());
    print_failures(&report.failures);
}

fn print_failures(failures: &[kvbackup_engine::NodeFailure]) {
    if failures.is_empty() {
        return;
    }
    println!("  Failures:");
    for failure in failures {
        println!("    [{}] {}: {}", failure.operation, failure.path, failure.cause);
    }
}

/// Ayiah - media library scanner
use anyhow::Context;
use ayiah_cli::{AppConfig, CliError};
use ayiah_core::types::{CreateLibraryFolder, FolderId, MediaKind, ScanOutcome, UpdateLibraryFolder};
use ayiah_core::CatalogStore;
use ayiah_scanner::ScanEngine;
use ayiah_storage::SqliteCatalog;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool as Pool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ayiah")]
#[command(about = "Scan media library folders into a local catalog", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./ayiah.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage library folders
    Folder {
        #[command(subcommand)]
        action: FolderCommand,
    },
    /// Scan one library folder
    Scan {
        /// Folder ID
        id: FolderId,
    },
    /// Scan every enabled library folder
    ScanAll,
    /// Watch every enabled folder until Ctrl-C
    Watch,
    /// Inspect cataloged items
    Item {
        #[command(subcommand)]
        action: ItemCommand,
    },
}

#[derive(Subcommand)]
enum FolderCommand {
    /// Register a library folder
    Add {
        /// Folder root on disk
        path: PathBuf,
        /// Media kind: movie, tv, comic or book
        #[arg(short, long)]
        kind: MediaKind,
        /// Display name (defaults to the directory name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List all library folders
    List,
    /// Rename a library folder
    Rename { id: FolderId, name: String },
    /// Enable a library folder
    Enable { id: FolderId },
    /// Disable a library folder (its items stay cataloged)
    Disable { id: FolderId },
    /// Remove a library folder and everything cataloged under it
    Remove { id: FolderId },
}

#[derive(Subcommand)]
enum ItemCommand {
    /// Show the item cataloged at a path, with its metadata
    Show { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = open_catalog(&config).await?;

    match cli.command {
        Commands::Folder { action } => folder(&pool, action).await?,
        Commands::Scan { id } => {
            let engine = engine(&pool, &config);
            let outcome = engine.scan(id).await?;
            print_outcome(&outcome);
        }
        Commands::ScanAll => scan_all(&pool, &config).await?,
        Commands::Watch => watch(&pool, &config).await?,
        Commands::Item {
            action: ItemCommand::Show { path },
        } => show_item(&pool, &path).await?,
    }

    Ok(())
}

async fn open_catalog(config: &AppConfig) -> anyhow::Result<Pool> {
    if let Some(parent) = config
        .database_url
        .strip_prefix("sqlite://")
        .map(PathBuf::from)
        .and_then(|path| path.parent().map(PathBuf::from))
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }

    let pool = ayiah_storage::create_pool(&config.database_url).await?;
    ayiah_storage::run_migrations(&pool).await?;
    tracing::debug!("Database connected");
    Ok(pool)
}

fn engine(pool: &Pool, config: &AppConfig) -> ScanEngine {
    let catalog: Arc<dyn CatalogStore> = Arc::new(SqliteCatalog::new(pool.clone()));
    ScanEngine::new(catalog, config.scanner.clone())
}

async fn folder(pool: &Pool, action: FolderCommand) -> anyhow::Result<()> {
    match action {
        FolderCommand::Add { path, kind, name } => {
            let path = std::fs::canonicalize(&path)
                .with_context(|| format!("folder root {} is not accessible", path.display()))?;
            if !path.is_dir() {
                anyhow::bail!("{} is not a directory", path.display());
            }
            let name = name.unwrap_or_else(|| {
                path.file_name()
                    .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
            });

            let folder = ayiah_storage::library_folders::create(
                pool,
                &CreateLibraryFolder {
                    name,
                    path: path.to_string_lossy().into_owned(),
                    media_kind: kind,
                },
            )
            .await?;
            println!("Added folder {} ({}) at {}", folder.id, folder.media_kind, folder.path);
        }
        FolderCommand::List => {
            let folders = ayiah_storage::library_folders::get_all(pool).await?;
            println!("Folders:");
            for folder in folders {
                let items = ayiah_storage::media_items::count_by_folder(pool, folder.id).await?;
                println!(
                    "  {} - {} [{}] {}{} ({} items)",
                    folder.id,
                    folder.name,
                    folder.media_kind,
                    folder.path,
                    if folder.enabled { "" } else { " (disabled)" },
                    items
                );
            }
        }
        FolderCommand::Rename { id, name } => {
            let update = UpdateLibraryFolder {
                name: Some(name),
                enabled: None,
            };
            ensure_found(ayiah_storage::library_folders::update(pool, id, &update).await?, id)?;
            println!("Renamed folder {id}");
        }
        FolderCommand::Enable { id } => {
            ensure_found(ayiah_storage::library_folders::set_enabled(pool, id, true).await?, id)?;
            println!("Enabled folder {id}");
        }
        FolderCommand::Disable { id } => {
            ensure_found(ayiah_storage::library_folders::set_enabled(pool, id, false).await?, id)?;
            println!("Disabled folder {id}");
        }
        FolderCommand::Remove { id } => {
            ensure_found(ayiah_storage::library_folders::delete(pool, id).await?, id)?;
            println!("Removed folder {id}");
        }
    }

    Ok(())
}

fn ensure_found(found: bool, id: FolderId) -> Result<(), CliError> {
    if found {
        Ok(())
    } else {
        Err(CliError::NotFound(format!("library folder {id}")))
    }
}

async fn scan_all(pool: &Pool, config: &AppConfig) -> anyhow::Result<()> {
    let engine = engine(pool, config);
    let results = engine.scan_all().await?;

    let mut failed = 0;
    for (folder_id, result) in results {
        match result {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => {
                failed += 1;
                println!("Folder {folder_id}: {e}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} folder(s) could not be scanned");
    }
    Ok(())
}

async fn watch(pool: &Pool, config: &AppConfig) -> anyhow::Result<()> {
    let engine = engine(pool, config);

    for (folder_id, result) in engine.watch_all().await? {
        if let Err(e) = result {
            println!("Folder {folder_id}: not watched ({e})");
        }
    }

    tracing::info!("Watching library folders, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    engine.shutdown().await;
    Ok(())
}

async fn show_item(pool: &Pool, path: &std::path::Path) -> anyhow::Result<()> {
    let key = ayiah_scanner::reconciler::canonical_path(path)
        .to_string_lossy()
        .into_owned();

    let catalog = SqliteCatalog::new(pool.clone());
    let item = catalog
        .get_item_by_path(&key)
        .await?
        .ok_or_else(|| CliError::NotFound(format!("no item cataloged at {key}")))?;

    println!("{}", serde_json::to_string_pretty(&item)?);
    match catalog.get_metadata(item.id).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("(no metadata)"),
    }
    Ok(())
}

fn print_outcome(outcome: &ScanOutcome) {
    println!(
        "Folder {}: {} added, {} updated, {} skipped, {} errored, {} removed{}",
        outcome.folder_id,
        outcome.added,
        outcome.updated,
        outcome.skipped,
        outcome.errored,
        outcome.removed,
        if outcome.partial { " (partial)" } else { "" }
    );
    for issue in &outcome.issues {
        println!("  {:?} {}: {}", issue.kind, issue.path, issue.message);
    }
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use stash_core::config::{parse_count_setting, resolve_database_url};
use stash_core::constants::{DEFAULT_BATCH_SIZE, DEFAULT_DATA_DIR, DEFAULT_MAX_CONNECTIONS};
use stash_core::{
    BatchItem, CoreConfig, NodeQuery, NodeType, SortColumn, SortDirection, Sorting, TreeService,
    UploadRequest,
};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "stash")]
#[command(about = "Stash per-user file tree CLI")]
struct Cli {
    /// User whose tree the command acts on
    #[arg(long, global = true, default_value_t = 1)]
    user: i64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the user's root folder and storage directories
    InitUser,
    /// Create a folder
    Mkdir {
        /// Parent folder id (0 is the root)
        parent: i64,
        name: String,
    },
    /// Upload a local file, creating it or adding a new version
    Upload {
        /// Local file to upload
        file: PathBuf,
        /// Parent folder id
        #[arg(long, default_value_t = 0)]
        parent: i64,
        /// Name in the tree; defaults to the local file name
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        mime_type: Option<String>,
        /// Bytes per chunk
        #[arg(long, default_value_t = 1024 * 1024)]
        chunk_size: u64,
    },
    /// List a folder
    Ls {
        #[arg(default_value_t = 0)]
        folder: i64,
        /// Sort column: title, modified, size or type (folders first by default)
        #[arg(long)]
        sort: Option<SortColumn>,
        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
    /// Find nodes by title and attributes
    Search {
        /// Case-insensitive part of the title
        #[arg(long)]
        title: Option<String>,
        /// Only direct children of this folder
        #[arg(long)]
        parent: Option<i64>,
        /// Only folders
        #[arg(long, conflicts_with = "files")]
        folders: bool,
        /// Only files
        #[arg(long)]
        files: bool,
        #[arg(long)]
        mime_type: Option<String>,
        #[arg(long)]
        min_size: Option<i64>,
        #[arg(long)]
        max_size: Option<i64>,
    },
    /// Mark a node as a favorite
    Favorite { node: i64 },
    /// Clear a node's favorite mark
    Unfavorite { node: i64 },
    /// List favorite nodes
    Favorites,
    /// Write a file's bytes to stdout
    Cat {
        node: i64,
        /// Historical version to read instead of the live one
        #[arg(long)]
        version: Option<i64>,
    },
    /// Rename a node in place
    Rename { node: i64, name: String },
    /// Copy nodes into a folder
    Copy {
        #[arg(required = true)]
        nodes: Vec<i64>,
        /// Destination folder id
        #[arg(long)]
        to: i64,
    },
    /// Move nodes into a folder
    Move {
        #[arg(required = true)]
        nodes: Vec<i64>,
        /// Destination folder id
        #[arg(long)]
        to: i64,
    },
    /// Move nodes to the trash
    Trash {
        #[arg(required = true)]
        nodes: Vec<i64>,
    },
    /// List the stored versions of a file
    Versions { node: i64 },
    /// Make a stored version live again
    RestoreVersion { node: i64, version: i64 },
    /// List the trash
    TrashList,
    /// Bring a trash entry back to its original folder
    RestoreTrash { entry: i64 },
}

/// One line of a bulk report.
#[derive(Serialize)]
struct ItemReport<T> {
    id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> From<BatchItem<T>> for ItemReport<T> {
    fn from(item: BatchItem<T>) -> Self {
        match item.outcome {
            Ok(outcome) => Self {
                id: item.id,
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => Self {
                id: item.id,
                outcome: None,
                error: Some(e.to_string()),
            },
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report<T>(items: Vec<BatchItem<T>>) -> Vec<ItemReport<T>> {
    items.into_iter().map(ItemReport::from).collect()
}

/// Resolve configuration from the environment once at startup.
fn load_config() -> anyhow::Result<CoreConfig> {
    let data_dir = PathBuf::from(
        std::env::var("STASH_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
    );
    let database_url = resolve_database_url(std::env::var("STASH_DATABASE_URL").ok(), &data_dir);
    let max_connections = parse_count_setting(
        std::env::var("STASH_DB_MAX_CONNECTIONS").ok(),
        "STASH_DB_MAX_CONNECTIONS",
        DEFAULT_MAX_CONNECTIONS,
    )?;
    let batch_size = parse_count_setting(
        std::env::var("STASH_BATCH_SIZE").ok(),
        "STASH_BATCH_SIZE",
        DEFAULT_BATCH_SIZE,
    )?;
    Ok(CoreConfig::new(
        data_dir,
        database_url,
        max_connections,
        batch_size,
    )?)
}

#[allow(clippy::too_many_arguments)]
async fn upload_file(
    service: &TreeService,
    user_id: i64,
    file: PathBuf,
    parent_id: i64,
    name: Option<String>,
    mime_type: Option<String>,
    chunk_size: u64,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    anyhow::ensure!(chunk_size > 0, "--chunk-size must be positive");
    let file_name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .with_context(|| format!("{} has no usable file name", file.display()))?,
    };
    let file_size = tokio::fs::metadata(&file).await?.len();
    let mut source = tokio::fs::File::open(&file)
        .await
        .with_context(|| format!("failed to open {}", file.display()))?;

    let last_index = u32::try_from(file_size.saturating_sub(1) / chunk_size)?;
    let mut upload_id = None;
    for chunk_index in 0..last_index {
        let mut chunk = (&mut source).take(chunk_size);
        let id = service
            .upload_chunk(user_id, upload_id, chunk_index, &mut chunk, cancel)
            .await?;
        upload_id = Some(id);
    }

    let request = UploadRequest {
        upload_id,
        chunk_index: last_index,
        parent_id,
        file_name,
        mime_type,
        file_size,
        hash_sum: None,
    };
    let result = service
        .upload_last_chunk(user_id, request, &mut source, cancel)
        .await?;
    print_json(&result)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("stash=info".parse()?))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = load_config()?;
    tracing::debug!("using data directory {}", cfg.data_dir().display());
    let service = TreeService::open(cfg).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, rolling back");
            on_interrupt.cancel();
        }
    });

    let user = cli.user;
    match cli.command {
        Commands::InitUser => print_json(&service.init_user(user).await?)?,
        Commands::Mkdir { parent, name } => {
            print_json(&service.create_folder(user, parent, &name, &cancel).await?)?
        }
        Commands::Upload {
            file,
            parent,
            name,
            mime_type,
            chunk_size,
        } => {
            upload_file(
                &service, user, file, parent, name, mime_type, chunk_size, &cancel,
            )
            .await?
        }
        Commands::Ls { folder, sort, desc } => {
            let direction = if desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            let sorting = match sort {
                Some(column) => Sorting::new(column, direction),
                None => Sorting::default(),
            };
            print_json(&service.list_children(user, folder, &sorting).await?)?
        }
        Commands::Search {
            title,
            parent,
            folders,
            files,
            mime_type,
            min_size,
            max_size,
        } => {
            let node_type = match (folders, files) {
                (true, _) => Some(NodeType::Folder),
                (_, true) => Some(NodeType::File),
                _ => None,
            };
            let query = NodeQuery {
                title,
                parent_id: parent,
                node_type,
                mime_type,
                min_size,
                max_size,
                ..Default::default()
            };
            print_json(&service.search(user, &query).await?)?
        }
        Commands::Favorite { node } => print_json(&service.set_favorite(user, node).await?)?,
        Commands::Unfavorite { node } => print_json(&service.unset_favorite(user, node).await?)?,
        Commands::Favorites => print_json(&service.favorites(user).await?)?,
        Commands::Cat { node, version } => {
            let mut reader = service
                .open_file(user, node, version)
                .await?
                .with_context(|| format!("no file {} for user {}", node, user))?;
            tokio::io::copy(&mut reader, &mut tokio::io::stdout()).await?;
        }
        Commands::Rename { node, name } => {
            print_json(&service.rename_node(user, node, &name, &cancel).await?)?
        }
        Commands::Copy { nodes, to } => {
            print_json(&report(service.copy_nodes(user, &nodes, to, &cancel).await))?
        }
        Commands::Move { nodes, to } => {
            print_json(&report(service.move_nodes(user, &nodes, to, &cancel).await))?
        }
        Commands::Trash { nodes } => {
            print_json(&report(service.delete_nodes(user, &nodes, &cancel).await))?
        }
        Commands::Versions { node } => print_json(&service.versions(user, node).await?)?,
        Commands::RestoreVersion { node, version } => {
            print_json(&service.restore_version(user, node, version, &cancel).await?)?
        }
        Commands::TrashList => print_json(&service.trash(user).await?)?,
        Commands::RestoreTrash { entry } => {
            print_json(&service.restore_from_trash(user, entry, &cancel).await?)?
        }
    }

    Ok(())
}

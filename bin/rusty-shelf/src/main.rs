//! # Rusty-Shelf Binary
//!
//! Operator CLI that assembles the engine from the compiled-in storage
//! backend and prints every result as JSON on stdout. Logs go to stderr.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use configs::{AppConfig, DatabaseConfig, LogConfig, LogFormat};
use rs_core::{
    CommentRequest, Engine, EngineSettings, RankRequest, Requester, TargetRef, VoteRequest,
};
use rs_identity_simple::Sha256Fingerprinter;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[cfg(not(any(feature = "db-sqlite", feature = "db-memory")))]
compile_error!("enable at least one storage backend: `db-sqlite` or `db-memory`");

#[derive(Parser)]
#[command(name = "rusty-shelf")]
#[command(about = "Rusty-Shelf - votes, comments and ranked listings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./rusty-shelf.toml when present)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Act as this authenticated user instead of anonymously
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Client address used for anonymous fingerprints
    #[arg(long, global = true, default_value = "127.0.0.1")]
    addr: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the database schema
    Migrate,

    /// Cast a vote with the configured repeat policy
    Vote {
        target_id: i64,
        /// `up` or `down`
        direction: String,
    },

    /// Cast a vote where repeating the same direction removes it
    UnvoteToggle {
        target_id: i64,
        direction: String,
    },

    /// Show the caller's vote and the counts on a target
    Status { target_id: i64 },

    /// Post a comment or a reply
    Comment {
        target_id: i64,
        content: String,

        /// Reply to this top-level comment
        #[arg(short, long)]
        parent: Option<i64>,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// Print the comment tree of a target
    Comments { target_id: i64 },

    /// Toggle the caller's like on a comment
    Like { comment_id: i64 },

    /// Rank candidate targets read from a JSON file of `{id, createdAt}`
    Rank {
        /// hot, top, new or discussed
        #[arg(short, long, default_value = "hot")]
        mode: String,

        #[arg(long)]
        candidates: String,

        #[arg(long)]
        offset: Option<usize>,

        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    status: rs_core::VoteStatus,
    counts: rs_core::VoteCounts,
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn build_engine(
    database: &DatabaseConfig,
    hasher: Arc<Sha256Fingerprinter>,
    settings: EngineSettings,
) -> anyhow::Result<Engine> {
    if database.is_memory() {
        #[cfg(feature = "db-memory")]
        {
            tracing::warn!("using the in-process store; nothing outlives this command");
            let store = Arc::new(rs_db_memory::MemoryStore::new());
            return Ok(Engine::new(store, hasher, settings));
        }
        #[cfg(not(feature = "db-memory"))]
        bail!("database.url = \"memory\" needs the `db-memory` feature");
    }

    #[cfg(feature = "db-sqlite")]
    {
        let store = rs_db_sqlite::SqliteStore::connect(
            &database.url,
            database.max_connections,
            database.busy_timeout(),
        )
        .await
        .with_context(|| format!("opening {}", database.url))?;
        tracing::info!(url = %database.url, "sqlite store ready");
        Ok(Engine::new(Arc::new(store), hasher, settings))
    }

    #[cfg(not(feature = "db-sqlite"))]
    bail!("{} needs the `db-sqlite` feature", database.url)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let AppConfig { database, identity, log, engine } =
        AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&log);

    let hasher = Arc::new(Sha256Fingerprinter::new(identity.fingerprint_pepper));
    // Connecting applies the schema, so `migrate` only has to open the store.
    let engine = build_engine(&database, hasher, engine).await?;

    let requester = Requester { user_id: cli.user, client_address: cli.addr };

    match cli.command {
        Commands::Migrate => {
            emit(&serde_json::json!({ "migrated": !database.is_memory() }))?;
        }
        Commands::Vote { target_id, direction } => {
            let outcome = engine
                .cast_vote(&requester, &VoteRequest::new(target_id, direction))
                .await?;
            emit(&outcome)?;
        }
        Commands::UnvoteToggle { target_id, direction } => {
            let outcome = engine
                .toggle_vote(&requester, &VoteRequest::new(target_id, direction))
                .await?;
            emit(&outcome)?;
        }
        Commands::Status { target_id } => {
            let report = StatusReport {
                status: engine.vote_status(&requester, target_id).await?,
                counts: engine.vote_counts(target_id).await?,
            };
            emit(&report)?;
        }
        Commands::Comment { target_id, content, parent, name } => {
            let req = CommentRequest {
                target_id,
                content,
                parent_comment_id: parent,
                display_name: name,
            };
            emit(&engine.post_comment(&requester, &req).await?)?;
        }
        Commands::Comments { target_id } => {
            emit(&engine.list_comments(&requester, target_id).await?)?;
        }
        Commands::Like { comment_id } => {
            emit(&engine.toggle_like(&requester, comment_id).await?)?;
        }
        Commands::Rank { mode, candidates, offset, limit } => {
            let raw = tokio::fs::read_to_string(&candidates)
                .await
                .with_context(|| format!("reading {candidates}"))?;
            let targets: Vec<TargetRef> =
                serde_json::from_str(&raw).with_context(|| format!("parsing {candidates}"))?;
            if targets.is_empty() {
                bail!("{candidates} contains no candidates");
            }
            let req = RankRequest { mode, offset, limit };
            emit(&engine.ranked(&req, &targets, chrono::Utc::now()).await?)?;
        }
    }

    Ok(())
}

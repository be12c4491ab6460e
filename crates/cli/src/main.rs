//! Operator CLI for the tree manager: maintenance jobs, dataset exports, and
//! a stats snapshot, all run against the Postgres-backed store.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod commands;
mod config;
mod error;

use commands::export::ExportTarget;
use error::CliResult;

#[derive(Parser)]
#[command(
    name = "dendron",
    version,
    about = "Operator CLI for the tree manager",
    long_about = "Runs the tree manager's maintenance jobs, dataset exports, and stats snapshots against its Postgres store."
)]
struct Cli {
    /// Enable verbose logging output
    #[arg(global = true, short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(global = true, long)]
    no_color: bool,

    /// Tree manager config file path (JSON, partial overrides allowed)
    #[arg(global = true, short, long, env = "DENDRON_CONFIG")]
    config: Option<PathBuf>,

    /// Postgres connection string
    #[arg(global = true, long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile missing tree states and re-run advancing condition checks
    EnsureTreeStates,

    /// Retry consensus scoring for trees stuck in SCORING_FAILED
    RetryScoringFailed,

    /// Hard-delete a user's messages and disable their account
    PurgeUser {
        /// Id of the user to purge
        #[arg(long)]
        user_id: Uuid,
    },

    /// Roll the backlog-activation check for one language
    ActivateBacklog {
        /// Language code, e.g. "en"
        #[arg(long)]
        lang: String,
    },

    /// Build and write a dataset export bundle
    Export {
        /// Explicit tree ids to export (mutually exclusive with --all-ready / --all-user)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<Uuid>,

        /// Export every tree currently ready for export
        #[arg(long, conflicts_with_all = ["ids", "all_user"])]
        all_ready: bool,

        /// Export every tree authored by this user
        #[arg(long, conflicts_with_all = ["ids", "all_ready"])]
        all_user: Option<Uuid>,

        /// Drop messages that never cleared review
        #[arg(long)]
        reviewed_only: bool,

        /// Keep soft-deleted messages in the bundle
        #[arg(long)]
        include_deleted: bool,

        /// Gzip-compress the output
        #[arg(long)]
        gzip: bool,

        /// Output file path (defaults to stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print tree-state counts and message-count aggregates
    Stats,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.no_color)?;

    tracing::info!("dendron-cli v{}", env!("CARGO_PKG_VERSION"));

    let tree_config = config::load(cli.config.as_ref())?;

    let pool = PgPoolOptions::new().connect(&cli.database_url).await?;
    let store = dendron_manager::PgStore::new(pool);

    match cli.command {
        Commands::EnsureTreeStates => {
            commands::ensure_tree_states::run(&store, &tree_config).await?;
        }

        Commands::RetryScoringFailed => {
            commands::retry_scoring_failed::run(&store, &tree_config).await?;
        }

        Commands::PurgeUser { user_id } => {
            commands::purge_user::run(&store, &tree_config, user_id).await?;
        }

        Commands::ActivateBacklog { lang } => {
            commands::activate_backlog::run(&store, &tree_config, &lang).await?;
        }

        Commands::Export {
            ids,
            all_ready,
            all_user,
            reviewed_only,
            include_deleted,
            gzip,
            out,
        } => {
            let target = if all_ready {
                ExportTarget::AllReady
            } else if let Some(user_id) = all_user {
                ExportTarget::AllUser(user_id)
            } else {
                ExportTarget::Ids(ids)
            };
            commands::export::run(&store, target, reviewed_only, include_deleted, gzip, out).await?;
        }

        Commands::Stats => {
            commands::stats::run(&store).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, no_color: bool) -> CliResult<()> {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(!no_color);

    builder.init();

    Ok(())
}

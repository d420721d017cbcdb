//! # SEC Insights CLI (`secctl`)
//!
//! ## Usage
//!
//! ```bash
//! secctl --config ./config/secctl.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `secctl migrate up\|down\|status` | Manage the database schema |
//! | `secctl upsert --dir <root>` | Register downloaded filings as documents |
//! | `secctl seed` | Chunk, embed and store vectors for every document |
//! | `secctl seed-db --dir <root>` | `upsert` followed by `seed` |
//! | `secctl serve` | Start the document HTTP API |
//! | `secctl check` | Print document and vector counts |
//! | `secctl complete "<prompt>"` | Send a prompt to the configured LLM |
//! | `secctl embed "<text>"` | Embed a string with the configured model |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sec_insights::check::{check_store, print_report};
use sec_insights::config::{self, Config};
use sec_insights::db;
use sec_insights::filings::find_filings;
use sec_insights::llm::{create_completer, create_embedder};
use sec_insights::loader::UrlLoader;
use sec_insights::migrate;
use sec_insights::models::Filing;
use sec_insights::seed::{seed_storage_context, SeedMode, SeedOptions};
use sec_insights::server;
use sec_insights::stocks::StockDirectory;
use sec_insights::store::postgres::PgStore;
use sec_insights::upsert::{parse_uploaded, upsert_documents_from_filings, UrlResolver};

/// SEC Insights: index SEC filings for document Q&A.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; environment variables such as `DATABASE_URL` override it.
#[derive(Parser)]
#[command(name = "secctl", about = "SEC Insights backend tooling", version)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/secctl.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply, revert or list schema migrations.
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },

    /// Register downloaded filings as documents, keyed by URL.
    Upsert {
        #[command(flatten)]
        source: FilingSource,
    },

    /// Load, chunk and embed every document into the vector store.
    Seed {
        /// Skip documents that already have vector rows.
        #[arg(long)]
        skip_indexed: bool,
    },

    /// Upsert filings, then seed the vector store.
    SeedDb {
        #[command(flatten)]
        source: FilingSource,

        /// Skip documents that already have vector rows.
        #[arg(long)]
        skip_indexed: bool,
    },

    /// Start the document HTTP API.
    Serve,

    /// Print document and vector counts.
    Check,

    /// Send a prompt to the configured completion model.
    Complete {
        prompt: String,

        /// Stream the response and print it once complete.
        #[arg(long)]
        stream: bool,
    },

    /// Embed text with the configured embedding model.
    Embed { text: String },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations.
    Up,
    /// Revert the most recent migrations.
    Down {
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },
    /// List applied and pending migrations.
    Status,
}

#[derive(clap::Args)]
struct FilingSource {
    /// Directory the filings were downloaded to.
    #[arg(long, default_value = "data/")]
    dir: PathBuf,

    /// Base URL documents are served from. Defaults to `[storage] cdn_base_url`.
    #[arg(long)]
    url_base: Option<String>,

    /// Already-uploaded files as comma-separated `path=url` pairs.
    #[arg(long)]
    uploaded: Option<String>,

    /// Use the configured S3 endpoint and bucket as the URL base.
    #[arg(long, conflicts_with = "url_base")]
    bucket_urls: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("secctl=info,sec_insights=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Migrate { action } => match action {
            MigrateAction::Up => {
                let applied = migrate::run_migrations(&cfg).await?;
                println!("Applied {} migration(s) {:?}", applied.len(), applied);
            }
            MigrateAction::Down { steps } => {
                let reverted = migrate::revert_migrations(&cfg, steps).await?;
                println!("Reverted {} migration(s) {:?}", reverted.len(), reverted);
            }
            MigrateAction::Status => {
                for m in migrate::migration_status(&cfg).await? {
                    let state = if m.applied { "applied" } else { "pending" };
                    println!("  {:>3}  {:<24} {}", m.version, m.name, state);
                }
            }
        },
        Commands::Upsert { source } => {
            let store = PgStore::new(db::connect(&cfg).await?);
            run_upsert(&cfg, &store, &source).await?;
            store.close().await;
        }
        Commands::Seed { skip_indexed } => {
            let store = PgStore::new(db::connect(&cfg).await?);
            run_seed(&cfg, &store, skip_indexed).await?;
            store.close().await;
        }
        Commands::SeedDb {
            source,
            skip_indexed,
        } => {
            let store = PgStore::new(db::connect(&cfg).await?);
            run_upsert(&cfg, &store, &source).await?;
            run_seed(&cfg, &store, skip_indexed).await?;
            store.close().await;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Check => {
            let store = PgStore::new(db::connect(&cfg).await?);
            let report = check_store(&store).await?;
            print_report(&report);
            store.close().await;
        }
        Commands::Complete { prompt, stream } => {
            let completer = create_completer(&cfg.llm)?;
            let answer = if stream {
                completer.stream_complete(&prompt).await?
            } else {
                completer.complete(&prompt).await?
            };
            println!("{}", answer);
        }
        Commands::Embed { text } => {
            let embedder = create_embedder(&cfg.llm)?;
            let vector = embedder.embed_one(&text).await?;
            let head: Vec<f32> = vector.iter().take(8).copied().collect();
            println!("model: {}", embedder.metadata().model_name);
            println!("dims:  {}", vector.len());
            println!("head:  {:?}", head);
        }
    }

    Ok(())
}

async fn run_upsert(cfg: &Config, store: &PgStore, source: &FilingSource) -> Result<()> {
    let url_base = resolve_url_base(cfg, source)?;
    let mut urls = UrlResolver::new(&url_base, &source.dir);
    if let Some(uploaded) = &source.uploaded {
        urls = urls.with_uploaded(parse_uploaded(uploaded)?);
    }

    let stocks = StockDirectory::load(&cfg.stocks)?;
    let filings: Vec<Filing> = find_filings(&source.dir).collect();
    println!("Found {} filing(s) under {}", filings.len(), source.dir.display());

    let summary = upsert_documents_from_filings(store, &filings, &stocks, &urls).await?;
    println!(
        "Upserted {} document(s), skipped {} with unknown symbols",
        summary.upserted, summary.skipped
    );
    Ok(())
}

fn resolve_url_base(cfg: &Config, source: &FilingSource) -> Result<String> {
    if source.bucket_urls {
        return cfg.storage.bucket_base_url().ok_or_else(|| {
            anyhow::anyhow!("--bucket-urls needs [storage] endpoint_url or S3_ENDPOINT_URL")
        });
    }
    Ok(source
        .url_base
        .clone()
        .unwrap_or_else(|| cfg.storage.cdn_base_url.clone()))
}

async fn run_seed(cfg: &Config, store: &PgStore, skip_indexed: bool) -> Result<()> {
    let embedder = create_embedder(&cfg.llm)?;
    let loader = UrlLoader::new(cfg.llm.timeout_secs.max(60))?;
    let options = SeedOptions {
        mode: if skip_indexed {
            SeedMode::SkipIndexed
        } else {
            SeedMode::Legacy
        },
        max_tokens: cfg.chunking.max_tokens,
    };

    let summary = seed_storage_context(store, &loader, embedder.as_ref(), options).await?;
    println!(
        "Indexed {} document(s) into {} vector row(s), skipped {}",
        summary.documents, summary.vectors, summary.skipped
    );
    Ok(())
}

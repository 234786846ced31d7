//! clauserag CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use clauserag::{
    api::{self, AppState},
    auth::create_identity_provider,
    commands::{
        cmd_db_init, cmd_db_status, cmd_delete, cmd_ingest, cmd_init, cmd_list_documents,
        cmd_query, cmd_reindex, cmd_verify_document, print_delete_outcome, print_documents,
        print_index_outcome, print_query_result, print_status, print_verify_report, upload_file,
        IngestRequest, InitOptions, PipelineContext, QuerySummary,
    },
    config::Config,
    error::{Error, Result},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "clauserag")]
#[command(version, about = "Clause retrieval over policy documents", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Caller identity for pipeline commands
    #[arg(short, long, global = true, env = "CLAUSERAG_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize clauserag configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP API
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Index a document
    ///
    /// Pass a local FILE to upload it first, or --storage-path for a file
    /// already in the object store.
    Ingest {
        /// Local file to upload and index
        file: Option<PathBuf>,

        /// Object store path of an uploaded file
        #[arg(long, conflicts_with = "file")]
        storage_path: Option<String>,

        /// Display filename (defaults to the local file name)
        #[arg(long)]
        filename: Option<String>,

        /// MIME type (guessed from the filename when omitted)
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Rebuild a document's chunks and vectors from its stored file
    Reindex {
        /// Document ID
        document_id: String,
    },

    /// Delete a document and its vectors
    Delete {
        /// Document ID
        document_id: String,

        /// Also remove the stored file
        #[arg(long)]
        delete_file: bool,
    },

    /// Ask a question against your indexed clauses
    Query {
        /// The question
        query: String,
    },

    /// List your documents
    Documents,

    /// Compare a document's chunk rows with its vectors
    Verify {
        /// Document ID
        document_id: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Manage the vector index
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Database management actions
#[derive(Subcommand)]
enum DbAction {
    /// Create the shared vector index
    Init,

    /// Show index and database status
    Status,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (json_layer, plain_layer) = if cli.log_json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stderr)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .init();

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force).await;
    }

    // Handle completions command (doesn't need config/db/index)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "clauserag", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let bind_default = config.bind.clone();
    let auth = config.auth.clone();
    let ctx = PipelineContext::from_config(config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Serve { bind } => {
            let identity = create_identity_provider(&auth)?;
            let state = Arc::new(AppState::new(ctx, identity));
            let bind = bind.unwrap_or(bind_default);
            api::serve(state, &bind).await?;
        }

        Commands::Ingest {
            file,
            storage_path,
            filename,
            mime_type,
        } => {
            let user_id = require_user(cli.user.as_deref())?;
            let request = match (file, storage_path) {
                (Some(file), _) => {
                    let filename = match filename {
                        Some(name) => name,
                        None => local_filename(&file)?,
                    };
                    let bytes = tokio::fs::read(&file).await?;
                    let storage_path = upload_file(&ctx, user_id, &filename, &bytes).await?;
                    IngestRequest {
                        storage_path,
                        filename,
                        mime_type,
                    }
                }
                (None, Some(storage_path)) => IngestRequest {
                    filename: filename.unwrap_or_default(),
                    storage_path,
                    mime_type,
                },
                (None, None) => {
                    return Err(Error::BadRequest(
                        "Pass a FILE or --storage-path".to_string(),
                    ))
                }
            };

            let outcome = cmd_ingest(&ctx, user_id, request).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_index_outcome("Indexed", &outcome);
            }
        }

        Commands::Reindex { document_id } => {
            let user_id = require_user(cli.user.as_deref())?;
            let outcome = cmd_reindex(&ctx, user_id, &document_id).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_index_outcome("Reindexed", &outcome);
            }
        }

        Commands::Delete {
            document_id,
            delete_file,
        } => {
            let user_id = require_user(cli.user.as_deref())?;
            let outcome = cmd_delete(&ctx, user_id, &document_id, delete_file).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_delete_outcome(&document_id, &outcome);
            }
        }

        Commands::Query { query } => {
            let user_id = require_user(cli.user.as_deref())?;
            let result = cmd_query(&ctx, user_id, &query).await?;

            if cli.json {
                let summary = QuerySummary {
                    query: &query,
                    fallback: result.synthesis.is_fallback(),
                    match_count: result.contexts.len(),
                    duration_ms: result.duration_ms,
                };
                let output = serde_json::json!({
                    "answer": result.synthesis.answer(),
                    "contexts": result.contexts,
                    "summary": summary,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_query_result(&result);
            }
        }

        Commands::Documents => {
            let user_id = require_user(cli.user.as_deref())?;
            let documents = cmd_list_documents(&ctx, user_id).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&documents)?);
            } else {
                print_documents(&documents);
            }
        }

        Commands::Verify { document_id } => {
            let user_id = require_user(cli.user.as_deref())?;
            let report = cmd_verify_document(&ctx, user_id, &document_id).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_verify_report(&report);
            }
        }

        Commands::Db { action } => {
            handle_db_action(&ctx, action, cli.json).await?;
        }
    }

    Ok(())
}

async fn handle_init(config: Option<PathBuf>, force: bool) -> Result<()> {
    // Get the base directory: if user specifies config file, use its parent dir
    let (base_dir, config_path) = if let Some(path) = config {
        if path.extension().is_some_and(|e| e == "toml") {
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            (base, path)
        } else {
            (path.clone(), path.join("config.toml"))
        }
    } else {
        let base = Config::default_base_dir();
        (base.clone(), base.join("config.toml"))
    };

    let config = cmd_init(InitOptions {
        base_dir,
        config_path,
        force,
    })
    .await?;

    println!("✓ clauserag initialized successfully");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Database: {}", config.paths.db_file.display());
    println!("\nNext steps:");
    println!("  1. Edit the config file to point at your embedding and chat endpoints");
    println!("  2. Start Qdrant: docker run -p 6334:6334 qdrant/qdrant");
    println!("  3. Index a file: clauserag --user alice ingest policy.pdf");

    Ok(())
}

async fn handle_db_action(ctx: &PipelineContext, action: DbAction, json: bool) -> Result<()> {
    match action {
        DbAction::Init => {
            let handle = cmd_db_init(ctx).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "index": handle.name,
                        "dimension": handle.dimension,
                    }))?
                );
            } else {
                println!(
                    "✓ Vector index '{}' ready (dimension {})",
                    handle.name, handle.dimension
                );
            }
        }
        DbAction::Status => {
            let status = cmd_db_status(ctx).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) if p.is_file() || p.extension().is_some_and(|e| e == "toml") => Config::load(p),
        Some(dir) => Config::load_from(Some(dir.to_path_buf())),
        None => Config::load_from(None),
    }
}

fn require_user(user: Option<&str>) -> Result<&str> {
    match user.map(str::trim) {
        Some(user) if !user.is_empty() => Ok(user),
        _ => Err(Error::BadRequest(
            "Missing caller identity; pass --user or set CLAUSERAG_USER".to_string(),
        )),
    }
}

fn local_filename(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::BadRequest(format!("Cannot derive a filename from {}", path.display())))
}

use docqa::cli::{Cli, Commands, ConfigAction};
use docqa::config::Config;
use docqa::error::{DocQaError, Result};
use docqa::evaluation;
use docqa::ingestion::IngestOutcome;
use docqa::service::{DocumentService, QueryResponse, ServiceBackends, NO_DOCUMENTS_MESSAGE};
use docqa::storage::StorageStats;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Config { action } => cmd_config(cli.config, action),
        command => {
            let config = load_config(cli.config)?;
            let service = open_service(config)?;

            let rt = tokio::runtime::Runtime::new().map_err(|e| DocQaError::Io {
                source: e,
                context: "Failed to create tokio runtime".to_string(),
            })?;
            rt.block_on(run(service, command))
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "docqa=debug" } else { "docqa=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn open_service(config: Config) -> Result<DocumentService> {
    tracing::info!("Loading models...");
    let backends = ServiceBackends::from_config(&config)?;
    DocumentService::open(config, backends)
}

async fn run(service: DocumentService, command: Commands) -> Result<()> {
    match command {
        Commands::Serve { bind } => cmd_serve(service, bind).await,
        Commands::Upload { file } => cmd_upload(&service, &file).await,
        Commands::Ingest {
            dir,
            policy,
            rebuild,
        } => {
            let report = service.ingest_directory(&dir, policy, rebuild).await?;

            for (document, chunks) in &report.indexed {
                println!("✓ {} ({} chunks)", document, chunks);
            }
            for document in &report.empty {
                println!("- {}: no extractable text", document);
            }
            for (document, reason) in &report.failed {
                println!("✗ {}: {}", document, reason);
            }
            println!(
                "\nIndexed {} documents, {} chunks added, {} total vectors",
                report.indexed.len(),
                report.chunks_added(),
                report.total_vectors
            );
            Ok(())
        }
        Commands::Query { question, json } => cmd_query(&service, &question, json).await,
        Commands::Evaluate { questions, json } => {
            let questions = evaluation::load_questions(&questions)?;
            let report = evaluation::evaluate(&service, &questions).await?;

            if json {
                println!("{}", to_json(&report, "Failed to serialize evaluation report")?);
                return Ok(());
            }

            for result in &report.questions {
                println!("Q: {}", result.question);
                println!("Top-3: {:?}", result.top_pages);
                println!("Relevant: {:?}", result.relevant_pages);
                println!("{}", "-".repeat(50));
            }
            println!("\nTotal Questions: {}", report.total);
            println!("Top-1 Accuracy: {:.2}%", report.top1_accuracy * 100.0);
            println!("Top-3 Accuracy: {:.2}%", report.top3_accuracy * 100.0);
            println!("Average Latency: {:.4}s", report.mean_latency_seconds);
            println!("P95 Latency: {:.4}s", report.p95_latency_seconds);
            Ok(())
        }
        Commands::Stats { json } => {
            let stats = service.stats().await?;

            if json {
                println!("{}", to_json(&stats, "Failed to serialize stats")?);
                return Ok(());
            }

            println!("Vectors:    {}", stats.total_vectors);
            println!("Dimension:  {}", stats.dimension);
            println!("Embedding:  {}", stats.embedding_model);
            println!("Reranker:   {}", stats.reranker_model);
            println!(
                "Storage:    {} (index {}, metadata {})",
                StorageStats::format_size(stats.storage.total_size()),
                StorageStats::format_size(stats.storage.index_size),
                StorageStats::format_size(stats.storage.metadata_size)
            );
            if stats.needs_reconcile {
                println!("⚠ Index files need reconciliation; ingestion is disabled");
            }
            println!("\nDocuments:");
            for doc in &stats.documents {
                println!("  {} ({} chunks, {} pages)", doc.document, doc.chunks, doc.pages);
            }
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

async fn cmd_serve(service: DocumentService, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| service.config().server.bind.clone());
    let addr: SocketAddr = bind.parse().map_err(|_| DocQaError::InvalidConfigValue {
        path: "server.bind".to_string(),
        message: format!("Invalid bind address: {}", bind),
    })?;

    docqa::server::serve(service, addr).await?;
    Ok(())
}

async fn cmd_upload(service: &DocumentService, file: &Path) -> Result<()> {
    let data = std::fs::read(file).map_err(|e| DocQaError::Io {
        source: e,
        context: format!("Failed to read {}", file.display()),
    })?;
    let file_name = file.to_string_lossy();

    match service.upload(&file_name, data).await? {
        IngestOutcome::Indexed {
            document,
            chunks_added,
            total_vectors,
        } => {
            println!("✓ {} uploaded and indexed successfully.", document);
            println!("  Chunks added:  {}", chunks_added);
            println!("  Total vectors: {}", total_vectors);
            Ok(())
        }
        IngestOutcome::NoExtractableText { document } => {
            Err(DocQaError::EmptyExtraction { document })
        }
    }
}

async fn cmd_query(service: &DocumentService, question: &str, json: bool) -> Result<()> {
    let response = QueryResponse::from(service.query(question).await?);

    if json {
        println!("{}", to_json(&response, "Failed to serialize query response")?);
        return Ok(());
    }

    match response {
        QueryResponse::NoDocuments { .. } => println!("{}", NO_DOCUMENTS_MESSAGE),
        QueryResponse::Results(answer) => {
            println!("Q: {} ({:.4}s)\n", answer.question, answer.latency_seconds);
            for (rank, result) in answer.results.iter().enumerate() {
                println!(
                    "{}. {} p.{}  score {:.4}  similarity {:.4}",
                    rank + 1,
                    result.document,
                    result.page_number,
                    result.score,
                    result.similarity
                );
                println!("   {}\n", result.snippet.replace('\n', " "));
            }
        }
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            println!("{}", to_json(&config, "Failed to serialize config")?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DocQaError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'docqa config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        docqa::config::ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    Config::load(&path)
}

fn to_json<T: serde::Serialize>(value: &T, context: &str) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| DocQaError::Json {
        source: e,
        context: context.to_string(),
    })
}

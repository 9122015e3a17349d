use anyhow::Context;
use clap::{Parser, Subcommand};
use quarry_embed::FastEmbedProvider;
use quarry_ingest::DirectoryCorpus;
use quarry_retriever::{
    config::QuarryConfig,
    retrieval::{IndexBuilder, QueryHit, RetrievalConfig, RetrievalService, StartupOutcome},
    status::StatusApi,
    storage::{Document, DocumentStore},
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Build and query a persisted document index.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ./quarry.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Vector index file; the sidecar path is derived from it
    #[arg(long)]
    index_path: Option<PathBuf>,

    /// Corpus directory to build from
    #[arg(long)]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the persisted index, rebuilding it if needed
    Build {
        /// Rebuild from the corpus even if the persisted index is usable
        #[arg(long)]
        force: bool,
    },
    /// Retrieve the documents closest to a query
    Query {
        text: String,
        /// Maximum number of results
        #[arg(short)]
        k: Option<usize>,
        /// Only return documents closer than this squared L2 distance
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show the state of the persisted index
    Status {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Print one stored document by row
    Get {
        row: usize,
        /// Output format
        #[arg(short, long, default_value = "full")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = QuarryConfig::discover(args.config.as_deref())?;
    if let Some(index_path) = args.index_path {
        config.index.index_path = index_path;
        config.index.store_path = None;
    }
    if let Some(corpus) = args.corpus {
        config.corpus.source_path = corpus;
    }

    match args.command {
        Commands::Build { force } => {
            let builder = open_builder(&config, open_provider(&config).await?)?;
            if force {
                let rows = builder.rebuild().await?;
                println!("Rebuilt index with {rows} documents");
            } else {
                match builder.start().await? {
                    StartupOutcome::Loaded { rows } => {
                        println!("Index is up to date ({rows} documents)")
                    }
                    StartupOutcome::Rebuilt { reason, rows } => {
                        println!("Rebuilt index with {rows} documents ({reason})")
                    }
                }
            }
            let paths = builder.paths();
            println!("Index: {}", paths.index_path.display());
            println!("Store: {}", paths.store_path.display());
            Ok(())
        }
        Commands::Query {
            text,
            k,
            threshold,
            format,
        } => {
            let provider = open_provider(&config).await?;
            let builder = open_builder(&config, provider.clone())?;
            builder.start().await?;

            let overrides = RetrievalConfig {
                top_k: k.unwrap_or(config.retrieval.top_k),
                distance_threshold: threshold.unwrap_or(config.retrieval.distance_threshold),
            };
            overrides.validate()?;

            let service = RetrievalService::new(builder.handle(), provider, overrides);
            let documents = service.search(&text).await?;

            match format {
                OutputFormat::Json => {
                    let hits: Vec<QueryHit> = documents.iter().map(QueryHit::from).collect();
                    println!("{}", serde_json::to_string_pretty(&hits)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} documents:", documents.len());
                    for doc in &documents {
                        println!(
                            "  Distance: {:.3} | Source: {} | Type: {} | {}",
                            doc.similarity_score().unwrap_or_default(),
                            doc.source().unwrap_or("-"),
                            doc.doc_type().unwrap_or("-"),
                            preview(&doc.content, 80)
                        );
                    }
                }
                OutputFormat::Full => {
                    for doc in &documents {
                        println!("Distance: {:.3}", doc.similarity_score().unwrap_or_default());
                        print_document(doc);
                        println!("---");
                    }
                }
            }
            Ok(())
        }
        Commands::Status { format } => {
            let status = StatusApi::persisted_status(&config.index_paths(), None);

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Quarry Index Status");
                    println!("===================");
                    println!(
                        "Index: {} ({})",
                        status.index_path.display(),
                        if status.index_exists { "present" } else { "missing" }
                    );
                    println!(
                        "Store: {} ({})",
                        status.store_path.display(),
                        if status.store_exists { "present" } else { "missing" }
                    );
                    if let Some(rows) = status.rows {
                        println!("Rows: {rows}");
                    }
                    if let Some(dimension) = status.dimension {
                        println!("Dimension: {dimension}");
                    }
                    if let Some(built_at) = status.built_at {
                        println!("Built at: {}", built_at.to_rfc3339());
                    }
                    match &status.rebuild_reason {
                        None => println!("Loadable: Yes"),
                        Some(reason) => println!("Loadable: No ({reason})"),
                    }
                    if format == OutputFormat::Full {
                        if let Some(size) = status.index_size_bytes {
                            println!("Index size: {size} bytes");
                        }
                        if let Some(fp) = &status.store_fingerprint {
                            println!("Store fingerprint: {fp}");
                        }
                        println!("Corpus: {}", config.corpus.source_path.display());
                        println!("Embedding model: {}", config.embedding.model_name);
                        println!(
                            "Retrieval: top_k={} distance_threshold={}",
                            config.retrieval.top_k, config.retrieval.distance_threshold
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Get { row, format } => {
            let store_path = config.index_paths().store_path;
            let (store, _) = DocumentStore::load(&store_path)?;
            let doc = store.get(row)?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(doc)?);
                }
                OutputFormat::Summary => {
                    println!("Row: {row}");
                    println!("Source: {}", doc.source().unwrap_or("-"));
                    println!("Content preview: {}", preview(&doc.content, 100));
                }
                OutputFormat::Full => {
                    println!("Row: {row}");
                    print_document(doc);
                }
            }
            Ok(())
        }
    }
}

async fn open_provider(config: &QuarryConfig) -> anyhow::Result<Arc<FastEmbedProvider>> {
    let provider = FastEmbedProvider::create(config.embedding.clone())
        .await
        .with_context(|| format!("loading embedding model {}", config.embedding.model_name))?;
    Ok(Arc::new(provider))
}

fn open_builder(config: &QuarryConfig, provider: Arc<FastEmbedProvider>) -> anyhow::Result<IndexBuilder> {
    let mut corpus = DirectoryCorpus::new(&config.corpus.source_path);
    if let Some(chunking) = config.corpus.chunking() {
        corpus = corpus.with_chunking(chunking)?;
    }

    Ok(
        IndexBuilder::new(provider, Arc::new(corpus), config.index_paths())
            .with_batch_size(config.embedding.batch_size),
    )
}

fn print_document(doc: &Document) {
    println!("Source: {}", doc.source().unwrap_or("-"));
    println!("Type: {}", doc.doc_type().unwrap_or("-"));
    let extra: Vec<_> = doc
        .metadata
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "source" | "type" | "similarity_score"))
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    if !extra.is_empty() {
        println!("Metadata: {}", extra.join(", "));
    }
    println!("Content:\n{}", doc.content);
}

fn preview(text: &str, chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > chars {
        format!("{}...", flat.chars().take(chars).collect::<String>())
    } else {
        flat
    }
}

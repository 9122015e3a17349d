use clap::Parser;
use quarry_ingest::{ChunkingOptions, CorpusSource, DirectoryCorpus};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Load a corpus directory the way the index builder does and print it as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing the corpus text and PDF files
    #[arg(default_value = "data")]
    root: PathBuf,

    /// Split files into chunks of at most this many bytes
    #[arg(short = 's', long)]
    chunk_size: Option<usize>,

    /// Bytes of overlap carried between consecutive chunks
    #[arg(short = 'o', long, default_value_t = 50)]
    chunk_overlap: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut corpus = DirectoryCorpus::new(args.root);
    if let Some(chunk_size) = args.chunk_size {
        corpus = corpus.with_chunking(ChunkingOptions {
            chunk_size,
            chunk_overlap: args.chunk_overlap,
        })?;
    }

    let documents = corpus.load_corpus().await?;
    println!("{}", serde_json::to_string_pretty(&documents)?);

    Ok(())
}

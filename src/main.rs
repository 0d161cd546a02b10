use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use archive_ingest::catalog::{CatalogLister, CatalogWriter};
use archive_ingest::config::{
    self, CatalogConfig, HarvestConfig, RagConfig, StorageConfig,
};
use archive_ingest::fetch::{self, Downloader};
use archive_ingest::harvest::Harvester;
use archive_ingest::rag::{HttpCompletionClient, HttpSearchClient, RetrievalPipeline};
use archive_ingest::retry::RetryPolicy;
use archive_ingest::site::IndexPage;
use archive_ingest::store::DocumentStore;
use archive_ingest::types::HarvestError;

#[derive(Parser)]
#[command(
    name = "archive-ingest",
    about = "Scrape archival record catalogs into object storage and query the processed index"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate the catalog and write the record files without downloading.
    List {
        /// Directory for the catalog generation files.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Full pipeline: list, download, upload, write the run catalog.
    Harvest {
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Concurrent fetch/upload slots (default: sequential).
        #[arg(long)]
        max_workers: Option<usize>,
    },
    /// Generate a static HTML index over the stored documents.
    IndexPage {
        #[arg(long, default_value = "index.html")]
        output: PathBuf,
    },
    /// Ask a question against the externally processed index.
    Ask {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    // Per-record failures are reported in the run summary and keep the exit
    // code at zero; only startup and fatal errors reach this branch.
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::List { output_dir } => list(output_dir).await?,
        Command::Harvest {
            output_dir,
            max_workers,
        } => harvest(output_dir, max_workers).await?,
        Command::IndexPage { output } => index_page(output).await?,
        Command::Ask { question, top_k } => ask(&question, top_k).await?,
    }
    Ok(())
}

async fn list(output_dir: Option<PathBuf>) -> Result<(), HarvestError> {
    let catalog_config = CatalogConfig::from_env()?;
    let harvest_config = HarvestConfig::from_env();
    let client = fetch::http_client(&catalog_config.user_agent)?;

    let lister = CatalogLister::new(client, catalog_config, RetryPolicy::default());
    let records = lister.collect_records().await;

    let writer = CatalogWriter::new(output_dir.unwrap_or(harvest_config.output_dir));
    let files = writer.write_records(&records).await?;

    println!("{} records listed", records.len());
    println!("catalog: {}", files.csv.display());
    println!("urls:    {}", files.urls.display());
    Ok(())
}

async fn harvest(
    output_dir: Option<PathBuf>,
    max_workers: Option<usize>,
) -> Result<(), HarvestError> {
    let catalog_config = CatalogConfig::from_env()?;
    let storage_config = StorageConfig::from_env()?;
    let mut harvest_config = HarvestConfig::from_env();
    if let Some(dir) = output_dir {
        harvest_config.output_dir = dir;
    }
    if let Some(workers) = max_workers {
        harvest_config = harvest_config.with_max_workers(workers);
    }

    let client = fetch::http_client(&catalog_config.user_agent)?;
    let retry = RetryPolicy::default();

    let harvester = Harvester::builder()
        .lister(CatalogLister::new(
            client.clone(),
            catalog_config,
            retry.clone(),
        ))
        .downloader(Downloader::new(client, retry.clone()))
        .store(DocumentStore::s3(&storage_config, retry)?)
        .writer(CatalogWriter::new(harvest_config.output_dir.clone()))
        .max_workers(harvest_config.max_workers)
        .build();

    let report = harvester.run().await?;
    println!("{}", report.summary.render());
    println!("catalog: {}", report.catalog.csv.display());
    Ok(())
}

async fn index_page(output: PathBuf) -> Result<(), HarvestError> {
    let storage_config = StorageConfig::from_env()?;
    let store = DocumentStore::s3(&storage_config, RetryPolicy::default())?;

    let mut page = IndexPage::new(storage_config);
    if let Some(dataset_url) = config::processed_dataset_url() {
        page = page.with_processed_dataset_url(dataset_url);
    }

    let written = page.write(&store, output).await?;
    println!("index page written to {}", written.display());
    Ok(())
}

async fn ask(question: &str, top_k: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let rag_config = RagConfig::from_env()?;
    let client = fetch::http_client("archive-ingest/0.3")?;

    let search = Arc::new(HttpSearchClient::new(
        client.clone(),
        rag_config.search_endpoint.clone(),
        rag_config.search_api_key.clone(),
    ));
    let completion = Arc::new(HttpCompletionClient::new(
        client,
        rag_config.completion_endpoint.clone(),
        rag_config.completion_api_key.clone(),
        rag_config.completion_model.clone(),
    ));

    let pipeline = RetrievalPipeline::new(search, completion, top_k.unwrap_or(rag_config.top_k));
    let answer = pipeline.ask(question).await?;

    println!("{}\n", answer.text);
    println!("sources:");
    for citation in &answer.citations {
        println!(
            "  [{:.2}] {} ({})",
            citation.score,
            citation.filename.as_deref().unwrap_or("unknown"),
            citation.source_url.as_deref().unwrap_or("unknown source"),
        );
    }
    Ok(())
}

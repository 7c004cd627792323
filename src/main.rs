use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use curricula_lib::config::{self, AppConfig};
use curricula_lib::models::Program;
use curricula_lib::pipeline::import::PlanFetcher;
use curricula_lib::pipeline::processor::PlanProcessor;
use curricula_lib::pipeline::rag::HybridRetriever;
use curricula_lib::pipeline::storage::embedder::shared_embedding_model;
use curricula_lib::pipeline::storage::index::build_index;
use curricula_lib::pipeline::storage::plan_store::{load_all_plans, load_plan};

#[derive(Parser, Debug)]
#[command(
    name = "curricula",
    version,
    about = "Extract curriculum plans from PDFs and search them"
)]
struct Cli {
    /// Data directory (defaults to CURRICULA_DATA_DIR or ~/Curricula)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a plan from a local PDF and store it
    Ingest {
        #[arg(long, value_parser = parse_program)]
        program: Program,
        #[arg(long)]
        pdf: PathBuf,
        /// Recorded as the plan's source (defaults to the program page)
        #[arg(long)]
        source_url: Option<String>,
    },
    /// Download the program's plan PDF and ingest it
    Scrape {
        /// Program to fetch; all programs when omitted
        #[arg(long, value_parser = parse_program)]
        program: Option<Program>,
    },
    /// Rebuild the search index from the stored plans
    Index,
    /// Hybrid search over course chunks, one JSON hit per line
    Search {
        query: String,
        #[arg(short, default_value_t = 6)]
        k: usize,
        #[arg(long, value_parser = parse_program)]
        program: Option<Program>,
    },
    /// Print the derived rules of a stored plan
    Rules {
        #[arg(long, value_parser = parse_program)]
        program: Program,
    },
}

fn parse_program(raw: &str) -> Result<Program, String> {
    Program::from_cli(raw).ok_or_else(|| format!("unknown program `{raw}` (expected ai or ai-product)"))
}

fn main() -> Result<()> {
    curricula_lib::init_tracing();
    let cli = Cli::parse();

    let mut app = AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        app.paths = config::DataPaths::new(dir);
    }
    tracing::info!(
        version = config::APP_VERSION,
        data_dir = %app.paths.root().display(),
        "{} starting",
        config::APP_NAME
    );

    match cli.command {
        Command::Ingest {
            program,
            pdf,
            source_url,
        } => {
            let bytes = std::fs::read(&pdf)
                .with_context(|| format!("failed to read {}", pdf.display()))?;
            let source_url = source_url.unwrap_or_else(|| program.page_url().to_string());
            let outcome = PlanProcessor::with_pdf_defaults()
                .ingest(&app.paths, program, &bytes, &source_url)
                .with_context(|| format!("failed to ingest {program}"))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Scrape { program } => {
            let fetcher = PlanFetcher::new()?;
            let processor = PlanProcessor::with_pdf_defaults();
            let programs = program.map_or_else(|| Program::ALL.to_vec(), |p| vec![p]);
            let mut failed = Vec::new();
            for program in programs {
                match processor.scrape(&app.paths, &fetcher, program) {
                    Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
                    Err(e) => {
                        tracing::error!(program = %program, error = %e, "Scrape failed");
                        failed.push(program.as_str());
                    }
                }
            }
            anyhow::ensure!(failed.is_empty(), "scrape failed for {}", failed.join(", "));
        }
        Command::Index => {
            let plans = load_all_plans(&app.paths.normalized_dir())?;
            let embedder = shared_embedding_model(&app.embeddings)?;
            let manifest = build_index(&app.paths.index_dir(), &plans, embedder.as_ref())
                .context("failed to build index")?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        Command::Search { query, k, program } => {
            let embedder = match shared_embedding_model(&app.embeddings) {
                Ok(model) => Some(model),
                Err(e) => {
                    tracing::warn!(error = %e, "Embedding model unavailable, lexical only");
                    None
                }
            };
            let retriever = HybridRetriever::open(&app.paths, embedder)?;
            let outcome = retriever.search(&query, k, program);
            if outcome.is_unavailable() {
                eprintln!("no results: no index available, run `curricula index` first");
            }
            for hit in &outcome.hits {
                println!("{}", serde_json::to_string(hit)?);
            }
        }
        Command::Rules { program } => {
            let plan = load_plan(&app.paths.normalized_dir(), program)?
                .with_context(|| format!("no plan stored for {program}"))?;
            println!("{}", serde_json::to_string_pretty(&plan.rules)?);
        }
    }
    Ok(())
}

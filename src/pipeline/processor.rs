//! Plan ingestion orchestrator.
//!
//! Drives one program through the pipeline:
//! PDF bytes → table cascade → normalization → plan → JSON + SQLite.
//!
//! The cascade is injected so the whole flow runs against fixture layouts
//! in tests.

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;

use crate::config::DataPaths;
use crate::db::{open_database, replace_plan, DatabaseError};
use crate::models::{Plan, Program};
use crate::pipeline::extraction::{StrategyAttempt, TableCascade};
use crate::pipeline::import::{ImportError, PlanFetcher};
use crate::pipeline::normalize::{build_plan, normalize_tables, plan_version, NormalizeError};
use crate::pipeline::storage::plan_store::save_plan;
use crate::pipeline::storage::StorageError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Download failed: {0}")]
    Import(#[from] ImportError),

    #[error("Plan validation failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Summary of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub program: Program,
    pub version: String,
    /// Strategy whose tables were used; `None` means no plan was found.
    pub strategy: Option<&'static str>,
    pub attempts: Vec<StrategyAttempt>,
    pub tables: usize,
    pub courses: usize,
    pub plan_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct PlanProcessor {
    cascade: TableCascade,
}

impl PlanProcessor {
    pub fn new(cascade: TableCascade) -> Self {
        Self { cascade }
    }

    pub fn with_pdf_defaults() -> Self {
        Self::new(TableCascade::with_pdf_defaults())
    }

    /// Extract and normalize a plan without persisting it.
    ///
    /// Extraction never fails: a document with no usable tables gives a plan
    /// with no courses. Only a provenance collision is an error.
    pub fn build(
        &self,
        program: Program,
        pdf_bytes: &[u8],
        source_url: &str,
    ) -> Result<(Plan, ProcessingSummary), ProcessingError> {
        let extraction = self.cascade.run(pdf_bytes);
        let courses = normalize_tables(&extraction.tables);
        if courses.is_empty() {
            tracing::warn!(program = %program, "No courses extracted");
        }

        let plan = build_plan(program, plan_version(Utc::now()), source_url, courses)?;
        let summary = ProcessingSummary {
            strategy: extraction.winner,
            attempts: extraction.attempts,
            tables: extraction.tables.len(),
        };
        Ok((plan, summary))
    }

    /// Build the plan and replace the stored copies (JSON and SQLite).
    pub fn ingest(
        &self,
        paths: &DataPaths,
        program: Program,
        pdf_bytes: &[u8],
        source_url: &str,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let (plan, summary) = self.build(program, pdf_bytes, source_url)?;

        let plan_path = save_plan(&paths.normalized_dir(), &plan)?;
        std::fs::create_dir_all(paths.root()).map_err(StorageError::from)?;
        let mut conn = open_database(&paths.database_path())?;
        replace_plan(&mut conn, &plan)?;

        tracing::info!(
            program = %program,
            strategy = summary.strategy.unwrap_or("none"),
            courses = plan.courses.len(),
            total_credit_value = plan.rules.total_credit_value,
            "Plan ingested"
        );

        Ok(ProcessingOutcome {
            program,
            version: plan.version,
            strategy: summary.strategy,
            attempts: summary.attempts,
            tables: summary.tables,
            courses: plan.courses.len(),
            plan_path,
        })
    }

    /// Download the program's plan PDF and ingest it.
    pub fn scrape(
        &self,
        paths: &DataPaths,
        fetcher: &PlanFetcher,
        program: Program,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let (pdf_url, bytes) = fetcher.fetch_plan(program, &paths.raw_dir())?;
        tracing::debug!(program = %program, pdf_url = %pdf_url, "Plan PDF downloaded");
        self.ingest_downloaded(paths, program, &bytes)
    }

    /// Ingest a downloaded plan PDF. The plan cites the program page, not
    /// the PDF link.
    pub fn ingest_downloaded(
        &self,
        paths: &DataPaths,
        program: Program,
        pdf_bytes: &[u8],
    ) -> Result<ProcessingOutcome, ProcessingError> {
        self.ingest(paths, program, pdf_bytes, program.page_url())
    }
}

/// Extraction details carried alongside a built plan.
#[derive(Debug, Clone)]
pub struct ProcessingSummary {
    pub strategy: Option<&'static str>,
    pub attempts: Vec<StrategyAttempt>,
    pub tables: usize,
}

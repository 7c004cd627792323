use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::lattice::RuledLineStrategy;
use super::stream::WhitespaceStreamStrategy;
use super::text_split::TextHeuristicStrategy;
use super::types::{PageTable, StrategyClass, TableStrategy};

/// What happened when one strategy was tried.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptStatus {
    Produced { tables: usize },
    Empty,
    Unavailable,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyAttempt {
    pub strategy: &'static str,
    pub class: StrategyClass,
    pub status: AttemptStatus,
}

/// Tables of one document plus the trail of strategies tried.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeOutcome {
    pub tables: Vec<PageTable>,
    /// Strategy whose output was kept; `None` when nothing succeeded.
    pub winner: Option<&'static str>,
    pub attempts: Vec<StrategyAttempt>,
}

/// Ordered table-extraction strategies, most structurally reliable first.
///
/// Fallback is whole-document: the first strategy that yields any table
/// supplies every table of the document, and weaker strategies are not
/// consulted for the remaining pages.
pub struct TableCascade {
    strategies: Vec<Box<dyn TableStrategy>>,
}

impl TableCascade {
    pub fn new(strategies: Vec<Box<dyn TableStrategy>>) -> Self {
        Self { strategies }
    }

    /// Ruled-line and whitespace-stream over PDFium, then the text-layer heuristic.
    pub fn with_pdf_defaults() -> Self {
        Self::new(vec![
            Box::new(RuledLineStrategy::pdfium()),
            Box::new(WhitespaceStreamStrategy::pdfium()),
            Box::new(TextHeuristicStrategy::pdf_text()),
        ])
    }

    /// Tables of the document; empty when no strategy succeeds. Never fails.
    pub fn extract_tables(&self, pdf_bytes: &[u8]) -> Vec<PageTable> {
        self.run(pdf_bytes).tables
    }

    pub fn run(&self, pdf_bytes: &[u8]) -> CascadeOutcome {
        let mut outcome = CascadeOutcome::default();

        for strategy in &self.strategies {
            let name = strategy.name();
            let class = strategy.class();

            // PDF libraries can panic on malformed input; treat that as a failure.
            let result = panic::catch_unwind(AssertUnwindSafe(|| strategy.try_extract(pdf_bytes)));

            let status = match result {
                Ok(Ok(tables)) if !tables.is_empty() => {
                    info!(
                        strategy = name,
                        class = class.as_str(),
                        tables = tables.len(),
                        "Table extraction succeeded"
                    );
                    let count = tables.len();
                    outcome.tables = tables;
                    outcome.winner = Some(name);
                    outcome.attempts.push(StrategyAttempt {
                        strategy: name,
                        class,
                        status: AttemptStatus::Produced { tables: count },
                    });
                    return outcome;
                }
                Ok(Ok(_)) => {
                    debug!(strategy = name, "Strategy found no tables");
                    AttemptStatus::Empty
                }
                Ok(Err(super::ExtractionError::Unavailable(reason))) => {
                    debug!(strategy = name, reason = %reason, "Strategy unavailable, skipping");
                    AttemptStatus::Unavailable
                }
                Ok(Err(e)) => {
                    warn!(strategy = name, error = %e, "Strategy failed");
                    AttemptStatus::Failed {
                        reason: e.to_string(),
                    }
                }
                Err(_) => {
                    warn!(strategy = name, "Strategy panicked");
                    AttemptStatus::Failed {
                        reason: "strategy panicked".into(),
                    }
                }
            };

            outcome.attempts.push(StrategyAttempt {
                strategy: name,
                class,
                status,
            });
        }

        warn!(attempts = outcome.attempts.len(), "No strategy produced tables");
        outcome
    }
}

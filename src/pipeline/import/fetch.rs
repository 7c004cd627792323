//! Program page → plan PDF link → PDF bytes.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;

use super::ImportError;
use crate::models::Program;
use crate::pipeline::storage::plan_store::write_atomic;

const USER_AGENT: &str = concat!("curricula/", env!("CARGO_PKG_VERSION"));
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const PDF_TIMEOUT: Duration = Duration::from_secs(60);

static PLAN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/programs/(\d+)/plan/abit/pdf").expect("valid regex"));

/// Canonical PDF endpoint for a constructor program id.
pub fn plan_pdf_url(program_id: &str) -> String {
    format!("https://api.itmo.su/constructor-ep/api/v1/static/programs/{program_id}/plan/abit/pdf")
}

/// First `/programs/<id>/plan/abit/pdf` reference in a program page.
pub fn resolve_plan_link(html: &str) -> Option<String> {
    PLAN_LINK
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|id| plan_pdf_url(id.as_str()))
}

/// Where a downloaded plan PDF is kept.
pub fn raw_pdf_path(raw_dir: &Path, program: Program) -> PathBuf {
    raw_dir.join(format!("{}.pdf", program.slug()))
}

/// Blocking HTTP client for program pages and plan PDFs.
pub struct PlanFetcher {
    client: Client,
}

impl PlanFetcher {
    pub fn new() -> Result<Self, ImportError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::blocking::Response, ImportError> {
        let response = self.client.get(url).timeout(timeout).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    pub fn fetch_page(&self, url: &str) -> Result<String, ImportError> {
        Ok(self.get(url, PAGE_TIMEOUT)?.text()?)
    }

    pub fn download(&self, url: &str) -> Result<Vec<u8>, ImportError> {
        let bytes = self.get(url, PDF_TIMEOUT)?.bytes()?;
        tracing::info!(url, bytes = bytes.len(), "Plan PDF downloaded");
        Ok(bytes.to_vec())
    }

    /// Plan PDF link advertised on the program page.
    pub fn scrape_plan_link(&self, program: Program) -> Result<String, ImportError> {
        let html = self.fetch_page(program.page_url())?;
        resolve_plan_link(&html).ok_or_else(|| ImportError::NoPlanLink(program.page_url().to_string()))
    }

    /// Plan PDF link for `program`: scraped from its page when possible,
    /// otherwise the known direct link.
    pub fn plan_url(&self, program: Program) -> String {
        match self.scrape_plan_link(program) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(program = %program, error = %e, "Using direct plan link");
                program.direct_plan_url().to_string()
            }
        }
    }

    /// Resolve, download and keep a copy of the plan PDF under `raw_dir`.
    pub fn fetch_plan(&self, program: Program, raw_dir: &Path) -> Result<(String, Vec<u8>), ImportError> {
        let url = self.plan_url(program);
        let bytes = self.download(&url)?;
        let path = raw_pdf_path(raw_dir, program);
        if let Err(e) = write_atomic(&path, &bytes) {
            tracing::warn!(path = %path.display(), error = %e, "Could not keep raw PDF");
        }
        Ok((url, bytes))
    }
}

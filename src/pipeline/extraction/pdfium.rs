//! Page geometry via Google PDFium.
//!
//! Reads positioned text runs and drawn path bounds for the ruled-line and
//! whitespace-stream strategies. PDFium is bound at runtime: when the
//! library cannot be found every call returns `ExtractionError::Unavailable`
//! and the cascade moves on to the next strategy.
//!
//! `PdfiumLayoutSource` is stateless (`Send + Sync`). Each operation creates
//! a fresh `Pdfium` instance because the upstream type is `!Send`.
//! The OS caches `dlopen`/`LoadLibrary` calls, so repeat loads are near-free.

use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::{LayoutSource, PageLayout, Rect, RuleSegment, TextBox};
use super::ExtractionError;

const LIB_PATH_ENV: &str = "PDFIUM_DYNAMIC_LIB_PATH";

/// Loads page layouts with PDFium.
pub struct PdfiumLayoutSource;

impl PdfiumLayoutSource {
    /// True when the PDFium library can be bound in this environment.
    pub fn is_available() -> bool {
        load_pdfium().is_ok()
    }
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path)
/// 2. Alongside the running executable, then `<exe_dir>/pdfium/lib`
/// 3. System library search paths
fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var(LIB_PATH_ENV) {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            ExtractionError::Unavailable(format!("Failed to load PDFium from {path}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidates = [
                exe_dir.to_path_buf(),
                exe_dir.join("pdfium").join("lib"),
            ];

            for dir in &candidates {
                let lib_path = Pdfium::pdfium_platform_library_name_at_path(
                    dir.to_string_lossy().as_ref(),
                );
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium from candidate directory");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractionError::Unavailable(format!(
            "PDFium library not found. Set {LIB_PATH_ENV} or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Map PDF load errors; encrypted PDFs get their own variant.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let msg = format!("{e}");
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfEncrypted
    } else {
        ExtractionError::PdfParsing(format!("Failed to load PDF: {e}"))
    }
}

fn to_rect(rect: &PdfRect) -> Rect {
    Rect::new(
        rect.left().value,
        rect.bottom().value,
        rect.right().value,
        rect.top().value,
    )
}

impl LayoutSource for PdfiumLayoutSource {
    fn load_layouts(&self, pdf_bytes: &[u8]) -> Result<Vec<PageLayout>, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let page_count = document.pages().len();
        if page_count == 0 {
            return Err(ExtractionError::EmptyDocument);
        }

        let mut layouts = Vec::with_capacity(page_count as usize);

        for (idx, page) in document.pages().iter().enumerate() {
            let page_number = idx + 1;

            let text: Vec<TextBox> = match page.text() {
                Ok(page_text) => page_text
                    .segments()
                    .iter()
                    .filter_map(|segment| {
                        let content = segment.text();
                        let content = content.trim();
                        if content.is_empty() {
                            return None;
                        }
                        Some(TextBox {
                            text: content.to_string(),
                            rect: to_rect(&segment.bounds()),
                        })
                    })
                    .collect(),
                Err(e) => {
                    warn!(page = page_number, error = %e, "PDFium could not read text layer");
                    Vec::new()
                }
            };

            let rules: Vec<RuleSegment> = page
                .objects()
                .iter()
                .filter(|object| object.object_type() == PdfPageObjectType::Path)
                .filter_map(|object| object.bounds().ok())
                .flat_map(|quad| RuleSegment::from_bounds(&to_rect(&quad.to_rect())))
                .collect();

            debug!(
                page = page_number,
                text_runs = text.len(),
                rules = rules.len(),
                "Loaded page layout"
            );

            layouts.push(PageLayout {
                page_number,
                width: page.width().value,
                height: page.height().value,
                text,
                rules,
            });
        }

        Ok(layouts)
    }
}

// ── Fixture source for testing ──────────────────────────────────────

/// Returns pre-built layouts regardless of input bytes.
///
/// Used by strategy and cascade tests that need geometry without the
/// PDFium binary.
pub struct FixtureLayoutSource {
    layouts: Vec<PageLayout>,
}

impl FixtureLayoutSource {
    pub fn new(layouts: Vec<PageLayout>) -> Self {
        Self { layouts }
    }
}

impl LayoutSource for FixtureLayoutSource {
    fn load_layouts(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageLayout>, ExtractionError> {
        Ok(self.layouts.clone())
    }
}

/// Always reports its backing library as missing.
pub struct UnavailableLayoutSource;

impl LayoutSource for UnavailableLayoutSource {
    fn load_layouts(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageLayout>, ExtractionError> {
        Err(ExtractionError::Unavailable("layout library not installed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_returns_layouts_unchanged() {
        let source = FixtureLayoutSource::new(vec![PageLayout {
            page_number: 3,
            width: 595.0,
            height: 842.0,
            ..Default::default()
        }]);
        let layouts = source.load_layouts(b"ignored").unwrap();
        assert_eq!(layouts.len(), 1);
        assert_eq!(layouts[0].page_number, 3);
    }

    #[test]
    fn unavailable_source_reports_unavailable() {
        let err = UnavailableLayoutSource.load_layouts(&[]).unwrap_err();
        assert!(matches!(err, ExtractionError::Unavailable(_)));
    }
}

use super::types::TextLayerSource;
use super::ExtractionError;

/// Per-page text layer using the pdf-extract crate.
/// Pure Rust, so it stays available when PDFium is not installed.
pub struct PdfTextSource;

impl TextLayerSource for PdfTextSource {
    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        if pages.is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }
        Ok(pages)
    }
}

/// Fixed page texts, for strategy tests.
pub struct FixtureTextSource {
    pages: Vec<String>,
}

impl FixtureTextSource {
    pub fn new<S: Into<String>>(pages: impl IntoIterator<Item = S>) -> Self {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }
}

impl TextLayerSource for FixtureTextSource {
    fn page_texts(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        Ok(self.pages.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Generate a valid PDF with one text line per entry, using lopdf
    /// (the library that pdf-extract uses internally).
    pub(crate) fn make_test_pdf(lines: &[&str]) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        // BT /F1 10 Tf 14 TL 50 750 Td (line) Tj T* (line) Tj ... ET
        let mut content = String::from("BT /F1 10 Tf 14 TL 50 750 Td ");
        for line in lines {
            content.push_str(&format!("({line}) Tj T* "));
        }
        content.push_str("ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        };

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });

        if let Ok(Object::Dictionary(ref mut dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", pages_id);
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn reads_text_layer_of_digital_pdf() {
        let pdf_bytes = make_test_pdf(&["Curriculum plan", "Machine Learning"]);
        let pages = PdfTextSource.page_texts(&pdf_bytes).unwrap();

        assert_eq!(pages.len(), 1);
        assert!(
            pages[0].contains("Curriculum") || pages[0].contains("Machine"),
            "unexpected text layer: {}",
            pages[0]
        );
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let result = PdfTextSource.page_texts(b"not a pdf");
        assert!(matches!(result, Err(ExtractionError::PdfParsing(_))));
    }

    #[test]
    fn fixture_source_returns_pages() {
        let source = FixtureTextSource::new(["a", "b"]);
        assert_eq!(source.page_texts(&[]).unwrap(), vec!["a", "b"]);
    }
}

//! Plain-text heuristic: the last resort when no geometry is available.
//!
//! Each text line is split on runs of two or more whitespace characters
//! (or tabs). Lines with at least four fields are taken as table rows.
//! Columns get positional labels, so field inference normally resolves
//! roles from the first row promoted to header.

use std::sync::LazyLock;

use regex::Regex;

use super::pdf::PdfTextSource;
use super::types::{PageTable, RawTable, StrategyClass, TableStrategy, TextLayerSource};
use super::ExtractionError;

/// Minimum fields for a text line to count as a table row.
const MIN_FIELDS: usize = 4;

static FIELD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}|\t").expect("valid regex"));

pub struct TextHeuristicStrategy<T: TextLayerSource = PdfTextSource> {
    source: T,
}

impl TextHeuristicStrategy<PdfTextSource> {
    pub fn pdf_text() -> Self {
        Self::new(PdfTextSource)
    }
}

impl<T: TextLayerSource> TextHeuristicStrategy<T> {
    pub fn new(source: T) -> Self {
        Self { source }
    }
}

impl<T: TextLayerSource> TableStrategy for TextHeuristicStrategy<T> {
    fn name(&self) -> &'static str {
        "text_heuristic"
    }

    fn class(&self) -> StrategyClass {
        StrategyClass::TextHeuristic
    }

    fn try_extract(&self, pdf_bytes: &[u8]) -> Result<Vec<PageTable>, ExtractionError> {
        let pages = self.source.page_texts(pdf_bytes)?;
        Ok(pages
            .iter()
            .enumerate()
            .filter_map(|(idx, text)| {
                let rows = split_rows(text);
                if rows.is_empty() {
                    return None;
                }
                Some(PageTable {
                    page_number: idx + 1,
                    table: RawTable::positional(rows),
                })
            })
            .collect())
    }
}

/// Rows of one page's text that split into enough fields.
pub fn split_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<String> = FIELD_SEPARATOR
                .split(line.trim())
                .map(str::to_string)
                .collect();
            (parts.len() >= MIN_FIELDS).then_some(parts)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::pdf::FixtureTextSource;

    const PAGE: &str = "Учебный план 2025\n\
        Дисциплина  Сем  ЗЕТ  Тип\n\
        Линейная алгебра   1   5   Обязательная\n\
        Итого: 120 ЗЕТ\n\
        Обработка текстов\t2\t3\tПо выбору\n";

    #[test]
    fn keeps_only_lines_with_four_fields() {
        let rows = split_rows(PAGE);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["Дисциплина", "Сем", "ЗЕТ", "Тип"]);
        assert_eq!(rows[1][0], "Линейная алгебра");
        assert_eq!(rows[2][3], "По выбору");
    }

    #[test]
    fn single_spaces_do_not_split() {
        assert!(split_rows("one two three four five").is_empty());
    }

    #[test]
    fn pages_without_rows_are_skipped() {
        let strategy = TextHeuristicStrategy::new(FixtureTextSource::new(["prose only", PAGE]));
        let tables = strategy.try_extract(&[]).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page_number, 2);
        assert_eq!(tables[0].table.columns, vec!["0", "1", "2", "3"]);
        assert_eq!(tables[0].table.rows.len(), 3);
    }

    #[test]
    fn reads_synthesized_pdf() {
        let pdf = crate::pipeline::extraction::pdf::tests::make_test_pdf(&[
            "Name    Semester    Credits    Type",
            "Linear Algebra    1    5    Required",
        ]);
        assert_eq!(PdfTextSource.page_texts(&pdf).unwrap().len(), 1);

        let tables = TextHeuristicStrategy::pdf_text().try_extract(&pdf).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page_number, 1);
        let rows = &tables[0].table.rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Name", "Semester", "Credits", "Type"]);
        assert_eq!(rows[1], vec!["Linear Algebra", "1", "5", "Required"]);
    }
}

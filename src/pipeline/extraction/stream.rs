//! Whitespace-stream table detection.
//!
//! Tables laid out without ruling: columns are separated only by vertical
//! gutters of whitespace. Text runs are grouped into lines by baseline,
//! and the horizontal extents of runs on multi-run lines are merged into
//! column spans. Gaps between spans are the gutters.

use tracing::debug;

use super::lattice::join_cell;
use super::pdfium::PdfiumLayoutSource;
use super::types::{
    LayoutSource, PageLayout, PageTable, RawTable, StrategyClass, TableStrategy, TextBox,
};
use super::ExtractionError;

/// Runs whose vertical centers differ by at most this (points) share a line.
const LINE_TOLERANCE: f32 = 3.0;

/// Minimum gutter width (points) that separates two columns.
const MIN_GUTTER: f32 = 4.0;

/// Minimum lines with two or more runs for a page to hold a table.
const MIN_TABLE_LINES: usize = 2;

pub struct WhitespaceStreamStrategy<S: LayoutSource = PdfiumLayoutSource> {
    source: S,
}

impl WhitespaceStreamStrategy<PdfiumLayoutSource> {
    pub fn pdfium() -> Self {
        Self::new(PdfiumLayoutSource)
    }
}

impl<S: LayoutSource> WhitespaceStreamStrategy<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: LayoutSource> TableStrategy for WhitespaceStreamStrategy<S> {
    fn name(&self) -> &'static str {
        "whitespace_stream"
    }

    fn class(&self) -> StrategyClass {
        StrategyClass::WhitespaceStream
    }

    fn try_extract(&self, pdf_bytes: &[u8]) -> Result<Vec<PageTable>, ExtractionError> {
        let layouts = self.source.load_layouts(pdf_bytes)?;
        Ok(layouts
            .iter()
            .filter_map(|layout| {
                table_from_gutters(layout).map(|table| PageTable {
                    page_number: layout.page_number,
                    table,
                })
            })
            .collect())
    }
}

/// Cut the whitespace-aligned table out of a page, if there is one.
///
/// Only lines with at least two runs become rows; single-run lines are
/// titles, footers or wrapped text and are left out.
pub fn table_from_gutters(layout: &PageLayout) -> Option<RawTable> {
    let lines = group_lines(&layout.text);
    let table_lines: Vec<&Vec<&TextBox>> = lines.iter().filter(|l| l.len() >= 2).collect();

    if table_lines.len() < MIN_TABLE_LINES {
        return None;
    }

    let spans = column_spans(table_lines.iter().flat_map(|l| l.iter().copied()));
    if spans.len() < 2 {
        debug!(page = layout.page_number, "No whitespace gutters found");
        return None;
    }

    let grid: Vec<Vec<String>> = table_lines
        .iter()
        .map(|line| {
            let mut cells: Vec<Vec<&TextBox>> = vec![Vec::new(); spans.len()];
            for &run in line.iter() {
                cells[nearest_span(&spans, run.rect.center_x())].push(run);
            }
            cells.into_iter().map(join_cell).collect()
        })
        .collect();

    RawTable::from_grid(grid)
}

/// Group runs into lines, top of page first, runs left to right.
fn group_lines(text: &[TextBox]) -> Vec<Vec<&TextBox>> {
    let mut runs: Vec<&TextBox> = text.iter().filter(|t| !t.text.trim().is_empty()).collect();
    runs.sort_by(|a, b| b.rect.center_y().total_cmp(&a.rect.center_y()));

    let mut lines: Vec<(f32, Vec<&TextBox>)> = Vec::new();
    for run in runs {
        let cy = run.rect.center_y();
        match lines.last_mut() {
            Some((anchor, line)) if (*anchor - cy).abs() <= LINE_TOLERANCE => line.push(run),
            _ => lines.push((cy, vec![run])),
        }
    }

    lines
        .into_iter()
        .map(|(_, mut line)| {
            line.sort_by(|a, b| a.rect.left.total_cmp(&b.rect.left));
            line
        })
        .collect()
}

/// Merge horizontal extents into column spans separated by gutters.
fn column_spans<'a>(runs: impl Iterator<Item = &'a TextBox>) -> Vec<(f32, f32)> {
    let mut extents: Vec<(f32, f32)> = runs.map(|r| (r.rect.left, r.rect.right)).collect();
    extents.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut spans: Vec<(f32, f32)> = Vec::new();
    for (left, right) in extents {
        match spans.last_mut() {
            Some(last) if left - last.1 < MIN_GUTTER => last.1 = last.1.max(right),
            _ => spans.push((left, right)),
        }
    }
    spans
}

fn nearest_span(spans: &[(f32, f32)], x: f32) -> usize {
    spans
        .iter()
        .enumerate()
        .map(|(i, &(left, right))| {
            let distance = if x < left {
                left - x
            } else if x > right {
                x - right
            } else {
                0.0
            };
            (i, distance)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::lattice::tests::word;
    use crate::pipeline::extraction::pdfium::FixtureLayoutSource;

    fn stream_page() -> PageLayout {
        PageLayout {
            page_number: 4,
            width: 595.0,
            height: 842.0,
            text: vec![
                word("Учебный план", 200.0, 780.0),
                word("Дисциплина", 50.0, 700.0),
                word("Семестр", 300.0, 700.0),
                word("ЗЕТ", 400.0, 701.0),
                word("Машинное обучение", 50.0, 680.0),
                word("1", 300.0, 680.0),
                word("6", 400.0, 679.5),
                word("Статистика", 50.0, 660.0),
                word("2", 300.0, 660.0),
                word("4,5", 400.0, 660.0),
            ],
            rules: vec![],
        }
    }

    #[test]
    fn groups_runs_into_lines() {
        let page = stream_page();
        let lines = group_lines(&page.text);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0][0].text, "Учебный план");
        assert_eq!(lines[1].len(), 3);
        assert_eq!(lines[1][0].text, "Дисциплина");
    }

    #[test]
    fn splits_columns_on_gutters() {
        let table = table_from_gutters(&stream_page()).unwrap();
        assert_eq!(table.columns, vec!["Дисциплина", "Семестр", "ЗЕТ"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["Статистика", "2", "4,5"]);
    }

    #[test]
    fn prose_page_yields_nothing() {
        let page = PageLayout {
            page_number: 1,
            text: vec![
                word("Программа магистратуры", 50.0, 700.0),
                word("Искусственный интеллект", 50.0, 680.0),
            ],
            ..Default::default()
        };
        assert!(table_from_gutters(&page).is_none());
    }

    #[test]
    fn nearest_span_picks_closest_column() {
        let spans = [(0.0, 10.0), (50.0, 60.0)];
        assert_eq!(nearest_span(&spans, 5.0), 0);
        assert_eq!(nearest_span(&spans, 40.0), 1);
    }

    #[test]
    fn strategy_reports_page_numbers() {
        let strategy = WhitespaceStreamStrategy::new(FixtureLayoutSource::new(vec![stream_page()]));
        let tables = strategy.try_extract(b"%PDF").unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page_number, 4);
        assert_eq!(strategy.name(), "whitespace_stream");
    }
}

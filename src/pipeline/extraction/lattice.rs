//! Ruled-line table detection.
//!
//! Tables whose cells are delimited by drawn lines. Ruling segments are
//! snapped into a grid of row and column boundaries; every text run is
//! dropped into the cell containing its center point.

use tracing::debug;

use super::pdfium::PdfiumLayoutSource;
use super::types::{
    LayoutSource, Orientation, PageLayout, PageTable, RawTable, StrategyClass, TableStrategy,
    TextBox,
};
use super::ExtractionError;

/// Rule positions closer than this (points) are the same grid line.
const SNAP_TOLERANCE: f32 = 2.5;

pub struct RuledLineStrategy<S: LayoutSource = PdfiumLayoutSource> {
    source: S,
}

impl RuledLineStrategy<PdfiumLayoutSource> {
    pub fn pdfium() -> Self {
        Self::new(PdfiumLayoutSource)
    }
}

impl<S: LayoutSource> RuledLineStrategy<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: LayoutSource> TableStrategy for RuledLineStrategy<S> {
    fn name(&self) -> &'static str {
        "ruled_line"
    }

    fn class(&self) -> StrategyClass {
        StrategyClass::RuledLine
    }

    fn try_extract(&self, pdf_bytes: &[u8]) -> Result<Vec<PageTable>, ExtractionError> {
        let layouts = self.source.load_layouts(pdf_bytes)?;
        Ok(layouts
            .iter()
            .filter_map(|layout| {
                table_from_rules(layout).map(|table| PageTable {
                    page_number: layout.page_number,
                    table,
                })
            })
            .collect())
    }
}

/// Cut the single ruled table out of a page, if there is one.
pub fn table_from_rules(layout: &PageLayout) -> Option<RawTable> {
    let mut row_edges = snap_positions(
        layout
            .rules
            .iter()
            .filter(|r| r.orientation == Orientation::Horizontal)
            .map(|r| r.position),
    );
    let col_edges = snap_positions(
        layout
            .rules
            .iter()
            .filter(|r| r.orientation == Orientation::Vertical)
            .map(|r| r.position),
    );

    if row_edges.len() < 3 || col_edges.len() < 3 {
        return None;
    }

    // Rows read top-down; PDF y grows upwards.
    row_edges.reverse();

    let n_rows = row_edges.len() - 1;
    let n_cols = col_edges.len() - 1;
    let mut cells: Vec<Vec<Vec<&TextBox>>> = vec![vec![Vec::new(); n_cols]; n_rows];

    for text_box in &layout.text {
        let cx = text_box.rect.center_x();
        let cy = text_box.rect.center_y();
        let col = col_edges.windows(2).position(|w| cx >= w[0] && cx < w[1]);
        let row = row_edges.windows(2).position(|w| cy <= w[0] && cy > w[1]);
        if let (Some(row), Some(col)) = (row, col) {
            cells[row][col].push(text_box);
        }
    }

    let grid: Vec<Vec<String>> = cells
        .into_iter()
        .map(|row| row.into_iter().map(join_cell).collect())
        .collect();

    let grid = drop_empty_lines(grid);
    if grid.len() < 2 || grid.first().map_or(0, |r| r.len()) < 2 {
        debug!(page = layout.page_number, "Ruling present but no populated grid");
        return None;
    }

    RawTable::from_grid(grid)
}

/// Sort positions and merge those within `SNAP_TOLERANCE` into their mean.
pub(super) fn snap_positions(positions: impl Iterator<Item = f32>) -> Vec<f32> {
    let mut sorted: Vec<f32> = positions.filter(|p| p.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut snapped: Vec<f32> = Vec::new();
    let mut group: Vec<f32> = Vec::new();
    for p in sorted {
        if let Some(&last) = group.last() {
            if p - last > SNAP_TOLERANCE {
                snapped.push(group.iter().sum::<f32>() / group.len() as f32);
                group.clear();
            }
        }
        group.push(p);
    }
    if !group.is_empty() {
        snapped.push(group.iter().sum::<f32>() / group.len() as f32);
    }
    snapped
}

/// Text of one cell: runs in reading order, joined by single spaces.
pub(super) fn join_cell(mut runs: Vec<&TextBox>) -> String {
    runs.sort_by(|a, b| {
        b.rect
            .top
            .total_cmp(&a.rect.top)
            .then(a.rect.left.total_cmp(&b.rect.left))
    });
    runs.iter()
        .map(|r| r.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove rows, then columns, that hold no text at all.
fn drop_empty_lines(grid: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let grid: Vec<Vec<String>> = grid
        .into_iter()
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    let width = grid.first().map_or(0, |r| r.len());
    let keep: Vec<bool> = (0..width)
        .map(|col| grid.iter().any(|row| !row[col].is_empty()))
        .collect();

    grid.into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&keep)
                .filter(|(_, keep)| **keep)
                .map(|(cell, _)| cell)
                .collect()
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::extraction::pdfium::{FixtureLayoutSource, UnavailableLayoutSource};
    use crate::pipeline::extraction::types::{Rect, RuleSegment};

    pub(crate) fn word(text: &str, x: f32, y: f32) -> TextBox {
        TextBox {
            text: text.into(),
            rect: Rect::new(x, y, x + 6.0 * text.chars().count() as f32, y + 10.0),
        }
    }

    fn h_rule(y: f32, x0: f32, x1: f32) -> RuleSegment {
        RuleSegment { orientation: Orientation::Horizontal, position: y, start: x0, end: x1 }
    }

    fn v_rule(x: f32, y0: f32, y1: f32) -> RuleSegment {
        RuleSegment { orientation: Orientation::Vertical, position: x, start: y0, end: y1 }
    }

    /// Three columns at x = 50 | 250 | 300 | 350, three rows at
    /// y = 700 | 680 | 660 | 640, text placed inside the cells.
    pub(crate) fn ruled_page(page_number: usize) -> PageLayout {
        let rows = [700.0, 680.0, 660.0, 640.0];
        let cols = [50.0, 250.0, 300.0, 350.0];
        let mut rules: Vec<RuleSegment> = rows.iter().map(|&y| h_rule(y, 50.0, 350.0)).collect();
        rules.extend(cols.iter().map(|&x| v_rule(x, 640.0, 700.0)));
        // Doubled stroke, must snap onto x = 250.
        rules.push(v_rule(251.0, 640.0, 700.0));

        PageLayout {
            page_number,
            width: 595.0,
            height: 842.0,
            text: vec![
                word("Дисциплина", 55.0, 685.0),
                word("Сем", 255.0, 685.0),
                word("ЗЕТ", 305.0, 685.0),
                word("Машинное", 55.0, 665.0),
                word("обучение", 120.0, 665.0),
                word("1", 255.0, 665.0),
                word("6", 305.0, 665.0),
                word("Глубокое обучение", 55.0, 645.0),
                word("2", 255.0, 645.0),
                word("3", 305.0, 645.0),
                word("Page footer", 55.0, 40.0),
            ],
            rules,
        }
    }

    #[test]
    fn snaps_nearby_positions() {
        let snapped = snap_positions([10.0, 11.0, 50.0, 100.0, 101.5].into_iter());
        assert_eq!(snapped.len(), 3);
        assert!((snapped[0] - 10.5).abs() < 0.01);
    }

    #[test]
    fn builds_grid_from_rules() {
        let table = table_from_rules(&ruled_page(1)).unwrap();
        assert_eq!(table.columns, vec!["Дисциплина", "Сем", "ЗЕТ"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["Машинное обучение", "1", "6"]);
        assert_eq!(table.rows[1][0], "Глубокое обучение");
    }

    #[test]
    fn text_outside_grid_is_ignored() {
        let table = table_from_rules(&ruled_page(1)).unwrap();
        assert!(table
            .rows
            .iter()
            .flatten()
            .all(|cell| !cell.contains("footer")));
    }

    #[test]
    fn page_without_rules_yields_nothing() {
        let mut page = ruled_page(1);
        page.rules.clear();
        assert!(table_from_rules(&page).is_none());
    }

    #[test]
    fn empty_grid_yields_nothing() {
        let mut page = ruled_page(1);
        page.text.clear();
        assert!(table_from_rules(&page).is_none());
    }

    #[test]
    fn strategy_emits_one_table_per_ruled_page() {
        let mut blank = ruled_page(2);
        blank.rules.clear();
        let strategy =
            RuledLineStrategy::new(FixtureLayoutSource::new(vec![ruled_page(1), blank, ruled_page(3)]));

        let tables = strategy.try_extract(b"%PDF").unwrap();
        let pages: Vec<usize> = tables.iter().map(|t| t.page_number).collect();
        assert_eq!(pages, vec![1, 3]);
        assert_eq!(strategy.class(), StrategyClass::RuledLine);
    }

    #[test]
    fn missing_library_propagates_unavailable() {
        let strategy = RuledLineStrategy::new(UnavailableLayoutSource);
        assert!(matches!(
            strategy.try_extract(b"%PDF"),
            Err(ExtractionError::Unavailable(_))
        ));
    }
}

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Axis-aligned box in PDF user space (origin bottom-left, y grows upwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl Rect {
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left: left.min(right),
            bottom: bottom.min(top),
            right: left.max(right),
            top: bottom.max(top),
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.bottom + self.top) / 2.0
    }
}

/// A run of text with its position on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub text: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A ruling line. `position` is y for horizontal rules, x for vertical ones;
/// `start..end` spans the other axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleSegment {
    pub orientation: Orientation,
    pub position: f32,
    pub start: f32,
    pub end: f32,
}

/// Maximum thickness (points) of a path still treated as a line.
const MAX_RULE_THICKNESS: f32 = 2.0;

/// Minimum length (points) of a path treated as a ruling line.
const MIN_RULE_LENGTH: f32 = 8.0;

impl RuleSegment {
    /// Turn the bounds of a drawn path into ruling lines.
    ///
    /// Thin paths become one line; boxes large in both directions (cell
    /// borders drawn with `re`) contribute their four edges; anything else
    /// is decoration and yields nothing.
    pub fn from_bounds(rect: &Rect) -> Vec<RuleSegment> {
        let (w, h) = (rect.width(), rect.height());

        if h <= MAX_RULE_THICKNESS && w >= MIN_RULE_LENGTH {
            return vec![RuleSegment {
                orientation: Orientation::Horizontal,
                position: rect.center_y(),
                start: rect.left,
                end: rect.right,
            }];
        }
        if w <= MAX_RULE_THICKNESS && h >= MIN_RULE_LENGTH {
            return vec![RuleSegment {
                orientation: Orientation::Vertical,
                position: rect.center_x(),
                start: rect.bottom,
                end: rect.top,
            }];
        }
        if w >= MIN_RULE_LENGTH && h >= MIN_RULE_LENGTH {
            return vec![
                RuleSegment { orientation: Orientation::Horizontal, position: rect.top, start: rect.left, end: rect.right },
                RuleSegment { orientation: Orientation::Horizontal, position: rect.bottom, start: rect.left, end: rect.right },
                RuleSegment { orientation: Orientation::Vertical, position: rect.left, start: rect.bottom, end: rect.top },
                RuleSegment { orientation: Orientation::Vertical, position: rect.right, start: rect.bottom, end: rect.top },
            ];
        }
        vec![]
    }
}

/// Geometry of one PDF page, independent of the library that produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    /// 1-based.
    pub page_number: usize,
    pub width: f32,
    pub height: f32,
    pub text: Vec<TextBox>,
    pub rules: Vec<RuleSegment>,
}

/// A table as cut out of the page: header labels plus body rows.
///
/// Body rows are padded to the header width by the strategies, so every
/// row has `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build from a grid whose first row is the header. Pads ragged rows.
    pub fn from_grid(mut grid: Vec<Vec<String>>) -> Option<Self> {
        if grid.is_empty() {
            return None;
        }
        let width = grid.iter().map(|r| r.len()).max().unwrap_or(0);
        for row in &mut grid {
            row.resize(width, String::new());
        }
        let columns = grid.remove(0);
        Some(Self { columns, rows: grid })
    }

    /// Build from rows with positional column labels ("0", "1", ...).
    pub fn positional(mut rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Self {
            columns: (0..width).map(|i| i.to_string()).collect(),
            rows,
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// A table together with the 1-based page it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTable {
    pub page_number: usize,
    pub table: RawTable,
}

/// Strength class of a strategy, most reliable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyClass {
    RuledLine,
    WhitespaceStream,
    TextHeuristic,
}

impl StrategyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuledLine => "ruled_line",
            Self::WhitespaceStream => "whitespace_stream",
            Self::TextHeuristic => "text_heuristic",
        }
    }
}

/// One way of cutting tables out of a whole PDF.
///
/// Strategies emit at most one table per page, which keeps `page=..,row=..`
/// provenance unique within a document. `ExtractionError::Unavailable`
/// means the backing library is missing, not that the PDF is bad.
pub trait TableStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn class(&self) -> StrategyClass;

    fn try_extract(&self, pdf_bytes: &[u8]) -> Result<Vec<PageTable>, ExtractionError>;
}

/// Page geometry provider (PDFium in production, fixtures in tests).
pub trait LayoutSource: Send + Sync {
    fn load_layouts(&self, pdf_bytes: &[u8]) -> Result<Vec<PageLayout>, ExtractionError>;
}

/// Plain per-page text provider.
pub trait TextLayerSource: Send + Sync {
    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

//! Raw table rows → validated course records.
//!
//! Coercion is per field: a malformed cell falls back to that field's
//! default and the row is kept. Only the row admission filter drops rows.

use tracing::{debug, warn};

use super::fields::{infer_columns, ColumnRole, ColumnRoles};
use super::NormalizeError;
use crate::models::{source_ref, Course, CourseKind};
use crate::pipeline::extraction::{PageTable, RawTable};

/// Sentinel for rows without a module cell.
pub const UNKNOWN_MODULE: &str = "Unknown";

pub const DEFAULT_SEMESTER: u32 = 1;

pub const DEFAULT_CREDIT_VALUE: f64 = 0.0;

/// Shortest admissible course name, in characters.
const MIN_NAME_CHARS: usize = 3;

/// Lowercase markers of an elective course in the kind column.
const ELECTIVE_KEYWORDS: &[&str] = &["выбор", "электив", "elective"];

/// Name prefixes that mark a header row repeated inside the body.
const HEADER_ARTIFACT_PREFIXES: &[&str] = &["наименование"];

/// Names that are header echoes or summary rows, never courses.
const HEADER_ARTIFACTS: &[&str] = &[
    "дисциплина",
    "дисциплины",
    "name",
    "discipline",
    "course",
    "итого",
    "всего",
    "total",
];

/// Normalize the rows of a table whose column roles are known.
///
/// Row `i` of `raw_table.rows` gets `source_ref` `page=<page_number>,row=<i>`.
pub fn normalize(raw_table: &RawTable, page_number: usize, column_roles: &ColumnRoles) -> Vec<Course> {
    normalize_rows(raw_table.rows.iter().enumerate(), page_number, column_roles)
}

/// Infer roles and normalize one table.
///
/// When the header does not resolve name, semester and credit value, the
/// first body row is tried as the header. Remaining rows keep their
/// original body index, so provenance does not shift.
pub fn normalize_table(raw_table: &RawTable, page_number: usize) -> Result<Vec<Course>, NormalizeError> {
    let roles = infer_columns(&raw_table.columns);
    if roles.is_usable() {
        return Ok(normalize(raw_table, page_number, &roles));
    }

    if raw_table.rows.len() > 1 {
        let promoted = infer_columns(&raw_table.rows[0]);
        if promoted.is_usable() {
            debug!(page = page_number, "Promoted first body row to header");
            return Ok(normalize_rows(
                raw_table.rows.iter().enumerate().skip(1),
                page_number,
                &promoted,
            ));
        }
    }

    let missing = roles
        .missing_required()
        .iter()
        .map(ColumnRole::as_str)
        .collect::<Vec<_>>()
        .join("/");
    Err(NormalizeError::TableUnresolved {
        page: page_number,
        missing,
    })
}

/// Normalize every table of a document in order.
///
/// Unresolved tables are logged and dropped; the others still contribute.
pub fn normalize_tables(tables: &[PageTable]) -> Vec<Course> {
    let mut courses = Vec::new();
    for page_table in tables {
        match normalize_table(&page_table.table, page_table.page_number) {
            Ok(mut found) => {
                debug!(page = page_table.page_number, courses = found.len(), "Table normalized");
                courses.append(&mut found);
            }
            Err(e) => warn!(error = %e, "Table dropped"),
        }
    }
    courses
}

fn normalize_rows<'a>(
    rows: impl Iterator<Item = (usize, &'a Vec<String>)>,
    page_number: usize,
    roles: &ColumnRoles,
) -> Vec<Course> {
    let cell = |row: &'a Vec<String>, role: ColumnRole| -> &'a str {
        roles
            .index(role)
            .and_then(|idx| row.get(idx))
            .map_or("", |c| c.trim())
    };

    rows.filter_map(|(row_index, row)| {
        let name = clean_name(cell(row, ColumnRole::Name));
        if !is_admissible_name(&name) {
            return None;
        }

        let semester_cell = cell(row, ColumnRole::Semester);
        let semester = parse_semester(semester_cell).unwrap_or_else(|| {
            debug!(page = page_number, row = row_index, cell = semester_cell, "Semester defaulted");
            DEFAULT_SEMESTER
        });

        let credit_cell = cell(row, ColumnRole::CreditValue);
        let credit_value = parse_credit_value(credit_cell).unwrap_or_else(|| {
            debug!(page = page_number, row = row_index, cell = credit_cell, "Credit value defaulted");
            DEFAULT_CREDIT_VALUE
        });

        let module = cell(row, ColumnRole::Module);
        let code = cell(row, ColumnRole::Code);

        Some(Course {
            code: (!code.is_empty()).then(|| code.to_string()),
            name,
            semester,
            credit_value,
            kind: classify_kind(cell(row, ColumnRole::Kind)),
            module: if module.is_empty() {
                UNKNOWN_MODULE.to_string()
            } else {
                module.to_string()
            },
            prerequisites: vec![],
            notes: None,
            source_ref: source_ref(page_number, row_index),
        })
    })
    .collect()
}

/// Trim and collapse internal whitespace (cells often carry line breaks).
fn clean_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Row admission filter on the course name.
pub fn is_admissible_name(name: &str) -> bool {
    if name.chars().count() < MIN_NAME_CHARS {
        return false;
    }
    let lower = name.to_lowercase();
    !(HEADER_ARTIFACT_PREFIXES.iter().any(|p| lower.starts_with(p))
        || HEADER_ARTIFACTS.contains(&lower.as_str()))
}

/// Leading integer token; `None` when absent, malformed or zero.
pub fn parse_semester(cell: &str) -> Option<u32> {
    cell.split_whitespace()
        .next()?
        .parse::<u32>()
        .ok()
        .filter(|&s| s >= 1)
}

/// Leading decimal token with `,` accepted as the decimal separator;
/// `None` when absent, malformed, negative or not finite.
pub fn parse_credit_value(cell: &str) -> Option<f64> {
    cell.replace(',', ".")
        .split_whitespace()
        .next()?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

pub fn classify_kind(cell: &str) -> CourseKind {
    let lower = cell.to_lowercase();
    if ELECTIVE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        CourseKind::Elective
    } else {
        CourseKind::Required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn end_to_end_single_row() {
        let tables = vec![
            PageTable {
                page_number: 1,
                table: table(&["Дисциплина", "Сем", "ЗЕТ", "Тип"], &[&["Линейная алгебра", "1", "5", "Обязательная"]]),
            },
            PageTable {
                page_number: 2,
                table: table(&["Содержание", "Страница"], &[&["Введение", "3"], &["Приложения", "40"]]),
            },
        ];

        let courses = normalize_tables(&tables);
        assert_eq!(courses.len(), 1);
        let course = &courses[0];
        assert_eq!(course.name, "Линейная алгебра");
        assert_eq!(course.semester, 1);
        assert_eq!(course.credit_value, 5.0);
        assert_eq!(course.kind, CourseKind::Required);
        assert_eq!(course.module, UNKNOWN_MODULE);
        assert_eq!(course.code, None);
        assert_eq!(course.source_ref, "page=1,row=0");
    }

    #[test]
    fn malformed_credit_cell_defaults_to_zero() {
        let t = table(&["Дисциплина", "Сем", "ЗЕТ"], &[&["Философия науки", "2", "н/д"]]);
        let courses = normalize_table(&t, 1).unwrap();
        assert_eq!(courses[0].credit_value, 0.0);
        assert_eq!(courses[0].semester, 2);
    }

    #[test]
    fn malformed_semester_cell_defaults_to_one() {
        let t = table(&["Дисциплина", "Сем", "ЗЕТ"], &[&["Философия науки", "осень", "3"], &["Статистика", "0", "3"]]);
        let courses = normalize_table(&t, 1).unwrap();
        assert_eq!(courses[0].semester, 1);
        assert_eq!(courses[1].semester, 1);
    }

    #[test]
    fn header_echo_rows_are_excluded() {
        let t = table(
            &["Дисциплина", "Сем", "ЗЕТ"],
            &[
                &["Наименование", "Сем", "ЗЕТ"],
                &["Наименование дисциплины", "", ""],
                &["ML", "1", "3"],
                &["", "1", "3"],
                &["Итого", "", "120"],
                &["Глубокое обучение", "2", "4"],
            ],
        );
        let courses = normalize_table(&t, 5).unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].name, "Глубокое обучение");
        assert_eq!(courses[0].source_ref, "page=5,row=5");
    }

    #[test]
    fn coercion_rules() {
        assert_eq!(parse_credit_value("4,5"), Some(4.5));
        assert_eq!(parse_credit_value("3 ЗЕТ"), Some(3.0));
        assert_eq!(parse_credit_value("-2"), None);
        assert_eq!(parse_credit_value("NaN"), None);
        assert_eq!(parse_credit_value(""), None);
        assert_eq!(parse_semester("3 семестр"), Some(3));
        assert_eq!(parse_semester("1,2"), None);
        assert_eq!(classify_kind("Дисциплина по выбору"), CourseKind::Elective);
        assert_eq!(classify_kind("ВЫБОР"), CourseKind::Elective);
        assert_eq!(classify_kind(""), CourseKind::Required);
    }

    #[test]
    fn optional_fields_from_cells() {
        let t = table(
            &["Код", "Дисциплина", "Семестр", "ЗЕТ", "Тип", "Модуль"],
            &[&["Б1.В.01", "  Обработка\nестественного   языка ", "3", "5", "По выбору", " Специализация "]],
        );
        let course = &normalize_table(&t, 7).unwrap()[0];
        assert_eq!(course.code.as_deref(), Some("Б1.В.01"));
        assert_eq!(course.name, "Обработка естественного языка");
        assert_eq!(course.kind, CourseKind::Elective);
        assert_eq!(course.module, "Специализация");
    }

    #[test]
    fn first_body_row_promoted_to_header() {
        let t = RawTable::positional(vec![
            vec!["Наименование".into(), "Сем".into(), "Кредиты".into(), "Тип".into()],
            vec!["Машинное обучение".into(), "1".into(), "6".into(), "Обязательная".into()],
            vec!["Компьютерное зрение".into(), "2".into(), "3".into(), "Выбор".into()],
        ]);
        let courses = normalize_table(&t, 3).unwrap();
        assert_eq!(courses.len(), 2);
        // Original body indices survive the promotion.
        assert_eq!(courses[0].source_ref, "page=3,row=1");
        assert_eq!(courses[1].source_ref, "page=3,row=2");
        assert_eq!(courses[1].kind, CourseKind::Elective);
    }

    #[test]
    fn unresolvable_table_is_rejected() {
        let t = table(&["a", "b"], &[&["x", "y"], &["z", "w"]]);
        let err = normalize_table(&t, 9).unwrap_err();
        match err {
            NormalizeError::TableUnresolved { page, missing } => {
                assert_eq!(page, 9);
                assert_eq!(missing, "name/semester/credit_value");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn normalize_with_explicit_roles_skips_inference() {
        let t = table(&["0", "1", "2"], &[&["Алгоритмы", "2", "4"]]);
        let roles = infer_columns(&["Name", "Semester", "ECTS"]);
        let courses = normalize(&t, 1, &roles);
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].credit_value, 4.0);
    }
}

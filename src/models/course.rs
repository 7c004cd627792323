use serde::{Deserialize, Serialize};

use super::enums::CourseKind;

/// One row of a curriculum table after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub code: Option<String>,
    pub name: String,
    pub semester: u32,
    pub credit_value: f64,
    pub kind: CourseKind,
    pub module: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub notes: Option<String>,
    /// `page=<n>,row=<m>`; unique within a plan.
    pub source_ref: String,
}

/// Provenance token for a table row.
pub fn source_ref(page_number: usize, row_index: usize) -> String {
    format!("page={page_number},row={row_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ref_format() {
        assert_eq!(source_ref(12, 5), "page=12,row=5");
    }

    #[test]
    fn course_json_uses_contract_field_names() {
        let course = Course {
            code: None,
            name: "Линейная алгебра".into(),
            semester: 1,
            credit_value: 5.0,
            kind: CourseKind::Required,
            module: "Unknown".into(),
            prerequisites: vec![],
            notes: None,
            source_ref: source_ref(1, 1),
        };
        let json = serde_json::to_value(&course).unwrap();
        assert_eq!(json["credit_value"], 5.0);
        assert_eq!(json["kind"], "required");
        assert_eq!(json["source_ref"], "page=1,row=1");
        assert!(json["code"].is_null());
    }
}

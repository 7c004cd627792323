use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::course::Course;
use super::enums::Program;

/// Load bounds for one semester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemesterBounds {
    pub min: u32,
    pub max: u32,
}

/// Aggregate constraints derived from a course list.
///
/// These are heuristic estimates. `total_credit_value` is not required to
/// cover the sum of course credit values, and the per-semester bounds are a
/// fixed policy, not observed load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    pub total_credit_value: u32,
    pub min_elective_credit_value: u32,
    /// Keyed by semester number; serialized with string labels ("1", "2", ...).
    pub per_semester_constraints: BTreeMap<u32, SemesterBounds>,
}

/// Structured curriculum of one program. Rebuilt wholesale on each extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub program: Program,
    pub version: String,
    pub source_url: String,
    pub courses: Vec<Course>,
    pub rules: Rules,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semester_labels_serialize_as_strings() {
        let mut per_sem = BTreeMap::new();
        per_sem.insert(2, SemesterBounds { min: 24, max: 36 });
        per_sem.insert(10, SemesterBounds { min: 24, max: 36 });
        let rules = Rules {
            total_credit_value: 120,
            min_elective_credit_value: 24,
            per_semester_constraints: per_sem,
        };
        let json = serde_json::to_string(&rules).unwrap();
        assert!(json.contains("\"2\":{\"min\":24,\"max\":36}"));
        // Numeric ordering survives serialization: 2 before 10.
        assert!(json.find("\"2\"").unwrap() < json.find("\"10\"").unwrap());

        let back: Rules = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rules);
    }
}

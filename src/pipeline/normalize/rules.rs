//! Aggregate curriculum rules.
//!
//! Every number produced here is an estimate. The fallbacks and the
//! per-semester bounds are fixed policy values; do not replace them with
//! figures inferred from observed load.

use std::collections::BTreeMap;

use crate::models::{Course, CourseKind, Rules, SemesterBounds};

/// Used when the course list carries no credit values.
pub const FALLBACK_TOTAL_CREDIT_VALUE: u32 = 120;

/// Used when half the elective credit rounds down to zero.
pub const FALLBACK_MIN_ELECTIVE_CREDIT_VALUE: u32 = 24;

/// Policy bounds applied to every observed semester.
pub const POLICY_SEMESTER_BOUNDS: SemesterBounds = SemesterBounds { min: 24, max: 36 };

/// Derive plan rules from a course list. Pure; same input, same output.
pub fn derive_rules(courses: &[Course]) -> Rules {
    let total: f64 = courses.iter().map(|c| c.credit_value).sum();
    let total_credit_value = match total.round_ties_even() as u32 {
        0 => FALLBACK_TOTAL_CREDIT_VALUE,
        n => n,
    };

    let elective: f64 = courses
        .iter()
        .filter(|c| c.kind == CourseKind::Elective)
        .map(|c| c.credit_value)
        .sum();
    let min_elective_credit_value = match (elective / 2.0).floor() as u32 {
        0 => FALLBACK_MIN_ELECTIVE_CREDIT_VALUE,
        n => n,
    };

    let per_semester_constraints: BTreeMap<u32, SemesterBounds> = courses
        .iter()
        .map(|c| (c.semester, POLICY_SEMESTER_BOUNDS))
        .collect();

    Rules {
        total_credit_value,
        min_elective_credit_value,
        per_semester_constraints,
    }
}

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};
use tracing::error;

use super::rules::derive_rules;
use super::NormalizeError;
use crate::models::{Course, Plan, Program};

/// Academic-year label `"<year>-<year+1>"` for the given instant.
pub fn plan_version(now: DateTime<Utc>) -> String {
    let year = now.year();
    format!("{}-{}", year, year + 1)
}

/// Fail on the first `source_ref` seen twice.
pub fn validate_source_refs(program: Program, courses: &[Course]) -> Result<(), NormalizeError> {
    let mut seen = HashSet::with_capacity(courses.len());
    for course in courses {
        if !seen.insert(course.source_ref.as_str()) {
            error!(program = %program, source_ref = %course.source_ref, "Duplicate provenance token");
            return Err(NormalizeError::SourceRefCollision {
                program,
                source_ref: course.source_ref.clone(),
            });
        }
    }
    Ok(())
}

/// Assemble a validated plan with derived rules.
pub fn build_plan(
    program: Program,
    version: impl Into<String>,
    source_url: impl Into<String>,
    courses: Vec<Course>,
) -> Result<Plan, NormalizeError> {
    validate_source_refs(program, &courses)?;
    let rules = derive_rules(&courses);
    Ok(Plan {
        program,
        version: version.into(),
        source_url: source_url.into(),
        courses,
        rules,
    })
}

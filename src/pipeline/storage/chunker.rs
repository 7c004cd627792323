use crate::models::{Chunk, Course, Plan, Program};

/// Stable chunk identity: `<program>-<source_ref>`.
pub fn chunk_id(program: Program, source_ref: &str) -> String {
    format!("{}-{}", program.as_str(), source_ref)
}

/// Shortest round-trip decimal with at least one fractional digit
/// (`5` → `"5.0"`, `4.5` → `"4.5"`).
pub fn format_credit_value(value: f64) -> String {
    format!("{value:?}")
}

/// Citable one-line summary of a course.
pub fn chunk_text(course: &Course) -> String {
    format!(
        "{} — {} — {} ECTS — семестр {}",
        course.name,
        course.module,
        format_credit_value(course.credit_value),
        course.semester
    )
}

/// One chunk per course, in course order. Deterministic for a given plan.
pub fn build_chunks(plan: &Plan) -> Vec<Chunk> {
    plan.courses
        .iter()
        .map(|course| Chunk {
            id: chunk_id(plan.program, &course.source_ref),
            program: plan.program,
            text: chunk_text(course),
            source_ref: course.source_ref.clone(),
            source_url: plan.source_url.clone(),
        })
        .collect()
}

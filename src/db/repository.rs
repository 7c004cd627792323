use std::str::FromStr;

use rusqlite::{params, Connection};

use super::DatabaseError;
use crate::models::*;

// ═══════════════════════════════════════════
// Plan mirror
// ═══════════════════════════════════════════

/// Replace everything stored for `plan.program` with the given plan.
///
/// Delete + insert run in one transaction: readers see either the previous
/// plan or the new one, never a mix.
pub fn replace_plan(conn: &mut Connection, plan: &Plan) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    let program = plan.program.as_str();

    tx.execute("DELETE FROM courses WHERE program = ?1", params![program])?;
    tx.execute("DELETE FROM plans WHERE program = ?1", params![program])?;

    tx.execute(
        "INSERT INTO plans (program, version, source_url, total_credit_value,
         min_elective_credit_value, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            program,
            plan.version,
            plan.source_url,
            plan.rules.total_credit_value,
            plan.rules.min_elective_credit_value,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO courses (program, version, position, code, name, semester,
             credit_value, kind, module, source_ref)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for (position, course) in plan.courses.iter().enumerate() {
            stmt.execute(params![
                program,
                plan.version,
                position as i64,
                course.code,
                course.name,
                course.semester,
                course.credit_value,
                course.kind.as_str(),
                course.module,
                course.source_ref,
            ])?;
        }
    }

    tx.commit()?;
    tracing::debug!(program, courses = plan.courses.len(), "Plan mirrored to SQLite");
    Ok(())
}

struct CourseRow {
    code: Option<String>,
    name: String,
    semester: u32,
    credit_value: f64,
    kind: String,
    module: String,
    source_ref: String,
}

/// Courses of one program in plan order.
pub fn get_courses(conn: &Connection, program: Program) -> Result<Vec<Course>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT code, name, semester, credit_value, kind, module, source_ref
         FROM courses WHERE program = ?1 ORDER BY position",
    )?;

    let rows = stmt.query_map(params![program.as_str()], |row| {
        Ok(CourseRow {
            code: row.get(0)?,
            name: row.get(1)?,
            semester: row.get(2)?,
            credit_value: row.get(3)?,
            kind: row.get(4)?,
            module: row.get(5)?,
            source_ref: row.get(6)?,
        })
    })?;

    let mut courses = Vec::new();
    for row in rows {
        let row = row?;
        courses.push(Course {
            code: row.code,
            name: row.name,
            semester: row.semester,
            credit_value: row.credit_value,
            kind: CourseKind::from_str(&row.kind)?,
            module: row.module,
            prerequisites: vec![],
            notes: None,
            source_ref: row.source_ref,
        });
    }
    Ok(courses)
}

/// Number of mirrored courses for a program.
pub fn count_courses(conn: &Connection, program: Program) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM courses WHERE program = ?1",
        params![program.as_str()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

//! Normalized plans on disk: `normalized/<slug>.json`, one per program.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::StorageError;
use crate::models::{Plan, Program};

pub fn plan_path(dir: &Path, program: Program) -> PathBuf {
    dir.join(format!("{}.json", program.slug()))
}

/// Replace `path` with `bytes` via a sibling temp file + rename, so readers
/// never see a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StorageError::Persist {
        path: path.to_path_buf(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}

/// Write the plan as pretty UTF-8 JSON, replacing any previous version.
pub fn save_plan(dir: &Path, plan: &Plan) -> Result<PathBuf, StorageError> {
    let path = plan_path(dir, plan.program);
    let json = serde_json::to_vec_pretty(plan)?;
    write_atomic(&path, &json)?;
    tracing::info!(
        program = %plan.program,
        courses = plan.courses.len(),
        path = %path.display(),
        "Plan written"
    );
    Ok(path)
}

/// `None` when the program has not been ingested yet.
pub fn load_plan(dir: &Path, program: Program) -> Result<Option<Plan>, StorageError> {
    let path = plan_path(dir, program);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Every stored plan, in `Program::ALL` order.
pub fn load_all_plans(dir: &Path) -> Result<Vec<Plan>, StorageError> {
    let mut plans = Vec::new();
    for program in Program::ALL {
        if let Some(plan) = load_plan(dir, program)? {
            plans.push(plan);
        }
    }
    Ok(plans)
}

pub mod fields;
pub mod records;
pub mod rules;
pub mod plan;

pub use fields::*;
pub use records::*;
pub use rules::*;
pub use plan::*;

use thiserror::Error;

use crate::models::Program;

#[derive(Error, Debug)]
pub enum NormalizeError {
    /// Name, semester or credit-value column could not be identified.
    #[error("Table on page {page} unresolved: no {missing} column")]
    TableUnresolved { page: usize, missing: String },

    /// Two records claim the same provenance token. Points at an extraction bug.
    #[error("Duplicate source_ref {source_ref} in {program} plan")]
    SourceRefCollision { program: Program, source_ref: String },
}

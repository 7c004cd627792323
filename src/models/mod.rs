pub mod enums;
pub mod course;
pub mod plan;
pub mod chunk;

pub use enums::*;
pub use course::*;
pub use plan::*;
pub use chunk::*;

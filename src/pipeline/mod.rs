pub mod import;
pub mod extraction;
pub mod normalize;
pub mod storage;
pub mod rag;
pub mod processor;

//! Per-major curriculum indexes and answer generation over them.

pub mod answer;
pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod registry;

pub use answer::AnswerGenerator;
pub use index::Index;
pub use registry::IndexRegistry;

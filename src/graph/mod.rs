pub mod entities;
pub mod store;
pub mod structure;
pub mod vectors;

pub use entities::{EntityBuilder, EntityReport, Triple};
pub use store::{ChunkContext, GraphError, GraphStats, GraphStore, PendingChunk, ScoredChunk};
pub use structure::StructureBuilder;
pub use vectors::{embedding_text, VectorIndexBuilder};

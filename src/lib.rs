pub mod agent;
pub mod api;
pub mod commands;
pub mod config;
pub mod graph;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;

// Re-export commonly used items
pub use agent::SelfRagAgent;
pub use processing::Chunk;
pub use providers::traits::{ChatMessage, ChatRole, CompletionProvider};
pub use retrieval::KnowledgeBase;

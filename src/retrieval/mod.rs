pub mod graph_retriever;
pub mod hybrid;
pub mod keywords;
pub mod vector_store;

pub use graph_retriever::{format_context, GraphRetriever};
pub use hybrid::HybridRetriever;
pub use keywords::extract_keywords;
pub use vector_store::{VectorHit, VectorStore, VectorStoreError};

use anyhow::Result;
use async_trait::async_trait;

/// The lookup surface the retrieval agent drives. The production
/// implementation searches the entity graph; tests substitute scripted
/// ones.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
}

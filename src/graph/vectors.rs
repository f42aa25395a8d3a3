use crate::graph::store::GraphStore;
use crate::processing::Chunk;
use crate::providers::embeddings::EmbeddingClient;
use crate::retrieval::vector_store::VectorStore;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

/// Upsert batch size shared by both stores.
const BATCH_SIZE: usize = 100;

/// Embeds chunks once and writes the vectors to both homes: onto the
/// Chunk nodes behind the graph's vector index, and into the vector
/// database for similarity search.
pub struct VectorIndexBuilder<'a> {
    store: &'a GraphStore,
    embedder: &'a EmbeddingClient,
    vectors: &'a VectorStore,
}

impl<'a> VectorIndexBuilder<'a> {
    pub fn new(
        store: &'a GraphStore,
        embedder: &'a EmbeddingClient,
        vectors: &'a VectorStore,
    ) -> Self {
        Self {
            store,
            embedder,
            vectors,
        }
    }

    pub async fn build(&self, chunks: &[Chunk]) -> Result<usize> {
        let dimension = self.embedder.dimension();
        info!("rebuilding vector index at {} dimensions", dimension);

        self.store.recreate_vector_index(dimension).await?;
        self.vectors.ensure_collection(dimension as u64).await?;

        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap(),
        );

        let mut indexed = 0;
        for batch in chunks.chunks(BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(embedding_text).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;

            for (chunk, vector) in batch.iter().zip(&vectors) {
                self.store.set_embedding(&chunk.id, vector).await?;
            }
            self.vectors.upsert_chunks(batch, &vectors).await?;

            indexed += batch.len();
            pb.inc(batch.len() as u64);
        }

        pb.finish_with_message("vector index complete");
        Ok(indexed)
    }
}

/// The embedded text carries the breadcrumb so queries can match section
/// wording as well as body text.
pub fn embedding_text(chunk: &Chunk) -> String {
    format!(
        "Path: {}\nContent: {}",
        chunk.metadata.path, chunk.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::MarkdownSplitter;

    #[test]
    fn embedding_text_includes_breadcrumb() {
        let chunks = MarkdownSplitter::new().split_text("# Intro\nHello.", "doc");
        let text = embedding_text(&chunks[0]);
        assert!(text.starts_with("Path: Intro\n"));
        assert!(text.contains("Content: 【Intro】\nHello."));
    }
}

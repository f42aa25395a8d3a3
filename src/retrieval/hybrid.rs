use crate::graph::{ChunkContext, GraphStore};
use crate::providers::embeddings::EmbeddingClient;
use crate::providers::traits::{ChatMessage, CompletionProvider};
use crate::providers::utils::strip_think_blocks;
use crate::retrieval::vector_store::{VectorHit, VectorStore};
use anyhow::Result;
use log::info;
use std::collections::HashMap;

/// Vector hits pulled per question.
const SEARCH_LIMIT: u64 = 3;

/// Two-stage retrieval: similarity search locates chunks, the graph adds
/// their section titles and linked entities, and the model answers over
/// the combined context.
pub struct HybridRetriever {
    vectors: VectorStore,
    store: GraphStore,
    embedder: EmbeddingClient,
}

impl HybridRetriever {
    pub fn new(vectors: VectorStore, store: GraphStore, embedder: EmbeddingClient) -> Self {
        Self {
            vectors,
            store,
            embedder,
        }
    }

    pub async fn ask(
        &self,
        provider: &(dyn CompletionProvider + Send + Sync),
        question: &str,
    ) -> Result<String> {
        let query_vector = self.embedder.embed(question).await?;
        let hits = self.vectors.search(query_vector, SEARCH_LIMIT).await?;
        info!("vector search returned {} chunks", hits.len());

        let ids: Vec<String> = hits.iter().map(|h| h.chunk_id.clone()).collect();
        let enriched = self.store.enrich_chunks(&ids).await?;

        let context = build_snippets(&hits, &enriched);
        let system_prompt = "You are a precise technical assistant. Answer the \
             question from the graph-enriched context provided.";
        let user_prompt = format!("Context:\n{}\n\nQuestion: {}", context, question);

        let raw = provider
            .complete_messages(&[
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_prompt),
            ])
            .await?;
        Ok(strip_think_blocks(&raw))
    }
}

/// Numbered reference snippets combining vector hits with their graph
/// context.
pub fn build_snippets(hits: &[VectorHit], enriched: &HashMap<String, ChunkContext>) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let context = enriched.get(&hit.chunk_id);
            let section = context
                .and_then(|c| c.section.clone())
                .unwrap_or_else(|| "Unknown Section".to_string());
            let entities = match context {
                Some(c) if !c.entities.is_empty() => c.entities.join(", "),
                _ => "none".to_string(),
            };

            format!(
                "[Reference {}]\n- Section: {}\n- Linked entities: {}\n- Content: {}",
                i + 1,
                section,
                entities,
                hit.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, content: &str) -> VectorHit {
        VectorHit {
            chunk_id: id.to_string(),
            score: 0.9,
            content: content.to_string(),
            path: "A > B".to_string(),
            source: "doc".to_string(),
        }
    }

    #[test]
    fn snippets_are_numbered_and_enriched() {
        let hits = vec![hit("c1", "First."), hit("c2", "Second.")];
        let mut enriched = HashMap::new();
        enriched.insert(
            "c1".to_string(),
            ChunkContext {
                section: Some("Design".to_string()),
                entities: vec!["Agent".to_string()],
            },
        );

        let text = build_snippets(&hits, &enriched);
        assert!(text.contains("[Reference 1]"));
        assert!(text.contains("- Section: Design"));
        assert!(text.contains("- Linked entities: Agent"));
        assert!(text.contains("[Reference 2]"));
        assert!(text.contains("- Section: Unknown Section"));
        assert!(text.contains("- Linked entities: none"));
    }
}

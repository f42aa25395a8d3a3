use crate::graph::{GraphError, GraphStats, GraphStore, ScoredChunk};
use crate::providers::traits::{ChatMessage, CompletionProvider};
use crate::providers::utils::strip_think_blocks;
use crate::retrieval::keywords::extract_keywords;
use anyhow::Result;
use log::info;

/// Default number of context pieces pulled for a one-shot answer.
const ANSWER_CONTEXT_LIMIT: i64 = 5;

/// Keyword-driven retrieval over the entity graph.
#[derive(Clone)]
pub struct GraphRetriever {
    store: GraphStore,
}

impl GraphRetriever {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    /// Returns a formatted context string for the keywords, empty when
    /// nothing in the graph matches.
    pub async fn query_context(
        &self,
        keywords: &[String],
        limit: i64,
    ) -> Result<String, GraphError> {
        let hits = self.store.search_by_keywords(keywords, limit).await?;
        Ok(format_context(&hits))
    }

    pub async fn stats(&self) -> Result<GraphStats, GraphError> {
        self.store.stats().await
    }

    /// One-shot question answering: model-extracted keywords, graph
    /// lookup, then an answer grounded in whatever came back.
    pub async fn answer(
        &self,
        provider: &(dyn CompletionProvider + Send + Sync),
        question: &str,
    ) -> Result<String> {
        let keywords = extract_keywords(provider, question).await;
        info!("searching graph with keywords: {:?}", keywords);

        let mut context = self.query_context(&keywords, ANSWER_CONTEXT_LIMIT).await?;
        if context.is_empty() {
            context = "No background knowledge was found.".to_string();
        }

        let system_prompt = "You are an assistant backed by a knowledge graph. \
             Answer the user question from the provided background knowledge. \
             Quote it when it has the answer; when it does not, say so honestly \
             or supplement from your own knowledge and make that explicit.";
        let user_prompt = format!(
            "Background knowledge:\n{}\n\nUser question:\n{}",
            context, question
        );

        let raw = provider
            .complete_messages(&[
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_prompt),
            ])
            .await?;
        Ok(strip_think_blocks(&raw))
    }
}

/// Renders scored chunks into the context block fed to the model.
pub fn format_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "【Related passage (entities: {})】:\n{}\n",
                hit.entities.join(", "),
                hit.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

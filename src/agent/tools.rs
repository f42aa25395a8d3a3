use crate::retrieval::{GraphRetriever, KnowledgeBase};
use anyhow::Result;
use async_trait::async_trait;
use log::info;

pub const NO_RESULTS_NOTICE: &str =
    "[Database feedback]: no entities or related content matched those keywords.";

/// Knowledge-base lookup over the entity graph. The query is split on
/// whitespace into keywords; failures come back as readable text so the
/// loop can grade and react to them instead of crashing.
pub struct GraphKnowledgeBase {
    retriever: GraphRetriever,
    limit: i64,
}

impl GraphKnowledgeBase {
    pub fn new(retriever: GraphRetriever, limit: i64) -> Self {
        Self { retriever, limit }
    }
}

#[async_trait]
impl KnowledgeBase for GraphKnowledgeBase {
    async fn search(&self, query: &str) -> Result<String> {
        info!("knowledge base lookup: {}", query);
        let keywords: Vec<String> = query.split_whitespace().map(String::from).collect();

        match self.retriever.query_context(&keywords, self.limit).await {
            Ok(context) if context.is_empty() => Ok(NO_RESULTS_NOTICE.to_string()),
            Ok(context) => Ok(context),
            Err(e) => Ok(format!("[Tool error]: the lookup failed - {}", e)),
        }
    }
}

use crate::graph::store::{GraphError, GraphStore, PendingChunk};
use crate::providers::traits::{ChatMessage, CompletionProvider};
use crate::providers::utils::strip_code_fences;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::Deserialize;

/// Texts shorter than this carry no extractable relations.
const MIN_TEXT_CHARS: usize = 10;
/// The extraction prompt sees at most this many characters of a chunk.
const EXTRACT_WINDOW: usize = 1200;
/// Chunks picked up per run.
const BATCH_LIMIT: i64 = 2000;

/// One extracted entity relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Triple {
    pub head: String,
    pub head_type: String,
    pub relation: String,
    pub tail: String,
    pub tail_type: String,
}

#[derive(Deserialize)]
struct TripleResponse {
    #[serde(default)]
    triples: Vec<RawTriple>,
}

#[derive(Deserialize)]
struct RawTriple {
    head: Option<String>,
    #[serde(rename = "type")]
    head_type: Option<String>,
    relation: Option<String>,
    tail: Option<String>,
    tail_type: Option<String>,
}

#[derive(Debug, Default)]
pub struct EntityReport {
    pub processed: usize,
    pub with_triples: usize,
}

/// Runs LLM entity extraction over unprocessed chunks and writes the
/// resulting Entity nodes and RELATED edges.
pub struct EntityBuilder<'a> {
    store: &'a GraphStore,
    provider: &'a (dyn CompletionProvider + Send + Sync),
    workers: usize,
}

impl<'a> EntityBuilder<'a> {
    pub fn new(
        store: &'a GraphStore,
        provider: &'a (dyn CompletionProvider + Send + Sync),
        workers: usize,
    ) -> Self {
        Self {
            store,
            provider,
            workers,
        }
    }

    pub async fn run(&self) -> Result<EntityReport, GraphError> {
        let pending = self.store.pending_chunks(BATCH_LIMIT).await?;
        if pending.is_empty() {
            info!("no chunks waiting for entity extraction");
            return Ok(EntityReport::default());
        }

        info!(
            "extracting entities from {} chunks with {} workers",
            pending.len(),
            self.workers
        );

        let pb = ProgressBar::new(pending.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap(),
        );

        let outcomes: Vec<Result<bool, GraphError>> =
            stream::iter(pending.iter().map(|chunk| {
                let pb = pb.clone();
                async move {
                    let outcome = self.process_chunk(chunk).await;
                    pb.inc(1);
                    outcome
                }
            }))
            .buffer_unordered(self.workers.max(1))
            .collect()
            .await;

        pb.finish_with_message("entity extraction complete");

        let mut report = EntityReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(found) => {
                    report.processed += 1;
                    if found {
                        report.with_triples += 1;
                    }
                }
                Err(e) => warn!("chunk failed during extraction: {}", e),
            }
        }
        Ok(report)
    }

    async fn process_chunk(&self, chunk: &PendingChunk) -> Result<bool, GraphError> {
        let triples = self.extract_triples(&chunk.content).await;

        // Mark first. A chunk that keeps failing must not be requeued on
        // every run.
        self.store.mark_entity_processed(&chunk.id).await?;

        for triple in &triples {
            self.store.write_triple(&chunk.id, triple).await?;
        }
        Ok(!triples.is_empty())
    }

    async fn extract_triples(&self, text: &str) -> Vec<Triple> {
        if text.chars().count() < MIN_TEXT_CHARS {
            return Vec::new();
        }

        let window: String = text.chars().take(EXTRACT_WINDOW).collect();
        let prompt = format!(
            "Extract entity relations (triples) from the following text.\n\
             Text: {}\n\n\
             Requirements:\n\
             1. Output strict JSON containing a \"triples\" list.\n\
             2. The relation may be any short verb phrase.\n\n\
             Example output:\n\
             {{\"triples\": [{{\"head\": \"Transformer\", \"type\": \"Technology\", \
             \"relation\": \"replaces\", \"tail\": \"RNN\", \"tail_type\": \"Technology\"}}]}}",
            window
        );

        let messages = [
            ChatMessage::system("You are a tool that outputs JSON."),
            ChatMessage::user(prompt),
        ];

        match self.provider.complete_messages(&messages).await {
            Ok(raw) => parse_triples(&raw),
            Err(e) => {
                warn!("triple extraction call failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Parses model output into triples. Entries without both a head and a
/// tail are dropped; missing types fall back to "Concept".
pub fn parse_triples(raw: &str) -> Vec<Triple> {
    let cleaned = strip_code_fences(raw);
    let response: TripleResponse = match serde_json::from_str(&cleaned) {
        Ok(r) => r,
        Err(e) => {
            warn!("unparseable triple output: {}", e);
            return Vec::new();
        }
    };

    response
        .triples
        .into_iter()
        .filter_map(|t| {
            let head = t.head?;
            let tail = t.tail?;
            Some(Triple {
                head,
                head_type: t.head_type.unwrap_or_else(|| "Concept".to_string()),
                relation: t.relation.unwrap_or_else(|| "RELATED".to_string()),
                tail,
                tail_type: t.tail_type.unwrap_or_else(|| "Concept".to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"triples": [{"head": "A", "type": "Tech", "relation": "uses", "tail": "B", "tail_type": "Tool"}]}"#;
        let triples = parse_triples(raw);
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].head, "A");
        assert_eq!(triples[0].relation, "uses");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"triples\": [{\"head\": \"A\", \"tail\": \"B\"}]}\n```";
        let triples = parse_triples(raw);
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].head_type, "Concept");
        assert_eq!(triples[0].relation, "RELATED");
    }

    #[test]
    fn drops_entries_missing_head_or_tail() {
        let raw = r#"{"triples": [{"head": "A"}, {"tail": "B"}, {"head": "C", "tail": "D"}]}"#;
        let triples = parse_triples(raw);
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].head, "C");
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(parse_triples("the model rambled instead").is_empty());
        assert!(parse_triples("{}").is_empty());
    }
}

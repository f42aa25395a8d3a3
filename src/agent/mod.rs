pub mod grader;
pub mod self_rag;
pub mod state;
pub mod tools;

pub use grader::Grader;
pub use self_rag::SelfRagAgent;
pub use state::{AgentState, SessionStore};
pub use tools::GraphKnowledgeBase;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::providers::traits::{ChatMessage, CompletionProvider};
    use crate::retrieval::KnowledgeBase;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Replays canned completions in order and records every call.
    #[derive(Clone)]
    pub struct ScriptedProvider {
        responses: Arc<Mutex<VecDeque<String>>>,
        pub calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    }

    impl ScriptedProvider {
        pub fn new(responses: Vec<String>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.complete_messages(&[ChatMessage::user(prompt)]).await
        }

        async fn complete_messages(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.lock().push(messages.to_vec());
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| anyhow!("scripted provider ran out of responses"))
        }

        async fn get_model_info(&self) -> Result<String> {
            Ok("scripted".to_string())
        }

        fn clone_box(&self) -> Box<dyn CompletionProvider + Send + Sync> {
            Box::new(self.clone())
        }
    }

    /// Errors on every call.
    pub struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("provider unavailable"))
        }

        async fn complete_messages(&self, _messages: &[ChatMessage]) -> Result<String> {
            Err(anyhow!("provider unavailable"))
        }

        async fn get_model_info(&self) -> Result<String> {
            Err(anyhow!("provider unavailable"))
        }

        fn clone_box(&self) -> Box<dyn CompletionProvider + Send + Sync> {
            Box::new(FailingProvider)
        }
    }

    /// Replays canned search outcomes and records the queries.
    pub struct ScriptedKnowledgeBase {
        script: Mutex<VecDeque<Result<String, String>>>,
        fallback: Option<String>,
        pub queries: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedKnowledgeBase {
        pub fn with_docs(docs: Vec<String>) -> Self {
            Self {
                script: Mutex::new(docs.into_iter().map(Ok).collect()),
                fallback: None,
                queries: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn with_failures(errors: Vec<String>) -> Self {
            Self {
                script: Mutex::new(errors.into_iter().map(Err).collect()),
                fallback: None,
                queries: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn repeating(doc: &str) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: Some(doc.to_string()),
                queries: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl KnowledgeBase for ScriptedKnowledgeBase {
        async fn search(&self, query: &str) -> Result<String> {
            self.queries.lock().push(query.to_string());
            match self.script.lock().pop_front() {
                Some(Ok(doc)) => Ok(doc),
                Some(Err(e)) => Err(anyhow!(e)),
                None => self
                    .fallback
                    .clone()
                    .ok_or_else(|| anyhow!("knowledge script ran out of results")),
            }
        }
    }
}

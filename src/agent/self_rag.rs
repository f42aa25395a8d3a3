use crate::agent::grader::Grader;
use crate::agent::state::AgentState;
use crate::config::AgentConfig;
use crate::providers::traits::{ChatMessage, ChatRole, CompletionProvider};
use crate::providers::utils::strip_think_blocks;
use crate::retrieval::KnowledgeBase;
use anyhow::Result;
use log::{info, warn};

/// Marks every message injected by the loop itself, so the original
/// question can be told apart from machinery.
pub const NOTICE_PREFIX: &str = "[System Notice]";

/// The grader's pass verdict. Its presence in the latest user-role
/// message is what flips the agent into writer mode.
const CONTEXT_VALID: &str = "[System Notice] Context is valid.";

/// Marks the restated search requirement so it is appended at most once.
const FORCED_MARKER: &str = "Mandatory system directive";

const SEARCHER_PROMPT: &str = "You are a rigorous researcher.\n\
     1. When a question arrives you must call the search tool first.\n\
     2. Format: {\"action\": \"search\", \"query\": \"keywords\"}";

const WRITER_PROMPT: &str = "You are a technical expert. Knowledge-base \
     retrieval is complete.\n\
     Task: answer the question from the retrieved material.\n\
     Focus on explaining algorithm principles and architecture design \
     rather than experimental tables.";

const CEILING_FALLBACK: &str =
    "The retrieval loop reached its step ceiling before an answer was produced.";

/// Where the router sends the agent's latest output.
#[derive(Debug, PartialEq)]
enum Route {
    Search { query: Option<String> },
    End,
}

/// The self-correcting retrieval loop. The agent alternates between a
/// searcher persona that must emit a JSON search action and a writer
/// persona that answers once graded context is in hand. Failed retrievals
/// are retried with new keywords until the retry budget runs out, at
/// which point the loop forces an answer; a step ceiling bounds the whole
/// conversation regardless.
pub struct SelfRagAgent {
    provider: Box<dyn CompletionProvider + Send + Sync>,
    knowledge: Box<dyn KnowledgeBase>,
    grader: Grader,
    max_retries: u32,
    max_steps: u32,
}

impl SelfRagAgent {
    pub fn new(
        provider: Box<dyn CompletionProvider + Send + Sync>,
        knowledge: Box<dyn KnowledgeBase>,
        grader: Grader,
        config: &AgentConfig,
    ) -> Self {
        Self {
            provider,
            knowledge,
            grader,
            max_retries: config.max_retries,
            max_steps: config.max_steps,
        }
    }

    /// Runs one question through the loop. The state keeps the transcript
    /// across calls, which is what gives a thread its memory.
    pub async fn run(&self, state: &mut AgentState, question: &str) -> Result<String> {
        state.messages.push(ChatMessage::user(question));
        state.loop_count = 0;

        for _ in 0..self.max_steps {
            let response = self.agent_step(state).await?;
            state.messages.push(ChatMessage::assistant(response.clone()));

            match route(&response) {
                Route::End => return Ok(response),
                Route::Search { query } => {
                    let notice = self.tool_and_grade(state, query.as_deref()).await;
                    state.messages.push(notice);
                }
            }
        }

        warn!(
            "step ceiling of {} reached without a final answer",
            self.max_steps
        );
        state.messages.push(ChatMessage::assistant(CEILING_FALLBACK));
        Ok(CEILING_FALLBACK.to_string())
    }

    /// One-shot convenience over a fresh conversation.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let mut state = AgentState::default();
        self.run(&mut state, question).await
    }

    /// Decides the persona from the latest message and calls the model.
    /// The conversation state itself is never mutated here.
    async fn agent_step(&self, state: &AgentState) -> Result<String> {
        let has_valid_context = state
            .messages
            .last()
            .map(|m| m.role == ChatRole::User && m.content.contains(CONTEXT_VALID))
            .unwrap_or(false);

        info!(
            "agent pass {} (mode: {})",
            state.loop_count + 1,
            if has_valid_context { "writer" } else { "searcher" }
        );

        let mut final_messages = Vec::with_capacity(state.messages.len() + 1);
        if has_valid_context {
            final_messages.push(ChatMessage::system(WRITER_PROMPT));
            final_messages.extend(state.messages.iter().cloned());
        } else {
            final_messages.push(ChatMessage::system(SEARCHER_PROMPT));
            final_messages.extend(state.messages.iter().cloned());

            // Small models forget standing instructions, so the search
            // requirement is restated inside the last user message.
            if let Some(last) = final_messages.last_mut() {
                if last.role == ChatRole::User && !last.content.contains(FORCED_MARKER) {
                    last.content = format!(
                        "{}\n\n({}: this is a technical question and your own \
                         knowledge base is empty. You must output the JSON \
                         tool call first. Do not answer from memory. Format \
                         example: {{\"action\": \"search\", \"query\": \
                         \"Transformer vs RNN advantages\"}})",
                        last.content, FORCED_MARKER
                    );
                }
            }
        }

        let response = self.provider.complete_messages(&final_messages).await?;
        Ok(strip_think_blocks(&response))
    }

    /// Executes the search, grades the result, and composes the notice
    /// that steers the next agent pass. Only graded outcomes spend the
    /// retry budget; tool malfunctions do not.
    async fn tool_and_grade(&self, state: &mut AgentState, query: Option<&str>) -> ChatMessage {
        let query = match query {
            Some(q) if !q.trim().is_empty() => q.to_string(),
            _ => {
                return ChatMessage::user(format!(
                    "{} Tool call error: the search action had no query field.",
                    NOTICE_PREFIX
                ))
            }
        };

        info!("executing search: {}", query);
        let document = match self.knowledge.search(&query).await {
            Ok(doc) => doc,
            Err(e) => {
                return ChatMessage::user(format!(
                    "{} Tool call error: {}",
                    NOTICE_PREFIX, e
                ))
            }
        };

        let user_question = latest_question(&state.messages);
        if self.grader.grade(&user_question, &document).await {
            info!("grader passed the retrieved context");
            state.loop_count += 1;
            return ChatMessage::user(format!(
                "{}\nContent: {}\n\nPlease answer.",
                CONTEXT_VALID, document
            ));
        }

        if state.loop_count >= self.max_retries {
            warn!("retry budget exhausted, forcing an answer");
            state.loop_count += 1;
            return ChatMessage::user(format!(
                "{} The context may be imperfect but the retry limit is \
                 reached. {}: ignore the search-first rule and answer the \
                 question directly from the information above or your own \
                 knowledge: \"{}\"",
                NOTICE_PREFIX, FORCED_MARKER, user_question
            ));
        }

        info!("grader rejected the context, asking for new keywords");
        state.loop_count += 1;
        ChatMessage::user(format!(
            "{} Your search '{}' returned content unrelated to the question.\n\
             Change the keywords and try the search again.",
            NOTICE_PREFIX, query
        ))
    }
}

/// Digs the original question out of the transcript, skipping every
/// loop-injected notice.
fn latest_question(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User && !m.content.contains(NOTICE_PREFIX))
        .map(|m| m.content.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Scans the model output for a search action: the text between the first
/// `{` and the last `}` is tried as JSON. Anything else ends the loop.
fn route(content: &str) -> Route {
    let content = content.trim();
    let (start, end) = match (content.find('{'), content.rfind('}')) {
        (Some(s), Some(e)) if e >= s => (s, e),
        _ => return Route::End,
    };

    let parsed: serde_json::Value = match serde_json::from_str(&content[start..=end]) {
        Ok(v) => v,
        Err(e) => {
            info!("router: output carried no parsable action ({})", e);
            return Route::End;
        }
    };

    if parsed.get("action").and_then(|a| a.as_str()) == Some("search") {
        let query = parsed
            .get("query")
            .and_then(|q| q.as_str())
            .map(String::from);
        return Route::Search { query };
    }
    Route::End
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::{ScriptedKnowledgeBase, ScriptedProvider};

    const LONG_DOC: &str = "【Related passage (entities: Transformer)】:\n\
         Attention lets every token attend to every other token.";

    fn search_json(query: &str) -> String {
        format!(r#"{{"action": "search", "query": "{}"}}"#, query)
    }

    fn agent_config(max_retries: u32, max_steps: u32) -> AgentConfig {
        AgentConfig {
            max_retries,
            max_steps,
            retrieval_limit: 3,
            llm_grading: false,
        }
    }

    fn agent(
        provider: ScriptedProvider,
        kb: ScriptedKnowledgeBase,
        config: &AgentConfig,
    ) -> SelfRagAgent {
        SelfRagAgent::new(Box::new(provider), Box::new(kb), Grader::lenient(), config)
    }

    #[test]
    fn route_finds_json_inside_prose() {
        let out = r#"Sure, let me search. {"action": "search", "query": "attention"} Done."#;
        assert_eq!(
            route(out),
            Route::Search {
                query: Some("attention".to_string())
            }
        );
    }

    #[test]
    fn route_rejects_other_actions_and_noise() {
        assert_eq!(route(r#"{"action": "think"}"#), Route::End);
        assert_eq!(route("A plain prose answer."), Route::End);
        assert_eq!(route("{not valid json}"), Route::End);
        assert_eq!(route("} backwards {"), Route::End);
    }

    #[test]
    fn route_accepts_search_without_query() {
        assert_eq!(
            route(r#"{"action": "search"}"#),
            Route::Search { query: None }
        );
    }

    #[tokio::test]
    async fn happy_path_searches_once_then_answers() {
        let provider = ScriptedProvider::new(vec![
            search_json("transformer attention"),
            "Attention is the core mechanism.".to_string(),
        ]);
        let kb = ScriptedKnowledgeBase::with_docs(vec![LONG_DOC.to_string()]);
        let queries = kb.queries.clone();

        let mut state = AgentState::default();
        let answer = agent(provider, kb, &agent_config(2, 15))
            .run(&mut state, "What is the core mechanism of the Transformer?")
            .await
            .unwrap();

        assert_eq!(answer, "Attention is the core mechanism.");
        assert_eq!(queries.lock().as_slice(), ["transformer attention"]);
        assert_eq!(state.loop_count, 1);
        assert!(state
            .messages
            .iter()
            .any(|m| m.content.contains("Context is valid")));
    }

    #[tokio::test]
    async fn rejected_context_triggers_a_retry() {
        let provider = ScriptedProvider::new(vec![
            search_json("wrong words"),
            search_json("better words"),
            "Answer after the second search.".to_string(),
        ]);
        // First result is degenerate, second is usable.
        let kb = ScriptedKnowledgeBase::with_docs(vec![
            "nothing".to_string(),
            LONG_DOC.to_string(),
        ]);

        let mut state = AgentState::default();
        let answer = agent(provider, kb, &agent_config(2, 15))
            .run(&mut state, "question")
            .await
            .unwrap();

        assert_eq!(answer, "Answer after the second search.");
        assert!(state
            .messages
            .iter()
            .any(|m| m.content.contains("Change the keywords")));
        assert_eq!(state.loop_count, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_force_an_answer() {
        let provider = ScriptedProvider::new(vec![
            search_json("try one"),
            search_json("try two"),
            search_json("try three"),
            "Forced answer from model knowledge.".to_string(),
        ]);
        // Every retrieval comes back degenerate.
        let kb = ScriptedKnowledgeBase::with_docs(vec![
            "bad".to_string(),
            "bad".to_string(),
            "bad".to_string(),
        ]);

        let mut state = AgentState::default();
        let answer = agent(provider, kb, &agent_config(2, 15))
            .run(&mut state, "question")
            .await
            .unwrap();

        assert_eq!(answer, "Forced answer from model knowledge.");
        let fuse_notices = state
            .messages
            .iter()
            .filter(|m| m.content.contains("retry limit is reached"))
            .count();
        assert_eq!(fuse_notices, 1);
        assert_eq!(state.loop_count, 3);
    }

    #[tokio::test]
    async fn plain_answer_skips_the_tool_entirely() {
        let provider = ScriptedProvider::new(vec!["Just an answer.".to_string()]);
        let kb = ScriptedKnowledgeBase::with_docs(vec![]);
        let queries = kb.queries.clone();

        let answer = agent(provider, kb, &agent_config(2, 15))
            .ask("hello")
            .await
            .unwrap();

        assert_eq!(answer, "Just an answer.");
        assert!(queries.lock().is_empty());
    }

    #[tokio::test]
    async fn step_ceiling_always_terminates_the_loop() {
        // A model that never stops asking for searches.
        let provider = ScriptedProvider::new(vec![search_json("again"); 10]);
        let kb = ScriptedKnowledgeBase::repeating(LONG_DOC);

        let mut state = AgentState::default();
        let answer = agent(provider, kb, &agent_config(2, 4))
            .run(&mut state, "question")
            .await
            .unwrap();

        assert_eq!(answer, CEILING_FALLBACK);
    }

    #[tokio::test]
    async fn tool_failure_does_not_spend_the_retry_budget() {
        let provider = ScriptedProvider::new(vec![
            search_json("boom"),
            "Recovered answer.".to_string(),
        ]);
        let kb = ScriptedKnowledgeBase::with_failures(vec!["backend offline".to_string()]);

        let mut state = AgentState::default();
        let answer = agent(provider, kb, &agent_config(2, 15))
            .run(&mut state, "question")
            .await
            .unwrap();

        assert_eq!(answer, "Recovered answer.");
        assert_eq!(state.loop_count, 0);
        assert!(state
            .messages
            .iter()
            .any(|m| m.content.contains("Tool call error")));
    }

    #[tokio::test]
    async fn second_turn_keeps_the_transcript() {
        let provider = ScriptedProvider::new(vec![
            search_json("first"),
            "First answer.".to_string(),
            search_json("second"),
            "Second answer.".to_string(),
        ]);
        let kb = ScriptedKnowledgeBase::repeating(LONG_DOC);

        let config = agent_config(2, 15);
        let agent = agent(provider, kb, &config);

        let mut state = AgentState::default();
        agent.run(&mut state, "What is a Transformer?").await.unwrap();
        let after_first = state.messages.len();

        let answer = agent
            .run(&mut state, "What are its advantages over an RNN?")
            .await
            .unwrap();

        assert_eq!(answer, "Second answer.");
        assert!(state.messages.len() > after_first);
        assert!(state
            .messages
            .iter()
            .any(|m| m.content.contains("What is a Transformer?")));
        assert_eq!(state.loop_count, 1);
    }

    #[test]
    fn latest_question_skips_notices() {
        let messages = vec![
            ChatMessage::user("the real question"),
            ChatMessage::assistant(search_json("x")),
            ChatMessage::user(format!("{} Context is valid.", NOTICE_PREFIX)),
        ];
        assert_eq!(latest_question(&messages), "the real question");
    }
}

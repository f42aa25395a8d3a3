use colored::Colorize;

use crate::agent::{AgentState, GraphKnowledgeBase, Grader, SelfRagAgent};
use crate::config::{AgentConfig, GraphConfig};
use crate::graph::GraphStore;
use crate::providers::provider_from_env;
use crate::retrieval::GraphRetriever;

pub mod pipeline;

/// Interactive chat session over the self-correcting retrieval agent.
/// Every input that is not a command goes through the full
/// search-grade-answer loop with conversation memory.
pub struct CommandHandler {
    agent: SelfRagAgent,
    retriever: GraphRetriever,
    state: AgentState,
}

impl CommandHandler {
    pub async fn new(provider_name: &str) -> anyhow::Result<Self> {
        let graph_config = GraphConfig::from_env()?;
        let store = GraphStore::connect(&graph_config).await?;

        let agent_config = AgentConfig::from_env();
        let provider = provider_from_env(provider_name)?;
        let grader = if agent_config.llm_grading {
            Grader::with_model(provider.clone_box())
        } else {
            Grader::lenient()
        };

        let retriever = GraphRetriever::new(store);
        let knowledge =
            GraphKnowledgeBase::new(retriever.clone(), agent_config.retrieval_limit as i64);
        let agent = SelfRagAgent::new(provider, Box::new(knowledge), grader, &agent_config);

        Ok(Self {
            agent,
            retriever,
            state: AgentState::default(),
        })
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<(), String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(());
        }

        match input.to_lowercase().as_str() {
            "help" => return self.print_help(),
            "new" | "reset" => {
                self.state = AgentState::default();
                println!("{}", "🧹 Conversation cleared.".green());
                return Ok(());
            }
            "stats" => return self.print_stats().await,
            _ => {}
        }

        self.handle_chat(input).await
    }

    async fn handle_chat(&mut self, input: &str) -> Result<(), String> {
        let input_tokens = input.split_whitespace().count();
        println!("📥 Input tokens: {}", input_tokens.to_string().cyan());

        match self.agent.run(&mut self.state, input).await {
            Ok(response) => {
                let response_tokens = response.split_whitespace().count();
                self.print_response(&response, input_tokens, response_tokens);
                Ok(())
            }
            Err(e) => Err(format!("Failed to get an answer: {}", e)),
        }
    }

    async fn print_stats(&self) -> Result<(), String> {
        let stats = self
            .retriever
            .stats()
            .await
            .map_err(|e| format!("Failed to read graph stats: {}", e))?;

        println!("\n📊 Knowledge graph contents:");
        println!("  Documents: {}", stats.documents.to_string().cyan());
        println!("  Sections:  {}", stats.sections.to_string().cyan());
        println!("  Chunks:    {}", stats.chunks.to_string().cyan());
        println!("  Entities:  {}", stats.entities.to_string().cyan());
        println!("  Relations: {}", stats.relations.to_string().cyan());
        println!();
        Ok(())
    }

    fn print_response(&self, response: &str, input_tokens: usize, response_tokens: usize) {
        println!("{}", response.truecolor(255, 236, 179));

        println!(
            "\n📊 Tokens: 📥 Input: {} | 📤 Response: {} | 📈 Total: {}",
            input_tokens.to_string().cyan(),
            response_tokens.to_string().cyan(),
            (input_tokens + response_tokens).to_string().cyan()
        );
        println!();
    }

    fn print_help(&self) -> Result<(), String> {
        println!("\n🤖 Knowledge-Base Agent:");
        println!("  Just type your question.");
        println!("  The agent searches the knowledge graph first, checks what");
        println!("  came back, and retries with new keywords when it misses.");
        println!();

        println!("⚙️ Session Commands:");
        println!("  new    - Start a fresh conversation");
        println!("  stats  - Show knowledge graph counts");
        println!("  help   - Show this help menu");
        println!("  exit   - Exit the program");
        println!();
        Ok(())
    }
}

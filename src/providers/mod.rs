pub mod deepseek;
pub mod embeddings;
pub mod ollama;
pub mod traits;
pub mod utils;

use crate::config::LlmConfig;
use anyhow::{bail, Result};
use traits::CompletionProvider;

/// Builds a boxed provider by name, resolving its settings from the
/// environment.
pub fn provider_from_env(name: &str) -> Result<Box<dyn CompletionProvider + Send + Sync>> {
    let config = LlmConfig::from_env(name)?;
    match name {
        "deepseek" => Ok(Box::new(deepseek::DeepSeekProvider::new(config)?)),
        "ollama" => Ok(Box::new(ollama::OllamaProvider::new(config))),
        _ => bail!("unknown LLM provider: {}", name),
    }
}

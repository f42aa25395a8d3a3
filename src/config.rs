use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use url::Url;

/// Connection settings for the Neo4j graph database.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl GraphConfig {
    pub fn from_env() -> Result<Self> {
        let uri = env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string());
        Url::parse(&uri).with_context(|| format!("invalid NEO4J_URI: {}", uri))?;

        Ok(Self {
            uri,
            user: env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string()),
            password: env::var("NEO4J_PASSWORD")
                .context("NEO4J_PASSWORD must be set for graph commands")?,
        })
    }
}

/// Connection settings for the Qdrant vector database.
#[derive(Debug, Clone)]
pub struct VectorDbConfig {
    pub url: String,
    pub collection: String,
}

impl VectorDbConfig {
    pub fn from_env() -> Result<Self> {
        let url = env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6333".to_string());
        Url::parse(&url).with_context(|| format!("invalid QDRANT_URL: {}", url))?;

        Ok(Self {
            url,
            collection: env::var("VECTOR_COLLECTION")
                .unwrap_or_else(|_| "knowledge_chunks".to_string()),
        })
    }
}

/// Per-provider LLM settings, resolved from `<PREFIX>_API_URL`,
/// `<PREFIX>_MODEL`, `<PREFIX>_API_KEY` and `<PREFIX>_TEMPERATURE`.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub chat_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
}

impl LlmConfig {
    pub fn from_env(provider: &str) -> Result<Self> {
        let prefix = provider.to_uppercase();

        let chat_url = env::var(format!("{}_API_URL", prefix)).unwrap_or_else(|_| {
            match provider {
                "deepseek" => "https://api.deepseek.com/v1/chat/completions".to_string(),
                "ollama" => "http://localhost:11434/v1/chat/completions".to_string(),
                _ => String::new(),
            }
        });
        if chat_url.is_empty() {
            bail!("unknown LLM provider: {}", provider);
        }
        Url::parse(&chat_url)
            .with_context(|| format!("invalid {}_API_URL: {}", prefix, chat_url))?;

        let model = env::var(format!("{}_MODEL", prefix)).unwrap_or_else(|_| {
            match provider {
                "deepseek" => "deepseek-chat".to_string(),
                "ollama" => "qwen2.5:1.5b".to_string(),
                _ => String::new(),
            }
        });

        // Local servers accept any token; remote providers need a real key.
        let api_key = env::var(format!("{}_API_KEY", prefix)).unwrap_or_else(|_| {
            match provider {
                "ollama" => "ollama".to_string(),
                _ => String::new(),
            }
        });

        let temperature = env::var(format!("{}_TEMPERATURE", prefix))
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(match provider {
                // The retrieval loop wants deterministic output from the local model.
                "ollama" => 0.0,
                _ => 0.1,
            });

        Ok(Self {
            chat_url,
            model,
            api_key,
            temperature,
        })
    }
}

/// Settings for the OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub url: String,
    pub model: String,
    pub api_key: String,
    pub dimension: usize,
}

impl EmbeddingConfig {
    pub fn from_env() -> Result<Self> {
        let url = env::var("EMBEDDING_API_URL")
            .unwrap_or_else(|_| "http://localhost:11434/v1/embeddings".to_string());
        Url::parse(&url).with_context(|| format!("invalid EMBEDDING_API_URL: {}", url))?;

        Ok(Self {
            url,
            model: env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "all-minilm".to_string()),
            api_key: env::var("EMBEDDING_API_KEY").unwrap_or_else(|_| "ollama".to_string()),
            dimension: env::var("EMBEDDING_DIMENSION")
                .ok()
                .and_then(|d| d.parse().ok())
                .unwrap_or(384),
        })
    }
}

/// Settings for the external document converter service. When no URL is
/// configured the pipeline falls back to local plain-text extraction.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub url: Option<String>,
}

impl ConverterConfig {
    pub fn from_env() -> Result<Self> {
        let url = match env::var("CONVERTER_URL") {
            Ok(u) if !u.trim().is_empty() => {
                Url::parse(&u).with_context(|| format!("invalid CONVERTER_URL: {}", u))?;
                Some(u)
            }
            _ => None,
        };
        Ok(Self { url })
    }
}

/// Retry budget and grading policy for the retrieval loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Failed-retrieval retries before the loop forces an answer.
    pub max_retries: u32,
    /// Hard ceiling on agent turns, independent of grading outcomes.
    pub max_steps: u32,
    /// Context pieces fetched per knowledge-base lookup.
    pub retrieval_limit: usize,
    /// When false the grader waves through everything non-degenerate.
    pub llm_grading: bool,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self {
            max_retries: env_parse("AGENT_MAX_RETRIES", 2),
            max_steps: env_parse("AGENT_MAX_STEPS", 15),
            retrieval_limit: env_parse("AGENT_RETRIEVAL_LIMIT", 3),
            llm_grading: env::var("AGENT_LLM_GRADING")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

/// Corpus locations and worker counts for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub chunks_path: PathBuf,
    pub convert_workers: usize,
    pub extract_workers: usize,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        Self {
            raw_dir: data_dir.join("raw"),
            processed_dir: data_dir.join("processed"),
            chunks_path: data_dir.join("processed").join("hierarchical_chunks.jsonl"),
            convert_workers: env_parse("CONVERT_WORKERS", 2),
            extract_workers: env_parse("EXTRACT_WORKERS", 5),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_config_defaults() {
        let cfg = LlmConfig::from_env("ollama").unwrap();
        assert_eq!(cfg.chat_url, "http://localhost:11434/v1/chat/completions");
        assert_eq!(cfg.api_key, "ollama");
        assert_eq!(cfg.temperature, 0.0);
    }

    #[test]
    fn unknown_provider_rejected() {
        assert!(LlmConfig::from_env("mistral").is_err());
    }

    #[test]
    fn pipeline_paths_share_data_dir() {
        let cfg = PipelineConfig::from_env();
        assert!(cfg.chunks_path.starts_with(&cfg.processed_dir));
    }
}

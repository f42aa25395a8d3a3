use crate::config::EmbeddingConfig;
use anyhow::{anyhow, Result};
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::{json, Value};
use std::num::NonZeroUsize;

const EMBEDDING_CACHE_CAPACITY: usize = 1024;

/// Client for an OpenAI-compatible embeddings endpoint with an LRU cache
/// keyed on the input text. Chunk texts repeat across pipeline stages, so
/// the cache saves a round trip per repeat.
pub struct EmbeddingClient {
    config: EmbeddingConfig,
    client: Client,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(EMBEDDING_CACHE_CAPACITY).unwrap(),
            )),
        }
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.lock().get(text) {
            return Ok(hit.clone());
        }

        let mut vectors = self.request(&[text.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| anyhow!("embedding API returned no vectors"))?;

        self.cache.lock().put(text.to_string(), vector.clone());
        Ok(vector)
    }

    /// Embeds a batch in one request, serving cached texts locally and
    /// fetching only the misses.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut misses: Vec<(usize, String)> = Vec::new();

        {
            let mut cache = self.cache.lock();
            for (i, text) in texts.iter().enumerate() {
                match cache.get(text) {
                    Some(hit) => results[i] = Some(hit.clone()),
                    None => misses.push((i, text.clone())),
                }
            }
        }

        if !misses.is_empty() {
            let inputs: Vec<String> = misses.iter().map(|(_, t)| t.clone()).collect();
            let vectors = self.request(&inputs).await?;
            if vectors.len() != misses.len() {
                return Err(anyhow!(
                    "embedding API returned {} vectors for {} inputs",
                    vectors.len(),
                    misses.len()
                ));
            }

            let mut cache = self.cache.lock();
            for ((i, text), vector) in misses.into_iter().zip(vectors) {
                cache.put(text, vector.clone());
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.config.url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.config.model,
                "input": inputs
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "Embedding request failed: Status {}, Body: {}",
                status,
                error_text
            ));
        }

        let response_json: Value = response.json().await?;
        let data = response_json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| anyhow!("Invalid embedding response: missing data array"))?;

        // Items carry an index field; do not rely on response order.
        let mut vectors: Vec<Vec<f32>> = vec![Vec::new(); inputs.len()];
        for item in data {
            let index = item
                .get("index")
                .and_then(|i| i.as_u64())
                .ok_or_else(|| anyhow!("Invalid embedding response: missing index"))? as usize;
            let values = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| anyhow!("Invalid embedding response: missing embedding"))?;

            let mut vector = Vec::with_capacity(values.len());
            for value in values {
                let number = value
                    .as_f64()
                    .ok_or_else(|| anyhow!("Invalid embedding response: non-numeric value"))?;
                vector.push(number as f32);
            }

            if index >= vectors.len() {
                return Err(anyhow!("Invalid embedding response: index {} out of range", index));
            }
            vectors[index] = vector;
        }

        Ok(vectors)
    }
}

use crate::config::VectorDbConfig;
use crate::processing::Chunk;
use qdrant_client::{
    config::QdrantConfig,
    qdrant::{
        point_id::PointIdOptions, with_payload_selector::SelectorOptions, CreateCollection,
        Distance, PointId, PointStruct, SearchPoints, Value, VectorParams, VectorsConfig,
        WithPayloadSelector,
    },
    Qdrant,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Operation failed: {0}")]
    Operation(String),
}

/// One similarity-search result with the payload fields the pipeline
/// stores per chunk.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: String,
    pub score: f32,
    pub content: String,
    pub path: String,
    pub source: String,
}

/// Qdrant-backed store of chunk embeddings. Point ids reuse the chunk
/// uuids so graph lookups can join on them directly.
#[derive(Clone)]
pub struct VectorStore {
    client: Arc<Qdrant>,
    collection: String,
}

impl VectorStore {
    pub async fn connect(config: &VectorDbConfig) -> Result<Self, VectorStoreError> {
        let client = create_client(&config.url).await?;
        Ok(Self {
            client: Arc::new(client),
            collection: config.collection.clone(),
        })
    }

    /// Creates the collection if it does not exist yet.
    pub async fn ensure_collection(&self, vector_size: u64) -> Result<(), VectorStoreError> {
        let vectors_config = VectorsConfig {
            config: Some(qdrant_client::qdrant::vectors_config::Config::Params(
                VectorParams {
                    size: vector_size,
                    distance: Distance::Cosine.into(),
                    ..Default::default()
                },
            )),
        };

        let create_collection = CreateCollection {
            collection_name: self.collection.clone(),
            vectors_config: Some(vectors_config),
            ..Default::default()
        };

        match self.client.create_collection(create_collection).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("AlreadyExists") => {
                log::info!(
                    "Collection {} already exists, skipping creation",
                    self.collection
                );
                Ok(())
            }
            Err(e) => Err(VectorStoreError::Operation(e.to_string())),
        }
    }

    /// Upserts one point per chunk. Existing points with the same id are
    /// overwritten, so reruns converge instead of duplicating.
    pub async fn upsert_chunks(
        &self,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<(), VectorStoreError> {
        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let mut payload: HashMap<String, Value> = HashMap::new();
                payload.insert("chunk_id".to_string(), Value::from(chunk.id.clone()));
                payload.insert("content".to_string(), Value::from(chunk.content.clone()));
                payload.insert("path".to_string(), Value::from(chunk.metadata.path.clone()));
                payload.insert(
                    "source".to_string(),
                    Value::from(chunk.metadata.source.clone()),
                );
                payload.insert("level".to_string(), Value::from(chunk.metadata.level as i64));

                PointStruct {
                    id: Some(PointId {
                        point_id_options: Some(PointIdOptions::Uuid(chunk.id.clone())),
                    }),
                    vectors: Some(vector.clone().into()),
                    payload,
                }
            })
            .collect();

        self.client
            .upsert_points(qdrant_client::qdrant::UpsertPoints {
                collection_name: self.collection.clone(),
                points,
                ..Default::default()
            })
            .await
            .map_err(|e| VectorStoreError::Operation(e.to_string()))?;

        Ok(())
    }

    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        let request = SearchPoints {
            collection_name: self.collection.clone(),
            vector: query_vector,
            limit,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let results = self
            .client
            .search_points(request)
            .await
            .map_err(|e| VectorStoreError::Operation(e.to_string()))?;

        let hits = results
            .result
            .into_iter()
            .map(|point| {
                let chunk_id = match point.id.and_then(|id| id.point_id_options) {
                    Some(PointIdOptions::Uuid(uuid)) => uuid,
                    _ => String::new(),
                };
                VectorHit {
                    chunk_id,
                    score: point.score,
                    content: payload_str(&point.payload, "content"),
                    path: payload_str(&point.payload, "path"),
                    source: payload_str(&point.payload, "source"),
                }
            })
            .collect();

        Ok(hits)
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> String {
    payload
        .get(key)
        .cloned()
        .and_then(|v| serde_json::Value::try_from(v).ok())
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_default()
}

async fn create_client(url: &str) -> Result<Qdrant, VectorStoreError> {
    // Clean the URL
    let clean_url = if url.contains("://") {
        url.split("://").nth(1).unwrap_or(url).to_string()
    } else {
        url.to_string()
    };

    // Replace port 6333 with 6334 for gRPC if needed
    let grpc_url = if clean_url.ends_with(":6333") {
        clean_url.replace(":6333", ":6334")
    } else {
        clean_url
    };

    let url_with_scheme = format!("http://{}", grpc_url);
    log::info!("Attempting to connect to Qdrant with URL: {}", url_with_scheme);

    let mut config = QdrantConfig::from_url(&url_with_scheme);
    config.check_compatibility = false;
    config.timeout = Duration::from_secs(30);
    config.connect_timeout = Duration::from_secs(10);

    let client = Qdrant::new(config).map_err(|e| VectorStoreError::Connection(e.to_string()))?;

    // Test the connection
    match client.list_collections().await {
        Ok(_) => {
            log::info!("Successfully connected to Qdrant");
            Ok(client)
        }
        Err(e) => {
            log::error!("Connection test failed: {}", e);
            Err(VectorStoreError::Connection(format!(
                "Failed to connect to Qdrant: {}",
                e
            )))
        }
    }
}

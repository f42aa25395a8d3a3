use crate::config::GraphConfig;
use crate::graph::entities::Triple;
use neo4rs::{query, Graph};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query failed: {0}")]
    Query(#[from] neo4rs::Error),
    #[error("Row decode failed: {0}")]
    Decode(String),
}

/// A chunk that has not been through entity extraction yet.
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub id: String,
    pub content: String,
}

/// A chunk returned by keyword search, ranked by how many matching
/// entities point at it.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub content: String,
    pub score: i64,
    pub entities: Vec<String>,
}

/// Structural and semantic context looked up for one chunk id.
#[derive(Debug, Clone)]
pub struct ChunkContext {
    pub section: Option<String>,
    pub entities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub documents: i64,
    pub sections: i64,
    pub chunks: i64,
    pub entities: i64,
    pub relations: i64,
}

/// Owns every Cypher statement in the crate. Callers work with plain Rust
/// types and never see the driver.
#[derive(Clone)]
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        // Probe the connection so a bad URI fails here, not mid-build.
        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        Ok(Self { graph })
    }

    /// Removes all nodes and relationships. Schema objects stay.
    pub async fn clean(&self) -> Result<(), GraphError> {
        self.graph.run(query("MATCH (n) DETACH DELETE n")).await?;
        Ok(())
    }

    pub async fn init_schema(&self) -> Result<(), GraphError> {
        self.graph
            .run(query(
                "CREATE CONSTRAINT document_name_unique IF NOT EXISTS \
                 FOR (d:Document) REQUIRE d.name IS UNIQUE",
            ))
            .await?;
        self.graph
            .run(query(
                "CREATE CONSTRAINT chunk_id_unique IF NOT EXISTS \
                 FOR (c:Chunk) REQUIRE c.id IS UNIQUE",
            ))
            .await?;
        self.graph
            .run(query(
                "CREATE INDEX section_path_index IF NOT EXISTS \
                 FOR (s:Section) ON (s.full_path)",
            ))
            .await?;
        Ok(())
    }

    pub async fn merge_document(&self, name: &str) -> Result<(), GraphError> {
        self.graph
            .run(query("MERGE (d:Document {name: $name})").param("name", name))
            .await?;
        Ok(())
    }

    /// Links a top-level section under its document.
    pub async fn link_section_to_document(
        &self,
        document: &str,
        full_path: &str,
        title: &str,
    ) -> Result<(), GraphError> {
        self.graph
            .run(
                query(
                    "MATCH (p:Document {name: $p_val}) \
                     MERGE (s:Section {full_path: $full_path}) \
                     SET s.title = $title, s.source = $doc_name \
                     MERGE (p)-[:HAS_SECTION]->(s)",
                )
                .param("p_val", document)
                .param("full_path", full_path)
                .param("title", title)
                .param("doc_name", document),
            )
            .await?;
        Ok(())
    }

    /// Links a nested section under its parent section.
    pub async fn link_section_to_section(
        &self,
        document: &str,
        parent_path: &str,
        full_path: &str,
        title: &str,
    ) -> Result<(), GraphError> {
        self.graph
            .run(
                query(
                    "MATCH (p:Section {full_path: $p_val}) \
                     MERGE (s:Section {full_path: $full_path}) \
                     SET s.title = $title, s.source = $doc_name \
                     MERGE (p)-[:HAS_SUBSECTION]->(s)",
                )
                .param("p_val", parent_path)
                .param("full_path", full_path)
                .param("title", title)
                .param("doc_name", document),
            )
            .await?;
        Ok(())
    }

    /// Hangs a chunk with no section trail directly off its document.
    pub async fn attach_chunk_to_document(
        &self,
        document: &str,
        chunk_id: &str,
        content: &str,
        path: &str,
    ) -> Result<(), GraphError> {
        self.graph
            .run(
                query(
                    "MATCH (d:Document {name: $doc_name}) \
                     MERGE (c:Chunk {id: $c_id}) \
                     SET c.content = $content, c.path = $path \
                     MERGE (d)-[:HAS_CHUNK]->(c)",
                )
                .param("doc_name", document)
                .param("c_id", chunk_id)
                .param("content", content)
                .param("path", path),
            )
            .await?;
        Ok(())
    }

    pub async fn attach_chunk_to_section(
        &self,
        section_path: &str,
        chunk_id: &str,
        content: &str,
        path: &str,
    ) -> Result<(), GraphError> {
        self.graph
            .run(
                query(
                    "MATCH (s:Section {full_path: $s_path}) \
                     MERGE (c:Chunk {id: $c_id}) \
                     SET c.content = $content, c.path = $path \
                     MERGE (s)-[:HAS_CHUNK]->(c)",
                )
                .param("s_path", section_path)
                .param("c_id", chunk_id)
                .param("content", content)
                .param("path", path),
            )
            .await?;
        Ok(())
    }

    /// Chunks still waiting for entity extraction. The processed flag is
    /// set before triples are written, so a crashed run never reprocesses
    /// the same chunk forever.
    pub async fn pending_chunks(&self, limit: i64) -> Result<Vec<PendingChunk>, GraphError> {
        let mut stream = self
            .graph
            .execute(
                query(
                    "MATCH (c:Chunk) \
                     WHERE c.content IS NOT NULL AND c.entity_processed IS NULL \
                     RETURN c.id AS id, c.content AS content \
                     LIMIT $limit",
                )
                .param("limit", limit),
            )
            .await?;

        let mut pending = Vec::new();
        while let Some(row) = stream.next().await? {
            pending.push(PendingChunk {
                id: row
                    .get("id")
                    .map_err(|e| GraphError::Decode(e.to_string()))?,
                content: row
                    .get("content")
                    .map_err(|e| GraphError::Decode(e.to_string()))?,
            });
        }
        Ok(pending)
    }

    pub async fn mark_entity_processed(&self, chunk_id: &str) -> Result<(), GraphError> {
        self.graph
            .run(
                query("MATCH (c:Chunk {id: $id}) SET c.entity_processed = true")
                    .param("id", chunk_id),
            )
            .await?;
        Ok(())
    }

    pub async fn write_triple(&self, chunk_id: &str, triple: &Triple) -> Result<(), GraphError> {
        self.graph
            .run(
                query(
                    "MATCH (c:Chunk {id: $chunk_id}) \
                     MERGE (h:Entity {name: $head}) \
                     ON CREATE SET h.type = $head_type \
                     MERGE (t:Entity {name: $tail}) \
                     ON CREATE SET t.type = $tail_type \
                     MERGE (h)-[r:RELATED {type: $relation}]->(t) \
                     MERGE (c)-[:HAS_ENTITY]->(h) \
                     MERGE (c)-[:HAS_ENTITY]->(t)",
                )
                .param("chunk_id", chunk_id)
                .param("head", triple.head.as_str())
                .param("head_type", triple.head_type.as_str())
                .param("tail", triple.tail.as_str())
                .param("tail_type", triple.tail_type.as_str())
                .param("relation", triple.relation.as_str()),
            )
            .await?;
        Ok(())
    }

    /// Finds chunks whose entities match any of the keywords,
    /// case-insensitively. Score is the number of matching entities
    /// pointing at the chunk.
    pub async fn search_by_keywords(
        &self,
        keywords: &[String],
        limit: i64,
    ) -> Result<Vec<ScoredChunk>, GraphError> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let mut stream = self
            .graph
            .execute(
                query(
                    "MATCH (e:Entity) \
                     WHERE any(word IN $keywords WHERE toLower(e.name) CONTAINS toLower(word)) \
                     MATCH (c:Chunk)-[:HAS_ENTITY]->(e) \
                     RETURN c.content AS content, count(e) AS score, \
                            collect(distinct e.name) AS entities \
                     ORDER BY score DESC \
                     LIMIT $limit",
                )
                .param("keywords", keywords.to_vec())
                .param("limit", limit),
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = stream.next().await? {
            results.push(ScoredChunk {
                content: row
                    .get("content")
                    .map_err(|e| GraphError::Decode(e.to_string()))?,
                score: row
                    .get("score")
                    .map_err(|e| GraphError::Decode(e.to_string()))?,
                entities: row
                    .get("entities")
                    .map_err(|e| GraphError::Decode(e.to_string()))?,
            });
        }
        Ok(results)
    }

    /// Looks up the parent section and linked entities for a set of chunk
    /// ids in one round trip.
    pub async fn enrich_chunks(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, ChunkContext>, GraphError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut stream = self
            .graph
            .execute(
                query(
                    "MATCH (c:Chunk) WHERE c.id IN $ids \
                     OPTIONAL MATCH (c)<-[:HAS_CHUNK]-(s:Section) \
                     OPTIONAL MATCH (c)-[:HAS_ENTITY]->(e:Entity) \
                     RETURN c.id AS id, s.title AS section, collect(e.name) AS entities",
                )
                .param("ids", ids.to_vec()),
            )
            .await?;

        let mut enriched = HashMap::new();
        while let Some(row) = stream.next().await? {
            let id: String = row
                .get("id")
                .map_err(|e| GraphError::Decode(e.to_string()))?;
            let section: Option<String> = row
                .get("section")
                .map_err(|e| GraphError::Decode(e.to_string()))?;
            let entities: Vec<String> = row
                .get("entities")
                .map_err(|e| GraphError::Decode(e.to_string()))?;
            enriched.insert(id, ChunkContext { section, entities });
        }
        Ok(enriched)
    }

    pub async fn set_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<(), GraphError> {
        // Bolt floats are 64-bit.
        let vector: Vec<f64> = vector.iter().map(|v| *v as f64).collect();
        self.graph
            .run(
                query("MATCH (c:Chunk {id: $id}) SET c.embedding = $vector")
                    .param("id", chunk_id)
                    .param("vector", vector),
            )
            .await?;
        Ok(())
    }

    /// Drops and recreates the cosine vector index over chunk embeddings.
    /// Index options cannot be parameterized, so the dimension is inlined.
    pub async fn recreate_vector_index(&self, dimension: usize) -> Result<(), GraphError> {
        self.graph
            .run(query("DROP INDEX vector_index IF EXISTS"))
            .await?;

        let statement = format!(
            "CREATE VECTOR INDEX vector_index IF NOT EXISTS \
             FOR (c:Chunk) ON (c.embedding) \
             OPTIONS {{indexConfig: {{`vector.dimensions`: {}, `vector.similarity_function`: 'cosine'}}}}",
            dimension
        );
        self.graph.run(query(&statement)).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<GraphStats, GraphError> {
        Ok(GraphStats {
            documents: self.count("MATCH (d:Document) RETURN count(d) AS count").await?,
            sections: self.count("MATCH (s:Section) RETURN count(s) AS count").await?,
            chunks: self.count("MATCH (c:Chunk) RETURN count(c) AS count").await?,
            entities: self.count("MATCH (e:Entity) RETURN count(e) AS count").await?,
            relations: self
                .count("MATCH (:Entity)-[r:RELATED]->(:Entity) RETURN count(r) AS count")
                .await?,
        })
    }

    async fn count(&self, cypher: &str) -> Result<i64, GraphError> {
        let mut stream = self.graph.execute(query(cypher)).await?;
        match stream.next().await? {
            Some(row) => row
                .get("count")
                .map_err(|e| GraphError::Decode(e.to_string())),
            None => Ok(0),
        }
    }
}

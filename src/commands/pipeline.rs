use anyhow::{bail, Result};
use colored::Colorize;

use crate::config::{
    ConverterConfig, EmbeddingConfig, GraphConfig, PipelineConfig, VectorDbConfig,
};
use crate::graph::{EntityBuilder, GraphStore, StructureBuilder, VectorIndexBuilder};
use crate::ingestion::{self, ConverterClient};
use crate::processing;
use crate::providers::embeddings::EmbeddingClient;
use crate::providers::provider_from_env;
use crate::retrieval::{GraphRetriever, HybridRetriever, VectorStore};

async fn connect_store() -> Result<GraphStore> {
    let config = GraphConfig::from_env()?;
    Ok(GraphStore::connect(&config).await?)
}

/// Converts every PDF under data/raw into markdown.
pub async fn convert() -> Result<()> {
    let pipeline = PipelineConfig::from_env();
    let converter = ConverterClient::new(ConverterConfig::from_env()?);

    let report = ingestion::convert_corpus(&converter, &pipeline).await?;
    println!(
        "📄 Conversion finished: {} converted, {} skipped, {} failed (of {})",
        report.converted.to_string().green(),
        report.skipped.to_string().yellow(),
        report.failed.len().to_string().red(),
        report.total
    );
    for (name, reason) in &report.failed {
        println!("  {} {}: {}", "✗".red(), name, reason);
    }
    Ok(())
}

/// Splits converted markdown into hierarchical chunks and writes the
/// chunk file the build stages read.
pub async fn split() -> Result<()> {
    let pipeline = PipelineConfig::from_env();

    let chunks = processing::split_corpus(&pipeline.processed_dir)?;
    processing::write_chunks(&pipeline.chunks_path, &chunks)?;
    println!(
        "✂️  Split {} chunks into {}",
        chunks.len().to_string().green(),
        pipeline.chunks_path.display()
    );
    Ok(())
}

/// Rebuilds the document/section/chunk skeleton of the graph.
pub async fn build_structure() -> Result<()> {
    let pipeline = PipelineConfig::from_env();
    let chunks = processing::read_chunks(&pipeline.chunks_path)?;

    let store = connect_store().await?;
    let loaded = StructureBuilder::new(&store).rebuild(&chunks).await?;
    println!(
        "🏗️  Graph structure rebuilt: {} chunks loaded",
        loaded.to_string().green()
    );
    Ok(())
}

/// Extracts entities and relations from chunks not yet processed.
pub async fn build_entities(provider_name: &str) -> Result<()> {
    let pipeline = PipelineConfig::from_env();
    let store = connect_store().await?;
    let provider = provider_from_env(provider_name)?;

    let builder = EntityBuilder::new(&store, provider.as_ref(), pipeline.extract_workers);
    let report = builder.run().await?;
    println!(
        "🔗 Entity extraction: {} chunks processed, {} yielded triples",
        report.processed.to_string().green(),
        report.with_triples.to_string().green()
    );
    if report.processed == 0 {
        println!("  Nothing pending. Run build-structure first or add documents.");
    }
    Ok(())
}

/// Embeds every chunk and fills both the graph-side vector index and
/// the standalone vector collection.
pub async fn build_vectors() -> Result<()> {
    let pipeline = PipelineConfig::from_env();
    let chunks = processing::read_chunks(&pipeline.chunks_path)?;

    let store = connect_store().await?;
    let embedder = EmbeddingClient::new(EmbeddingConfig::from_env()?);
    let vectors = VectorStore::connect(&VectorDbConfig::from_env()?).await?;

    let built = VectorIndexBuilder::new(&store, &embedder, &vectors)
        .build(&chunks)
        .await?;
    println!(
        "🧮 Embedded and indexed {} chunks",
        built.to_string().green()
    );
    Ok(())
}

/// Runs the three build stages in order against the current chunk file.
pub async fn build_all(provider_name: &str) -> Result<()> {
    build_structure().await?;
    build_entities(provider_name).await?;
    build_vectors().await
}

/// Prints node and relation counts for the current graph.
pub async fn stats() -> Result<()> {
    let store = connect_store().await?;
    let stats = store.stats().await?;

    println!("\n📊 Knowledge graph contents:");
    println!("  Documents: {}", stats.documents.to_string().cyan());
    println!("  Sections:  {}", stats.sections.to_string().cyan());
    println!("  Chunks:    {}", stats.chunks.to_string().cyan());
    println!("  Entities:  {}", stats.entities.to_string().cyan());
    println!("  Relations: {}", stats.relations.to_string().cyan());
    println!();
    Ok(())
}

/// Answers a single question with the chosen retrieval engine.
pub async fn ask(provider_name: &str, question: &str, engine: &str) -> Result<()> {
    let store = connect_store().await?;
    let provider = provider_from_env(provider_name)?;

    let answer = match engine {
        "hybrid" => {
            let embedder = EmbeddingClient::new(EmbeddingConfig::from_env()?);
            let vectors = VectorStore::connect(&VectorDbConfig::from_env()?).await?;
            let retriever = HybridRetriever::new(vectors, store, embedder);
            retriever.ask(provider.as_ref(), question).await?
        }
        "graph" => {
            let retriever = GraphRetriever::new(store);
            retriever.answer(provider.as_ref(), question).await?
        }
        other => bail!("Unknown engine '{}'. Available engines: hybrid, graph", other),
    };

    println!("{}", answer.truecolor(255, 236, 179));
    Ok(())
}

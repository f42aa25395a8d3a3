pub mod converter;

pub use converter::{ConvertError, ConverterClient};

use crate::config::PipelineConfig;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Output files this small are treated as earlier failed runs and redone.
const RESUME_MIN_BYTES: u64 = 100;

#[derive(Debug, Default)]
pub struct ConversionReport {
    pub total: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
}

enum FileOutcome {
    Converted,
    Skipped,
    Failed(String),
}

/// Converts every PDF under the raw directory into markdown under the
/// processed directory. Already-converted files are skipped, so an
/// interrupted run picks up where it stopped.
pub async fn convert_corpus(
    client: &ConverterClient,
    pipeline: &PipelineConfig,
) -> Result<ConversionReport> {
    tokio::fs::create_dir_all(&pipeline.processed_dir)
        .await
        .with_context(|| format!("creating {}", pipeline.processed_dir.display()))?;

    let pdf_files = list_pdfs(&pipeline.raw_dir).await?;
    let mut report = ConversionReport {
        total: pdf_files.len(),
        ..Default::default()
    };

    if pdf_files.is_empty() {
        warn!("no PDF files found under {}", pipeline.raw_dir.display());
        return Ok(report);
    }

    info!(
        "converting {} files with {} workers",
        pdf_files.len(),
        pipeline.convert_workers
    );

    let pb = ProgressBar::new(pdf_files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap(),
    );

    let processed_dir = pipeline.processed_dir.clone();
    let outcomes: Vec<(String, FileOutcome)> = stream::iter(pdf_files.into_iter().map(|path| {
        let pb = pb.clone();
        let processed_dir = processed_dir.clone();
        async move {
            let name = file_stem(&path);
            pb.set_message(name.clone());
            let outcome = convert_one(client, &path, &processed_dir).await;
            pb.inc(1);
            (name, outcome)
        }
    }))
    .buffer_unordered(pipeline.convert_workers.max(1))
    .collect()
    .await;

    pb.finish_with_message("conversion complete");

    for (name, outcome) in outcomes {
        match outcome {
            FileOutcome::Converted => report.converted += 1,
            FileOutcome::Skipped => {
                info!("skipping {}: already converted", name);
                report.skipped += 1;
            }
            FileOutcome::Failed(reason) => report.failed.push((name, reason)),
        }
    }

    Ok(report)
}

async fn convert_one(client: &ConverterClient, path: &Path, out_dir: &Path) -> FileOutcome {
    let output_file = out_dir.join(format!("{}.md", file_stem(path)));

    if let Ok(meta) = tokio::fs::metadata(&output_file).await {
        if meta.len() > RESUME_MIN_BYTES {
            return FileOutcome::Skipped;
        }
    }

    match client.convert_pdf(path).await {
        Ok(markdown) => match tokio::fs::write(&output_file, markdown).await {
            Ok(()) => FileOutcome::Converted,
            Err(e) => FileOutcome::Failed(truncate(&e.to_string())),
        },
        Err(e) => FileOutcome::Failed(truncate(&e.to_string())),
    }
}

async fn list_pdfs(raw_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(raw_dir)
        .await
        .with_context(|| format!("reading {}", raw_dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string()
}

fn truncate(message: &str) -> String {
    message.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfig;
    use tempfile::tempdir;

    fn pipeline_for(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            raw_dir: dir.join("raw"),
            processed_dir: dir.join("processed"),
            chunks_path: dir.join("processed").join("hierarchical_chunks.jsonl"),
            convert_workers: 2,
            extract_workers: 2,
        }
    }

    #[tokio::test]
    async fn empty_corpus_reports_zero() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline_for(dir.path());
        tokio::fs::create_dir_all(&pipeline.raw_dir).await.unwrap();

        let client = ConverterClient::new(ConverterConfig { url: None });
        let report = convert_corpus(&client, &pipeline).await.unwrap();

        assert_eq!(report.total, 0);
        assert_eq!(report.converted, 0);
    }

    #[tokio::test]
    async fn large_existing_output_is_skipped() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline_for(dir.path());
        tokio::fs::create_dir_all(&pipeline.raw_dir).await.unwrap();
        tokio::fs::create_dir_all(&pipeline.processed_dir)
            .await
            .unwrap();

        tokio::fs::write(pipeline.raw_dir.join("report.pdf"), b"not a real pdf")
            .await
            .unwrap();
        tokio::fs::write(
            pipeline.processed_dir.join("report.md"),
            "x".repeat(200).as_bytes(),
        )
        .await
        .unwrap();

        let client = ConverterClient::new(ConverterConfig { url: None });
        let report = convert_corpus(&client, &pipeline).await.unwrap();

        assert_eq!(report.total, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn broken_pdf_is_reported_not_fatal() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline_for(dir.path());
        tokio::fs::create_dir_all(&pipeline.raw_dir).await.unwrap();
        tokio::fs::write(pipeline.raw_dir.join("junk.pdf"), b"garbage")
            .await
            .unwrap();

        let client = ConverterClient::new(ConverterConfig { url: None });
        let report = convert_corpus(&client, &pipeline).await.unwrap();

        assert_eq!(report.total, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "junk");
    }
}

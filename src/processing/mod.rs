pub mod jsonl;
pub mod splitter;

pub use jsonl::{read_chunks, write_chunks, ChunkFileError};
pub use splitter::MarkdownSplitter;

use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Name of the source document.
    pub source: String,
    /// Breadcrumb of section titles, e.g. "1. Background > 1.1 Status".
    pub path: String,
    /// Depth of the section stack this chunk was cut under.
    pub level: usize,
}

/// One contiguous piece of a document, cut along markdown headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Section titles from the breadcrumb path, root marker excluded.
    pub fn header_trail(&self) -> Vec<String> {
        self.metadata
            .path
            .split('>')
            .map(str::trim)
            .filter(|h| !h.is_empty() && *h != "Root")
            .map(String::from)
            .collect()
    }
}

/// Splits every markdown file in a directory, taking the file stem as
/// the source document name.
pub fn split_corpus(dir: &Path) -> Result<Vec<Chunk>, ChunkFileError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("md"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let splitter = MarkdownSplitter::new();
    let mut chunks = Vec::new();
    for path in files {
        let text = fs::read_to_string(&path)?;
        let source = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());

        let mut file_chunks = splitter.split_text(&text, &source);
        info!("{}: {} chunks", source, file_chunks.len());
        chunks.append(&mut file_chunks);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_trail_drops_root() {
        let chunk = Chunk {
            id: "x".to_string(),
            content: String::new(),
            metadata: ChunkMetadata {
                source: "doc".to_string(),
                path: "Root".to_string(),
                level: 0,
            },
        };
        assert!(chunk.header_trail().is_empty());
    }

    #[test]
    fn header_trail_splits_breadcrumb() {
        let chunk = Chunk {
            id: "x".to_string(),
            content: String::new(),
            metadata: ChunkMetadata {
                source: "doc".to_string(),
                path: "1. Background > 1.1 Status".to_string(),
                level: 2,
            },
        };
        assert_eq!(chunk.header_trail(), vec!["1. Background", "1.1 Status"]);
    }

    #[test]
    fn split_corpus_names_sources_after_file_stems() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("alpha.md"), "# A\nbody a").unwrap();
        fs::write(dir.path().join("beta.md"), "# B\nbody b").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let chunks = split_corpus(dir.path()).unwrap();
        let sources: Vec<&str> = chunks.iter().map(|c| c.metadata.source.as_str()).collect();
        assert_eq!(sources, vec!["alpha", "beta"]);
    }
}

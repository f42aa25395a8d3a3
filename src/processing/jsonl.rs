use super::Chunk;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad chunk on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("serialize error: {0}")]
    Serialize(serde_json::Error),
}

/// Writes chunks as one JSON object per line, creating parent directories
/// as needed.
pub fn write_chunks(path: &Path, chunks: &[Chunk]) -> Result<(), ChunkFileError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for chunk in chunks {
        let line = serde_json::to_string(chunk).map_err(ChunkFileError::Serialize)?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a JSONL chunk file, reporting the offending line number on parse
/// failures. Blank lines are tolerated.
pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>, ChunkFileError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut chunks = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk = serde_json::from_str(&line).map_err(|source| ChunkFileError::Parse {
            line: index + 1,
            source,
        })?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::MarkdownSplitter;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_preserves_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("chunks.jsonl");

        let chunks = MarkdownSplitter::new().split_text("# A\none\n# B\ntwo", "doc");
        write_chunks(&path, &chunks).unwrap();

        let loaded = read_chunks(&path).unwrap();
        assert_eq!(loaded.len(), chunks.len());
        assert_eq!(loaded[0].id, chunks[0].id);
        assert_eq!(loaded[1].metadata.path, "B");
    }

    #[test]
    fn parse_error_names_the_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(&path, "{\"id\": \"a\", \"content\": \"x\", \"metadata\": {\"source\": \"s\", \"path\": \"Root\", \"level\": 0}}\nnot json\n").unwrap();

        let err = read_chunks(&path).unwrap_err();
        match err {
            ChunkFileError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn blank_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gaps.jsonl");
        let chunks = MarkdownSplitter::new().split_text("# A\none", "doc");
        write_chunks(&path, &chunks).unwrap();

        let mut text = std::fs::read_to_string(&path).unwrap();
        text.push('\n');
        std::fs::write(&path, text).unwrap();

        assert_eq!(read_chunks(&path).unwrap().len(), 1);
    }
}

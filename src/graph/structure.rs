use crate::graph::store::{GraphError, GraphStore};
use crate::processing::Chunk;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

/// Loads the document outline into the graph: a Document node per source
/// file, a Section chain per breadcrumb, and a Chunk hanging off the
/// deepest section.
pub struct StructureBuilder<'a> {
    store: &'a GraphStore,
}

impl<'a> StructureBuilder<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// Wipes graph data, reapplies the schema and loads every chunk.
    pub async fn rebuild(&self, chunks: &[Chunk]) -> Result<usize, GraphError> {
        info!("clearing previous graph data");
        self.store.clean().await?;
        self.store.init_schema().await?;

        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap(),
        );

        for chunk in chunks {
            self.load_chunk(chunk).await?;
            pb.inc(1);
        }

        pb.finish_with_message("graph structure complete");
        Ok(chunks.len())
    }

    async fn load_chunk(&self, chunk: &Chunk) -> Result<(), GraphError> {
        let source = &chunk.metadata.source;
        let headers = chunk.header_trail();
        let path_str = headers.join(" > ");

        self.store.merge_document(source).await?;

        // Full paths start with the document name so equal titles in
        // different documents stay distinct Section nodes.
        let full_paths = accumulate_paths(source, &headers);
        for (depth, title) in headers.iter().enumerate() {
            if depth == 0 {
                self.store
                    .link_section_to_document(source, &full_paths[0], title)
                    .await?;
            } else {
                self.store
                    .link_section_to_section(source, &full_paths[depth - 1], &full_paths[depth], title)
                    .await?;
            }
        }

        match full_paths.last() {
            Some(deepest) => {
                self.store
                    .attach_chunk_to_section(deepest, &chunk.id, &chunk.content, &path_str)
                    .await?;
            }
            None => {
                self.store
                    .attach_chunk_to_document(source, &chunk.id, &chunk.content, &path_str)
                    .await?;
            }
        }
        Ok(())
    }
}

/// One accumulated breadcrumb per header, e.g. for source "doc" and
/// headers ["A", "B"]: ["doc > A", "doc > A > B"].
fn accumulate_paths(source: &str, headers: &[String]) -> Vec<String> {
    let mut paths = Vec::with_capacity(headers.len());
    let mut current = source.to_string();
    for title in headers {
        current = format!("{} > {}", current, title);
        paths.push(current.clone());
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_accumulate_from_source() {
        let headers = vec!["1. Intro".to_string(), "1.1 Status".to_string()];
        assert_eq!(
            accumulate_paths("report", &headers),
            vec!["report > 1. Intro", "report > 1. Intro > 1.1 Status"]
        );
    }

    #[test]
    fn no_headers_no_paths() {
        assert!(accumulate_paths("report", &[]).is_empty());
    }
}

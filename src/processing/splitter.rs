use super::{Chunk, ChunkMetadata};
use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

lazy_static! {
    // 1 to 6 leading '#', at least one space, then the title.
    static ref HEADER_PATTERN: Regex = Regex::new(r"^(#{1,6})\s+(.*)").unwrap();
}

struct HeaderNode {
    level: usize,
    title: String,
}

/// Splits markdown into chunks that each know their place in the document
/// outline. A stack of open headers tracks the current section; every chunk
/// records the breadcrumb path of titles above it.
pub struct MarkdownSplitter;

impl MarkdownSplitter {
    pub fn new() -> Self {
        Self
    }

    pub fn split_text(&self, text: &str, source_name: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut header_stack: Vec<HeaderNode> = Vec::new();
        let mut content_buffer: Vec<String> = Vec::new();

        for line in text.split('\n') {
            if let Some(caps) = HEADER_PATTERN.captures(line) {
                // A new header closes the running section.
                Self::flush(source_name, &header_stack, &mut content_buffer, &mut chunks);

                let new_level = caps[1].len();
                let new_title = caps[2].trim().to_string();

                // Siblings and deeper levels leave the stack before the new
                // header goes on.
                while header_stack
                    .last()
                    .map_or(false, |top| top.level >= new_level)
                {
                    header_stack.pop();
                }

                // Keep the title in the body so the chunk reads coherently
                // on its own.
                content_buffer.push(format!("【{}】", new_title));
                header_stack.push(HeaderNode {
                    level: new_level,
                    title: new_title,
                });
            } else {
                content_buffer.push(line.to_string());
            }
        }

        Self::flush(source_name, &header_stack, &mut content_buffer, &mut chunks);
        chunks
    }

    fn flush(
        source_name: &str,
        header_stack: &[HeaderNode],
        content_buffer: &mut Vec<String>,
        chunks: &mut Vec<Chunk>,
    ) {
        let full_text = content_buffer.join("\n").trim().to_string();
        content_buffer.clear();

        if full_text.is_empty() {
            return;
        }

        let path = if header_stack.is_empty() {
            "Root".to_string()
        } else {
            header_stack
                .iter()
                .map(|h| h.title.as_str())
                .collect::<Vec<_>>()
                .join(" > ")
        };

        chunks.push(Chunk {
            id: Uuid::new_v4().to_string(),
            content: full_text,
            metadata: ChunkMetadata {
                source: source_name.to_string(),
                path,
                level: header_stack.len(),
            },
        });
    }
}

impl Default for MarkdownSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.metadata.path.as_str()).collect()
    }

    #[test]
    fn preamble_lands_under_root() {
        let text = "Intro text.\n\n# Title\nBody.";
        let chunks = MarkdownSplitter::new().split_text(text, "doc");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "Intro text.");
        assert_eq!(chunks[0].metadata.path, "Root");
        assert_eq!(chunks[0].metadata.level, 0);
    }

    #[test]
    fn sibling_header_replaces_stack_top() {
        let text = "# One\nAlpha.\n## Sub A\nBeta.\n## Sub B\nGamma.\n# Two\nDelta.";
        let chunks = MarkdownSplitter::new().split_text(text, "doc");

        assert_eq!(
            paths(&chunks),
            vec!["One", "One > Sub A", "One > Sub B", "Two"]
        );
        assert_eq!(chunks[1].metadata.level, 2);
        assert_eq!(chunks[3].metadata.level, 1);
    }

    #[test]
    fn title_marker_kept_in_content() {
        let text = "# Budget\nTen units.";
        let chunks = MarkdownSplitter::new().split_text(text, "doc");

        assert_eq!(chunks[0].content, "【Budget】\nTen units.");
    }

    #[test]
    fn back_to_back_headers_emit_marker_only_chunk() {
        let text = "# One\n# Two\nBody.";
        let chunks = MarkdownSplitter::new().split_text(text, "doc");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "【One】");
        assert_eq!(chunks[0].metadata.path, "One");
    }

    #[test]
    fn whitespace_only_sections_are_skipped() {
        let text = "\n   \n# One\nBody.";
        let chunks = MarkdownSplitter::new().split_text(text, "doc");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.path, "One");
    }

    #[test]
    fn hash_without_space_is_not_a_header() {
        let text = "# Real\n#tag line stays in body.";
        let chunks = MarkdownSplitter::new().split_text(text, "doc");

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("#tag line"));
    }

    #[test]
    fn ids_are_unique() {
        let text = "# A\none\n# B\ntwo";
        let chunks = MarkdownSplitter::new().split_text(text, "doc");
        assert_ne!(chunks[0].id, chunks[1].id);
    }
}

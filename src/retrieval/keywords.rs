use crate::providers::traits::CompletionProvider;
use crate::providers::utils::strip_code_fences;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

lazy_static! {
    // First JSON array anywhere in the output, for models that wrap the
    // list in prose.
    static ref JSON_ARRAY: Regex = Regex::new(r"(?s)\[.*?\]").unwrap();
}

/// Asks the model for 2-3 search keywords. Falls back to the first words
/// of the question when the model output cannot be parsed.
pub async fn extract_keywords(
    provider: &(dyn CompletionProvider + Send + Sync),
    question: &str,
) -> Vec<String> {
    let prompt = format!(
        "Extract 2-3 core search keywords (entities) from the user question.\n\
         Question: \"{}\"\n\n\
         Requirements:\n\
         1. Output only the keyword list, no other text.\n\
         2. The format must be a JSON list, e.g. [\"Transformer\", \"Attention\", \"Google\"]",
        question
    );

    match provider.complete(&prompt).await {
        Ok(raw) => parse_keyword_list(&raw).unwrap_or_else(|| fallback_keywords(question)),
        Err(e) => {
            warn!("keyword extraction failed: {}, using fallback", e);
            fallback_keywords(question)
        }
    }
}

fn parse_keyword_list(raw: &str) -> Option<Vec<String>> {
    let cleaned = strip_code_fences(raw);
    if let Ok(keywords) = serde_json::from_str::<Vec<String>>(&cleaned) {
        return Some(keywords);
    }
    // The model may have wrapped the list in commentary.
    let captured = JSON_ARRAY.find(&cleaned)?;
    serde_json::from_str(captured.as_str()).ok()
}

fn fallback_keywords(question: &str) -> Vec<String> {
    question
        .split_whitespace()
        .take(2)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_list() {
        assert_eq!(
            parse_keyword_list(r#"["Transformer", "RNN"]"#),
            Some(vec!["Transformer".to_string(), "RNN".to_string()])
        );
    }

    #[test]
    fn parses_fenced_list() {
        assert_eq!(
            parse_keyword_list("```json\n[\"Agent\"]\n```"),
            Some(vec!["Agent".to_string()])
        );
    }

    #[test]
    fn recovers_list_from_prose() {
        assert_eq!(
            parse_keyword_list("Here are the keywords: [\"RAG\", \"Neo4j\"] as requested."),
            Some(vec!["RAG".to_string(), "Neo4j".to_string()])
        );
    }

    #[test]
    fn rambling_output_is_rejected() {
        assert_eq!(parse_keyword_list("I could not decide on keywords."), None);
    }

    #[test]
    fn fallback_takes_first_two_words() {
        assert_eq!(
            fallback_keywords("what is an agent"),
            vec!["what".to_string(), "is".to_string()]
        );
    }
}

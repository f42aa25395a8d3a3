use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref THINK_BLOCK: Regex = Regex::new(r"(?s)<think>.*?</think>").unwrap();
}

/// Removes `<think>...</think>` reasoning traces that local models such as
/// deepseek-r1 emit before their actual answer.
pub fn strip_think_blocks(text: &str) -> String {
    THINK_BLOCK.replace_all(text, "").trim().to_string()
}

/// Removes a surrounding markdown code fence (```json ... ```) if present.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_close = without_open.strip_suffix("```").unwrap_or(without_open);
    without_close.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_think_blocks() {
        let raw = "<think>step one\nstep two</think>The answer is 42.";
        assert_eq!(strip_think_blocks(raw), "The answer is 42.");
    }

    #[test]
    fn test_strip_think_blocks_multiline() {
        let raw = "prefix <think>a</think> middle <think>b</think> end";
        assert_eq!(strip_think_blocks(raw), "prefix  middle  end");
    }

    #[test]
    fn test_strip_code_fences() {
        let raw = "```json\n[\"alpha\", \"beta\"]\n```";
        assert_eq!(strip_code_fences(raw), "[\"alpha\", \"beta\"]");
        assert_eq!(strip_code_fences("plain"), "plain");
    }
}

//! Assembly of retrieved chunks into the prompt context.
//!
//! The budget is a character count used as a cheap stand-in for a token
//! limit. Truncation applies to the joined string, so a separator can be
//! cut as well as a chunk.

use crate::config::ContextConfig;
use crate::models::RetrievedChunk;

/// Join chunk contents in rank order with `separator` and cut the result to
/// at most `budget_chars` characters.
///
/// Pure and deterministic. No chunks gives an empty string.
///
/// ```rust
/// use grounded_chat::context::assemble_context;
/// use grounded_chat::models::RetrievedChunk;
///
/// let chunks = vec![RetrievedChunk::new("a", 0.9), RetrievedChunk::new("b", 0.8)];
/// assert_eq!(assemble_context(&chunks, " | ", 100), "a | b");
/// assert_eq!(assemble_context(&chunks, " | ", 3), "a |");
/// ```
pub fn assemble_context(chunks: &[RetrievedChunk], separator: &str, budget_chars: usize) -> String {
    let joined = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join(separator);
    truncate_chars(joined, budget_chars)
}

/// [`assemble_context`] with the configured separator and budget.
pub fn assemble_with(chunks: &[RetrievedChunk], config: &ContextConfig) -> String {
    assemble_context(chunks, &config.separator, config.budget_chars)
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<RetrievedChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| RetrievedChunk::new(*t, 0.9 - i as f64 * 0.1))
            .collect()
    }

    #[test]
    fn test_joins_in_rank_order() {
        let got = assemble_context(
            &chunks(&["Refunds within 30 days.", "Contact support for exceptions."]),
            "\n---\n",
            3000,
        );
        assert_eq!(got, "Refunds within 30 days.\n---\nContact support for exceptions.");
    }

    #[test]
    fn test_empty_retrieval_is_empty_context() {
        assert_eq!(assemble_context(&[], "\n---\n", 3000), "");
    }

    #[test]
    fn test_single_chunk_has_no_separator() {
        assert_eq!(assemble_context(&chunks(&["only"]), "\n---\n", 3000), "only");
    }

    #[test]
    fn test_truncates_assembled_string_not_chunks() {
        let got = assemble_context(&chunks(&["aaaa", "bbbb"]), "--", 7);
        assert_eq!(got, "aaaa--b");
    }

    #[test]
    fn test_never_exceeds_budget() {
        let long = "x".repeat(5000);
        let input = chunks(&[&long, "tail"]);
        for budget in [1, 10, 2999, 3000, 3001] {
            let got = assemble_context(&input, "\n---\n", budget);
            assert!(got.chars().count() <= budget);
        }
        assert_eq!(assemble_context(&input, "\n---\n", 3000).chars().count(), 3000);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let got = assemble_context(&chunks(&["héllo wörld"]), "", 2);
        assert_eq!(got, "hé");
    }

    #[test]
    fn test_deterministic() {
        let input = chunks(&["one", "two", "three"]);
        let a = assemble_context(&input, "\n", 9);
        let b = assemble_context(&input, "\n", 9);
        assert_eq!(a, b);
        assert_eq!(a, "one\ntwo\nt");
    }

    #[test]
    fn test_assemble_with_config_defaults() {
        let config = ContextConfig::default();
        let got = assemble_with(&chunks(&["a", "b"]), &config);
        assert_eq!(got, "a\n---\nb");
    }
}

//! Text assembly shared by the graph-sync worker and the enrichment path
//! (§4.5: "single implementation shared by sync and enrichment").

/// Agents with descriptions longer than this are truncated before
/// embedding; the limit keeps a single pathological agent from dominating
/// a batch request's token budget.
pub const MAX_EMBED_TEXT_CHARS: usize = 30_000;

/// Assemble the text embedded for an agent: the name, a blank line, then
/// the description, truncated at [`MAX_EMBED_TEXT_CHARS`] characters.
pub fn assemble_embed_text(name: &str, description: &str) -> String {
    let joined = format!("{name}\n\n{description}");
    truncate_chars(&joined, MAX_EMBED_TEXT_CHARS)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}

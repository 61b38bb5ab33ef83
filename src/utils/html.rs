// src/utils/html.rs

use std::collections::HashSet;

/// Strips every HTML tag from player-supplied text using the ammonia library.
///
/// Display names and affiliations are shown to other participants, so no markup
/// is allowed through at all; text content of harmless tags is kept, `<script>`
/// and `<style>` bodies are dropped entirely. The result is trimmed.
pub fn clean_text(input: &str) -> String {
    ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(input)
        .to_string()
        .trim()
        .to_string()
}

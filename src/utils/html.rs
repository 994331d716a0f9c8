// src/utils/html.rs

/// Sanitizes administrator-authored rich text (prompts, explanations,
/// descriptions, option text) before it is stored.
///
/// Whitelist-based: safe formatting tags such as <b> and <p> survive, while
/// <script>, <iframe> and event-handler attributes are stripped together with
/// their content. Surrounding whitespace is trimmed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}

/// Plain-text fields (titles, topics, option text) are stored as typed, minus
/// surrounding whitespace. They are never rendered as HTML, so escaping them
/// here would only corrupt `<` and `&` and inflate their length.
pub fn plain_text(input: &str) -> String {
    input.trim().to_string()
}

// src/utils/html.rs

use ammonia;

/// Cleans authored SJT text (scenarios, rationales, action texts).
///
/// Whitelist-based: safe formatting tags (like <b>, <p>) are kept, while
/// <script>, <iframe> and event-handler attributes are dropped together with
/// their content. Surrounding whitespace is trimmed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input).trim().to_string()
}

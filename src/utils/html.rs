// src/utils/html.rs

/// Sanitizes question text with ammonia's whitelist.
///
/// Safe formatting tags (<b>, <p>, <code>) survive; <script> and <style>
/// are removed with their content, as are event-handler attributes.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

//! Text rendering utilities for human-friendly error messages.
//!
//! Formats bean and alias chains, shortens Rust type names and
//! ranks "did you mean?" candidates for unknown names.

/// Renders a reference chain as a readable string.
///
/// # Examples
/// ```
/// use tarkib_support::rendering::render_chain;
///
/// let chain = vec!["server", "handler", "repository", "server"];
/// let rendered = render_chain(&chain);
/// assert_eq!(rendered, "server → handler → repository → server");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use tarkib_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::beans::http::Server");
/// assert_eq!(short, "Server");
///
/// let short = shorten_type_name("alloc::sync::Arc<dyn my_app::runner::Runner>");
/// assert_eq!(short, "Arc<dyn Runner>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    // Keep the last segment of every path: "a::b::C" → "C"
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut current_segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                current_segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                result.push_str(&current_segment);
                result.push(ch);
                current_segment.clear();
            }
            _ => {
                current_segment.push(ch);
            }
        }
    }

    result.push_str(&current_segment);
    result
}

/// Suggests registered names close to a requested one.
///
/// Candidates are ranked by substring containment first, then by the
/// length of the common prefix. At most `max_suggestions` names are
/// returned, best first.
///
/// ```
/// use tarkib_support::rendering::suggest_similar;
///
/// let available = ["userService", "userRepository", "logger"];
/// let suggestions = suggest_similar("userServise", &available, 2);
/// assert_eq!(suggestions[0], "userService");
/// ```
pub fn suggest_similar(
    requested: &str,
    available: &[impl AsRef<str>],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = shorten_type_name(requested).to_lowercase();
    if requested_lower.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| *name != requested)
        .filter_map(|name| {
            let name_lower = shorten_type_name(name).to_lowercase();

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 100));
            }

            let common = name_lower
                .chars()
                .zip(requested_lower.chars())
                .take_while(|(a, b)| a == b)
                .count();

            if common >= 3 {
                return Some((name, common * 10));
            }

            None
        })
        .collect();

    // stable on ties so callers passing sorted input get sorted output
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

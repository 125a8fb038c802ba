//! Deterministic message templates for forwards, chat notifications and email.

/// `[source]`, an optional `Keywords: ...` line, a blank line, then the body.
pub fn format_message(source: &str, keywords: &[String], body: &str) -> String {
    let mut out = format!("[{}]\n", source);
    if !keywords.is_empty() {
        out.push_str("Keywords: ");
        out.push_str(&keywords.join(", "));
        out.push('\n');
    }
    out.push('\n');
    out.push_str(body);
    out
}

pub fn email_subject(source: &str, keywords: &[String]) -> String {
    if keywords.is_empty() {
        format!("New match from {}", source)
    } else {
        format!("New match from {}: {}", source, keywords.join(", "))
    }
}

/// First `limit` characters of `body` (not bytes).
pub fn truncate_chars(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((end, _)) => body[..end].to_string(),
        None => body.to_string(),
    }
}

//! Normalization of free-text model responses into constraint lists.

const FENCE: &str = "```";
const LABEL: &str = "constraints:";

/// Split a model response into discrete constraint phrases.
///
/// Code fences, a fence language tag, surrounding quotes and a leading
/// `Constraints:` label are removed; tokens are comma separated and empty
/// tokens are dropped. The result is stable under re-normalization of its
/// comma-joined form.
pub fn normalize_constraints(raw: &str) -> Vec<String> {
    let unfenced = strip_fences(raw.trim());

    unfenced
        .split(',')
        .map(clean_token)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join constraints back into the comma-separated form the model emits.
pub fn join_constraints(constraints: &[String]) -> String {
    constraints.join(", ")
}

fn strip_fences(text: &str) -> String {
    let text = match text.strip_prefix(FENCE) {
        // ```text\nA, B``` carries a language tag on the opening line.
        Some(rest) => match rest.split_once('\n') {
            Some((tag, body)) if is_fence_tag(tag) => body,
            _ => rest,
        },
        None => text,
    };
    text.replace(FENCE, "")
}

fn is_fence_tag(tag: &str) -> bool {
    matches!(
        tag.trim().to_ascii_lowercase().as_str(),
        "text" | "txt" | "plaintext" | "csv" | "json" | "markdown" | "md"
    )
}

fn clean_token(token: &str) -> &str {
    let mut current = token;
    loop {
        let trimmed = current.trim_matches(|c: char| c.is_whitespace() || c == '"');
        let unlabeled = strip_label(trimmed);
        if unlabeled == current {
            return current;
        }
        current = unlabeled;
    }
}

fn strip_label(token: &str) -> &str {
    match token.get(..LABEL.len()) {
        Some(head) if head.eq_ignore_ascii_case(LABEL) => &token[LABEL.len()..],
        _ => token,
    }
}

/// Escapes Markdown V1 control characters in a model's free-form answer so
/// an unbalanced `_` or `` ` `` cannot break delivery-side parsing. Code
/// batches and fenced replies are sent as-is; only conversational answers
/// pass through here.
pub fn escape_markdown_v1(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '`' | '_' | '*' | '[' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

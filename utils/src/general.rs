pub fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// Renders key/value pairs as an aligned two-column block. Continuation
/// lines of multi-line values are indented under the value column.
pub fn format_key_values<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let pairs: Vec<(&str, &str)> = pairs.into_iter().collect();
    let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (key, value) in pairs {
        let mut lines = value.lines();
        let first = lines.next().unwrap_or("");
        out.push_str(&format!("  {:<width$}  {}\n", key, first, width = width));
        for line in lines {
            out.push_str(&format!("  {:<width$}  {}\n", "", line, width = width));
        }
    }
    out
}

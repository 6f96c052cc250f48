use std::sync::LazyLock;

use regex::{Captures, Regex};
use rollout_defs::TemplateContext;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?P<name>[A-Za-z0-9_.-]+)>").unwrap());

/// Replaces every `<name>` token that has a context entry with its value.
///
/// Substitution is literal and single-pass: values are inserted verbatim
/// (slashes, ampersands, backslashes, `$` and even `<other>` tokens inside a
/// value are never interpreted). Tokens without an entry are left as they
/// are so a template can be completed in a later pass.
pub fn resolve(template: &str, ctx: &TemplateContext) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures| match ctx.get(&caps["name"]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Tokens still present in `text`, in order of first appearance.
pub fn unresolved_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = vec![];
    for caps in TOKEN.captures_iter(text) {
        let name = &caps["name"];
        if !tokens.iter().any(|t| t == name) {
            tokens.push(name.to_string());
        }
    }
    tokens
}

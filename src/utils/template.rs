use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::OnceLock;

static TOKEN: OnceLock<Regex> = OnceLock::new();

fn token_regex() -> &'static Regex {
    TOKEN.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("valid template token regex"))
}

/// Replaces `{key}` tokens (case-insensitive) with the contact's variables.
/// `{nome}` and `{telefone}` fall back to the contact's name and phone.
/// Tokens without a value stay in the text as written.
pub fn render_template(
    template: &str,
    name: Option<&str>,
    phone: &str,
    variables: &JsonValue,
) -> String {
    let mut values: HashMap<String, String> = HashMap::new();
    if let Some(map) = variables.as_object() {
        for (key, value) in map {
            values.insert(key.trim().to_lowercase(), stringify(value));
        }
    }
    values
        .entry("nome".to_string())
        .or_insert_with(|| name.unwrap_or_default().to_string());
    values
        .entry("telefone".to_string())
        .or_insert_with(|| phone.to_string());

    token_regex()
        .replace_all(template, |caps: &Captures| {
            let key = caps[1].trim().to_lowercase();
            match values.get(&key) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

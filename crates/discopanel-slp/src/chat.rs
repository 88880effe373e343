use serde_json::Value;

/// Flattens a Minecraft chat component (either a plain string or a
/// `{text, extra: [...]}` tree) into plain text by concatenating every
/// `text` field depth-first.
pub fn flatten_description(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) => {
            let mut out = String::new();
            flatten_into(value, &mut out);
            out
        }
        _ => String::new(),
    }
}

fn flatten_into(value: &Value, out: &mut String) {
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        out.push_str(text);
    }
    if let Some(extras) = value.get("extra").and_then(Value::as_array) {
        for extra in extras {
            flatten_into(extra, out);
        }
    }
}

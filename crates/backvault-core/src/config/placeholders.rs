//! `ENV_<NAME>` placeholder substitution for configuration values.

use serde_json::Value;

const PLACEHOLDER_PREFIX: &str = "ENV_";

/// Replace every `ENV_<NAME>` string in `value` with `$NAME` from the process environment.
pub fn resolve_env_placeholders(value: &mut Value) {
    resolve_with(value, &|name| std::env::var(name).ok());
}

/// Replace placeholders using an arbitrary variable lookup.
///
/// Unresolvable placeholders are left untouched and a warning is logged.
pub fn resolve_with(value: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => {
            if let Some(var_name) = placeholder_name(s) {
                match lookup(var_name) {
                    Some(resolved) => *s = resolved,
                    None => tracing::warn!(
                        "Environment variable '{}' not set for placeholder '{}'",
                        var_name,
                        s
                    ),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                resolve_with(item, lookup);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                resolve_with(item, lookup);
            }
        }
        _ => {}
    }
}

/// Variable name referenced by a placeholder, if `s` is exactly `ENV_[A-Z0-9_]+`.
fn placeholder_name(s: &str) -> Option<&str> {
    let name = s.strip_prefix(PLACEHOLDER_PREFIX)?;
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
    valid.then_some(name)
}

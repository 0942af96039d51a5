//! Environment variable resolution: `${VAR}` substitution in string values,
//! and `CONDUIT_*` fallbacks for fields left unset by every file layer.

use std::collections::HashMap;

/// Snapshot the current process environment once per load, so resolution is
/// deterministic within a single call to [`crate::loader::load`].
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Recursively substitute `$VAR`, `${VAR}`, and `${VAR:-default}` references
/// in every string leaf of a TOML value tree. An unresolved reference with no
/// default is left as-is (not an error — config is allowed to reference an
/// env var that simply isn't set on this box).
pub fn resolve_env_references(value: &mut toml::Value, env: &HashMap<String, String>) {
    match value {
        toml::Value::String(s) => *s = substitute(s, env),
        toml::Value::Array(items) => {
            for item in items {
                resolve_env_references(item, env);
            }
        },
        toml::Value::Table(table) => {
            for (_, v) in table.iter_mut() {
                resolve_env_references(v, env);
            }
        },
        _ => {},
    }
}

fn substitute(input: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;
    while pos < input.len() {
        let rest = &input[pos..];
        if let Some(after_dollar_brace) = rest.strip_prefix("${") {
            if let Some(end) = after_dollar_brace.find('}') {
                let inner = &after_dollar_brace[..end];
                out.push_str(&resolve_braced(inner, env));
                pos += "${".len() + end + '}'.len_utf8();
                continue;
            }
        } else if let Some(after_dollar) = rest.strip_prefix('$') {
            let name_len = after_dollar.chars().take_while(|c| is_ident_continue(*c)).filter(|c| c.is_ascii()).count();
            if name_len > 0 && after_dollar.chars().next().is_some_and(is_ident_start) {
                let name = &after_dollar[..name_len];
                if let Some(v) = env.get(name) {
                    out.push_str(v);
                }
                pos += '$'.len_utf8() + name_len;
                continue;
            }
        }
        let c = rest.chars().next().expect("pos < input.len() guarantees a char");
        out.push(c);
        pos += c.len_utf8();
    }
    out
}

fn resolve_braced(inner: &str, env: &HashMap<String, String>) -> String {
    if let Some((name, default)) = inner.split_once(":-") {
        env.get(name).cloned().unwrap_or_else(|| default.to_string())
    } else {
        env.get(inner).cloned().unwrap_or_default()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// The `CONDUIT_*` → dotted-field mapping used for fallback application
/// (§10.3: env var overrides for fields no file layer set).
const FALLBACKS: &[(&str, &str)] = &[
    ("CONDUIT_LOG_LEVEL", "log.level"),
    ("CONDUIT_LOG_FORMAT", "log.format"),
    ("CONDUIT_STORAGE_PATH", "storage.path"),
    ("CONDUIT_REQUEST_TIMEOUT_SECS", "timeouts.request_secs"),
    ("CONDUIT_STREAM_IDLE_SECS", "timeouts.stream_idle_secs"),
    ("CONDUIT_MAX_TOOL_ROUNDS", "runtime.max_tool_rounds"),
    ("CONDUIT_TOOL_CONCURRENCY", "runtime.tool_concurrency"),
    ("CONDUIT_HTTP_POOL_SIZE", "http.pool_size"),
    ("CONDUIT_HTTP_CONNECT_TIMEOUT_SECS", "http.connect_timeout_secs"),
];

/// Apply `CONDUIT_*` fallbacks for any dotted field not already present in
/// `merged`. Returns the number of fields filled this way.
pub fn apply_env_fallbacks(merged: &mut toml::Value, env: &HashMap<String, String>) -> usize {
    let mut applied = 0;
    for (var, path) in FALLBACKS {
        let Some(raw) = env.get(*var) else { continue };
        if set_if_absent(merged, path, raw) {
            applied = applied.saturating_add(1);
        }
    }
    applied
}

/// Set a dotted path to a parsed value only if the path isn't already
/// present as a leaf in the tree (a file layer takes precedence over env).
fn set_if_absent(root: &mut toml::Value, dotted_path: &str, raw: &str) -> bool {
    let segments: Vec<&str> = dotted_path.split('.').collect();
    let Some((leaf, parents)) = segments.split_last() else { return false };

    let mut node = root;
    for segment in parents {
        let table = node.as_table_mut().get_or_insert_with(Default::default);
        node = table.entry((*segment).to_string()).or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
    }
    let table = match node.as_table_mut() {
        Some(t) => t,
        None => return false,
    };
    if table.contains_key(*leaf) {
        return false;
    }
    table.insert((*leaf).to_string(), parse_scalar(raw));
    true
}

fn parse_scalar(raw: &str) -> toml::Value {
    if let Ok(i) = raw.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(b) = raw.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    toml::Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_braced_and_bare_vars() {
        let mut env = HashMap::new();
        env.insert("HOME".to_string(), "/home/conduit".to_string());
        assert_eq!(substitute("${HOME}/data", &env), "/home/conduit/data");
        assert_eq!(substitute("$HOME/data", &env), "/home/conduit/data");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let env = HashMap::new();
        assert_eq!(substitute("${MISSING:-fallback}", &env), "fallback");
    }

    #[test]
    fn leaves_unresolved_reference_with_no_default_untouched() {
        let env = HashMap::new();
        assert_eq!(substitute("${MISSING}", &env), "");
    }

    #[test]
    fn fallback_does_not_override_a_value_already_present() {
        let mut merged: toml::Value = toml::from_str("[log]\nlevel = \"debug\"\n").unwrap();
        let mut env = HashMap::new();
        env.insert("CONDUIT_LOG_LEVEL".to_string(), "trace".to_string());
        let applied = apply_env_fallbacks(&mut merged, &env);
        assert_eq!(applied, 0);
        assert_eq!(merged["log"]["level"].as_str(), Some("debug"));
    }

    #[test]
    fn fallback_fills_an_absent_field() {
        let mut merged = toml::Value::Table(toml::value::Table::new());
        let mut env = HashMap::new();
        env.insert("CONDUIT_MAX_TOOL_ROUNDS".to_string(), "12".to_string());
        let applied = apply_env_fallbacks(&mut merged, &env);
        assert_eq!(applied, 1);
        assert_eq!(merged["runtime"]["max_tool_rounds"].as_integer(), Some(12));
    }
}

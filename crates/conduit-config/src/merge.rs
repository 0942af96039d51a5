//! Layered merging of TOML value trees (§10.3 precedence chain).

/// Which layer a field's value came from, for `conduit config show`-style
/// introspection (§6.5 caller API does not expose this directly, but it's
/// cheap to carry and useful when diagnosing a misconfigured deployment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    /// The embedded `defaults.toml`.
    Defaults,
    /// `/etc/conduit/config.toml`.
    System,
    /// `~/.conduit/config.toml`.
    User,
    /// `{workspace}/.conduit/config.toml`.
    Workspace,
    /// A `CONDUIT_*` environment variable fallback.
    Env,
}

/// Recursively merge `overlay` into `base`, table by table. A non-table leaf
/// in `overlay` replaces the corresponding leaf (or subtree) in `base`
/// outright — this is a last-writer-wins merge, not an array-append.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_table.insert(key.clone(), overlay_value.clone());
                    },
                }
            }
        },
        (base_slot, overlay_value) => *base_slot = overlay_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_replaces_leaves_and_preserves_untouched_siblings() {
        let mut base: toml::Value = toml::from_str("[log]\nlevel = \"info\"\nformat = \"pretty\"\n").unwrap();
        let overlay: toml::Value = toml::from_str("[log]\nlevel = \"debug\"\n").unwrap();
        deep_merge(&mut base, &overlay);
        assert_eq!(base["log"]["level"].as_str(), Some("debug"));
        assert_eq!(base["log"]["format"].as_str(), Some("pretty"));
    }

    #[test]
    fn overlay_introduces_a_section_absent_from_base() {
        let mut base: toml::Value = toml::from_str("[log]\nlevel = \"info\"\n").unwrap();
        let overlay: toml::Value = toml::from_str("[runtime]\nmax_tool_rounds = 3\n").unwrap();
        deep_merge(&mut base, &overlay);
        assert_eq!(base["runtime"]["max_tool_rounds"].as_integer(), Some(3));
    }
}

//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Load configuration with the following precedence (highest first):
/// 1) `ENCORE_CONFIG_JSON` env var containing raw JSON
/// 2) If `ENCORE_CONFIG_STDIN=true/1`, read JSON from stdin
/// 3) File pointed at by `ENCORE_CONFIG_PATH`
/// 4) config.json in the current working directory
/// 5) Defaults compiled into the binary
///
/// Individual fields can be overridden by environment variables with prefix
/// `ENCORE` using `__` as a nested separator, e.g. `ENCORE__PORT=8080` or
/// `ENCORE__LOGGING__LEVEL=debug`. Any errors while reading or parsing are
/// printed to stderr and the affected source is skipped.
///
/// Validation errors from [`validate_config`] are logged to stderr but not
/// propagated -- `load()` always returns a `Config`. Callers who need hard
/// failure should call `validate_config` themselves.
#[must_use]
pub fn load() -> Config {
    use std::env;
    use std::io::Read;
    use std::path::PathBuf;

    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    // 1) Inline JSON via env var
    if let Ok(json) = env::var("ENCORE_CONFIG_JSON") {
        if let Some(value) = parse_json_document(&json, "ENCORE_CONFIG_JSON") {
            merge_values(&mut merged, value);
        }
    }

    // 2) JSON from stdin (opt-in)
    if let Ok(val) = env::var("ENCORE_CONFIG_STDIN") {
        if env_var_truthy(&val) {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("Failed to read config from stdin: {e}");
            } else if let Some(value) = parse_json_document(&buf, "stdin") {
                merge_values(&mut merged, value);
            }
        }
    }

    // 3) Explicit path via env var
    if let Ok(path) = env::var("ENCORE_CONFIG_PATH") {
        merge_file_source(&mut merged, &PathBuf::from(path));
    }

    // 4) config.json in CWD
    merge_file_source(&mut merged, Path::new("config.json"));

    // Per-field env overrides
    apply_env_overrides(&mut merged);

    let config: Config = match serde_json::from_value(merged) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid merged configuration, using defaults: {e}");
            Config::default()
        }
    };

    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation warning:\n{e}");
    }

    config
}

fn merge_file_source(merged: &mut Value, path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::read_to_string(path) {
        Ok(contents) => {
            if let Some(value) = parse_json_document(&contents, &path.display().to_string()) {
                merge_values(merged, value);
            }
        }
        Err(e) => eprintln!("Failed to read config file {}: {e}", path.display()),
    }
}

fn parse_json_document(document: &str, source: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(document) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(_) => {
            eprintln!("Config source {source} is not a JSON object, skipping");
            None
        }
        Err(e) => {
            eprintln!("Failed to parse config from {source}: {e}");
            None
        }
    }
}

/// Deep-merge `overlay` into `base`. Objects merge recursively; everything
/// else replaces.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay) => *base_slot = overlay,
    }
}

fn env_var_truthy(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Apply `ENCORE__SECTION__FIELD=value` overrides. Values parse as JSON when
/// possible (numbers, booleans) and fall back to strings.
fn apply_env_overrides(merged: &mut Value) {
    for (key, raw) in std::env::vars() {
        let Some(rest) = key.strip_prefix("ENCORE__") else {
            continue;
        };
        let path: Vec<String> = rest
            .split("__")
            .map(|part| part.to_ascii_lowercase())
            .collect();
        if path.iter().any(String::is_empty) {
            continue;
        }

        let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
        set_path(merged, &path, value);
    }
}

fn set_path(target: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    let Value::Object(map) = target else {
        return;
    };

    if rest.is_empty() {
        map.insert(head.clone(), value);
        return;
    }

    let slot = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    set_path(slot, rest, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn merge_replaces_scalars_and_merges_objects() {
        let mut base = serde_json::json!({"port": 3536, "server": {"max_players": 10}});
        merge_values(
            &mut base,
            serde_json::json!({"port": 8080, "server": {"sweep_interval": 60}}),
        );
        assert_eq!(base["port"], 8080);
        assert_eq!(base["server"]["max_players"], 10);
        assert_eq!(base["server"]["sweep_interval"], 60);
    }

    #[test]
    fn non_object_documents_are_rejected() {
        assert!(parse_json_document("[1,2,3]", "test").is_none());
        assert!(parse_json_document("not json", "test").is_none());
        assert!(parse_json_document("{\"a\":1}", "test").is_some());
    }

    #[test]
    #[serial]
    fn env_override_sets_nested_field() {
        std::env::set_var("ENCORE__SERVER__MAX_PLAYERS", "4");
        std::env::set_var("ENCORE__PORT", "9000");
        let mut merged = serde_json::to_value(Config::default()).unwrap();
        apply_env_overrides(&mut merged);
        std::env::remove_var("ENCORE__SERVER__MAX_PLAYERS");
        std::env::remove_var("ENCORE__PORT");

        assert_eq!(merged["server"]["max_players"], 4);
        assert_eq!(merged["port"], 9000);
    }

    #[test]
    #[serial]
    fn inline_json_overrides_defaults() {
        std::env::set_var("ENCORE_CONFIG_JSON", r#"{"port": 4444}"#);
        let config = load();
        std::env::remove_var("ENCORE_CONFIG_JSON");

        assert_eq!(config.port, 4444);
        assert_eq!(config.server.max_players, 10);
    }

    #[test]
    #[serial]
    fn defaults_survive_a_clean_environment() {
        std::env::remove_var("ENCORE_CONFIG_JSON");
        std::env::remove_var("ENCORE_CONFIG_PATH");
        let config = load();
        assert_eq!(config.port, 3536);
        assert_eq!(config.websocket.pong_wait_secs, 60);
    }
}

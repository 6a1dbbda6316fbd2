//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Load configuration by layering JSON documents over the compiled-in
/// defaults, in ascending precedence:
/// 1) `config.json` in the current working directory
/// 2) File pointed to by `MORTPION_CONFIG_PATH`
/// 3) `MORTPION_CONFIG_JSON` env var containing raw JSON
///
/// Individual fields can additionally be overridden by environment variables
/// prefixed `MORTPION__` with `__` as the nesting separator, e.g.
/// `MORTPION__PORT=8080` or `MORTPION__GAME__TURN_TIMEOUT_MS=30000`. Those
/// win over every document.
///
/// A source that cannot be read or parsed is reported to stderr and skipped;
/// `load()` always returns a `Config`. Callers who need hard failure should
/// run [`validate_config`] on the result themselves (main.rs does).
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut doc = serde_json::to_value(&defaults).unwrap_or(Value::Null);

    for (label, raw) in collect_sources() {
        match serde_json::from_str::<Value>(&raw) {
            Ok(patch) => overlay(&mut doc, patch),
            Err(err) => eprintln!("Ignoring config from {label}: {err}"),
        }
    }

    apply_env_overrides(&mut doc);

    let config = match serde_json::from_value::<Config>(doc) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    };

    // Warn-only here; main.rs validates again and propagates the error.
    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation error: {e}");
    }

    config
}

/// Raw JSON documents to layer, weakest first. Missing sources are simply
/// absent; present-but-unreadable ones are reported and skipped.
fn collect_sources() -> Vec<(String, String)> {
    let mut sources = Vec::new();

    let cwd_file = Path::new("config.json");
    if cwd_file.exists() {
        match fs::read_to_string(cwd_file) {
            Ok(raw) => sources.push(("file config.json".to_string(), raw)),
            Err(err) => eprintln!("Failed to read config.json: {err}"),
        }
    }

    if let Ok(path) = std::env::var("MORTPION_CONFIG_PATH") {
        match fs::read_to_string(&path) {
            Ok(raw) => sources.push((format!("file {path}"), raw)),
            Err(err) => eprintln!("Failed to read config from {path}: {err}"),
        }
    }

    if let Ok(raw) = std::env::var("MORTPION_CONFIG_JSON") {
        if !raw.trim().is_empty() {
            sources.push(("MORTPION_CONFIG_JSON".to_string(), raw));
        }
    }

    sources
}

/// Deep-merge `patch` into `doc`: two objects merge key-wise, anything else
/// replaces the target outright.
fn overlay(doc: &mut Value, patch: Value) {
    match (doc, patch) {
        (Value::Object(target), Value::Object(fields)) => {
            for (key, value) in fields {
                overlay(target.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, patch) => *slot = patch,
    }
}

fn apply_env_overrides(doc: &mut Value) {
    for (key, raw_value) in std::env::vars() {
        let Some(stripped) = key.strip_prefix("MORTPION__") else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        set_nested_value(doc, &segments, parse_scalar(raw_value.trim()));
    }
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Walk `segments` into `target`, coercing anything that is not an object
/// along the way, and set the leaf.
fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };
    if rest.is_empty() {
        map.insert(head.clone(), value);
    } else {
        set_nested_value(map.entry(head.clone()).or_insert(Value::Null), rest, value);
    }
}

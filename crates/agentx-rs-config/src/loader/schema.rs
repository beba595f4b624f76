//! Schema validation helpers for AgentX JSON5 configuration.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    let allowed = ["$schema", "model", "memory", "sessions", "prompts", "timeouts"];
    ensure_allowed_keys(map, &allowed, layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("model") {
        validate_model(value, layer, "model")?;
    }
    if let Some(value) = map.get("memory") {
        validate_memory(value, layer, "memory")?;
    }
    if let Some(value) = map.get("sessions") {
        validate_sessions(value, layer, "sessions")?;
    }
    if let Some(value) = map.get("prompts") {
        validate_prompts(value, layer, "prompts")?;
    }
    if let Some(value) = map.get("timeouts") {
        validate_timeouts(value, layer, "timeouts")?;
    }

    Ok(())
}

/// Validate the "model" block.
fn validate_model(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["provider", "chat_model", "embedding_model", "temperature"],
        layer,
        path,
    )?;

    for key in ["provider", "chat_model", "embedding_model"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("temperature") {
        expect_f64(value, layer, &join_path(path, "temperature"))?;
    }
    Ok(())
}

/// Validate the "memory" block.
fn validate_memory(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = [
        "path",
        "recall_k",
        "seed_text",
        "dimension",
        "metric",
        "capture",
    ];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    if let Some(value) = map.get("path") {
        expect_string(value, layer, &join_path(path, "path"))?;
    }
    if let Some(value) = map.get("recall_k") {
        expect_u64(value, layer, &join_path(path, "recall_k"))?;
    }
    if let Some(value) = map.get("seed_text") {
        expect_string(value, layer, &join_path(path, "seed_text"))?;
    }
    if let Some(value) = map.get("dimension") {
        expect_optional_u64(value, layer, &join_path(path, "dimension"))?;
    }
    if let Some(value) = map.get("metric") {
        validate_metric(value, layer, &join_path(path, "metric"))?;
    }
    if let Some(value) = map.get("capture") {
        validate_memory_capture(value, layer, &join_path(path, "capture"))?;
    }
    Ok(())
}

/// Validate similarity metric values.
fn validate_metric(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let Some(metric) = value.as_str() else {
        return Err(invalid_field(layer, path, "expected string"));
    };
    if matches!(metric, "cosine" | "dot" | "euclidean") {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "invalid metric"))
    }
}

/// Validate memory capture configuration.
fn validate_memory_capture(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = [
        "deny_patterns",
        "redact_patterns",
        "max_record_chars",
        "detect_secrets",
        "secret_entropy_threshold",
        "redaction_replacement",
    ];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    if let Some(value) = map.get("deny_patterns") {
        validate_string_array(value, layer, &join_path(path, "deny_patterns"))?;
    }
    if let Some(value) = map.get("redact_patterns") {
        validate_string_array(value, layer, &join_path(path, "redact_patterns"))?;
    }
    if let Some(value) = map.get("max_record_chars") {
        expect_optional_u64(value, layer, &join_path(path, "max_record_chars"))?;
    }
    if let Some(value) = map.get("detect_secrets") {
        expect_bool(value, layer, &join_path(path, "detect_secrets"))?;
    }
    if let Some(value) = map.get("secret_entropy_threshold") {
        expect_f64(value, layer, &join_path(path, "secret_entropy_threshold"))?;
    }
    if let Some(value) = map.get("redaction_replacement") {
        expect_string(value, layer, &join_path(path, "redaction_replacement"))?;
    }
    Ok(())
}

/// Validate session transcript configuration.
fn validate_sessions(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["enabled", "path", "history_window"], layer, path)?;

    if let Some(value) = map.get("enabled") {
        expect_bool(value, layer, &join_path(path, "enabled"))?;
    }
    if let Some(value) = map.get("path") {
        expect_string(value, layer, &join_path(path, "path"))?;
    }
    if let Some(value) = map.get("history_window") {
        expect_u64(value, layer, &join_path(path, "history_window"))?;
    }
    Ok(())
}

/// Validate prompt overrides.
fn validate_prompts(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["reformulate", "answer", "no_context", "min_context_score"],
        layer,
        path,
    )?;

    for key in ["reformulate", "answer", "no_context"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("min_context_score")
        && !value.is_null()
    {
        expect_f64(value, layer, &join_path(path, "min_context_score"))?;
    }
    Ok(())
}

/// Validate timeout settings.
fn validate_timeouts(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let keys = ["embedding_ms", "llm_ms", "persist_ms"];
    ensure_allowed_keys(map, &keys, layer, path)?;

    for key in keys {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if matches!(value, Value::Bool(_)) {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Expect a non-negative JSON integer.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Expect a non-negative JSON integer or null.
fn expect_optional_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_null() {
        Ok(())
    } else {
        expect_u64(value, layer, path)
    }
}

fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_f64() || value.is_u64() || value.is_i64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Validate that a value is an array of strings.
fn validate_string_array(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let Value::Array(arr) = value else {
        return Err(invalid_field(layer, path, "expected array"));
    };
    for (idx, entry) in arr.iter().enumerate() {
        if entry.as_str().is_none() {
            return Err(invalid_field(
                layer,
                &format!("{path}[{idx}]"),
                "expected string",
            ));
        }
    }
    Ok(())
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}

//! Tests for layered configuration loading.

use super::*;
use crate::MemoryMetric;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Options that only look inside the temp dir.
fn isolated_options(cwd: &Path) -> LayeredConfigOptions {
    let mut options = LayeredConfigOptions::new(cwd);
    options.system_config_path = None;
    options.user_config_path = None;
    options.requirements_path = None;
    options
}

#[test]
fn parse_minimal_config() {
    let config = AgentxConfig::load_from_str("{}").expect("config");
    assert_eq!(config.model.chat_model, "gpt-4o-mini");
    assert_eq!(config.model.temperature, 0.5);
    assert_eq!(config.memory.recall_k, 4);
    assert_eq!(config.memory.path, ".agentx/memory");
    assert_eq!(config.memory.seed_text, "Initial AgentX memory.");
    assert_eq!(config.memory.metric, MemoryMetric::Cosine);
    assert_eq!(config.sessions.history_window, 20);
    assert!(config.prompts.answer.contains("{context}"));
    assert_eq!(config.timeouts.llm_ms, 60_000);
}

#[test]
fn parses_json5_overrides() {
    let json5 = r#"{
        // comments are allowed
        model: { chat_model: "gpt-4o", temperature: 0.0 },
        memory: { recall_k: 8, metric: "dot", dimension: 1536 },
        prompts: { min_context_score: 0.25 },
    }"#;
    let config = AgentxConfig::load_from_str(json5).expect("config");
    assert_eq!(config.model.chat_model, "gpt-4o");
    assert_eq!(config.memory.recall_k, 8);
    assert_eq!(config.memory.metric, MemoryMetric::Dot);
    assert_eq!(config.memory.dimension, Some(1536));
    assert_eq!(config.prompts.min_context_score, Some(0.25));
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = AgentxConfig::load_from_str("{ unexpected: true }").unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("config:unexpected"));
    assert!(msg.contains("unknown key"));
}

#[test]
fn rejects_invalid_metric() {
    let err = AgentxConfig::load_from_str(r#"{ memory: { metric: "manhattan" } }"#).unwrap_err();
    assert!(format!("{err}").contains("memory.metric"));
}

#[test]
fn rejects_wrongly_typed_field() {
    let err = AgentxConfig::load_from_str(r#"{ memory: { recall_k: "four" } }"#).unwrap_err();
    assert!(format!("{err}").contains("memory.recall_k"));
}

#[test]
fn validate_rejects_zero_recall_k() {
    let err = AgentxConfig::load_from_str("{ memory: { recall_k: 0 } }").unwrap_err();
    assert!(format!("{err}").contains("recall_k"));
}

#[test]
fn validate_rejects_answer_prompt_without_placeholder() {
    let err =
        AgentxConfig::load_from_str(r#"{ prompts: { answer: "Just answer." } }"#).unwrap_err();
    assert!(format!("{err}").contains("{context}"));
}

#[test]
fn validate_rejects_zero_timeout() {
    let err = AgentxConfig::load_from_str("{ timeouts: { persist_ms: 0 } }").unwrap_err();
    assert!(format!("{err}").contains("timeouts.persist_ms"));
}

#[test]
fn validate_rejects_uncompilable_capture_pattern() {
    let err = AgentxConfig::load_from_str(
        r#"{ memory: { capture: { deny_patterns: ["(?i)password", "("] } } }"#,
    )
    .unwrap_err();
    match err {
        ConfigError::InvalidField { path, .. } => {
            assert_eq!(path, "memory.capture.deny_patterns[1]");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn layered_config_prefers_repo_over_cwd() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let project_root = root.join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    let cwd = project_root.join("subdir");
    fs::create_dir_all(&cwd).expect("cwd");

    let system_config = root.join("system.json5");
    write_json5(&system_config, "{ memory: { recall_k: 1 } }");
    let user_config = root.join("user.json5");
    write_json5(&user_config, "{ memory: { recall_k: 2 } }");
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ memory: { recall_k: 3 } }",
    );
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), "{ memory: { recall_k: 5 } }");
    write_json5(
        &project_root
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
        "{ memory: { recall_k: 7 } }",
    );

    let mut options = isolated_options(&cwd);
    options.system_config_path = Some(system_config);
    options.user_config_path = Some(user_config);

    let layered = AgentxConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.memory.recall_k, 7);
    let sources: Vec<ConfigLayerSource> =
        layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::System,
            ConfigLayerSource::User,
            ConfigLayerSource::Project,
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Repo,
        ]
    );
}

#[test]
fn layers_merge_nested_sections() {
    let temp = TempDir::new().expect("tmp");
    let cwd = temp.path();
    let system_config = cwd.join("system.json5");
    write_json5(&system_config, r#"{ model: { chat_model: "gpt-4o" } }"#);
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), "{ model: { temperature: 0.1 } }");

    let mut options = isolated_options(cwd);
    options.system_config_path = Some(system_config);

    let layered = AgentxConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.model.chat_model, "gpt-4o");
    assert_eq!(layered.config.model.temperature, 0.1);
}

#[test]
fn requirements_lock_overrides() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();

    let requirements = root.join("requirements.json5");
    write_json5(&requirements, r#"{ memory: { path: "/srv/agentx/memory" } }"#);
    let runtime_config = root.join("runtime.json5");
    write_json5(
        &runtime_config,
        r#"{ memory: { path: "elsewhere", recall_k: 9 } }"#,
    );

    let mut options = isolated_options(root).with_runtime_path(&runtime_config);
    options.requirements_path = Some(requirements);

    let layered = AgentxConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.memory.path, "/srv/agentx/memory");
    assert_eq!(layered.config.memory.recall_k, 9);
    assert_eq!(layered.layers[0].source, ConfigLayerSource::Requirements);
}

#[test]
fn runtime_override_wins_without_constraints() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    write_json5(&root.join(DEFAULT_CONFIG_FILE), "{ memory: { recall_k: 2 } }");
    let runtime_config = root.join("runtime.json5");
    write_json5(&runtime_config, "{ memory: { recall_k: 6 } }");

    let options = isolated_options(root).with_runtime_path(&runtime_config);
    let layered = AgentxConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.memory.recall_k, 6);
}

#[test]
fn missing_runtime_layer_is_an_error() {
    let temp = TempDir::new().expect("tmp");
    let options = isolated_options(temp.path()).with_runtime_path(temp.path().join("nope.json5"));
    let err = AgentxConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn layer_errors_name_the_layer() {
    let temp = TempDir::new().expect("tmp");
    write_json5(
        &temp.path().join(DEFAULT_CONFIG_FILE),
        "{ sessions: { enabled: \"yes\" } }",
    );
    let err = AgentxConfig::load_layered_with_options(isolated_options(temp.path())).unwrap_err();
    match err {
        ConfigError::InvalidField { path, .. } => {
            assert!(path.starts_with("cwd("));
            assert!(path.ends_with(":sessions.enabled"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

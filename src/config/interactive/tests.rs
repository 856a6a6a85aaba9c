use super::load_existing_config as load_existing_config_impl;
use super::{non_empty_model, test_ollama_connection};
use crate::config::OllamaConfig;
use tempfile::TempDir;

#[test]
fn load_existing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "not = [valid")
        .expect("should write broken config");

    let config = load_existing_config_impl(temp_dir.path());
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(config.ollama.batch_size > 0);
}

#[test]
fn model_name_validation() {
    assert!(non_empty_model(&"llama3.2".to_string()).is_ok());
    assert!(non_empty_model(&"  ".to_string()).is_err());
}

#[test]
fn unreachable_ollama_reports_failure() {
    let ollama = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..OllamaConfig::default()
    };
    assert!(!test_ollama_connection(&ollama));
}

use super::*;
use serial_test::serial;
use tempfile::TempDir;

fn test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::with_base_dir(temp_dir.path());
    (config, temp_dir)
}

#[test]
fn default_config() {
    let (config, _temp_dir) = test_config();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.embedding_model, "nomic-embed-text:latest");
    assert_eq!(config.ollama.batch_size, 16);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.retrieval.top_k, 4);
}

#[test]
fn config_validation() {
    let (config, _temp_dir) = test_config();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.chat_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.chunking.chunk_overlap = 1000;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::OverlapTooLarge(1000, 1000))
    ));

    let mut invalid_config = config;
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));
}

#[test]
fn ollama_url_generation() {
    let (config, _temp_dir) = test_config();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_round_trip_keeps_settings() {
    let (mut config, _temp_dir) = test_config();
    config.ollama.protocol = "https".to_string();
    config.retrieval.top_k = 8;

    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let mut parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    parsed_config.base_dir = config.base_dir.clone();

    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_fills_defaults() {
    let partial = r#"
        [ollama]
        host = "gpu-box"

        [chunking]
        chunk_size = 500
    "#;

    let config: Config = toml::from_str(partial).expect("should parse partial toml");
    assert_eq!(config.ollama.host, "gpu-box");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.retrieval.top_k, 4);
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_embedding_model("new-model".to_string()).is_ok());
    assert!(config.set_chat_model("chat-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_protocol("HTTP".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_embedding_model(String::new()).is_err());
    assert!(config.set_chat_model("   ".to_string()).is_err());
    assert!(config.set_batch_size(0).is_err());
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
}

#[test]
fn save_then_load() {
    let (mut config, temp_dir) = test_config();
    config.ollama.chat_model = "mistral:7b".to_string();
    config.save().expect("should save config");

    assert!(temp_dir.path().join("config.toml").exists());

    let loaded = Config::load(temp_dir.path()).expect("should load saved config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ntop_k = 0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn derived_paths() {
    let (config, temp_dir) = test_config();
    assert_eq!(config.database_path(), temp_dir.path().join("documents.db"));
    assert_eq!(
        config.vector_store_path(),
        temp_dir.path().join("vector_store")
    );
    assert_eq!(config.uploads_path(), temp_dir.path().join("uploads"));
}

#[test]
#[serial]
fn config_dir_honours_env_override() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let previous = std::env::var_os(HOME_ENV_VAR);

    // SAFETY: serialized with every other test touching this variable
    unsafe { std::env::set_var(HOME_ENV_VAR, temp_dir.path()) };
    let resolved = Config::config_dir();
    match previous {
        // SAFETY: as above
        Some(value) => unsafe { std::env::set_var(HOME_ENV_VAR, value) },
        // SAFETY: as above
        None => unsafe { std::env::remove_var(HOME_ENV_VAR) },
    }

    assert_eq!(
        resolved.expect("should resolve config dir"),
        temp_dir.path()
    );
}

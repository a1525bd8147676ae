use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.backend, EmbeddingBackend::Ollama);
    assert_eq!(config.embedding.host, "localhost");
    assert_eq!(config.embedding.port, 11434);
    assert_eq!(config.embedding.batch_size, 100);
    assert_eq!(config.generation.api_key_env, "OPENROUTER_API_KEY");
    assert!(!config.generation.auto_accept_cost);
    assert_eq!(config.retrieval.top_k, 12);
    assert_eq!(config.retrieval.context_budget, 4000);
    assert_eq!(config.retrieval.budget_scope, BudgetScope::Context);
    assert!((config.retrieval.relevance_threshold - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.retrieval.top_relevant_cap, 5);
    assert_eq!(config.index.backend, IndexBackend::Lancedb);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.embedding.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.retry_attempts = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.cost_per_1k_tokens = -1.0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.generator_temperature = 3.5;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.index.table = " ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.retrieval.relevance_threshold = 1.5;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn zero_budget_is_rejected() {
    let mut config = Config::default();
    config.retrieval.context_budget = 0;

    let err = config.validate().expect_err("zero budget must fail");
    assert!(matches!(err, ConfigError::InvalidContextBudget(0)));

    assert!(config.retrieval.set_context_budget(0).is_err());
    assert!(config.retrieval.set_context_budget(1).is_ok());
    assert_eq!(config.retrieval.context_budget, 1);
}

#[test]
fn remote_backend_skips_ollama_checks() {
    let mut config = Config::default();
    config.embedding.backend = EmbeddingBackend::Remote;
    config.embedding.port = 0;
    assert!(config.validate().is_ok());

    config.embedding.remote_url = "not a url".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .embedding
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn setter_validation() {
    let mut embedding = EmbeddingConfig::default();

    assert!(embedding.set_protocol("https".to_string()).is_ok());
    assert!(embedding.set_host("example.com".to_string()).is_ok());
    assert!(embedding.set_port(8080).is_ok());
    assert!(embedding.set_model("new-model".to_string()).is_ok());
    assert!(embedding.set_batch_size(128).is_ok());

    assert!(embedding.set_protocol("ftp".to_string()).is_err());
    assert!(embedding.set_port(0).is_err());
    assert!(embedding.set_model(String::new()).is_err());
    assert!(embedding.set_batch_size(0).is_err());

    let mut retrieval = RetrievalConfig::default();
    assert!(retrieval.set_top_k(0).is_err());
    assert!(retrieval.set_top_k(20).is_ok());
    assert_eq!(retrieval.top_k, 20);
}

#[test]
fn partial_toml_uses_section_defaults() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ncontext_budget = 1500\nbudget_scope = \"prompt\"\n\n[index]\nbackend = \"memory\"\n",
    )
    .expect("should write config file");

    let config = Config::load(temp_dir.path()).expect("should load config");
    assert_eq!(config.retrieval.context_budget, 1500);
    assert_eq!(config.retrieval.budget_scope, BudgetScope::Prompt);
    assert_eq!(config.retrieval.top_k, 12);
    assert_eq!(config.index.backend, IndexBackend::Memory);
    assert_eq!(config.embedding, EmbeddingConfig::default());
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn invalid_file_fails_to_load() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ncontext_budget = 0\n",
    )
    .expect("should write config file");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let base_dir = temp_dir.path().join("nested");

    let mut config = Config::load(&base_dir).expect("missing config should load defaults");
    config.generation.auto_accept_cost = true;
    config.retrieval.top_k = 7;
    config.save().expect("should save config");

    assert!(config.config_file_path().exists());

    let reloaded = Config::load(&base_dir).expect("should reload config");
    assert_eq!(config, reloaded);
    assert_eq!(reloaded.vector_database_path(), base_dir.join("vectors"));
}

#[test]
#[serial_test::serial]
fn api_key_lookup() {
    const VAR: &str = "LORE_WHISPER_TEST_KEY";

    // SAFETY: serialized test, no other thread reads this variable
    unsafe { std::env::remove_var(VAR) };
    assert!(matches!(
        api_key_from_env(VAR),
        Err(ConfigError::MissingApiKey(_))
    ));

    // SAFETY: serialized test, no other thread reads this variable
    unsafe { std::env::set_var(VAR, "sk-test") };
    assert_eq!(api_key_from_env(VAR).expect("key is set"), "sk-test");

    // SAFETY: serialized test, no other thread reads this variable
    unsafe { std::env::remove_var(VAR) };
}

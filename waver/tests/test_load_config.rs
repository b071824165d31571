use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use waver::load_config::{
    config_verbose, load_config, GEMINI_API_KEY_ENV, OPENAI_API_KEY_ENV, STORE_ACCESS_KEY_ENV,
    STORE_SECRET_KEY_ENV,
};
use waver_core::config::OutputFormat;

fn clear_env() {
    for var in [
        OPENAI_API_KEY_ENV,
        GEMINI_API_KEY_ENV,
        STORE_ACCESS_KEY_ENV,
        STORE_SECRET_KEY_ENV,
    ] {
        env::remove_var(var);
    }
}

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

#[test]
#[serial]
fn loads_both_sections() {
    clear_env();
    let file = config_file(
        r#"
waver:
  llm-provider: OpenAI
  output-path: ./tmp/output
  verbose: true
  output-format: html
  openai:
    api-key: sk-from-file
minio:
  endpoint: http://localhost:9000
  access-key: minioadmin
  secret-key: minioadmin
  bucket-name: waver-bucket
"#,
    );

    let config = load_config(file.path()).expect("Config should load");
    assert_eq!(config.waver.llm_provider.as_deref(), Some("OpenAI"));
    assert_eq!(config.waver.output_path, PathBuf::from("./tmp/output"));
    assert!(config.waver.verbose);
    assert_eq!(config.waver.output_format, OutputFormat::Html);
    assert_eq!(config.waver.openai.api_key.as_deref(), Some("sk-from-file"));
    assert_eq!(config.waver.gemini.api_key, None);
    assert_eq!(config.minio.endpoint, "http://localhost:9000");
    assert_eq!(config.minio.bucket_name, "waver-bucket");
    assert!(config_verbose(file.path()));
}

#[test]
#[serial]
fn waver_section_is_optional_and_defaults_apply() {
    clear_env();
    let file = config_file(
        r#"
minio:
  endpoint: file:///tmp/waver-store
  bucket-name: waver-bucket
"#,
    );

    let config = load_config(file.path()).expect("Config should load");
    assert_eq!(config.waver.llm_provider, None);
    assert_eq!(config.waver.output_path, PathBuf::from("output"));
    assert_eq!(config.waver.output_format, OutputFormat::Markdown);
    assert!(!config.waver.verbose);
    assert_eq!(config.minio.access_key, "");
    assert!(!config_verbose(file.path()));
}

#[test]
#[serial]
fn unknown_provider_is_not_a_load_error() {
    clear_env();
    let file = config_file(
        r#"
waver:
  llm-provider: Claude
minio:
  endpoint: http://localhost:9000
  bucket-name: b
"#,
    );
    let config = load_config(file.path()).expect("provider is validated lazily");
    assert_eq!(config.waver.llm_provider.as_deref(), Some("Claude"));
}

#[test]
#[serial]
fn environment_secrets_override_the_file() {
    clear_env();
    let file = config_file(
        r#"
waver:
  llm-provider: Gemini
  openai:
    api-key: sk-from-file
minio:
  endpoint: http://localhost:9000
  access-key: from-file
  bucket-name: b
"#,
    );
    env::set_var(OPENAI_API_KEY_ENV, "sk-from-env");
    env::set_var(GEMINI_API_KEY_ENV, "g-from-env");
    env::set_var(STORE_ACCESS_KEY_ENV, "access-from-env");
    env::set_var(STORE_SECRET_KEY_ENV, "   ");

    let config = load_config(file.path()).expect("Config should load");
    clear_env();

    assert_eq!(config.waver.openai.api_key.as_deref(), Some("sk-from-env"));
    assert_eq!(config.waver.gemini.api_key.as_deref(), Some("g-from-env"));
    assert_eq!(config.minio.access_key, "access-from-env");
    // Blank environment values are ignored.
    assert_eq!(config.minio.secret_key, "");
}

#[test]
#[serial]
fn missing_or_malformed_files_fail() {
    clear_env();
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));

    let file = config_file("waver: [unclosed");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));

    let file = config_file("waver:\n  verbose: true\n");
    assert!(load_config(file.path()).is_err(), "the minio section is required");
    assert!(config_verbose(file.path()));
}

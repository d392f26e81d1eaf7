/*!
 * Tests for configuration loading and the settings derived from it
 */

use std::path::Path;
use std::time::Duration;

use doctrans::app_config::Config;
use doctrans::formats::OutputMode;
use doctrans::task::ProviderKind;

use crate::common;

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.target_language, "中文");
    assert_eq!(config.translation.provider, ProviderKind::OpenAI);

    let reloaded = Config::load_or_create(&path).unwrap();
    assert_eq!(reloaded.translation.common.threads, config.translation.common.threads);
}

#[test]
fn test_deserialize_withPartialFile_shouldFillDefaults() {
    let json = r#"{
        "target_language": "English",
        "output_mode": "both",
        "translation": {
            "provider": "baidu",
            "available_providers": [{ "type": "baidu", "app_id": "2015", "app_key": "secret" }]
        }
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();
    assert_eq!(config.output_mode, OutputMode::Bilingual);
    assert_eq!(config.translation.provider, ProviderKind::Baidu);
    assert_eq!(config.translation.common.threads, 5);
    assert_eq!(config.translation.common.max_retries, 3);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_withMissingCredentials_shouldFail() {
    let mut config = Config::default();
    assert!(config.validate().is_err());

    config.translation.active_provider_config_mut().api_key = "sk-live".to_string();
    assert!(config.validate().is_ok());

    config.translation.provider = ProviderKind::Baidu;
    assert!(config.validate().is_err());
}

#[test]
fn test_jobSettings_withDefaults_shouldUseConfiguredBackoff() {
    let settings = Config::default().job_settings();
    assert_eq!(settings.retry.max_retries, 3);
    assert_eq!(settings.retry.retry_delay, Duration::from_millis(5000));
    assert_eq!(settings.retry.rate_limit_multiplier, 2);
    assert_eq!(settings.progress.step, 15.0);
    assert_eq!(settings.limits.csv_max_chunk_size, 1500);
}

#[test]
fn test_taskFor_shouldCarryActiveProviderAndMode() {
    let mut config = Config::default();
    config.target_language = "English".to_string();
    config.output_mode = OutputMode::InheritBilingual;
    config.translation.common.threads = 42;
    {
        let provider = config.translation.active_provider_config_mut();
        provider.api_key = "sk-live".to_string();
        provider.backup_model = Some("gpt-4o".to_string());
    }

    let task = config.task_for(Path::new("in/a.docx"), Path::new("out/a.English.docx"));
    assert_eq!(task.lang, "English");
    assert_eq!(task.server, ProviderKind::OpenAI);
    assert_eq!(task.model, "gpt-4o-mini");
    assert_eq!(task.api_key, "sk-live");
    assert_eq!(task.output_mode(), OutputMode::InheritBilingual);
    assert_eq!(task.thread_count(), 10);
    assert_eq!(task.fallback_model().as_deref(), Some("gpt-4o"));
    assert_eq!(task.extension(), "docx");
}

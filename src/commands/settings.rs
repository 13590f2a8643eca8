use crate::llm::{self, ModelProvider, ProviderId};
use crate::settings::{get_settings, write_settings, AppSettings, SettingsStore};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    pub api_provider: ProviderId,
    pub api_keys: HashMap<String, String>,
    pub selected_models: HashMap<String, String>,
    pub spell_enabled: bool,
    pub grammar_enabled: bool,
}

fn parse_provider(provider_id: &str) -> Result<ProviderId, String> {
    ProviderId::parse(provider_id).ok_or_else(|| format!("Unknown provider: {}", provider_id))
}

/// Shortest OpenRouter key accepted.
const MIN_OPENROUTER_KEY_LEN: usize = 20;

fn validate_api_key(provider: ProviderId, api_key: &str) -> Result<(), String> {
    if api_key.is_empty() {
        return Err("Please enter an API key for the selected provider".to_string());
    }
    if provider == ProviderId::DeepSeek {
        if !api_key.starts_with("sk-") {
            return Err(
                "Error: OpenRouter API keys must start with \"sk-\". Please check your key and try again."
                    .to_string(),
            );
        }
        if api_key.chars().count() < MIN_OPENROUTER_KEY_LEN {
            return Err("Warning: API key seems too short. Typical OpenRouter keys are 40+ characters. Please verify your key.".to_string());
        }
    }
    Ok(())
}

fn update<S, F>(store: &S, change: F) -> Result<(), String>
where
    S: SettingsStore + ?Sized,
    F: FnOnce(&mut AppSettings),
{
    let mut settings = get_settings(store);
    change(&mut settings);
    write_settings(store, &settings).map_err(|e| format!("{:#}", e))
}

pub fn get_providers() -> Vec<ModelProvider> {
    llm::get_available_providers()
}

pub fn get_check_config<S: SettingsStore + ?Sized>(store: &S) -> CheckConfig {
    let settings = get_settings(store);
    CheckConfig {
        api_provider: settings.api_provider,
        api_keys: settings.api_keys,
        selected_models: settings.selected_models,
        spell_enabled: settings.spell_enabled,
        grammar_enabled: settings.grammar_enabled,
    }
}

pub fn set_provider<S: SettingsStore + ?Sized>(store: &S, provider_id: &str) -> Result<(), String> {
    let provider = parse_provider(provider_id)?;
    info!("Switching provider to {}", provider);
    update(store, |settings| settings.api_provider = provider)
}

pub fn set_api_key<S: SettingsStore + ?Sized>(
    store: &S,
    provider_id: &str,
    api_key: &str,
) -> Result<(), String> {
    let provider = parse_provider(provider_id)?;
    let api_key = api_key.trim();
    validate_api_key(provider, api_key)?;
    update(store, |settings| {
        settings
            .api_keys
            .insert(provider.to_string(), api_key.to_string());
    })
}

pub fn set_model<S: SettingsStore + ?Sized>(
    store: &S,
    provider_id: &str,
    model_id: &str,
) -> Result<(), String> {
    let provider = parse_provider(provider_id)?;
    update(store, |settings| {
        settings
            .selected_models
            .insert(provider.to_string(), model_id.to_string());
    })
}

pub fn set_default_checks<S: SettingsStore + ?Sized>(
    store: &S,
    spell_enabled: bool,
    grammar_enabled: bool,
) -> Result<(), String> {
    update(store, |settings| {
        settings.spell_enabled = spell_enabled;
        settings.grammar_enabled = grammar_enabled;
    })
}

pub async fn test_provider_connection(provider_id: &str, api_key: &str) -> Result<bool, String> {
    let provider = parse_provider(provider_id)?;
    if api_key.trim().is_empty() {
        return Err("Please enter an API key".to_string());
    }
    llm::test_connection(provider, api_key)
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryStore;

    #[test]
    fn test_settings_handlers_persist() {
        let store = MemoryStore::new();

        set_provider(&store, "gemini").unwrap();
        set_api_key(&store, "gemini", "  AIza-key  ").unwrap();
        set_model(&store, "gemini", "gemini-2.5-flash").unwrap();
        set_default_checks(&store, true, false).unwrap();

        let config = get_check_config(&store);
        assert_eq!(config.api_provider, ProviderId::Gemini);
        assert_eq!(config.api_keys["gemini"], "AIza-key");
        assert_eq!(config.selected_models["gemini"], "gemini-2.5-flash");
        assert_eq!(
            config.selected_models["deepseek"],
            ProviderId::DeepSeek.default_model()
        );
        assert!(config.spell_enabled);
        assert!(!config.grammar_enabled);
    }

    #[test]
    fn test_api_key_is_validated_before_saving() {
        let store = MemoryStore::new();

        assert_eq!(
            set_api_key(&store, "gemini", "   "),
            Err("Please enter an API key for the selected provider".to_string())
        );
        assert_eq!(
            set_api_key(&store, "deepseek", "or-v1-0123456789abcdef0123456789"),
            Err("Error: OpenRouter API keys must start with \"sk-\". Please check your key and try again.".to_string())
        );
        assert!(set_api_key(&store, "deepseek", "sk-or-short")
            .unwrap_err()
            .starts_with("Warning: API key seems too short"));
        assert!(get_check_config(&store).api_keys.is_empty());

        set_api_key(&store, "deepseek", " sk-or-v1-0123456789abcdef ").unwrap();
        assert_eq!(
            get_check_config(&store).api_keys["deepseek"],
            "sk-or-v1-0123456789abcdef"
        );
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let store = MemoryStore::new();
        assert_eq!(
            set_provider(&store, "openai"),
            Err("Unknown provider: openai".to_string())
        );
        assert_eq!(get_check_config(&store).api_provider, ProviderId::DeepSeek);
    }

    #[tokio::test]
    async fn test_connection_requires_key() {
        assert_eq!(
            test_provider_connection("deepseek", "   ").await,
            Err("Please enter an API key".to_string())
        );
        assert!(test_provider_connection("nope", "key").await.is_err());
    }

    #[test]
    fn test_providers_listed() {
        let ids: Vec<_> = get_providers().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![ProviderId::DeepSeek, ProviderId::Gemini]);
    }
}

use waver_core::config::{ConfigError, LlmProvider, ProviderConfig, ProviderKeys, WaverSettings};
use waver_core::provider::resolve;

fn settings(provider: Option<&str>, openai: Option<&str>, gemini: Option<&str>) -> WaverSettings {
    WaverSettings {
        llm_provider: provider.map(str::to_string),
        openai: ProviderKeys {
            api_key: openai.map(str::to_string),
        },
        gemini: ProviderKeys {
            api_key: gemini.map(str::to_string),
        },
        ..WaverSettings::default()
    }
}

#[test]
fn openai_with_key_resolves_to_that_key() {
    let resolved = resolve(&settings(Some("OpenAI"), Some("sk-test"), None)).unwrap();
    assert_eq!(
        resolved,
        ProviderConfig::OpenAi {
            api_key: "sk-test".to_string()
        }
    );
    assert_eq!(resolved.api_key(), "sk-test");
    assert_eq!(resolved.provider(), LlmProvider::OpenAi);
}

#[test]
fn gemini_with_key_resolves_to_that_key() {
    let resolved = resolve(&settings(Some("Gemini"), Some("unused"), Some("g-key"))).unwrap();
    assert_eq!(
        resolved,
        ProviderConfig::Gemini {
            api_key: "g-key".to_string()
        }
    );
}

#[test]
fn selector_is_case_insensitive() {
    let resolved = resolve(&settings(Some("openai"), Some("k"), None)).unwrap();
    assert_eq!(resolved.provider(), LlmProvider::OpenAi);
}

#[test]
fn missing_selector_lists_valid_options() {
    let err = resolve(&settings(None, Some("k"), Some("k"))).unwrap_err();
    let ConfigError::Missing(message) = err else {
        panic!("expected a missing-configuration error, got {err:?}");
    };
    assert!(message.contains("waver.llm-provider"), "{message}");
    assert!(message.contains("[OpenAI, Gemini]"), "{message}");
}

#[test]
fn blank_and_unknown_selectors_fail() {
    for selector in ["", "   ", "Claude", "openai-compatible"] {
        let err = resolve(&settings(Some(selector), Some("k"), Some("k"))).unwrap_err();
        assert!(
            matches!(err, ConfigError::Missing(ref m) if m.contains("Valid options are")),
            "selector {selector:?} gave {err:?}"
        );
    }
}

#[test]
fn missing_key_names_the_property() {
    let err = resolve(&settings(Some("OpenAI"), None, Some("g"))).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Missing("Property 'waver.openai.api-key' was not set for OpenAI provider.".to_string())
    );

    let err = resolve(&settings(Some("Gemini"), Some("o"), Some("  "))).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Missing("Property 'waver.gemini.api-key' was not set for Gemini provider.".to_string())
    );
}

#[test]
fn debug_output_never_contains_the_key() {
    let resolved = resolve(&settings(Some("OpenAI"), Some("sk-secret"), None)).unwrap();
    assert!(!format!("{resolved:?}").contains("sk-secret"));
}

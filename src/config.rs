use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::warn;
use url::Url;

/// Runtime configuration, read from the environment once at startup and
/// passed explicitly to whatever needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub api_base: String,
    pub image_model: String,
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub max_output_tokens: i32,
    pub safety_settings: String,
    pub request_timeout_seconds: u64,
    pub model_cache_path: PathBuf,
    pub log_level: String,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_safety_settings(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }

    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "permissive" | "off" | "none" => "permissive".to_string(),
        "standard" => "standard".to_string(),
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            "permissive".to_string()
        }
    }
}

fn normalize_api_base(value: String) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|err| anyhow!("GEMINI_API_BASE is not a valid URL ({trimmed}): {err}"))?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(anyhow!(
            "GEMINI_API_BASE must be an http(s) URL, got {trimmed}"
        ));
    }
    Ok(trimmed.to_string())
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_base = normalize_api_base(env_string(
            "GEMINI_API_BASE",
            "https://generativelanguage.googleapis.com",
        ))?;

        Ok(Config {
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            api_base,
            image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            top_k: env_i32("GEMINI_TOP_K", 40),
            top_p: env_f32("GEMINI_TOP_P", 0.95),
            max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 2048),
            safety_settings: normalize_safety_settings(env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
            request_timeout_seconds: env_u64("REQUEST_TIMEOUT_SECONDS", 90),
            model_cache_path: PathBuf::from(env_string("MODEL_CACHE_PATH", "model_cache.json")),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
        })
    }

    /// The credential is only required for commands that reach the network;
    /// offline commands work without it.
    pub fn require_api_key(&self) -> Result<&str> {
        let key = self.gemini_api_key.trim();
        if key.is_empty() {
            return Err(anyhow!(
                "GEMINI_API_KEY is not set. Export it or add it to a .env file before generating."
            ));
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_safety_profile_falls_back_to_permissive() {
        assert_eq!(normalize_safety_settings("strict".to_string()), "permissive");
        assert_eq!(normalize_safety_settings("OFF".to_string()), "permissive");
        assert_eq!(normalize_safety_settings("standard".to_string()), "standard");
    }

    #[test]
    fn api_base_rejects_non_url_values() {
        assert!(normalize_api_base("not a url".to_string()).is_err());
        assert_eq!(
            normalize_api_base("https://example.com/".to_string()).unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn env_parsers_fall_back_on_garbage() {
        std::env::set_var("NANOBANANA_TEST_F32", "not-a-number");
        assert_eq!(env_f32("NANOBANANA_TEST_F32", 0.7), 0.7);
        std::env::set_var("NANOBANANA_TEST_U64", "12");
        assert_eq!(env_u64("NANOBANANA_TEST_U64", 90), 12);
    }
}

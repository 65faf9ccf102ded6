use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::llm::gemini::GenerationError;
use crate::utils::http::get_http_client;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|method| method == "generateContent")
    }

    /// The listing endpoint returns names as `models/<id>`; the short id is
    /// what `generateContent` and the CLI use.
    pub fn short_name(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelCacheFile {
    fetched_at: DateTime<Utc>,
    models: Vec<ModelInfo>,
}

pub async fn list_models(config: &Config) -> Result<Vec<ModelInfo>, GenerationError> {
    let client = get_http_client();
    let url = format!(
        "{}/v1beta/models?pageSize=200&key={}",
        config.api_base, config.gemini_api_key
    );

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|err| GenerationError::Transport(err.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, body_summary) = crate::llm::gemini::summarize_error_body(&body);
        return Err(GenerationError::Api {
            status,
            detail: message.unwrap_or(body_summary),
        });
    }

    let listing = response
        .json::<ListModelsResponse>()
        .await
        .map_err(|err| GenerationError::Transport(format!("invalid response body: {err}")))?;

    Ok(listing
        .models
        .into_iter()
        .filter(ModelInfo::supports_generation)
        .collect())
}

/// Best-effort cache of the last successful listing; overwritten whole on
/// every refetch. Any read failure reads as "no cache".
pub fn store_model_cache(path: &Path, models: &[ModelInfo]) {
    let cache = ModelCacheFile {
        fetched_at: Utc::now(),
        models: models.to_vec(),
    };
    let serialized = match serde_json::to_string_pretty(&cache) {
        Ok(serialized) => serialized,
        Err(err) => {
            info!("Failed to serialize model cache: {err}");
            return;
        }
    };
    if let Err(err) = fs::write(path, serialized) {
        info!("Failed to write model cache at {}: {err}", path.display());
    }
}

pub fn load_model_cache(path: &Path) -> Option<Vec<ModelInfo>> {
    if !path.exists() {
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            info!("Failed to read model cache at {}: {err}", path.display());
            return None;
        }
    };

    match serde_json::from_str::<ModelCacheFile>(&raw) {
        Ok(cache) => Some(cache.models),
        Err(err) => {
            info!("Failed to parse model cache at {}: {err}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, methods: &[&str]) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            display_name: String::new(),
            description: String::new(),
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn short_name_strips_models_prefix() {
        let info = model("models/gemini-2.5-flash-image", &["generateContent"]);
        assert_eq!(info.short_name(), "gemini-2.5-flash-image");
        let bare = model("gemini-2.5-flash-image", &[]);
        assert_eq!(bare.short_name(), "gemini-2.5-flash-image");
    }

    #[test]
    fn generation_support_requires_generate_content() {
        assert!(model("m", &["embedContent", "generateContent"]).supports_generation());
        assert!(!model("m", &["embedContent"]).supports_generation());
    }

    #[test]
    fn listing_response_tolerates_missing_models_field() {
        let listing: ListModelsResponse = serde_json::from_str("{}").unwrap();
        assert!(listing.models.is_empty());
    }

    #[test]
    fn cache_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_cache.json");

        let models = vec![model("models/gemini-2.5-flash-image", &["generateContent"])];
        store_model_cache(&path, &models);

        let loaded = load_model_cache(&path).expect("cache should load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].short_name(), "gemini-2.5-flash-image");
    }

    #[test]
    fn missing_or_corrupt_cache_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(load_model_cache(&missing).is_none());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "not json").unwrap();
        assert!(load_model_cache(&corrupt).is_none());
    }
}

use anyhow::Result;
use tracing::warn;

use crate::config::Config;
use crate::llm::models::{list_models, load_model_cache, store_model_cache, ModelInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    Remote,
    Cache,
}

#[derive(Debug)]
pub struct ModelCatalog {
    pub models: Vec<ModelInfo>,
    pub source: CatalogSource,
}

/// Everything a single run needs: the configuration plus the best-effort
/// model catalog cache. Passed explicitly; no global state.
pub struct Session {
    pub config: Config,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Session { config }
    }

    /// Fetch the model list and overwrite the cache on success. When the
    /// listing endpoint is unreachable the previous cache, if any, is
    /// served instead.
    pub async fn available_models(&self) -> Result<ModelCatalog> {
        match list_models(&self.config).await {
            Ok(models) => {
                store_model_cache(&self.config.model_cache_path, &models);
                Ok(ModelCatalog {
                    models,
                    source: CatalogSource::Remote,
                })
            }
            Err(err) => {
                warn!("Model listing failed: {err}");
                match load_model_cache(&self.config.model_cache_path) {
                    Some(models) => Ok(ModelCatalog {
                        models,
                        source: CatalogSource::Cache,
                    }),
                    None => Err(err.into()),
                }
            }
        }
    }

    pub fn cached_models(&self) -> Option<ModelCatalog> {
        load_model_cache(&self.config.model_cache_path).map(|models| ModelCatalog {
            models,
            source: CatalogSource::Cache,
        })
    }
}

use std::{sync::Arc, time::Instant};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tokio::task;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{Classifier, ModelLoader, ModelMetadata},
    prediction::{PredictionResult, format_prediction},
    preprocess::preprocess,
};

/// Loads the model on first use and caches it for the process lifetime.
/// Failed loads are not cached. Clones share the cache.
#[derive(Clone)]
pub struct ModelRegistry {
    loader: Arc<dyn ModelLoader>,
    model: Arc<OnceCell<Arc<dyn Classifier>>>,
    last_error: Arc<RwLock<Option<String>>>,
}

impl ModelRegistry {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            model: Arc::new(OnceCell::new()),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        #[cfg(feature = "tch-backend")]
        let loader: Arc<dyn ModelLoader> = Arc::new(super::TorchScriptLoader::new(config));
        #[cfg(not(feature = "tch-backend"))]
        let loader: Arc<dyn ModelLoader> = Arc::new(super::UnavailableLoader {
            path: config.model_path.clone(),
        });
        Self::new(loader)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    pub fn metadata(&self) -> Option<ModelMetadata> {
        self.model.get().map(|model| model.metadata())
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn ensure_loaded(&self) -> Result<Arc<dyn Classifier>, ServiceError> {
        let model = self.model.get_or_try_init(|| {
            let start = Instant::now();
            match self.loader.load() {
                Ok(model) => {
                    tracing::info!(
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "model loaded"
                    );
                    self.last_error.write().take();
                    Ok(model)
                }
                Err(err) => {
                    tracing::error!(error = %err, "model load failed");
                    self.last_error.write().replace(err.to_string());
                    Err(err)
                }
            }
        })?;
        Ok(model.clone())
    }

    pub async fn load(&self) -> Result<(), ServiceError> {
        if self.is_loaded() {
            return Ok(());
        }
        let registry = self.clone();
        task::spawn_blocking(move || registry.ensure_loaded().map(|_| ()))
            .await
            .map_err(|err| ServiceError::ModelLoad(format!("load task failed: {err}")))?
    }

    pub async fn classify(
        &self,
        image: Vec<u8>,
        labels: Arc<[String]>,
    ) -> Result<PredictionResult, ServiceError> {
        let registry = self.clone();
        task::spawn_blocking(move || {
            let start = Instant::now();
            let tensor = preprocess(&image)?;
            let model = registry.ensure_loaded()?;
            let scores = model.predict(&tensor)?;
            let result = format_prediction(&scores, &labels)?;
            tracing::debug!(
                predicted = %result.predicted_class,
                confidence = result.confidence,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "image classified"
            );
            Ok(result)
        })
        .await
        .map_err(|err| ServiceError::Inference(format!("inference task failed: {err}")))?
    }
}

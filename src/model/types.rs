use std::{path::PathBuf, sync::Arc};

use serde::Serialize;

use crate::{error::ServiceError, preprocess::ImageTensor};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetadata {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub backend: String,
    pub device: String,
}

pub trait Classifier: Send + Sync {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, ServiceError>;

    fn metadata(&self) -> ModelMetadata;
}

pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn Classifier>, ServiceError>;
}

/// Loader used when the binary was built without an inference backend.
pub struct UnavailableLoader {
    pub path: PathBuf,
}

impl ModelLoader for UnavailableLoader {
    fn load(&self) -> Result<Arc<dyn Classifier>, ServiceError> {
        Err(ServiceError::ModelLoad(format!(
            "cannot load {}: no inference backend compiled in (enable the `tch-backend` feature)",
            self.path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_loader_names_the_missing_backend() {
        let loader = UnavailableLoader {
            path: "model/saus_scene_classifier.pt".into(),
        };
        let message = loader.load().err().unwrap().to_string();
        assert!(message.starts_with("Model loading failed:"));
        assert!(message.contains("tch-backend"));
    }
}

mod registry;
mod types;

#[cfg(feature = "tch-backend")]
mod loader;

#[cfg(feature = "tch-backend")]
pub use loader::{TorchScriptLoader, TorchScriptModel};
pub use registry::ModelRegistry;
pub use types::{Classifier, ModelLoader, ModelMetadata, UnavailableLoader};

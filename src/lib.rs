pub mod config;
pub mod error;
pub mod model;
pub mod prediction;
pub mod preprocess;
pub mod server;

pub use config::AppConfig;
pub use error::ServiceError;
pub use model::{Classifier, ModelLoader, ModelRegistry};
pub use prediction::PredictionResult;
pub use server::build_router;

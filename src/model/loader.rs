use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use parking_lot::Mutex;
use tch::{CModule, Device, IValue, Kind, Tensor, no_grad};

use crate::{
    config::{AppConfig, InputLayout},
    error::ServiceError,
    model::{Classifier, ModelLoader, ModelMetadata},
    preprocess::ImageTensor,
};

pub struct TorchScriptLoader {
    path: PathBuf,
    device: Device,
    layout: InputLayout,
}

impl TorchScriptLoader {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            path: config.model_path.clone(),
            device: config.device,
            layout: config.input_layout,
        }
    }
}

impl ModelLoader for TorchScriptLoader {
    fn load(&self) -> Result<Arc<dyn Classifier>, ServiceError> {
        let model = TorchScriptModel::new(&self.path, self.device, self.layout)?;
        Ok(Arc::new(model))
    }
}

pub struct TorchScriptModel {
    path: PathBuf,
    size_bytes: u64,
    device: Device,
    layout: InputLayout,
    module: Mutex<CModule>,
}

impl TorchScriptModel {
    pub fn new(path: &Path, device: Device, layout: InputLayout) -> Result<Self, ServiceError> {
        if !path.exists() {
            return Err(ServiceError::ModelLoad(format!(
                "model artifact missing: {}",
                path.display()
            )));
        }
        let size_bytes = fs::metadata(path)
            .map_err(|e| ServiceError::ModelLoad(format!("{}: {e}", path.display())))?
            .len();

        let start = Instant::now();
        let mut module = CModule::load_on_device(path, device)
            .map_err(|e| ServiceError::ModelLoad(e.to_string()))?;
        module.set_eval();
        tracing::info!(
            path = %path.display(),
            size_bytes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "TorchScript module loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            size_bytes,
            device,
            layout,
            module: Mutex::new(module),
        })
    }
}

fn input_tensor(input: &ImageTensor, layout: InputLayout) -> Tensor {
    let nhwc = Tensor::from_slice(input.data()).reshape(input.shape());
    match layout {
        InputLayout::Nhwc => nhwc,
        InputLayout::Nchw => nhwc.permute([0, 3, 1, 2]).contiguous(),
    }
}

// Exports either return the scores directly or as the first tuple element.
fn output_scores(output: IValue) -> Result<Vec<f32>, ServiceError> {
    let scores = match output {
        IValue::Tensor(t) => t,
        IValue::Tuple(tuple) => match tuple.into_iter().next() {
            Some(IValue::Tensor(t)) => t,
            Some(_) => {
                return Err(ServiceError::Inference(
                    "expected tensor as first tuple element".into(),
                ));
            }
            None => {
                return Err(ServiceError::Inference("model returned an empty tuple".into()));
            }
        },
        _ => {
            return Err(ServiceError::Inference(
                "unexpected model output format".into(),
            ));
        }
    };

    let flat = scores.to_kind(Kind::Float).to(Device::Cpu).flatten(0, -1);
    Vec::<f32>::try_from(&flat).map_err(|e| ServiceError::Inference(e.to_string()))
}

impl Classifier for TorchScriptModel {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, ServiceError> {
        let output = no_grad(|| {
            let tensor = input_tensor(input, self.layout).to(self.device);
            let module = self.module.lock();
            module
                .forward_is(&[IValue::Tensor(tensor)])
                .map_err(|e| ServiceError::Inference(e.to_string()))
        })?;
        output_scores(output)
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            path: self.path.clone(),
            size_bytes: self.size_bytes,
            backend: "torchscript".to_string(),
            device: format!("{:?}", self.device),
        }
    }
}

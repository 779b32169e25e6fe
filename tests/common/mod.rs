#![allow(dead_code)]

use std::{
    collections::HashMap,
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use saus_scene_service::{
    AppConfig, Classifier, ModelLoader, ModelRegistry, ServiceError, build_router,
    model::ModelMetadata, preprocess::ImageTensor,
};
use serde_json::Value;

pub const BOUNDARY: &str = "saus-test-boundary";

/// Scores a dark image towards `Ground` and a bright one towards `Outdoor_Places`.
pub struct BrightnessModel;

impl Classifier for BrightnessModel {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, ServiceError> {
        if input.shape() != [1, 128, 128, 3] {
            return Err(ServiceError::Inference(format!(
                "unexpected input shape {:?}",
                input.shape()
            )));
        }
        let mean = input.data().iter().sum::<f32>() / input.data().len() as f32;
        if mean < 0.5 {
            Ok(vec![0.05, 0.15, 0.4, 0.05, 0.25, 0.05, 0.05])
        } else {
            Ok(vec![0.02, 0.03, 0.2, 0.05, 0.1, 0.1, 0.5])
        }
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            path: "stub/brightness.pt".into(),
            size_bytes: 42,
            backend: "stub".into(),
            device: "Cpu".into(),
        }
    }
}

/// Counts loads; fails every one of them when `broken` is set.
pub struct StubLoader {
    pub calls: AtomicUsize,
    pub broken: bool,
}

impl StubLoader {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            broken: false,
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            broken: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelLoader for StubLoader {
    fn load(&self) -> Result<Arc<dyn Classifier>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            Err(ServiceError::ModelLoad(
                "model artifact missing: model/saus_scene_classifier.pt".into(),
            ))
        } else {
            Ok(Arc::new(BrightnessModel))
        }
    }
}

pub fn test_config(vars: &[(&str, &str)]) -> AppConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn create_test_app(loader: Arc<StubLoader>) -> Router {
    create_test_app_with(loader, test_config(&[]))
}

pub fn create_test_app_with(loader: Arc<StubLoader>, config: AppConfig) -> Router {
    build_router(Arc::new(config), ModelRegistry::new(loader))
}

pub fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// One part of a `multipart/form-data` body.
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match part.file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                part.name, file_name
            ),
            None => format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                part.name
            ),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn file_upload(file_name: &str, data: &[u8]) -> Request<Body> {
    upload_request(&[Part {
        name: "file",
        file_name: Some(file_name),
        data,
    }])
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

use std::{
    env,
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use anyhow::{anyhow, bail};
use serde::Serialize;

#[cfg(feature = "tch-backend")]
use tch::Device;

/// Labels in the order of the trained artifact's output vector.
pub const DEFAULT_CLASS_LABELS: [&str; 7] = [
    "Auditorium",
    "Classrooms",
    "Ground",
    "Indoor_Places",
    "Labs",
    "Office",
    "Outdoor_Places",
];

pub const DEFAULT_MODEL_FILE: &str = "model/saus_scene_classifier.pt";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Memory order the model expects its input tensor in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    /// `[batch, height, width, channels]`, as produced by Keras exports.
    Nhwc,
    /// `[batch, channels, height, width]`, as produced by torchvision models.
    Nchw,
}

impl FromStr for InputLayout {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "nhwc" => Ok(InputLayout::Nhwc),
            "nchw" => Ok(InputLayout::Nchw),
            other => Err(anyhow!("unknown input layout '{other}', expected nhwc or nchw")),
        }
    }
}

impl fmt::Display for InputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputLayout::Nhwc => f.write_str("nhwc"),
            InputLayout::Nchw => f.write_str("nchw"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub model_path: PathBuf,
    pub class_labels: Arc<[String]>,
    pub input_layout: InputLayout,
    pub max_upload_bytes: usize,
    pub preload_model: bool,
    pub require_model: bool,
    #[cfg(feature = "tch-backend")]
    pub device: Device,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("SERVER_ADDR")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5000));

        let model_path = lookup("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_model_path);

        let class_labels: Arc<[String]> = match lookup("CLASS_LABELS") {
            Some(raw) => parse_labels(&raw)?.into(),
            None => DEFAULT_CLASS_LABELS
                .iter()
                .map(|label| label.to_string())
                .collect(),
        };

        let input_layout = match lookup("INPUT_LAYOUT") {
            Some(raw) => raw.parse()?,
            None => InputLayout::Nhwc,
        };

        let max_upload_bytes = lookup("MAX_UPLOAD_BYTES")
            .and_then(|v| v.parse().ok())
            .filter(|&limit: &usize| limit > 0)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let preload_model = lookup("PRELOAD_MODEL")
            .and_then(|v| parse_flag(&v))
            .unwrap_or(true);
        let require_model = lookup("REQUIRE_MODEL")
            .and_then(|v| parse_flag(&v))
            .unwrap_or(false);

        #[cfg(feature = "tch-backend")]
        let device = {
            let raw = lookup("DEVICE").unwrap_or_else(|| "cpu".into());
            parse_device(&raw)
        };

        Ok(Self {
            listen_addr,
            model_path,
            class_labels,
            input_layout,
            max_upload_bytes,
            preload_model,
            require_model,
            #[cfg(feature = "tch-backend")]
            device,
        })
    }
}

/// Artifact location next to the installed executable, or relative to the
/// working directory when the executable path is unknown.
fn default_model_path() -> PathBuf {
    env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .map(|dir| dir.join(DEFAULT_MODEL_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_FILE))
}

fn parse_labels(raw: &str) -> anyhow::Result<Vec<String>> {
    let labels: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        bail!("CLASS_LABELS must name at least one class");
    }
    Ok(labels)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(feature = "tch-backend")]
fn parse_device(raw: &str) -> Device {
    let lower = raw.to_lowercase();
    if lower.starts_with("cuda") {
        let idx = lower
            .split(':')
            .nth(1)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        if tch::Cuda::is_available() {
            Device::Cuda(idx)
        } else {
            tracing::warn!(requested = %raw, "CUDA unavailable, falling back to CPU");
            Device::Cpu
        }
    } else {
        Device::Cpu
    }
}

//! Service settings, layered by `snapclass_core::load_settings`.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::vision::{Layout, Normalization};

pub const SERVICE_NAME: &str = "classifier-web";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub service_name: String,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub model: ModelSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    pub health_port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)), health_port: 9091, max_upload_bytes: 10 * 1024 * 1024 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self { Self { path: PathBuf::from("database.db") } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Reported in every prediction and stored with each record.
    pub name: String,
    pub path: PathBuf,
    pub class_index_path: PathBuf,
    pub input_size: u32,
    pub layout: Layout,
    pub normalization: Normalization,
    /// Set for models that emit logits rather than probabilities.
    pub apply_softmax: bool,
    /// Expected hex SHA-256 of the model file; empty or absent skips the check.
    pub sha256: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: "MobileNetV2".into(),
            path: PathBuf::from("models/mobilenet_v2_1.0_224.onnx"),
            class_index_path: PathBuf::from("imagenet_class_index.json"),
            input_size: 224,
            layout: Layout::Nhwc,
            normalization: Normalization::Tf,
            apply_softmax: false,
            sha256: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub password_iterations: u32,
    pub cookie_name: String,
    /// How long an unconsumed login grant stays valid.
    pub login_ttl_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self { Self { password_iterations: 260_000, cookie_name: "snapclass_session".into(), login_ttl_secs: 1800 } }
}

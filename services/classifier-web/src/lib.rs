//! Image classification web service: upload, classify, record, and a login-gated history.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

pub mod auth;
pub mod error;
pub mod http;
pub mod settings;
pub mod store;
pub mod vision;

pub use error::AppError;
pub use http::{build_router, AppState};
pub use settings::Settings;

use settings::ModelSettings;
use store::Store;
use vision::{ClassIndex, ImageClassifier, Predictor, Preprocessor};

/// Build the classifier named by the settings.
#[cfg(feature = "onnx")]
pub fn load_classifier(model: &ModelSettings, preprocessor: &Preprocessor) -> Result<Arc<dyn ImageClassifier>> {
    let classifier = vision::TractClassifier::load(&model.name, &model.path, preprocessor.input_shape(), model.sha256.as_deref())
        .with_context(|| format!("loading model {}", model.path.display()))?;
    Ok(Arc::new(classifier))
}

/// Without the `onnx` backend every upload scores uniformly.
#[cfg(not(feature = "onnx"))]
pub fn load_classifier(model: &ModelSettings, _preprocessor: &Preprocessor) -> Result<Arc<dyn ImageClassifier>> {
    warn!(model = %model.name, "built without the onnx feature; serving a uniform static classifier");
    let uniform = vec![1.0 / vision::NUM_CLASSES as f32; vision::NUM_CLASSES];
    Ok(Arc::new(vision::StaticClassifier::new(model.name.clone(), uniform)))
}

pub fn load_predictor(model: &ModelSettings) -> Result<Predictor> {
    let preprocessor = Preprocessor::new(model.input_size, model.layout, model.normalization);
    let class_index = ClassIndex::load(&model.class_index_path)
        .with_context(|| format!("loading class index {}", model.class_index_path.display()))?;
    if class_index.len() != vision::NUM_CLASSES {
        warn!(entries = class_index.len(), "class index does not cover every output class");
    }
    let classifier = load_classifier(model, &preprocessor)?;
    Ok(Predictor::new(classifier, class_index, preprocessor, model.apply_softmax))
}

/// Startup wiring shared by the binary: store, model, router, listener.
pub async fn run(settings: Settings) -> Result<()> {
    snapclass_core::init_metrics()?;
    snapclass_core::start_health_server(settings.server.health_port).await?;

    let store = Store::open(&settings.database.path).context("opening database")?;
    let model = settings.model.clone();
    let predictor = tokio::task::spawn_blocking(move || load_predictor(&model)).await??;
    info!(model = %predictor.model_name(), "classifier ready");

    let state = AppState::new(store, Arc::new(predictor), &settings.auth);
    let app = build_router(state, settings.server.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(settings.server.bind_addr).await?;
    info!(target: "classifier-web", addr = %listener.local_addr()?, "listening");
    snapclass_core::mark_ready();

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown_signal_received");
        })
        .await?;
    snapclass_core::clear_ready();
    Ok(())
}

use anyhow::Result;
use classifier_web::settings::{Settings, SERVICE_NAME};
use snapclass_core::{init_tracing, load_settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(SERVICE_NAME)?;
    let settings: Settings = load_settings(SERVICE_NAME)?;
    info!(target: "classifier-web", ?settings, "Starting classifier-web service");
    classifier_web::run(settings).await
}

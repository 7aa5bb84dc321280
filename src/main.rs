// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, sync::Arc};
use yolo_detect_node::{
    api::{start_server, AppState},
    config::DetectorConfig,
    vision::{AnnotationSink, ModelHost},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting YOLO Detect Node...\n");
    tracing::info!("{}", yolo_detect_node::version::get_version_string());
    println!("📦 BUILD VERSION: {}", yolo_detect_node::version::VERSION);
    println!("📅 Build Date: {}", yolo_detect_node::version::BUILD_DATE);
    println!();

    let config = DetectorConfig::parse();
    config.validate().context("Invalid configuration")?;

    // The model is loaded exactly once; a failure here aborts startup
    println!("📦 Loading model: {}", config.model_path.display());
    let model_host = ModelHost::load(&config.model_path, config.yolo_settings())
        .with_context(|| format!("Failed to load model {}", config.model_path.display()))?;
    let info = model_host.info();
    println!("✅ Model loaded successfully: {}", info.name);
    println!("   Classes: {}", info.class_names.join(", "));
    println!("   Execution provider: {}", info.execution_provider);
    println!(
        "   Thresholds: conf {} / iou {} / max {}",
        info.conf_threshold, info.iou_threshold, info.max_detections
    );

    let mut state = AppState::new(Arc::new(model_host))
        .with_max_upload_bytes(config.max_upload_bytes);

    if let Some(dir) = &config.annotate_dir {
        let sink = AnnotationSink::new(dir)?;
        println!(
            "🖍️  Annotated images will be written to {}",
            sink.output_dir().display()
        );
        state = state.with_annotator(sink);
    }

    let addr = config.socket_addr();
    println!();
    println!("🌐 API server: http://{}", addr);
    println!("   POST /detect       - detect objects in an uploaded image (field 'file')");
    println!("   POST /v1/detect    - alias of /detect");
    println!("   GET  /v1/models    - loaded model description");
    println!("   GET  /health       - health check");
    println!("   GET  /version      - build version and features");
    println!();
    println!("Press Ctrl+C to stop\n");

    start_server(state, addr).await?;

    println!("👋 YOLO Detect Node stopped");
    Ok(())
}

use std::time::Duration;

use anyhow::{Context, Result};
use httpmock::prelude::*;
use tokio::time::{sleep, timeout};
use umlforge_config::AppConfig;
use umlforge_runtime::{self, BackendServices};

fn build_config(base_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.ollama.base_url = base_url;
    config.ollama.probe_timeout_seconds = 1;
    config.orchestrator.vision_model = "vision-under-test".into();
    config.orchestrator.text_model = "text-under-test".into();
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_pins_configured_models() -> Result<()> {
    let server = MockServer::start_async().await;
    let tags = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(serde_json::json!({ "models": [] }));
        })
        .await;

    let config = build_config(server.base_url());
    let services = initialise(&config).await?;

    assert!(services.upstream_reachable);
    assert_eq!("vision-under-test", services.orchestrator.models().vision);
    assert_eq!("text-under-test", services.orchestrator.models().text);
    tags.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_tolerates_unreachable_runtime() -> Result<()> {
    let config = build_config("http://127.0.0.1:9".into());

    let services = initialise(&config).await?;

    assert!(
        !services.upstream_reachable,
        "an offline model runtime should not block startup"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_treats_failing_tags_endpoint_as_unreachable() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(503);
        })
        .await;

    let services = initialise(&build_config(server.base_url())).await?;
    assert!(!services.upstream_reachable);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_applies_image_limits_from_config() -> Result<()> {
    let mut config = build_config("http://127.0.0.1:9".into());
    config.orchestrator.max_images = 2;
    config.orchestrator.max_image_bytes = 16;

    let services = initialise(&config).await?;
    let limits = services.orchestrator.limits();

    assert_eq!(2, limits.max_images);
    assert_eq!(16, limits.max_image_bytes);
    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    umlforge_runtime::telemetry::init_tracing().expect("first initialisation should succeed");

    let second = umlforge_runtime::telemetry::init_tracing();
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(unix), ignore = "requires Unix signal handling")]
async fn shutdown_signal_completes_on_ctrl_c_notification() -> Result<()> {
    let shutdown_task = tokio::spawn(async { umlforge_runtime::shutdown_signal().await });

    sleep(Duration::from_millis(50)).await;
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGINT);
    }

    timeout(Duration::from_secs(2), shutdown_task).await??;
    Ok(())
}

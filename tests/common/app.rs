use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use assessment_backend::assessment::profile::{ProfileExtractor, ResponseProfileExtractor};
use assessment_backend::config::{
    AssessmentEnvConfig, Config, LLMConfig, SandboxConfig, WorkerConfig,
};
use assessment_backend::routes::build_router;
use assessment_backend::state::{build_engine, AppState};
use assessment_backend::store::Store;
use assessment_backend::workers::profile_extraction;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub shutdown_tx: broadcast::Sender<()>,
    _temp_dir: TempDir,
}

/// Config built in code; tests run in parallel threads and must not race on
/// process environment variables.
pub fn test_config(temp_dir: &TempDir) -> Config {
    let sled_path = temp_dir.path().join("assessment-test.sled");
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        worker: WorkerConfig {
            is_leader: false,
            enable_session_expiry: false,
            session_expiry_hours: 72,
            profile_queue_capacity: 16,
        },
        assessment: AssessmentEnvConfig {
            session_type: "onboarding".to_string(),
            step_catalog_path: None,
            recommendation_count: 5,
        },
        llm: LLMConfig {
            enabled: false,
            mock: true,
            api_url: String::new(),
            api_key: String::new(),
            model: "test-model".to_string(),
            timeout_secs: 5,
        },
        sandbox: SandboxConfig {
            enabled: false,
            api_url: String::new(),
            timeout_secs: 5,
        },
    }
}

pub async fn spawn_test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let mut config = test_config(&temp_dir);
    configure(&mut config);

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let (engine, profile_rx) = build_engine(&config, store.clone()).expect("build engine");
    let engine = Arc::new(engine);
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let extractor: Arc<dyn ProfileExtractor> = Arc::new(ResponseProfileExtractor::new(
        engine.repository().clone(),
        engine.catalog_handle(),
    ));
    tokio::spawn(profile_extraction::run(
        profile_rx,
        extractor,
        shutdown_tx.subscribe(),
    ));

    let state = AppState::new(store, engine, &config, shutdown_tx.clone());
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        shutdown_tx,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_test_app_with(|_| {}).await
}

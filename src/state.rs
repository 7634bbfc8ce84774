use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::assessment::catalog::StepCatalog;
use crate::assessment::config::EngineConfig;
use crate::assessment::error::CatalogError;
use crate::assessment::grader::{CodeExecutor, RubricGrader, StepGrader};
use crate::assessment::{AssessmentEngine, RecommendationEngine};
use crate::config::Config;
use crate::services::code_runner::{CodeRunnerError, HttpCodeRunner};
use crate::services::llm_provider::{LlmError, LlmProvider};
use crate::store::Store;
use crate::workers::profile_extraction::{ProfileExtractionQueue, ProfileJob};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("invalid engine configuration: {0}")]
    EngineConfig(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Sandbox(#[from] CodeRunnerError),
}

/// Builds the engine and its collaborators from process configuration.
/// The returned receiver feeds the profile-extraction worker.
pub fn build_engine(
    config: &Config,
    store: Arc<Store>,
) -> Result<(AssessmentEngine, mpsc::Receiver<ProfileJob>), StartupError> {
    let engine_config = EngineConfig::from_env(&config.assessment);
    engine_config.validate().map_err(StartupError::EngineConfig)?;

    let catalog = match &config.assessment.step_catalog_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading step catalog from file");
            StepCatalog::from_json_file(path)?
        }
        None => StepCatalog::builtin()?,
    };

    LlmProvider::validate_config(&config.llm)?;
    let rubric: Option<Arc<dyn RubricGrader>> = if config.llm.enabled {
        Some(Arc::new(LlmProvider::new(&config.llm)))
    } else {
        None
    };
    let executor: Option<Arc<dyn CodeExecutor>> = HttpCodeRunner::from_config(&config.sandbox)?
        .map(|runner| Arc::new(runner) as Arc<dyn CodeExecutor>);

    tracing::info!(
        steps = catalog.len(),
        llm = rubric.is_some(),
        sandbox = executor.is_some(),
        "Assessment engine configured"
    );

    let grader = StepGrader::new(engine_config.grading.clone(), rubric, executor);
    let (queue, rx) = ProfileExtractionQueue::channel(config.worker.profile_queue_capacity);
    let engine = AssessmentEngine::new(
        store,
        Arc::new(catalog),
        grader,
        engine_config,
        config.assessment.session_type.clone(),
    )
    .with_profile_queue(queue);
    Ok((engine, rx))
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    engine: Arc<AssessmentEngine>,
    recommender: Arc<RecommendationEngine>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        engine: Arc<AssessmentEngine>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let recommender = RecommendationEngine::builtin(engine.config().recommendation.clone());
        Self {
            store,
            engine,
            recommender: Arc::new(recommender),
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn engine(&self) -> &AssessmentEngine {
        &self.engine
    }

    pub fn engine_handle(&self) -> Arc<AssessmentEngine> {
        self.engine.clone()
    }

    pub fn recommender(&self) -> &RecommendationEngine {
        &self.recommender
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub mod catalog;
pub mod config;
pub mod error;
pub mod grader;
pub mod mastery;
pub mod profile;
pub mod recommend;
pub mod repository;
pub mod session;
pub mod skip_rules;
pub mod taxonomy;
pub mod types;

pub use catalog::StepCatalog;
pub use config::EngineConfig;
pub use error::EngineError;
pub use grader::StepGrader;
pub use recommend::RecommendationEngine;
pub use repository::AssessmentRepository;
pub use session::AssessmentEngine;

pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub assessment_sessions: sled::Tree,
    pub assessment_responses: sled::Tree,
    pub skill_mastery: sled::Tree,
    pub student_profiles: sled::Tree,
    pub meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("CAS retry exhausted after {attempts} attempts: entity={entity}, key={key}")]
    CasRetryExhausted {
        entity: String,
        key: String,
        attempts: u32,
    },
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let assessment_sessions = db.open_tree(trees::ASSESSMENT_SESSIONS)?;
        let assessment_responses = db.open_tree(trees::ASSESSMENT_RESPONSES)?;
        let skill_mastery = db.open_tree(trees::SKILL_MASTERY)?;
        let student_profiles = db.open_tree(trees::STUDENT_PROFILES)?;
        let meta = db.open_tree(trees::META)?;

        Ok(Self {
            db,
            assessment_sessions,
            assessment_responses,
            skill_mastery,
            student_profiles,
            meta,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Cheap read used by health checks.
    pub fn ping(&self) -> Result<(), StoreError> {
        self.meta.get(b"__health_check__")?;
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

pub(crate) fn transaction_error(e: sled::transaction::TransactionError<()>) -> StoreError {
    match e {
        sled::transaction::TransactionError::Abort(()) => {
            StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
        }
        sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
    }
}

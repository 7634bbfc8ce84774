use crate::assessment::repository::{AssessmentSession, SessionStatus};
use crate::store::keys;
use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_session_indexes", m002_session_indexes),
    ]
}

/// Applies pending migrations in order. Each migration must be idempotent: the
/// version is only recorded after it succeeds, so a crash in between reruns it.
/// Versions only move forward.
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;

    for (index, (name, func)) in migrations().iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.meta.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("unreadable schema version ({} bytes)", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store.meta.insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// Rebuilds the user listing index and the active-session index from the
/// session records.
fn m002_session_indexes(store: &Store) -> Result<(), StoreError> {
    for item in store.assessment_sessions.iter() {
        let (key, value) = item?;
        if keys::is_session_index_key(&key) {
            continue;
        }
        let session: AssessmentSession = Store::deserialize(&value)?;
        let user_index = keys::session_user_index_key(&session.user_id, &session.id);
        store
            .assessment_sessions
            .insert(user_index.as_bytes(), &[] as &[u8])?;

        if session.status == SessionStatus::InProgress {
            let active = keys::active_session_key(&session.user_id, &session.session_type);
            // Keep whichever session already holds the slot.
            let _ = store.assessment_sessions.compare_and_swap(
                active.as_bytes(),
                None::<&[u8]>,
                Some(session.id.as_bytes()),
            )?;
        }
    }
    Ok(())
}

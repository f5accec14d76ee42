//! Startup wiring: storage (with a retry budget), gateway, registry,
//! limiter, service, and the startup profile file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tmws_access::{RateLimiter, RateLimits};
use tmws_core::config::TmwsConfig;
use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_embeddings::{EmbeddingGateway, HashedTermProvider};
use tmws_registry::{profiles, AgentRegistry};
use tmws_service::MemoryService;
use tmws_storage::StorageEngine;

use crate::session::SessionManager;
use crate::state::AppState;

/// Database open attempts before giving up (exit code 3).
const OPEN_ATTEMPTS: u32 = 3;

/// Assemble the full application state from configuration.
pub fn build_state(config: TmwsConfig) -> TmwsResult<AppState> {
    let storage = Arc::new(open_storage(&config)?);
    let embeddings = Arc::new(EmbeddingGateway::new(Box::new(HashedTermProvider::new(
        config.vector_dimension,
    ))));
    let registry = Arc::new(AgentRegistry::new(Arc::clone(&storage))?);
    let limiter = Arc::new(RateLimiter::new(RateLimits {
        requests: config.rate_limit_requests,
        period_secs: config.rate_limit_period_secs,
        ..Default::default()
    }));
    let service = Arc::new(MemoryService::new(
        storage,
        embeddings,
        Arc::clone(&registry),
        limiter,
    ));

    load_startup_profiles(&registry);

    Ok(AppState {
        config: Arc::new(config),
        service,
        registry,
        sessions: Arc::new(SessionManager::new()),
    })
}

/// Open the database with a small retry budget and exponential backoff.
pub fn open_storage(config: &TmwsConfig) -> TmwsResult<StorageEngine> {
    let mut last_err = None;
    for attempt in 0..OPEN_ATTEMPTS {
        if attempt > 0 {
            let backoff = Duration::from_millis(200u64 << attempt);
            tracing::warn!(attempt, backoff_ms = backoff.as_millis() as u64,
                "retrying database open");
            std::thread::sleep(backoff);
        }
        match try_open(config) {
            Ok(engine) => return Ok(engine),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| TmwsError::Storage {
        message: "database unreachable".into(),
    }))
}

fn try_open(config: &TmwsConfig) -> TmwsResult<StorageEngine> {
    let url = config
        .database_url
        .strip_prefix("sqlite://")
        .or_else(|| config.database_url.strip_prefix("sqlite:"))
        .unwrap_or(&config.database_url);

    if url == ":memory:" {
        return StorageEngine::open_in_memory();
    }
    let path = PathBuf::from(url);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| TmwsError::Storage {
                message: format!("create database directory: {e}"),
            })?;
        }
    }
    StorageEngine::open(&path, &config.embedding_model)
}

/// Register agents from the first profile file on the search path. A bad
/// file is logged and skipped; startup continues without it.
fn load_startup_profiles(registry: &AgentRegistry) {
    let Some(path) = profiles::discover_profile_path() else {
        return;
    };
    match profiles::load_profiles(&path) {
        Ok(specs) => {
            let mut loaded = 0usize;
            for spec in specs {
                match registry.register(spec, true) {
                    Ok(_) => loaded += 1,
                    Err(TmwsError::DuplicateId { .. }) | Err(TmwsError::NameConflict { .. }) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping profile entry");
                    }
                }
            }
            tracing::info!(path = %path.display(), loaded, "startup profiles loaded");
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err,
                "profile file rejected, continuing without it");
        }
    }
}

//! Application State

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use agent_core::{GenerationOptions, MemorySessionStore, Result};
use agent_runtime::{GroqConfig, GroqProvider};
use math_solver::{AssistantConfig, MathAssistant, WikiClient};

/// Settings read once at startup
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server-side key used when a request carries none
    pub default_api_key: Option<String>,

    /// Groq endpoint
    pub base_url: String,

    /// Model used when a request names none
    pub model: String,

    /// Agent step limit
    pub max_iterations: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_api_key: None,
            base_url: GroqConfig::new("").base_url,
            model: agent_core::provider::DEFAULT_MODEL.into(),
            max_iterations: 15,
        }
    }
}

impl ServerConfig {
    /// Read `GROQ_API_KEY`, `GROQ_BASE_URL`, `MATHGPT_MODEL` and
    /// `AGENT_MAX_ITERATIONS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let groq = GroqConfig::from_env();

        let max_iterations = match std::env::var("AGENT_MAX_ITERATIONS") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(%raw, "Invalid AGENT_MAX_ITERATIONS, using default");
                defaults.max_iterations
            }),
            Err(_) => defaults.max_iterations,
        };

        Self {
            default_api_key: Some(groq.api_key).filter(|k| !k.trim().is_empty()),
            base_url: groq.base_url,
            model: std::env::var("MATHGPT_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.model),
            max_iterations,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Chat transcripts, one per UI session
    pub sessions: Arc<MemorySessionStore>,

    /// Encyclopedia backend for the Wikipedia tool
    pub wiki: Arc<dyn WikiClient>,

    pub config: Arc<ServerConfig>,

    /// One lock per session; a submission holds it from load to save
    session_locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl AppState {
    pub fn new(wiki: Arc<dyn WikiClient>, config: ServerConfig) -> Self {
        Self {
            sessions: Arc::new(MemorySessionStore::new()),
            wiki,
            config: Arc::new(config),
            session_locks: Arc::default(),
        }
    }

    /// Wait for exclusive use of a session
    pub async fn lock_session(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.session_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry of a session that no longer exists
    pub fn forget_session(&self, id: &str) {
        self.session_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// The request's key, else the server's; blank keys count as missing
    pub fn resolve_key(&self, requested: Option<&str>) -> Option<String> {
        requested
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.default_api_key.clone())
    }

    /// Groq client for one request
    pub fn provider(&self, api_key: &str) -> Result<GroqProvider> {
        GroqProvider::from_config(
            GroqConfig::new(api_key).with_base_url(self.config.base_url.clone()),
        )
    }

    /// Assistant for one request; providers are never shared between keys
    pub fn assistant(&self, api_key: &str, model: &str) -> Result<MathAssistant> {
        let provider = Arc::new(self.provider(api_key)?);
        let config = AssistantConfig {
            generation: GenerationOptions {
                model: model.to_string(),
                ..Default::default()
            },
            max_iterations: self.config.max_iterations,
        };

        MathAssistant::new(provider, Arc::clone(&self.wiki), config)
    }

    /// Model for a request, falling back to the configured default
    pub fn model_for(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map_or_else(|| self.config.model.clone(), str::to_string)
    }
}


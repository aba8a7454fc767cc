//! Application state: the persistent store, the optional OpenAI client, the
//! shop catalog and the lessons currently in flight.
//!
//! Lessons are held in memory keyed by `student:module`. Each sits behind its
//! own mutex so a slow oracle call in one lesson never blocks another.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument};

use crate::config::load_app_config_from_env;
use crate::domain::{LearningModule, ShopItem};
use crate::lesson::LessonSession;
use crate::openai::OpenAI;
use crate::seeds::shop_items;
use crate::store::{Store, StoreError};

pub type SharedSession = Arc<Mutex<LessonSession>>;

pub struct AppState {
    pub store: Store,
    pub openai: Option<OpenAI>,
    pub shop: Vec<ShopItem>,
    sessions: RwLock<HashMap<String, SharedSession>>,
}

pub fn session_key(student_id: &str, module_id: &str) -> String {
    format!("{student_id}:{module_id}")
}

impl AppState {
    /// Build state from env: load config, open the store, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub async fn new() -> Result<Self, StoreError> {
        let cfg = load_app_config_from_env().unwrap_or_default();
        let data_dir = cfg.storage.resolved_data_dir();
        let extra: Vec<LearningModule> = cfg.modules.into_iter().map(LearningModule::from).collect();
        let store = Store::open(&data_dir, &cfg.storage.schema_version, extra).await?;

        let openai = OpenAI::from_env(cfg.prompts);
        if let Some(oa) = &openai {
            info!(target: "spellquest_backend", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, transcribe_model = %oa.transcribe_model, "OpenAI enabled.");
        } else {
            info!(target: "spellquest_backend", "OpenAI disabled (no OPENAI_API_KEY). Using fallback content.");
        }
        info!(target: "spellquest_backend", %data_dir, "Application state ready");

        Ok(Self::with_parts(store, openai))
    }

    pub fn with_parts(store: Store, openai: Option<OpenAI>) -> Self {
        Self { store, openai, shop: shop_items(), sessions: RwLock::new(HashMap::new()) }
    }

    /// Register a loaded lesson, replacing any earlier one for the same pair.
    pub async fn insert_session(&self, student_id: &str, module_id: &str, session: LessonSession) -> SharedSession {
        let shared = Arc::new(Mutex::new(session));
        self.sessions
            .write()
            .await
            .insert(session_key(student_id, module_id), shared.clone());
        shared
    }

    pub async fn session(&self, student_id: &str, module_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(&session_key(student_id, module_id)).cloned()
    }

    pub async fn remove_session(&self, student_id: &str, module_id: &str) {
        self.sessions.write().await.remove(&session_key(student_id, module_id));
    }
}

use std::sync::Arc;
use crate::config::AppConfig;
use crate::models::global_session_manager::GlobalSessionManager;
use crate::services::github_loader::Loader;
use crate::services::knowledge_base::KnowledgeBaseFactory;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub session_manager: GlobalSessionManager,
    pub knowledge_base_factory: KnowledgeBaseFactory,
    pub loader: Arc<dyn Loader>,
}

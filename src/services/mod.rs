pub mod chat_service;
pub mod chunker;
pub mod embedding_service;
pub mod github_loader;
pub mod knowledge_base;
pub mod llm_service;
pub mod repo_service;
pub mod session_service;

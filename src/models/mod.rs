pub mod chat_answer;
pub mod chunk_db;
pub mod document;
pub mod global_session_manager;
pub mod message;
pub mod user_session;
pub mod vector_database;

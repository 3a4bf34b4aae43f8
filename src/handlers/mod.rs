pub mod chat_handler;
pub mod page_handler;
pub mod repo_handler;
pub mod session_handler;

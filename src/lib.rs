pub mod analyzer;
pub mod classify;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod llm;


pub use analyzer::{ContextBundle, UrlAnalyzer};
pub use classify::{ErrorTable, StatusRule};
pub use config::Config;
pub use error::{ApiError, Error, Result};
pub use llm::{ChatClient, ChatMessage, ClientOption, Role};

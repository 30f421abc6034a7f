pub mod ai;
pub mod backend;
pub mod config;
pub mod credential;
pub mod error;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use ai::{CompletionBackend, MistralClient};
pub use backend::{extract_agent_error_message, BackendConfig, BackendConfigLoader};
pub use config::Config;
pub use credential::CredentialStore;
pub use error::CompletionError;
pub use session::{PendingTurn, Session};
pub use state::{ChatRole, ChatTurn};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use store::MessageStore;

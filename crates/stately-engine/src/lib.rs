pub mod context_manager;
pub mod delete;
pub mod error;
mod list_path;
pub mod matcher;
pub mod record;
mod render;
pub mod state_helper;
pub mod transaction;

pub use context_manager::ContextManager;
pub use delete::DeleteStateHandler;
pub use error::EngineError;
pub use matcher::StateRequestMatcher;
pub use record::RecordStateHandler;
pub use state_helper::{StateHelper, StateValueRequest};
pub use transaction::{Transaction, TransactionManager};

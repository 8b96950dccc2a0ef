pub mod ai;
pub mod config;
pub mod format;
pub mod provider;
pub mod session;
pub mod state;
pub mod transport;

// Re-export main types for convenience
pub use ai::{GeminiClient, LangflowClient, ProxyClient};
pub use config::Config;
pub use format::{split_segments, CodeBlock, Segment, DEFAULT_LANGUAGE};
pub use provider::Provider;
pub use session::ChatSession;
pub use state::{ChatRole, ChatTurn, MessageStore};
pub use transport::{Transport, TransportError};

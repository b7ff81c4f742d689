pub mod config;
pub mod corpus;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ipc;
pub mod models;
pub mod ranking;
pub mod text;
pub mod vector;

pub use config::DeskmateConfig;
pub use corpus::{CorpusProvider, DemoCorpusProvider, PatternProvider, PersistentCorpusProvider};
pub use embeddings::{
    EmbeddingBackend, EmbeddingClientConfig, EmbeddingError, OpenAiEmbeddingClient, API_KEY_ENV,
};
pub use error::DeskmateError;
pub use generation::{CompletionRequest, GenerationBackend, GenerationError, OpenAiChatClient};

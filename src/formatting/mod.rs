pub mod backend;
pub mod llama_cli;
pub mod persona;
pub mod session;

pub use backend::{ChatMessage, Completion, GenerationParams, InferenceBackend, Role, SessionOptions};
pub use llama_cli::LlamaCliBackend;
pub use persona::Persona;
pub use session::{SessionManager, SessionState};

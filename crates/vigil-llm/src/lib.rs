//! vigil-llm — chat-completion backends and the structured-output client.
//!
//! One endpoint wire shape (OpenAI-compatible chat completions) covers every
//! deployment the engine runs against: llama.cpp, Ollama's /v1 endpoint, Groq,
//! vLLM. The same backend serves three roles (planner, observer, narrator)
//! with role-specific sampling options.

pub mod backend;
pub mod client;

pub use backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, LlmRole, Message, OpenAiCompatibleBackend};
pub use client::{client_for_role, ChatClient};

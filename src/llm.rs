/// Model clients for tag suggestion.
///
/// This module provides the [`TagModel`] capability and its backends: a
/// hosted chat-completion client using function calling, a local Ollama
/// client using structured output, and an offline demo client. The
/// [`protocol`] submodule owns prompt construction and reply parsing.
mod client;
mod demo;
mod local;
mod openai;
pub mod protocol;

pub use client::{LlmError, TagModel};
pub use demo::DemoClient;
pub use local::{DEFAULT_LOCAL_BASE_URL, LocalClient, LocalClientBuilder};
pub use openai::{
    DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, DEFAULT_TEMPERATURE, OpenAiClient,
    OpenAiClientBuilder,
};
pub use protocol::{TagSuggestionRequest, parse_chat_completion, parse_tag_arguments};

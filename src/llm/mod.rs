// Language-generation backend module
pub mod client;
pub mod prompts;
pub mod response;

pub use client::{
    create_generation_client, ClaudeClient, GenerationClient, GenerationError, GlossaryEntry,
    OpenAiClient, TransformResult,
};

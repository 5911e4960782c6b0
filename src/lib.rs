// Library exports for lingodigest crate
// This allows tests and other crates to use the modules

pub mod config;
pub mod digest;
pub mod extractor;
pub mod imap_client;
pub mod pipeline;
pub mod smtp_client;

// Language-generation backend clients
pub mod llm;

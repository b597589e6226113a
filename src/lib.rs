// Library root: the handover core used by the binary and integration tests.
// The binary entry point is src/main.rs.

pub mod config;
pub mod console;
pub mod docstore;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod livechat;
pub mod llm;
pub mod logger;
pub mod phone;
pub mod pipeline;
pub mod presence;
pub mod reaper;
pub mod session;
pub mod settings;

//! NexusChat core library: local store, conversation and contact derivation, the AI
//! assistant, and the chat controller used by the CLI.

pub mod config;
pub mod controller;
pub mod conversation;
pub mod ids;
pub mod init;
pub mod llm;
pub mod model;
pub mod store;

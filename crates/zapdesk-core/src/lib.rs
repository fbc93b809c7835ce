//! Zapdesk core: shared building blocks for the WhatsApp automation channel.
//!
//! - **config**: typed config schema, JSON loader, env var overrides
//! - **types**: chats, messages and inbound events exchanged with the transport
//! - **utils**: data paths and string helpers

pub mod config;
pub mod types;
pub mod utils;

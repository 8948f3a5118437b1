//! Dot Update: email-to-project-record webhook.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod records;
pub mod routes;

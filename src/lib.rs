//! Terminal client for the SRD question-answering assistant.

pub mod api;
pub mod chat;
pub mod commands;
pub mod dashboard;
pub mod render;
pub mod state;

#[cfg(test)]
mod test_support;

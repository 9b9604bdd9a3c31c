//! LLM provider plumbing used by the ticket drafting adapter.
//!
//! `model` defines the provider trait and message types, `providers` holds the
//! concrete HTTP clients, and `retry` wraps any provider with bounded retries.

pub mod model;
pub mod providers;
pub mod retry;

pub use {
    model::{ChatMessage, CompletionResponse, LlmProvider, Usage},
    retry::{ProviderErrorKind, RetryPolicy, RetryingProvider, classify_error},
};

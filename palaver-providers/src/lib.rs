//! Completion gateway for palaver
//!
//! Stateless adapters to remote chat-completion endpoints. A provider
//! takes the full role-tagged conversation and returns one generated
//! reply; everything about retries and user-facing degradation is the
//! session layer's business.

pub mod base;
pub mod mistral;

pub use base::{CompletionProvider, ProviderError, ProviderResult, WireMessage};
pub use mistral::MistralClient;

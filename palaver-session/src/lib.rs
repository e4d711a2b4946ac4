//! Session management for palaver
//!
//! One [`SessionManager`] handles one logical user session: presentation
//! events come in, write-throughs to the store and calls to the completion
//! gateway go out, and the presentation layer reads the resulting state
//! back. Events run to completion one at a time; concurrent sessions for
//! different users get their own manager over a shared pool.

mod manager;
mod state;

pub use manager::{CredentialMode, SessionManager, FALLBACK_REPLY};
pub use state::ChatSession;

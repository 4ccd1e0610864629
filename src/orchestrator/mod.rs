//! Request-level orchestration over the gateway.
//!
//! Orchestrators hold their backend behind a trait object so the HTTP surface
//! and tests can swap implementations. Neither keeps state between calls.

pub mod completion;
pub mod speech;

pub use completion::{CompletionOrchestrator, CompletionReply};
pub use speech::SpeechOrchestrator;

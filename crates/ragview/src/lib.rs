//! Client session for a document question-answering service.
//!
//! A [`ConversationSession`](chat::ConversationSession) keeps the conversation log and the
//! citations behind every answer, and drives a [`PreviewRenderer`](preview::PreviewRenderer)
//! that shows one cited source at a time.

pub mod chat;
pub mod ingest;
pub mod preview;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{Attachment, ConversationSession, SubmitOutcome, TurnId};
pub use ingest::{IngestResult, IngestionCoordinator};
pub use preview::{PreviewRenderer, PreviewState};
pub use settings::{ClientSettings, SettingsStore};

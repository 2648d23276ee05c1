pub mod message;
pub mod registry;
pub mod session;

pub use message::{
    Attachment, Citation, CitationKey, FileType, PhaseTransition, PhaseTransitionRejection,
    ResponseOutcome, Role, SessionPhase, Turn, TurnId,
};
pub use registry::CitationRegistry;
pub use session::{
    BACKEND_ERROR_MESSAGE, ConversationSession, SessionError, SessionResult, SessionSnapshot,
    SubmitOutcome,
};

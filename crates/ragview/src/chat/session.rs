use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::FutureExt;
use ragview_client::{AssistantBackend, QueryRequest, SourceRecord};
use snafu::{OptionExt, Snafu};
use tokio::sync::Mutex;

use super::message::{
    Attachment, Citation, CitationKey, PhaseTransition, ResponseOutcome, SessionPhase, Turn,
    TurnId,
};
use super::registry::CitationRegistry;
use crate::preview::{PreviewRenderer, PreviewState};

/// Assistant text shown when a query cannot be answered.
pub const BACKEND_ERROR_MESSAGE: &str = "Error contacting backend.";

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("no citation {ordinal} on turn {turn_id} (`{stage}`)"))]
    CitationNotFound {
        stage: &'static str,
        turn_id: u64,
        ordinal: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty text without an attachment; nothing was sent.
    Ignored,
    Answered {
        user_turn: TurnId,
        assistant_turn: TurnId,
    },
    Failed {
        user_turn: TurnId,
        assistant_turn: TurnId,
        reason: String,
    },
}

/// Read-only view of the session published after every mutation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub turns: Vec<Arc<Turn>>,
    pub phase: SessionPhase,
    pub active_preview: Option<CitationKey>,
}

impl SessionSnapshot {
    pub fn is_pending(&self) -> bool {
        self.phase.is_pending()
    }

    pub fn turn(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().map(Arc::as_ref).find(|turn| turn.id == id)
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last().map(Arc::as_ref)
    }
}

#[derive(Debug, Default)]
struct SessionState {
    turns: Vec<Arc<Turn>>,
    phase: SessionPhase,
    active_preview: Option<CitationKey>,
    /// Bumped by every open and close; an open only publishes its result while it is current.
    preview_epoch: u64,
    registry: CitationRegistry,
    last_turn_id: u64,
}

impl SessionState {
    fn next_turn_id(&mut self) -> TurnId {
        self.last_turn_id += 1;
        TurnId::new(self.last_turn_id)
    }

    fn push_user(&mut self, text: &str, attachment: Option<Attachment>) -> TurnId {
        let id = self.next_turn_id();
        self.turns.push(Arc::new(Turn::user(id, text, attachment)));
        id
    }

    /// Registers citations before the turn becomes visible.
    fn push_assistant(&mut self, answer: String, sources: Vec<SourceRecord>) -> TurnId {
        let id = self.next_turn_id();
        let citations: Vec<Citation> = sources
            .into_iter()
            .zip(1..)
            .map(|(source, ordinal)| Citation::from_source(id, ordinal, source))
            .collect();
        self.registry.register(id, citations.clone());
        self.turns.push(Arc::new(Turn::assistant(id, answer, citations)));
        id
    }

    fn transition(&mut self, transition: PhaseTransition) {
        match self.phase.apply(transition) {
            Ok(next) => self.phase = next,
            Err(rejection) => tracing::warn!(?rejection, "session phase transition rejected"),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            turns: self.turns.clone(),
            phase: self.phase,
            active_preview: self.active_preview,
        }
    }
}

/// Conversation log, citation registry and preview coordination for one user session.
///
/// Submissions may overlap; each one appends its user turn immediately and its reply when
/// the backend answers.
pub struct ConversationSession {
    backend: Arc<dyn AssistantBackend>,
    previewer: PreviewRenderer,
    state: Mutex<SessionState>,
    snapshot: ArcSwap<SessionSnapshot>,
}

impl ConversationSession {
    pub fn new(backend: Arc<dyn AssistantBackend>, previewer: PreviewRenderer) -> Self {
        Self {
            backend,
            previewer,
            state: Mutex::new(SessionState::default()),
            snapshot: ArcSwap::from_pointee(SessionSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.snapshot.load_full()
    }

    pub fn previewer(&self) -> &PreviewRenderer {
        &self.previewer
    }

    pub async fn preview_state(&self) -> PreviewState {
        self.previewer.state().await
    }

    fn publish(&self, state: &SessionState) {
        self.snapshot.store(Arc::new(state.snapshot()));
    }

    pub async fn citation(&self, turn_id: TurnId, ordinal: u32) -> Option<Citation> {
        self.state.lock().await.registry.get(turn_id, ordinal).cloned()
    }

    /// Sends `text` (and an optional attachment) and appends the reply.
    pub async fn submit(&self, text: &str, attachment: Option<Attachment>) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            tracing::debug!("ignoring empty submission");
            return SubmitOutcome::Ignored;
        }

        let request = QueryRequest::new(text, attachment.as_ref().map(|a| a.url.clone()));
        let user_turn = {
            let mut state = self.state.lock().await;
            let id = state.push_user(text, attachment);
            state.transition(PhaseTransition::Submit);
            self.publish(&state);
            id
        };
        tracing::info!(turn_id = user_turn.0, "query submitted");

        let reply = match AssertUnwindSafe(self.backend.query(request))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => {
                tracing::warn!(turn_id = user_turn.0, kind = ?error.kind(), %error, "query failed");
                Err(error.to_string())
            }
            Err(_) => {
                tracing::error!(turn_id = user_turn.0, "backend panicked while answering");
                Err("backend panicked".to_string())
            }
        };

        let mut state = self.state.lock().await;
        let outcome = match reply {
            Ok(response) => {
                let sources = response.sources.len();
                let assistant_turn = state.push_assistant(response.answer, response.sources);
                state.transition(PhaseTransition::Resolve(ResponseOutcome::Answered));
                tracing::info!(turn_id = assistant_turn.0, sources, "answer received");
                SubmitOutcome::Answered {
                    user_turn,
                    assistant_turn,
                }
            }
            Err(reason) => {
                let assistant_turn =
                    state.push_assistant(BACKEND_ERROR_MESSAGE.to_string(), Vec::new());
                state.transition(PhaseTransition::Resolve(ResponseOutcome::Failed));
                SubmitOutcome::Failed {
                    user_turn,
                    assistant_turn,
                    reason,
                }
            }
        };
        self.publish(&state);
        outcome
    }

    /// Shows the preview for citation `ordinal` (1-based) of `turn_id`.
    ///
    /// The session lock is taken before the renderer lock, never the reverse. If a close or a
    /// newer open was requested while this one loaded, the later request wins.
    pub async fn open_citation(&self, turn_id: TurnId, ordinal: u32) -> SessionResult<PreviewState> {
        let (citation, epoch) = {
            let mut state = self.state.lock().await;
            let citation = state.registry.get(turn_id, ordinal).cloned().context(
                CitationNotFoundSnafu {
                    stage: "open-citation",
                    turn_id: turn_id.0,
                    ordinal,
                },
            )?;
            state.preview_epoch += 1;
            state.active_preview = Some(citation.key);
            self.publish(&state);
            (citation, state.preview_epoch)
        };

        let opened = self.previewer.open(&citation).await;

        let mut state = self.state.lock().await;
        if state.preview_epoch == epoch {
            state.active_preview = opened.citation();
            self.publish(&state);
            return Ok(opened);
        }

        if state.active_preview.is_none() {
            // A close arrived before the renderer saw this open.
            tracing::debug!(
                turn_id = turn_id.0,
                ordinal,
                "preview closed while opening"
            );
            self.previewer.close().await;
        }
        Ok(self.previewer.state().await)
    }

    pub async fn close_preview(&self) {
        let mut state = self.state.lock().await;
        state.preview_epoch += 1;
        self.previewer.close().await;
        if state.active_preview.take().is_some() {
            self.publish(&state);
        }
    }
}

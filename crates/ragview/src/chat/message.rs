use std::num::NonZeroU32;

use ragview_client::SourceRecord;

/// Stable identifier for one turn in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl TurnId {
    /// Creates a typed turn identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Addresses one citation: the owning turn plus its 1-based ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CitationKey {
    pub turn_id: TurnId,
    pub ordinal: u32,
}

impl CitationKey {
    pub const fn new(turn_id: TurnId, ordinal: u32) -> Self {
        Self { turn_id, ordinal }
    }
}

/// Speaker of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// Kind of artifact a citation points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileType {
    Text,
    Image,
    Pdf,
    Audio,
    /// Any tag the previewer does not know how to render.
    Other(String),
}

impl FileType {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Self::Text,
            "image" => Self::Image,
            "pdf" => Self::Pdf,
            "audio" => Self::Audio,
            _ => Self::Other(tag.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Audio => "audio",
            Self::Other(tag) => tag,
        }
    }
}

/// One retrieved source attached to an assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub key: CitationKey,
    pub file_name: String,
    pub file_type: FileType,
    pub storage_path: Option<String>,
    /// Relevance in `[0, 1]`.
    pub score: Option<f64>,
    pub page_number: Option<NonZeroU32>,
    /// Raw `"start-end"` offset range for audio sources.
    pub time_range: Option<String>,
    pub content: Option<String>,
}

impl Citation {
    /// Builds the citation for the source at `ordinal` (1-based) of `turn_id`.
    pub fn from_source(turn_id: TurnId, ordinal: u32, source: SourceRecord) -> Self {
        let score = source
            .score
            .filter(|score| score.is_finite())
            .map(|score| score.clamp(0.0, 1.0));

        Self {
            key: CitationKey::new(turn_id, ordinal),
            file_type: FileType::from_tag(&source.file_type),
            file_name: source.file_name,
            storage_path: source.filepath.filter(|path| !path.trim().is_empty()),
            score,
            page_number: source.page_number.and_then(NonZeroU32::new),
            time_range: source.timestamp.filter(|range| !range.trim().is_empty()),
            content: source.content,
        }
    }

    pub fn ordinal(&self) -> u32 {
        self.key.ordinal
    }

    /// Short label used in citation lists, e.g. `[1] policy.pdf (p. 2)`.
    pub fn label(&self) -> String {
        let mut label = format!("[{}] {}", self.key.ordinal, self.file_name);
        if let Some(page) = self.page_number {
            label.push_str(&format!(" (p. {page})"));
        }
        if let Some(range) = &self.time_range {
            label.push_str(&format!(" ({range})"));
        }
        label
    }

    pub fn score_label(&self) -> Option<String> {
        self.score.map(|score| format!("{score:.3}"))
    }
}

/// Inline artifact sent with a user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
}

impl Attachment {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// One entry of the append-only conversation log.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub content: String,
    pub citations: Vec<Citation>,
    pub attachment: Option<Attachment>,
}

impl Turn {
    pub fn user(id: TurnId, content: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            citations: Vec::new(),
            attachment,
        }
    }

    pub fn assistant(id: TurnId, content: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            citations,
            attachment: None,
        }
    }
}

/// How the most recent backend exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    Answered,
    Failed,
}

/// Request lifecycle of the session.
///
/// Submissions may overlap, so the awaiting phase counts outstanding requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    AwaitingResponse {
        in_flight: usize,
    },
    /// Idle after the last outstanding request failed.
    IdleAfterError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransition {
    Submit,
    Resolve(ResponseOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransitionRejection {
    NoRequestInFlight,
}

pub type PhaseTransitionResult = Result<SessionPhase, PhaseTransitionRejection>;

impl SessionPhase {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::AwaitingResponse { .. })
    }

    pub fn in_flight(&self) -> usize {
        match self {
            Self::AwaitingResponse { in_flight } => *in_flight,
            Self::Idle | Self::IdleAfterError => 0,
        }
    }

    pub fn apply(&self, transition: PhaseTransition) -> PhaseTransitionResult {
        match transition {
            PhaseTransition::Submit => Ok(Self::AwaitingResponse {
                in_flight: self.in_flight() + 1,
            }),
            PhaseTransition::Resolve(outcome) => self.apply_resolve(outcome),
        }
    }

    fn apply_resolve(&self, outcome: ResponseOutcome) -> PhaseTransitionResult {
        match (self, outcome) {
            (Self::AwaitingResponse { in_flight }, _) if *in_flight > 1 => {
                Ok(Self::AwaitingResponse {
                    in_flight: in_flight - 1,
                })
            }
            (Self::AwaitingResponse { .. }, ResponseOutcome::Answered) => Ok(Self::Idle),
            (Self::AwaitingResponse { .. }, ResponseOutcome::Failed) => Ok(Self::IdleAfterError),
            (Self::Idle | Self::IdleAfterError, _) => {
                Err(PhaseTransitionRejection::NoRequestInFlight)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(file_name: &str, file_type: &str) -> SourceRecord {
        SourceRecord {
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
            ..SourceRecord::default()
        }
    }

    #[test]
    fn citation_normalizes_service_fields() {
        let record = SourceRecord {
            score: Some(1.7),
            page_number: Some(0),
            filepath: Some("  ".to_string()),
            timestamp: Some(String::new()),
            ..source("policy.pdf", "PDF")
        };

        let citation = Citation::from_source(TurnId::new(4), 1, record);
        assert_eq!(citation.key, CitationKey::new(TurnId::new(4), 1));
        assert_eq!(citation.file_type, FileType::Pdf);
        assert_eq!(citation.score, Some(1.0));
        assert_eq!(citation.page_number, None);
        assert_eq!(citation.storage_path, None);
        assert_eq!(citation.time_range, None);
    }

    #[test]
    fn unknown_file_types_keep_their_tag() {
        let citation = Citation::from_source(TurnId::new(1), 1, source("deck.pptx", "slides"));
        assert_eq!(citation.file_type, FileType::Other("slides".to_string()));
        assert_eq!(citation.file_type.as_str(), "slides");
    }

    #[test]
    fn label_includes_page_and_range() {
        let pdf = Citation::from_source(
            TurnId::new(2),
            1,
            SourceRecord {
                page_number: Some(2),
                score: Some(0.91),
                ..source("policy.pdf", "pdf")
            },
        );
        assert_eq!(pdf.label(), "[1] policy.pdf (p. 2)");
        assert_eq!(pdf.score_label().as_deref(), Some("0.910"));

        let audio = Citation::from_source(
            TurnId::new(2),
            2,
            SourceRecord {
                timestamp: Some("150-300".to_string()),
                ..source("talk.wav", "audio")
            },
        );
        assert_eq!(audio.label(), "[2] talk.wav (150-300)");
        assert_eq!(audio.score_label(), None);
    }

    #[test]
    fn overlapping_submits_stay_pending_until_the_last_resolves() {
        let phase = SessionPhase::Idle;
        let phase = phase.apply(PhaseTransition::Submit).unwrap();
        let phase = phase.apply(PhaseTransition::Submit).unwrap();
        assert_eq!(phase, SessionPhase::AwaitingResponse { in_flight: 2 });

        let phase = phase
            .apply(PhaseTransition::Resolve(ResponseOutcome::Failed))
            .unwrap();
        assert!(phase.is_pending());

        let phase = phase
            .apply(PhaseTransition::Resolve(ResponseOutcome::Answered))
            .unwrap();
        assert_eq!(phase, SessionPhase::Idle);
    }

    #[test]
    fn failed_last_request_lands_in_error_idle() {
        let phase = SessionPhase::IdleAfterError
            .apply(PhaseTransition::Submit)
            .unwrap()
            .apply(PhaseTransition::Resolve(ResponseOutcome::Failed))
            .unwrap();
        assert_eq!(phase, SessionPhase::IdleAfterError);
        assert!(!phase.is_pending());
    }

    #[test]
    fn resolve_without_request_is_rejected() {
        assert_eq!(
            SessionPhase::Idle.apply(PhaseTransition::Resolve(ResponseOutcome::Answered)),
            Err(PhaseTransitionRejection::NoRequestInFlight)
        );
    }
}

//! Sessions and the stage state machine

use crate::{DomainError, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a session has completed
///
/// Stages advance strictly forward. The verify/revise loop is unrolled by
/// round number so no stage is ever revisited:
///
/// ```text
/// Created → Hypotheses → SearchPlan → Evidence → Certitude → Draft
///   → Verification{0} → Revision{1} → Verification{1} → ... → Style
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Session created, nothing run yet
    Created,
    /// Hypotheses formed
    Hypotheses,
    /// Search plan designed
    SearchPlan,
    /// Evidence gathered
    Evidence,
    /// Certitudes updated
    Certitude,
    /// First draft written
    Draft,
    /// Draft verified; round 0 is the initial draft
    Verification {
        /// Revision round the verified draft came from
        round: u32,
    },
    /// Draft revised
    Revision {
        /// Revision round, starting at 1
        round: u32,
    },
    /// Final report styled
    Style,
}

impl Stage {
    /// Whether moving from `self` to `next` is a legal forward step
    pub fn can_advance_to(&self, next: Stage) -> bool {
        use Stage::*;
        match (*self, next) {
            (Created, Hypotheses)
            | (Hypotheses, SearchPlan)
            | (SearchPlan, Evidence)
            | (Evidence, Certitude)
            | (Certitude, Draft)
            | (Draft, Verification { round: 0 })
            | (Verification { .. }, Style) => true,
            (Verification { round: r }, Revision { round: n }) => n == r + 1,
            (Revision { round: r }, Verification { round: n }) => n == r,
            _ => false,
        }
    }

    /// Check a transition, returning an error when it is not a forward step
    pub fn advance_to(&self, next: Stage) -> Result<Stage, DomainError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(DomainError::IllegalTransition { from: *self, to: next })
        }
    }

    /// Parse the textual form produced by `Display`
    pub fn parse(s: &str) -> Option<Self> {
        let (name, round) = match s.split_once(':') {
            Some((name, round)) => (name, Some(round.parse::<u32>().ok()?)),
            None => (s, None),
        };
        match (name, round) {
            ("created", None) => Some(Stage::Created),
            ("hypotheses", None) => Some(Stage::Hypotheses),
            ("search_plan", None) => Some(Stage::SearchPlan),
            ("evidence", None) => Some(Stage::Evidence),
            ("certitude", None) => Some(Stage::Certitude),
            ("draft", None) => Some(Stage::Draft),
            ("verification", Some(round)) => Some(Stage::Verification { round }),
            ("revision", Some(round)) => Some(Stage::Revision { round }),
            ("style", None) => Some(Stage::Style),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Created => write!(f, "created"),
            Stage::Hypotheses => write!(f, "hypotheses"),
            Stage::SearchPlan => write!(f, "search_plan"),
            Stage::Evidence => write!(f, "evidence"),
            Stage::Certitude => write!(f, "certitude"),
            Stage::Draft => write!(f, "draft"),
            Stage::Verification { round } => write!(f, "verification:{}", round),
            Stage::Revision { round } => write!(f, "revision:{}", round),
            Stage::Style => write!(f, "style"),
        }
    }
}

/// Overall status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Pipeline in progress
    Running,
    /// Finished with the verification threshold met
    Done,
    /// Finished with the threshold missed after the revision budget
    DoneWithWarning,
    /// Stopped by a fatal error; artifacts preserved
    Failed,
    /// Stopped at a stage boundary on request
    Cancelled,
}

impl SessionStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Done => "done",
            SessionStatus::DoneWithWarning => "done_with_warning",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SessionStatus::Running),
            "done" => Some(SessionStatus::Done),
            "done_with_warning" => Some(SessionStatus::DoneWithWarning),
            "failed" => Some(SessionStatus::Failed),
            "cancelled" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the session will not progress any further by itself
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

/// One research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,
    /// Research topic
    pub topic: String,
    /// Last completed stage
    pub current_stage: Stage,
    /// Overall status
    pub status: SessionStatus,
    /// Revision rounds used so far
    pub revision_count: u32,
    /// Error message for failed sessions
    pub error: Option<String>,
    /// Serialized pipeline configuration the session runs with
    pub config: Option<String>,
    /// Creation time (Unix seconds)
    pub created_at: u64,
    /// Last update time (Unix seconds)
    pub updated_at: u64,
}

impl Session {
    /// Create a running session at the `Created` stage
    pub fn new(topic: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: SessionId::new(),
            topic: topic.into(),
            current_stage: Stage::Created,
            status: SessionStatus::Running,
            revision_count: 0,
            error: None,
            config: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Advance to the next stage, rejecting backward or skipping moves
    pub fn advance(&mut self, next: Stage, now: u64) -> Result<(), DomainError> {
        self.current_stage = self.current_stage.advance_to(next)?;
        if let Stage::Revision { round } = next {
            self.revision_count = round;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// A line of the append-only session transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Stage the entry was logged in
    pub stage: String,
    /// Message
    pub message: String,
    /// When it was logged (Unix seconds)
    pub logged_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_progression() {
        let path = [
            Stage::Created,
            Stage::Hypotheses,
            Stage::SearchPlan,
            Stage::Evidence,
            Stage::Certitude,
            Stage::Draft,
            Stage::Verification { round: 0 },
            Stage::Revision { round: 1 },
            Stage::Verification { round: 1 },
            Stage::Revision { round: 2 },
            Stage::Verification { round: 2 },
            Stage::Style,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_backward_and_skipping_moves_rejected() {
        assert!(!Stage::Draft.can_advance_to(Stage::Evidence));
        assert!(!Stage::Created.can_advance_to(Stage::Draft));
        assert!(!Stage::Verification { round: 1 }.can_advance_to(Stage::Revision { round: 1 }));
        assert!(!Stage::Revision { round: 2 }.can_advance_to(Stage::Verification { round: 1 }));
        assert!(!Stage::Style.can_advance_to(Stage::Style));
        assert!(!Stage::Revision { round: 1 }.can_advance_to(Stage::Style));
    }

    #[test]
    fn test_session_advance_tracks_revisions() {
        let mut session = Session::new("topic", 10);
        for stage in [
            Stage::Hypotheses,
            Stage::SearchPlan,
            Stage::Evidence,
            Stage::Certitude,
            Stage::Draft,
            Stage::Verification { round: 0 },
            Stage::Revision { round: 1 },
        ] {
            session.advance(stage, 20).unwrap();
        }
        assert_eq!(session.revision_count, 1);
        assert_eq!(session.updated_at, 20);

        let err = session.advance(Stage::Hypotheses, 30).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));
    }

    #[test]
    fn test_stage_text_roundtrip() {
        for stage in [
            Stage::Created,
            Stage::SearchPlan,
            Stage::Verification { round: 3 },
            Stage::Revision { round: 2 },
            Stage::Style,
        ] {
            assert_eq!(Stage::parse(&stage.to_string()), Some(stage));
        }
        assert_eq!(Stage::parse("verification"), None);
        assert_eq!(Stage::parse("draft:1"), None);
        assert_eq!(Stage::parse("bogus"), None);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(SessionStatus::parse("done_with_warning"), Some(SessionStatus::DoneWithWarning));
        assert!(SessionStatus::Failed.is_terminal());
        assert!(!SessionStatus::Running.is_terminal());
    }
}

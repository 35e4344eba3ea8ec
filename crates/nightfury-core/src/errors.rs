use crate::status::Status;

/// A state-machine precondition was violated. Returned to the direct caller;
/// no mutation has happened when this is produced.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("game already started")]
    AlreadyStarted,
    #[error("game not yet started")]
    NotStarted,
    #[error("game completed")]
    Completed,
    #[error("game failed")]
    Failed,
    #[error("game already in progress")]
    AlreadyInProgress,
    #[error("no ready game available")]
    NoReadyGame,
    #[error("cannot {verb} from a {from} game")]
    IllegalGameTransition { verb: &'static str, from: Status },
}

impl TransitionError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AlreadyStarted => "already_started",
            Self::NotStarted => "not_started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::AlreadyInProgress => "already_in_progress",
            Self::NoReadyGame => "no_ready_game",
            Self::IllegalGameTransition { .. } => "illegal_game_transition",
        }
    }
}

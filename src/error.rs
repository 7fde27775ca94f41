//! Error taxonomy for the game-state engine.
//!
//! Every variant is a definite business-rule violation surfaced to the caller.
//! Nothing here is retried by the engine.

use crate::types::{CellId, TeamId, UserId};

/// Result type for engine operations
pub type BingoResult<T> = Result<T, BingoError>;

/// Coarse grouping of errors, used by the HTTP adapter to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authorization,
    NotFound,
    Precondition,
    Validation,
    Storage,
}

/// Errors that can occur while playing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BingoError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot review your own proof")]
    SelfReview,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Game already started")]
    AlreadyStarted,

    #[error("Team resolution must be set before starting")]
    MissingTeamResolution,

    #[error("Need at least 2 team members to start, team has {count}")]
    InsufficientMembers { count: usize },

    #[error("Member {member} has only created {actual} of {expected} required resolutions")]
    ResolutionsIncomplete {
        member: UserId,
        actual: usize,
        expected: usize,
    },

    #[error("Bingo card already exists for user {user_id} in team {team_id}")]
    DuplicateCard { team_id: TeamId, user_id: UserId },

    #[error("Proof has already been reviewed")]
    AlreadyReviewed,

    #[error("Already a team member")]
    AlreadyMember,

    #[error("Invalid state {0:?}, must be \"to_complete\" or \"completed\"")]
    InvalidTransition(String),

    #[error("Empty cell {0} cannot be marked as completed")]
    EmptyCellNotCompletable(CellId),

    #[error("Comment is required when declining proof")]
    CommentRequired,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Only image files are allowed (got {0})")]
    UnsupportedMediaType(String),

    #[error("Upload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl BingoError {
    pub fn category(&self) -> ErrorCategory {
        use BingoError::*;

        match self {
            Forbidden(_) | SelfReview => ErrorCategory::Authorization,
            NotFound(_) => ErrorCategory::NotFound,
            AlreadyStarted
            | MissingTeamResolution
            | InsufficientMembers { .. }
            | ResolutionsIncomplete { .. }
            | DuplicateCard { .. }
            | AlreadyReviewed
            | AlreadyMember => ErrorCategory::Precondition,
            InvalidTransition(_)
            | EmptyCellNotCompletable(_)
            | CommentRequired
            | InvalidInput(_)
            | UnsupportedMediaType(_)
            | PayloadTooLarge { .. } => ErrorCategory::Validation,
            Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Stable machine-readable name for the error body
    pub fn kind(&self) -> &'static str {
        use BingoError::*;

        match self {
            Forbidden(_) => "FORBIDDEN",
            SelfReview => "SELF_REVIEW",
            NotFound(_) => "NOT_FOUND",
            AlreadyStarted => "ALREADY_STARTED",
            MissingTeamResolution => "MISSING_TEAM_RESOLUTION",
            InsufficientMembers { .. } => "INSUFFICIENT_MEMBERS",
            ResolutionsIncomplete { .. } => "RESOLUTIONS_INCOMPLETE",
            DuplicateCard { .. } => "DUPLICATE_CARD",
            AlreadyReviewed => "ALREADY_REVIEWED",
            AlreadyMember => "ALREADY_MEMBER",
            InvalidTransition(_) => "INVALID_TRANSITION",
            EmptyCellNotCompletable(_) => "EMPTY_CELL_NOT_COMPLETABLE",
            CommentRequired => "COMMENT_REQUIRED",
            InvalidInput(_) => "INVALID_INPUT",
            UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Storage(_) => "STORAGE",
        }
    }

    pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
        BingoError::Forbidden(msg.into())
    }
}

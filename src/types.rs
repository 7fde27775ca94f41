use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BingoError;

/// Opaque ID types for type safety
pub type TeamId = String;
pub type UserId = String;
pub type InvitationId = String;
pub type ProvidedResolutionId = String;
pub type PersonalResolutionId = String;
pub type CardId = String;
pub type CellId = String;
pub type ProofId = String;

/// Text written into cells the resolution pool could not fill
pub const EMPTY_CELL_TEXT: &str = "[Empty]";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    Forming,
    Started,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub leader_id: UserId,
    pub team_resolution_text: Option<String>,
    pub status: TeamStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Leader,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub role: MembershipRole,
    pub joined_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub team_id: TeamId,
    pub invited_email: String,
    pub invite_code: String,
    pub status: InvitationStatus,
    pub created_at: String,
}

/// A prompt one member writes for another member of the same team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidedResolution {
    pub id: ProvidedResolutionId,
    pub team_id: TeamId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub text: String,
    pub updated_at: String,
}

/// A prompt a user writes for themself, used to fill up their cards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalResolution {
    pub id: PersonalResolutionId,
    pub user_id: UserId,
    pub text: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Where the text of a cell came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    TeamResolution,
    TeamProvided,
    Personal,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    ToComplete,
    Completed,
}

impl CellState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellState::ToComplete => "to_complete",
            CellState::Completed => "completed",
        }
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellState {
    type Err = BingoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to_complete" => Ok(CellState::ToComplete),
            "completed" => Ok(CellState::Completed),
            other => Err(BingoError::InvalidTransition(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BingoCard {
    pub id: CardId,
    pub team_id: TeamId,
    pub user_id: UserId,
    pub grid_size: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BingoCell {
    pub id: CellId,
    pub card_id: CardId,
    pub row: usize,
    pub col: usize,
    pub resolution_text: String,
    pub is_joker: bool,
    pub is_empty: bool,
    pub source_kind: SourceKind,
    pub source_id: Option<String>,
    pub state: CellState,
}

/// A card together with its cells in row-major order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardView {
    #[serde(flatten)]
    pub card: BingoCard,
    pub cells: Vec<BingoCell>,
}

impl CardView {
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&BingoCell> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }

    pub fn empty_cell_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_empty).count()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProofStatus {
    Pending,
    Approved,
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    pub id: ProofId,
    pub cell_id: CellId,
    /// Location reference returned by the blob store
    pub file_ref: String,
    pub mime_type: String,
    pub status: ProofStatus,
    pub reviewed_by: Option<UserId>,
    pub review_comment: Option<String>,
    pub uploaded_at: String,
    pub reviewed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Decline,
}

/// Team details as seen by one of its members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamOverview {
    pub team: Team,
    pub members: Vec<Membership>,
    pub my_role: MembershipRole,
}

/// Whether the requester has already written a prompt for a teammate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolutionToCreate {
    pub user_id: UserId,
    pub resolution_provided: bool,
    pub resolution_text: Option<String>,
    pub resolution_id: Option<ProvidedResolutionId>,
}

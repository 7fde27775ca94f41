mod card;
mod cell;
mod game;
mod pool;
mod proof;
mod resolution;
mod team;

pub use card::generate_card;
pub use game::start_game_in;
pub use pool::{build_resolution_pool, PoolEntry};

use crate::blob::{BlobStore, MemoryBlobStore};
use crate::config::BingoConfig;
use crate::error::{BingoError, BingoResult};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Every persisted row of the game. Cloned as a whole to stage a transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    pub teams: HashMap<TeamId, Team>,
    /// Kept in join order; the leader is always first for their team
    pub memberships: Vec<Membership>,
    pub invitations: HashMap<InvitationId, Invitation>,
    pub provided_resolutions: HashMap<ProvidedResolutionId, ProvidedResolution>,
    pub personal_resolutions: HashMap<PersonalResolutionId, PersonalResolution>,
    pub cards: HashMap<CardId, BingoCard>,
    pub cells: HashMap<CellId, BingoCell>,
    pub proofs: HashMap<ProofId, Proof>,
}

impl Tables {
    pub fn team(&self, team_id: &str) -> BingoResult<&Team> {
        self.teams.get(team_id).ok_or(BingoError::NotFound("Team"))
    }

    pub fn membership(&self, team_id: &str, user_id: &str) -> Option<&Membership> {
        self.memberships
            .iter()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
    }

    pub fn is_member(&self, team_id: &str, user_id: &str) -> bool {
        self.membership(team_id, user_id).is_some()
    }

    /// Fails with Forbidden unless the user belongs to the team
    pub fn require_member(&self, team_id: &str, user_id: &str) -> BingoResult<&Membership> {
        self.membership(team_id, user_id)
            .ok_or_else(|| BingoError::forbidden("Not a team member"))
    }

    /// Members of a team in join order
    pub fn members_of(&self, team_id: &str) -> Vec<&Membership> {
        self.memberships
            .iter()
            .filter(|m| m.team_id == team_id)
            .collect()
    }

    pub fn card_for(&self, team_id: &str, user_id: &str) -> Option<&BingoCard> {
        self.cards
            .values()
            .find(|c| c.team_id == team_id && c.user_id == user_id)
    }

    /// Card with its cells sorted row-major
    pub fn card_view(&self, card: &BingoCard) -> CardView {
        let mut cells: Vec<BingoCell> = self
            .cells
            .values()
            .filter(|c| c.card_id == card.id)
            .cloned()
            .collect();
        cells.sort_by_key(|c| (c.row, c.col));

        CardView {
            card: card.clone(),
            cells,
        }
    }

    /// Resolve a cell together with the card it belongs to
    pub fn cell_with_card(&self, cell_id: &str) -> BingoResult<(&BingoCell, &BingoCard)> {
        let cell = self.cells.get(cell_id).ok_or(BingoError::NotFound("Cell"))?;
        let card = self
            .cards
            .get(&cell.card_id)
            .ok_or(BingoError::NotFound("Card"))?;
        Ok((cell, card))
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub tables: Arc<RwLock<Tables>>,
    pub config: Arc<BingoConfig>,
    pub blob_store: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(BingoConfig::default(), Arc::new(MemoryBlobStore::new()))
    }

    pub fn with_config(config: BingoConfig, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            config: Arc::new(config),
            blob_store,
        }
    }

    /// Run `f` against a staged copy of all tables while holding the write lock.
    ///
    /// The staged copy replaces the live tables only if `f` returns `Ok`, so a
    /// failure anywhere inside leaves no trace. Concurrent transactions are
    /// serialized by the lock.
    pub async fn transaction<T, F>(&self, f: F) -> BingoResult<T>
    where
        F: FnOnce(&mut Tables) -> BingoResult<T>,
    {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let out = f(&mut staged)?;
        *tables = staged;
        Ok(out)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(crate) fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

/// Trim and bound a user-supplied text
pub(crate) fn clean_text(text: &str, max_chars: usize, what: &str) -> BingoResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BingoError::InvalidInput(format!("{} cannot be empty", what)));
    }
    if trimmed.chars().count() > max_chars {
        return Err(BingoError::InvalidInput(format!(
            "{} is too long (max {} characters)",
            what, max_chars
        )));
    }
    Ok(trimmed.to_string())
}

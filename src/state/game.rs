use super::{generate_card, AppState, Tables};
use crate::error::{BingoError, BingoResult};
use crate::types::*;
use rand::Rng;
use std::collections::HashMap;

/// Check readiness, generate every member's card and flip the team to started.
///
/// Runs against a transaction context; the caller commits only on `Ok`.
pub fn start_game_in<R: Rng + ?Sized>(
    tx: &mut Tables,
    team_id: &str,
    requester: &str,
    grid_size: usize,
    rng: &mut R,
) -> BingoResult<Vec<CardView>> {
    let team = tx.team(team_id)?.clone();

    if team.leader_id != requester {
        return Err(BingoError::forbidden("Only team leader can start the game"));
    }
    if team.status == TeamStatus::Started {
        return Err(BingoError::AlreadyStarted);
    }
    let team_resolution = match team.team_resolution_text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => return Err(BingoError::MissingTeamResolution),
    };

    let members: Vec<UserId> = tx
        .members_of(team_id)
        .into_iter()
        .map(|m| m.user_id.clone())
        .collect();
    if members.len() < 2 {
        return Err(BingoError::InsufficientMembers {
            count: members.len(),
        });
    }

    // Authored prompts per member, counted in one pass
    let mut authored: HashMap<&str, usize> = HashMap::new();
    for r in tx
        .provided_resolutions
        .values()
        .filter(|r| r.team_id == team_id)
    {
        *authored.entry(r.from_user_id.as_str()).or_insert(0) += 1;
    }

    let expected = members.len() - 1;
    if let Some(member) = members
        .iter()
        .find(|m| authored.get(m.as_str()).copied().unwrap_or(0) < expected)
    {
        return Err(BingoError::ResolutionsIncomplete {
            member: member.clone(),
            actual: authored.get(member.as_str()).copied().unwrap_or(0),
            expected,
        });
    }

    let mut cards = Vec::with_capacity(members.len());
    for member in &members {
        cards.push(generate_card(
            tx,
            team_id,
            member,
            &team_resolution,
            grid_size,
            rng,
        )?);
    }

    if let Some(team) = tx.teams.get_mut(team_id) {
        team.status = TeamStatus::Started;
    }

    Ok(cards)
}

impl AppState {
    /// Start the bingo game for a team. All or nothing: either every member
    /// gets a card and the team is started, or nothing changes.
    pub async fn start_game(&self, team_id: &str, requester: &str) -> BingoResult<()> {
        let grid_size = self.config.grid_size;
        let result = self
            .transaction(|tx| {
                let mut rng = rand::rng();
                start_game_in(tx, team_id, requester, grid_size, &mut rng)
            })
            .await;

        match result {
            Ok(cards) => {
                tracing::info!(
                    "Team {} started with {} cards of {}x{}",
                    team_id,
                    cards.len(),
                    grid_size,
                    grid_size
                );
                Ok(())
            }
            Err(e) => {
                tracing::info!("Start of team {} rejected: {}", team_id, e);
                Err(e)
            }
        }
    }
}

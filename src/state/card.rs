use super::{build_resolution_pool, new_id, now, AppState, Tables};
use crate::config::{is_valid_grid_size, MAX_GRID_SIZE};
use crate::error::{BingoError, BingoResult};
use crate::types::*;
use rand::seq::SliceRandom;
use rand::Rng;

/// Lay out and persist one member's card inside an open transaction.
///
/// The center cell is the joker carrying `team_resolution`. Every other cell
/// takes the next prompt from the shuffled pool, or becomes an empty
/// placeholder once the pool runs out. Single-shot per (team, member).
pub fn generate_card<R: Rng + ?Sized>(
    tx: &mut Tables,
    team_id: &str,
    member: &str,
    team_resolution: &str,
    grid_size: usize,
    rng: &mut R,
) -> BingoResult<CardView> {
    if !is_valid_grid_size(grid_size) {
        return Err(BingoError::InvalidInput(format!(
            "Grid size must be an odd number between 1 and {}, got {}",
            MAX_GRID_SIZE, grid_size
        )));
    }
    if tx.card_for(team_id, member).is_some() {
        return Err(BingoError::DuplicateCard {
            team_id: team_id.to_string(),
            user_id: member.to_string(),
        });
    }

    let card = BingoCard {
        id: new_id(),
        team_id: team_id.to_string(),
        user_id: member.to_string(),
        grid_size,
        created_at: now(),
    };

    let mut pool = build_resolution_pool(tx, team_id, member);
    let pool_size = pool.len();
    pool.shuffle(rng);
    let mut pool = pool.into_iter();

    let center = grid_size / 2;
    let mut cells = Vec::with_capacity(grid_size * grid_size);

    for row in 0..grid_size {
        for col in 0..grid_size {
            let (resolution_text, is_joker, is_empty, source_kind, source_id) =
                if row == center && col == center {
                    (
                        team_resolution.to_string(),
                        true,
                        false,
                        SourceKind::TeamResolution,
                        None,
                    )
                } else if let Some(entry) = pool.next() {
                    (
                        entry.text,
                        false,
                        false,
                        entry.source_kind,
                        Some(entry.source_id),
                    )
                } else {
                    (
                        EMPTY_CELL_TEXT.to_string(),
                        false,
                        true,
                        SourceKind::None,
                        None,
                    )
                };

            cells.push(BingoCell {
                id: new_id(),
                card_id: card.id.clone(),
                row,
                col,
                resolution_text,
                is_joker,
                is_empty,
                source_kind,
                source_id,
                state: CellState::ToComplete,
            });
        }
    }

    tracing::debug!(
        "Generated {}x{} card {} for {} from a pool of {}",
        grid_size,
        grid_size,
        card.id,
        member,
        pool_size
    );

    for cell in &cells {
        tx.cells.insert(cell.id.clone(), cell.clone());
    }
    tx.cards.insert(card.id.clone(), card.clone());

    Ok(CardView { card, cells })
}

impl AppState {
    /// The card `user_id` received when the team started
    pub async fn get_card(&self, team_id: &str, user_id: &str) -> BingoResult<CardView> {
        let tables = self.tables.read().await;
        let card = tables
            .card_for(team_id, user_id)
            .ok_or(BingoError::NotFound("Bingo card"))?;
        Ok(tables.card_view(card))
    }

    /// Any member of a team may look at any other member's card
    pub async fn get_card_for_viewer(
        &self,
        team_id: &str,
        viewer: &str,
        owner: &str,
    ) -> BingoResult<CardView> {
        {
            let tables = self.tables.read().await;
            tables.team(team_id)?;
            tables.require_member(team_id, viewer)?;
        }
        self.get_card(team_id, owner).await
    }

    /// All cards of a team, without their cells
    pub async fn list_team_cards(
        &self,
        team_id: &str,
        viewer: &str,
    ) -> BingoResult<Vec<BingoCard>> {
        let tables = self.tables.read().await;
        tables.team(team_id)?;
        tables.require_member(team_id, viewer)?;

        let mut cards: Vec<BingoCard> = tables
            .cards
            .values()
            .filter(|c| c.team_id == team_id)
            .cloned()
            .collect();
        cards.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tables_with_personal(user: &str, count: usize) -> Tables {
        let mut tables = Tables::default();
        for i in 0..count {
            let r = PersonalResolution {
                id: format!("r{:03}", i),
                user_id: user.to_string(),
                text: format!("Resolution #{}", i),
                created_at: String::new(),
                updated_at: String::new(),
            };
            tables.personal_resolutions.insert(r.id.clone(), r);
        }
        tables
    }

    #[test]
    fn test_joker_at_center_for_any_odd_size() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in [1usize, 3, 5, 7, 9] {
            for pool_size in [0usize, 3, n * n] {
                let mut tables = tables_with_personal("alice", pool_size);
                let view =
                    generate_card(&mut tables, "t1", "alice", "Be kind", n, &mut rng).unwrap();

                assert_eq!(view.cells.len(), n * n);
                let jokers: Vec<_> = view.cells.iter().filter(|c| c.is_joker).collect();
                assert_eq!(jokers.len(), 1);
                let joker = jokers[0];
                assert_eq!((joker.row, joker.col), (n / 2, n / 2));
                assert_eq!(joker.resolution_text, "Be kind");
                assert_eq!(joker.source_kind, SourceKind::TeamResolution);
                assert!(!joker.is_empty);
                assert_eq!(joker.state, CellState::ToComplete);
            }
        }
    }

    #[test]
    fn test_empty_pool_fills_with_placeholders() {
        let mut tables = Tables::default();
        let mut rng = StdRng::seed_from_u64(1);
        let view = generate_card(&mut tables, "t1", "alice", "Be kind", 5, &mut rng).unwrap();

        assert_eq!(view.empty_cell_count(), 24);
        for cell in view.cells.iter().filter(|c| !c.is_joker) {
            assert!(cell.is_empty);
            assert_eq!(cell.resolution_text, EMPTY_CELL_TEXT);
            assert_eq!(cell.source_kind, SourceKind::None);
            assert!(cell.source_id.is_none());
        }
    }

    #[test]
    fn test_pool_exhaustion_boundary() {
        let mut rng = StdRng::seed_from_u64(3);

        let mut exact = tables_with_personal("alice", 24);
        let view = generate_card(&mut exact, "t1", "alice", "Joker", 5, &mut rng).unwrap();
        assert_eq!(view.empty_cell_count(), 0);

        let mut one_short = tables_with_personal("alice", 23);
        let view = generate_card(&mut one_short, "t1", "alice", "Joker", 5, &mut rng).unwrap();
        assert_eq!(view.empty_cell_count(), 1);

        let mut surplus = tables_with_personal("alice", 40);
        let view = generate_card(&mut surplus, "t1", "alice", "Joker", 5, &mut rng).unwrap();
        assert_eq!(view.empty_cell_count(), 0);
    }

    #[test]
    fn test_cells_are_row_major_and_never_joker_and_empty() {
        let mut tables = tables_with_personal("alice", 4);
        let mut rng = StdRng::seed_from_u64(11);
        let view = generate_card(&mut tables, "t1", "alice", "Joker", 3, &mut rng).unwrap();

        let coords: Vec<_> = view.cells.iter().map(|c| (c.row, c.col)).collect();
        let expected: Vec<_> = (0..3).flat_map(|r| (0..3).map(move |c| (r, c))).collect();
        assert_eq!(coords, expected);
        assert!(view.cells.iter().all(|c| !(c.is_joker && c.is_empty)));
        assert_eq!(view.empty_cell_count(), 4);
    }

    #[test]
    fn test_each_prompt_used_once() {
        let mut tables = tables_with_personal("alice", 24);
        let mut rng = StdRng::seed_from_u64(5);
        let view = generate_card(&mut tables, "t1", "alice", "Joker", 5, &mut rng).unwrap();

        let mut ids: Vec<_> = view
            .cells
            .iter()
            .filter_map(|c| c.source_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 24);
    }

    #[test]
    fn test_shuffle_varies_layout() {
        let mut layouts = std::collections::HashSet::new();
        for seed in 0..20 {
            let mut tables = tables_with_personal("alice", 8);
            let mut rng = StdRng::seed_from_u64(seed);
            let view = generate_card(&mut tables, "t1", "alice", "Joker", 3, &mut rng).unwrap();
            let layout: Vec<_> = view.cells.iter().map(|c| c.resolution_text.clone()).collect();
            layouts.insert(layout);
        }
        assert!(layouts.len() > 1);
    }

    #[test]
    fn test_duplicate_card_rejected() {
        let mut tables = Tables::default();
        let mut rng = StdRng::seed_from_u64(2);
        generate_card(&mut tables, "t1", "alice", "Joker", 3, &mut rng).unwrap();

        let again = generate_card(&mut tables, "t1", "alice", "Joker", 3, &mut rng);
        assert_eq!(
            again.unwrap_err(),
            BingoError::DuplicateCard {
                team_id: "t1".to_string(),
                user_id: "alice".to_string()
            }
        );
        assert_eq!(tables.cards.len(), 1);
        assert_eq!(tables.cells.len(), 9);
    }

    #[test]
    fn test_even_grid_size_rejected() {
        let mut tables = Tables::default();
        let mut rng = StdRng::seed_from_u64(2);
        let result = generate_card(&mut tables, "t1", "alice", "Joker", 4, &mut rng);
        assert!(matches!(result, Err(BingoError::InvalidInput(_))));
        assert!(tables.cards.is_empty());
    }

    #[test]
    fn test_oversized_grid_rejected_before_layout() {
        let mut tables = Tables::default();
        let mut rng = StdRng::seed_from_u64(2);
        let result = generate_card(&mut tables, "t1", "alice", "Joker", 99_999, &mut rng);
        assert!(matches!(result, Err(BingoError::InvalidInput(_))));
        assert!(tables.cells.is_empty());
    }

    #[tokio::test]
    async fn test_get_card_not_found() {
        let state = AppState::new();
        let result = state.get_card("t1", "alice").await;
        assert_eq!(result.unwrap_err(), BingoError::NotFound("Bingo card"));
    }
}

use super::AppState;
use crate::error::{BingoError, BingoResult};
use crate::types::*;

impl AppState {
    /// Mark a cell completed or revert it to be completed.
    ///
    /// Only the card owner may change a cell. Empty cells can never be
    /// completed. The previous state is not consulted, so both directions are
    /// always allowed for eligible cells, jokers included.
    pub async fn set_cell_state(
        &self,
        cell_id: &str,
        requester: &str,
        new_state: &str,
    ) -> BingoResult<BingoCell> {
        let mut tables = self.tables.write().await;

        let (cell, card) = tables.cell_with_card(cell_id)?;
        if card.user_id != requester {
            return Err(BingoError::forbidden("You can only update your own card"));
        }
        let new_state: CellState = new_state.parse()?;
        if cell.is_empty && new_state == CellState::Completed {
            return Err(BingoError::EmptyCellNotCompletable(cell.id.clone()));
        }

        let cell = tables
            .cells
            .get_mut(cell_id)
            .ok_or(BingoError::NotFound("Cell"))?;
        cell.state = new_state;
        tracing::debug!("Cell {} set to {}", cell_id, new_state);
        Ok(cell.clone())
    }
}

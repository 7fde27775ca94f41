use super::{new_id, now, AppState};
use crate::blob::validate_upload;
use crate::error::{BingoError, BingoResult};
use crate::types::*;

impl AppState {
    /// Attach a proof image to one of the requester's own cells.
    ///
    /// Older proofs of the same cell are kept as history.
    pub async fn submit_proof(
        &self,
        cell_id: &str,
        requester: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> BingoResult<Proof> {
        {
            let tables = self.tables.read().await;
            let (_, card) = tables.cell_with_card(cell_id)?;
            if card.user_id != requester {
                return Err(BingoError::forbidden(
                    "You can only submit proof for your own card",
                ));
            }
        }
        validate_upload(bytes, mime_type, self.config.max_upload_bytes)?;

        let file_ref = self.blob_store.put(bytes, mime_type).await.map_err(|e| {
            tracing::error!("Failed to store proof for cell {}: {}", cell_id, e);
            BingoError::from(e)
        })?;

        let proof = Proof {
            id: new_id(),
            cell_id: cell_id.to_string(),
            file_ref,
            mime_type: mime_type.trim().to_ascii_lowercase(),
            status: ProofStatus::Pending,
            reviewed_by: None,
            review_comment: None,
            uploaded_at: now(),
            reviewed_at: None,
        };

        self.tables
            .write()
            .await
            .proofs
            .insert(proof.id.clone(), proof.clone());
        tracing::info!("Proof {} submitted for cell {}", proof.id, cell_id);
        Ok(proof)
    }

    /// Approve or decline a pending proof. Declining needs a comment.
    pub async fn review_proof(
        &self,
        proof_id: &str,
        requester: &str,
        decision: ReviewDecision,
        comment: Option<&str>,
    ) -> BingoResult<Proof> {
        let mut tables = self.tables.write().await;

        let proof = tables
            .proofs
            .get(proof_id)
            .ok_or(BingoError::NotFound("Proof"))?;
        let (_, card) = tables.cell_with_card(&proof.cell_id)?;
        tables.require_member(&card.team_id, requester)?;
        if card.user_id == requester {
            return Err(BingoError::SelfReview);
        }

        let comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        if decision == ReviewDecision::Decline && comment.is_none() {
            return Err(BingoError::CommentRequired);
        }
        if proof.status != ProofStatus::Pending {
            return Err(BingoError::AlreadyReviewed);
        }

        let proof = tables
            .proofs
            .get_mut(proof_id)
            .ok_or(BingoError::NotFound("Proof"))?;
        proof.status = match decision {
            ReviewDecision::Approve => ProofStatus::Approved,
            ReviewDecision::Decline => ProofStatus::Declined,
        };
        proof.reviewed_by = Some(requester.to_string());
        proof.reviewed_at = Some(now());
        proof.review_comment = comment;

        tracing::info!("Proof {} {:?} by {}", proof_id, proof.status, requester);
        Ok(proof.clone())
    }

    /// Proof history of a cell, newest first. Visible to team members.
    pub async fn list_cell_proofs(
        &self,
        cell_id: &str,
        requester: &str,
    ) -> BingoResult<Vec<Proof>> {
        let tables = self.tables.read().await;
        let (_, card) = tables.cell_with_card(cell_id)?;
        tables.require_member(&card.team_id, requester)?;

        let mut proofs: Vec<Proof> = tables
            .proofs
            .values()
            .filter(|p| p.cell_id == cell_id)
            .cloned()
            .collect();
        proofs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        Ok(proofs)
    }
}

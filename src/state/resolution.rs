use super::{clean_text, new_id, now, AppState};
use crate::error::{BingoError, BingoResult};
use crate::types::*;

impl AppState {
    /// Create a personal resolution owned by `user_id`
    pub async fn create_personal_resolution(
        &self,
        user_id: &str,
        text: &str,
    ) -> BingoResult<PersonalResolution> {
        let text = clean_text(text, self.config.max_resolution_chars, "Resolution text")?;
        let ts = now();
        let resolution = PersonalResolution {
            id: new_id(),
            user_id: user_id.to_string(),
            text,
            created_at: ts.clone(),
            updated_at: ts,
        };

        self.tables
            .write()
            .await
            .personal_resolutions
            .insert(resolution.id.clone(), resolution.clone());
        Ok(resolution)
    }

    /// A user's own resolutions, newest first
    pub async fn list_personal_resolutions(&self, user_id: &str) -> Vec<PersonalResolution> {
        let mut resolutions: Vec<PersonalResolution> = self
            .tables
            .read()
            .await
            .personal_resolutions
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        resolutions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        resolutions
    }

    /// Resolutions owned by someone else are reported as missing
    pub async fn get_personal_resolution(
        &self,
        user_id: &str,
        id: &str,
    ) -> BingoResult<PersonalResolution> {
        self.tables
            .read()
            .await
            .personal_resolutions
            .get(id)
            .filter(|r| r.user_id == user_id)
            .cloned()
            .ok_or(BingoError::NotFound("Resolution"))
    }

    pub async fn update_personal_resolution(
        &self,
        user_id: &str,
        id: &str,
        text: &str,
    ) -> BingoResult<PersonalResolution> {
        let text = clean_text(text, self.config.max_resolution_chars, "Resolution text")?;

        let mut tables = self.tables.write().await;
        let resolution = tables
            .personal_resolutions
            .get_mut(id)
            .filter(|r| r.user_id == user_id)
            .ok_or(BingoError::NotFound("Resolution"))?;
        resolution.text = text;
        resolution.updated_at = now();
        Ok(resolution.clone())
    }

    pub async fn delete_personal_resolution(&self, user_id: &str, id: &str) -> BingoResult<()> {
        let mut tables = self.tables.write().await;
        match tables.personal_resolutions.get(id) {
            Some(r) if r.user_id == user_id => {
                tables.personal_resolutions.remove(id);
                Ok(())
            }
            _ => Err(BingoError::NotFound("Resolution")),
        }
    }

    /// Write (or rewrite) the prompt `from` gives to `to` in a team.
    ///
    /// At most one row exists per (team, from, to); a second call overwrites its text.
    pub async fn upsert_provided_resolution(
        &self,
        team_id: &str,
        from: &str,
        to: &str,
        text: &str,
    ) -> BingoResult<ProvidedResolution> {
        let text = clean_text(text, self.config.max_resolution_chars, "Resolution text")?;

        let mut tables = self.tables.write().await;
        tables.team(team_id)?;
        tables.require_member(team_id, from)?;
        if !tables.is_member(team_id, to) {
            return Err(BingoError::InvalidInput(
                "Recipient is not a team member".to_string(),
            ));
        }
        if from == to {
            return Err(BingoError::InvalidInput(
                "Cannot create resolution for yourself".to_string(),
            ));
        }

        let existing = tables
            .provided_resolutions
            .values_mut()
            .find(|r| r.team_id == team_id && r.from_user_id == from && r.to_user_id == to);

        if let Some(resolution) = existing {
            resolution.text = text;
            resolution.updated_at = now();
            tracing::debug!("Updated provided resolution {}", resolution.id);
            return Ok(resolution.clone());
        }

        let resolution = ProvidedResolution {
            id: new_id(),
            team_id: team_id.to_string(),
            from_user_id: from.to_string(),
            to_user_id: to.to_string(),
            text,
            updated_at: now(),
        };
        tables
            .provided_resolutions
            .insert(resolution.id.clone(), resolution.clone());
        Ok(resolution)
    }

    /// For each teammate, whether the requester has already written their prompt
    pub async fn resolutions_to_create(
        &self,
        team_id: &str,
        requester: &str,
    ) -> BingoResult<Vec<ResolutionToCreate>> {
        let tables = self.tables.read().await;
        tables.team(team_id)?;
        tables.require_member(team_id, requester)?;

        let entries = tables
            .members_of(team_id)
            .into_iter()
            .filter(|m| m.user_id != requester)
            .map(|m| {
                let provided = tables.provided_resolutions.values().find(|r| {
                    r.team_id == team_id && r.from_user_id == requester && r.to_user_id == m.user_id
                });
                ResolutionToCreate {
                    user_id: m.user_id.clone(),
                    resolution_provided: provided.is_some(),
                    resolution_text: provided.map(|r| r.text.clone()),
                    resolution_id: provided.map(|r| r.id.clone()),
                }
            })
            .collect();
        Ok(entries)
    }

    /// Prompts teammates have written for the requester
    pub async fn resolutions_for_me(
        &self,
        team_id: &str,
        requester: &str,
    ) -> BingoResult<Vec<ProvidedResolution>> {
        let tables = self.tables.read().await;
        tables.team(team_id)?;
        tables.require_member(team_id, requester)?;

        let mut resolutions: Vec<ProvidedResolution> = tables
            .provided_resolutions
            .values()
            .filter(|r| r.team_id == team_id && r.to_user_id == requester)
            .cloned()
            .collect();
        resolutions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(resolutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::team_with_members;

    #[tokio::test]
    async fn test_personal_resolution_crud() {
        let state = AppState::new();
        let created = state
            .create_personal_resolution("alice", "Read 12 books")
            .await
            .unwrap();

        let fetched = state
            .get_personal_resolution("alice", &created.id)
            .await
            .unwrap();
        assert_eq!(fetched.text, "Read 12 books");

        let updated = state
            .update_personal_resolution("alice", &created.id, "Read 24 books")
            .await
            .unwrap();
        assert_eq!(updated.text, "Read 24 books");

        assert_eq!(state.list_personal_resolutions("alice").await.len(), 1);

        state
            .delete_personal_resolution("alice", &created.id)
            .await
            .unwrap();
        assert!(state.list_personal_resolutions("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_personal_resolution_owner_only() {
        let state = AppState::new();
        let created = state
            .create_personal_resolution("alice", "Learn to juggle")
            .await
            .unwrap();

        let not_found = BingoError::NotFound("Resolution");
        assert_eq!(
            state
                .get_personal_resolution("bob", &created.id)
                .await
                .unwrap_err(),
            not_found
        );
        assert_eq!(
            state
                .update_personal_resolution("bob", &created.id, "Mine now")
                .await
                .unwrap_err(),
            not_found
        );
        assert_eq!(
            state
                .delete_personal_resolution("bob", &created.id)
                .await
                .unwrap_err(),
            not_found
        );
    }

    #[tokio::test]
    async fn test_personal_resolution_text_validation() {
        let state = AppState::new();
        assert!(state.create_personal_resolution("alice", "  ").await.is_err());

        let too_long = "x".repeat(501);
        assert!(state
            .create_personal_resolution("alice", &too_long)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_provided_resolution_upsert_keeps_single_row() {
        let state = AppState::new();
        let team = team_with_members(&state, "alice", &["bob"]).await;

        let first = state
            .upsert_provided_resolution(&team.id, "alice", "bob", "Call your mum")
            .await
            .unwrap();
        let second = state
            .upsert_provided_resolution(&team.id, "alice", "bob", "Call your dad")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let tables = state.tables.read().await;
        let rows: Vec<_> = tables
            .provided_resolutions
            .values()
            .filter(|r| r.team_id == team.id && r.from_user_id == "alice" && r.to_user_id == "bob")
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "Call your dad");
    }

    #[tokio::test]
    async fn test_provided_resolution_rules() {
        let state = AppState::new();
        let team = team_with_members(&state, "alice", &["bob"]).await;

        let to_self = state
            .upsert_provided_resolution(&team.id, "alice", "alice", "Be nice")
            .await;
        assert!(matches!(to_self, Err(BingoError::InvalidInput(_))));

        let outsider_author = state
            .upsert_provided_resolution(&team.id, "eve", "bob", "Be nice")
            .await;
        assert!(matches!(outsider_author, Err(BingoError::Forbidden(_))));

        let outsider_recipient = state
            .upsert_provided_resolution(&team.id, "alice", "eve", "Be nice")
            .await;
        assert!(matches!(outsider_recipient, Err(BingoError::InvalidInput(_))));

        let blank = state
            .upsert_provided_resolution(&team.id, "alice", "bob", " ")
            .await;
        assert!(matches!(blank, Err(BingoError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_resolutions_to_create_and_for_me() {
        let state = AppState::new();
        let team = team_with_members(&state, "alice", &["bob", "carol"]).await;
        state
            .upsert_provided_resolution(&team.id, "alice", "bob", "Go climbing")
            .await
            .unwrap();

        let todo = state.resolutions_to_create(&team.id, "alice").await.unwrap();
        assert_eq!(todo.len(), 2);
        let bob = todo.iter().find(|e| e.user_id == "bob").unwrap();
        assert!(bob.resolution_provided);
        assert_eq!(bob.resolution_text.as_deref(), Some("Go climbing"));
        let carol = todo.iter().find(|e| e.user_id == "carol").unwrap();
        assert!(!carol.resolution_provided);

        let for_bob = state.resolutions_for_me(&team.id, "bob").await.unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].from_user_id, "alice");
        assert!(state
            .resolutions_for_me(&team.id, "carol")
            .await
            .unwrap()
            .is_empty());
    }
}

use super::{clean_text, new_id, now, AppState};
use crate::error::{BingoError, BingoResult};
use crate::types::*;

const MAX_TEAM_NAME_CHARS: usize = 100;

impl AppState {
    /// Create a team; the creator becomes its leader
    pub async fn create_team(&self, user_id: &str, name: &str) -> BingoResult<Team> {
        let name = clean_text(name, MAX_TEAM_NAME_CHARS, "Team name")?;
        let team = Team {
            id: new_id(),
            name,
            leader_id: user_id.to_string(),
            team_resolution_text: None,
            status: TeamStatus::Forming,
            created_at: now(),
        };

        let mut tables = self.tables.write().await;
        tables.memberships.push(Membership {
            team_id: team.id.clone(),
            user_id: team.leader_id.clone(),
            role: MembershipRole::Leader,
            joined_at: team.created_at.clone(),
        });
        tables.teams.insert(team.id.clone(), team.clone());
        drop(tables);

        tracing::info!("Team {} created by {}", team.id, user_id);
        Ok(team)
    }

    /// Set the team-wide resolution that becomes every card's joker
    pub async fn set_team_resolution(
        &self,
        team_id: &str,
        requester: &str,
        text: &str,
    ) -> BingoResult<()> {
        let text = clean_text(text, self.config.max_resolution_chars, "Team resolution text")?;

        let mut tables = self.tables.write().await;
        let team = tables
            .teams
            .get_mut(team_id)
            .ok_or(BingoError::NotFound("Team"))?;
        if team.leader_id != requester {
            return Err(BingoError::forbidden(
                "Only team leader can set team resolution",
            ));
        }
        team.team_resolution_text = Some(text);
        Ok(())
    }

    /// Invite a user by email. Returns the invitation carrying its code.
    pub async fn create_invitation(
        &self,
        team_id: &str,
        requester: &str,
        email: &str,
    ) -> BingoResult<Invitation> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(BingoError::InvalidInput("Email is required".to_string()));
        }

        let mut tables = self.tables.write().await;
        let team = tables.team(team_id)?;
        if team.leader_id != requester {
            return Err(BingoError::forbidden("Only team leader can invite users"));
        }

        let invitation = Invitation {
            id: new_id(),
            team_id: team_id.to_string(),
            invited_email: email,
            invite_code: new_id(),
            status: InvitationStatus::Pending,
            created_at: now(),
        };
        tables
            .invitations
            .insert(invitation.id.clone(), invitation.clone());
        Ok(invitation)
    }

    /// Accept a pending invitation addressed to `email`
    pub async fn join_team(
        &self,
        invite_code: &str,
        user_id: &str,
        email: &str,
    ) -> BingoResult<Team> {
        let email = email.trim().to_lowercase();
        let mut tables = self.tables.write().await;
        let invitation_id = tables
            .invitations
            .values()
            .find(|i| {
                i.invite_code == invite_code
                    && i.invited_email == email
                    && i.status == InvitationStatus::Pending
            })
            .map(|i| i.id.clone())
            .ok_or(BingoError::NotFound("Invitation"))?;

        let team = tables
            .team(&tables.invitations[&invitation_id].team_id)?
            .clone();
        if team.status == TeamStatus::Started {
            return Err(BingoError::AlreadyStarted);
        }
        if tables.is_member(&team.id, user_id) {
            return Err(BingoError::AlreadyMember);
        }

        tables.memberships.push(Membership {
            team_id: team.id.clone(),
            user_id: user_id.to_string(),
            role: MembershipRole::Member,
            joined_at: now(),
        });
        if let Some(invitation) = tables.invitations.get_mut(&invitation_id) {
            invitation.status = InvitationStatus::Accepted;
        }
        drop(tables);

        tracing::info!("User {} joined team {}", user_id, team.id);
        Ok(team)
    }

    /// Team details, visible to members only
    pub async fn get_team(&self, team_id: &str, requester: &str) -> BingoResult<TeamOverview> {
        let tables = self.tables.read().await;
        let team = tables.team(team_id)?.clone();
        let my_role = tables.require_member(team_id, requester)?.role;
        let members = tables.members_of(team_id).into_iter().cloned().collect();

        Ok(TeamOverview {
            team,
            members,
            my_role,
        })
    }

    /// All teams the user belongs to, newest first
    pub async fn list_teams_for_user(&self, user_id: &str) -> Vec<Team> {
        let tables = self.tables.read().await;
        let mut teams: Vec<Team> = tables
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| tables.teams.get(&m.team_id).cloned())
            .collect();
        teams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        teams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::team_with_members;

    #[tokio::test]
    async fn test_create_team_adds_leader_membership() {
        let state = AppState::new();
        let team = state.create_team("alice", "  New Year Crew ").await.unwrap();

        assert_eq!(team.name, "New Year Crew");
        assert_eq!(team.status, TeamStatus::Forming);

        let overview = state.get_team(&team.id, "alice").await.unwrap();
        assert_eq!(overview.members.len(), 1);
        assert_eq!(overview.my_role, MembershipRole::Leader);
    }

    #[tokio::test]
    async fn test_create_team_requires_name() {
        let state = AppState::new();
        let result = state.create_team("alice", "   ").await;
        assert!(matches!(result, Err(BingoError::InvalidInput(_))));
        assert!(state.tables.read().await.memberships.is_empty());
    }

    #[tokio::test]
    async fn test_only_leader_sets_team_resolution() {
        let state = AppState::new();
        let team = team_with_members(&state, "alice", &["bob"]).await;

        let result = state.set_team_resolution(&team.id, "bob", "Sleep more").await;
        assert!(matches!(result, Err(BingoError::Forbidden(_))));

        state
            .set_team_resolution(&team.id, "alice", "Sleep more")
            .await
            .unwrap();
        let overview = state.get_team(&team.id, "bob").await.unwrap();
        assert_eq!(
            overview.team.team_resolution_text.as_deref(),
            Some("Sleep more")
        );
    }

    #[tokio::test]
    async fn test_join_team_with_invitation() {
        let state = AppState::new();
        let team = state.create_team("alice", "Crew").await.unwrap();
        let invitation = state
            .create_invitation(&team.id, "alice", "Bob@Example.com")
            .await
            .unwrap();

        // Wrong email does not match the invitation
        let wrong = state
            .join_team(&invitation.invite_code, "mallory", "mallory@example.com")
            .await;
        assert_eq!(wrong.unwrap_err(), BingoError::NotFound("Invitation"));

        let joined = state
            .join_team(&invitation.invite_code, "bob", "bob@example.com")
            .await
            .unwrap();
        assert_eq!(joined.id, team.id);

        let overview = state.get_team(&team.id, "bob").await.unwrap();
        assert_eq!(overview.members.len(), 2);
        assert_eq!(overview.my_role, MembershipRole::Member);

        // Invitation is consumed
        let again = state
            .join_team(&invitation.invite_code, "bob", "bob@example.com")
            .await;
        assert_eq!(again.unwrap_err(), BingoError::NotFound("Invitation"));
    }

    #[tokio::test]
    async fn test_join_team_twice_rejected() {
        let state = AppState::new();
        let team = team_with_members(&state, "alice", &["bob"]).await;
        let invitation = state
            .create_invitation(&team.id, "alice", "bob@example.com")
            .await
            .unwrap();

        let result = state
            .join_team(&invitation.invite_code, "bob", "bob@example.com")
            .await;
        assert_eq!(result.unwrap_err(), BingoError::AlreadyMember);

        // A rejected join leaves the invitation usable and adds no row
        let tables = state.tables.read().await;
        assert_eq!(tables.members_of(&team.id).len(), 2);
        assert_eq!(
            tables.invitations[&invitation.id].status,
            InvitationStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_concurrent_joins_consume_invitation_once() {
        let state = AppState::new();
        let team = state.create_team("alice", "Crew").await.unwrap();
        let code = state
            .create_invitation(&team.id, "alice", "bob@example.com")
            .await
            .unwrap()
            .invite_code;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let state = state.clone();
            let code = code.clone();
            handles.push(tokio::spawn(async move {
                state.join_team(&code, "bob", "bob@example.com").await
            }));
        }

        let mut joined = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                joined += 1;
            }
        }
        assert_eq!(joined, 1);
        assert_eq!(state.tables.read().await.members_of(&team.id).len(), 2);
    }

    #[tokio::test]
    async fn test_only_leader_invites() {
        let state = AppState::new();
        let team = team_with_members(&state, "alice", &["bob"]).await;
        let result = state
            .create_invitation(&team.id, "bob", "carol@example.com")
            .await;
        assert!(matches!(result, Err(BingoError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_get_team_requires_membership() {
        let state = AppState::new();
        let team = state.create_team("alice", "Crew").await.unwrap();
        let result = state.get_team(&team.id, "eve").await;
        assert!(matches!(result, Err(BingoError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_list_teams_for_user() {
        let state = AppState::new();
        team_with_members(&state, "alice", &["bob"]).await;
        state.create_team("bob", "Second").await.unwrap();

        assert_eq!(state.list_teams_for_user("bob").await.len(), 2);
        assert_eq!(state.list_teams_for_user("alice").await.len(), 1);
        assert!(state.list_teams_for_user("carol").await.is_empty());
    }
}

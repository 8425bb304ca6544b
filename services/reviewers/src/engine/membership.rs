//! Team and user operations that involve no reviewer selection.

use reviewers_id::{TeamName, UserId};
use tracing::{info, instrument};

use super::{ReviewError, ReviewerEngine};
use crate::store::{AssignmentStatistics, NewTeamMember, PullRequestShort, Team, User};

impl ReviewerEngine {
    /// Creates a team and upserts its members, moving existing users into it.
    #[instrument(skip(self, members), fields(team = %name, members = members.len()))]
    pub async fn create_team(
        &self,
        name: TeamName,
        members: Vec<NewTeamMember>,
    ) -> Result<Team, ReviewError> {
        let mut tx = self
            .transactions
            .begin()
            .await
            .map_err(ReviewError::during("begin transaction"))?;
        tx.insert_team(&name)
            .await
            .map_err(ReviewError::during("insert team"))?;
        let mut members = tx
            .upsert_users(&name, &members)
            .await
            .map_err(ReviewError::during("upsert team members"))?;
        tx.commit()
            .await
            .map_err(ReviewError::during("commit team"))?;

        members.sort_by(|a, b| a.id.cmp(&b.id));
        info!("Team created");
        Ok(Team { name, members })
    }

    pub async fn get_team(&self, name: &TeamName) -> Result<Team, ReviewError> {
        let exists = self
            .membership
            .team_exists(name)
            .await
            .map_err(ReviewError::during("check team"))?;
        if !exists {
            return Err(ReviewError::not_found("team not found"));
        }

        let members = self
            .membership
            .find_team_members(name)
            .await
            .map_err(ReviewError::during("load team members"))?;
        Ok(Team {
            name: name.clone(),
            members,
        })
    }

    /// Sets a user's active flag. Reviewer assignments are left untouched.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn set_user_active(
        &self,
        user_id: &UserId,
        is_active: bool,
    ) -> Result<User, ReviewError> {
        let mut tx = self
            .transactions
            .begin()
            .await
            .map_err(ReviewError::during("begin transaction"))?;
        let user = tx
            .set_user_active(user_id, is_active)
            .await
            .map_err(ReviewError::during("set user active"))?;
        tx.commit()
            .await
            .map_err(ReviewError::during("commit user"))?;
        Ok(user)
    }

    /// Pull requests the user currently reviews.
    pub async fn get_user_reviews(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PullRequestShort>, ReviewError> {
        self.membership
            .get_user(user_id)
            .await
            .map_err(ReviewError::during("load user"))?;
        self.pull_requests
            .find_by_reviewer(user_id)
            .await
            .map_err(ReviewError::during("load reviews"))
    }

    pub async fn statistics(&self) -> Result<AssignmentStatistics, ReviewError> {
        self.pull_requests
            .assignment_statistics()
            .await
            .map_err(ReviewError::during("load statistics"))
    }
}

//! Team repository.
//!
//! # Responsibility
//! - Persist teams and resolve the owned-members back-reference on demand.
//! - Apply the configured delete policy for teams that still own members.
//!
//! # Invariants
//! - A team delete never leaves members pointing at a missing team.
//! - Cascade deletes remove members and team in one transaction.

use crate::config::TeamDeletePolicy;
use crate::error::{RepoError, RepoResult};
use crate::model::member::Member;
use crate::model::record::ValidationError;
use crate::model::team::{Team, TeamId};
use crate::query::filter::{Filter, Sort};
use crate::repo::repository::Repository;
use crate::session::Session;
use crate::store::{RecordStore, SqliteRecordStore};
use log::info;
use rusqlite::TransactionBehavior;

/// Team plus the members that reference it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamWithMembers {
    pub team: Team,
    pub members: Vec<Member>,
}

/// Repository for [`Team`] records.
pub struct TeamRepository<'s> {
    teams: Repository<'s, Team>,
    members: SqliteRecordStore<'s, Member>,
    delete_policy: TeamDeletePolicy,
}

impl<'s> TeamRepository<'s> {
    /// Uses the session's configured delete policy.
    pub fn new(session: &'s Session) -> Self {
        Self::with_policy(session, session.config().team_delete_policy)
    }

    pub fn with_policy(session: &'s Session, delete_policy: TeamDeletePolicy) -> Self {
        Self {
            teams: Repository::new(session),
            members: SqliteRecordStore::new(session),
            delete_policy,
        }
    }

    pub fn records(&self) -> &Repository<'s, Team> {
        &self.teams
    }

    pub fn delete_policy(&self) -> TeamDeletePolicy {
        self.delete_policy
    }

    pub fn save(&self, team: &Team) -> RepoResult<Team> {
        self.teams.save(team)
    }

    pub fn find_by_id(&self, id: TeamId) -> RepoResult<Option<Team>> {
        self.teams.find_by_id(id)
    }

    pub fn find_all(&self) -> RepoResult<Vec<Team>> {
        self.teams.find_all()
    }

    pub fn count(&self) -> RepoResult<i64> {
        self.teams.count()
    }

    /// Loads a team with its members ordered by id.
    pub fn find_with_members(&self, id: TeamId) -> RepoResult<Option<TeamWithMembers>> {
        let Some(team) = self.teams.find_by_id(id)? else {
            return Ok(None);
        };
        let plans = self
            .members
            .builder()
            .build(&Filter::new().eq("team_id", id), &Sort::unsorted())?;
        let members = self.members.fetch(&plans.content)?;
        Ok(Some(TeamWithMembers { team, members }))
    }

    pub fn delete(&self, team: &Team) -> RepoResult<()> {
        let id = team.id.ok_or(ValidationError::MissingId("teams"))?;
        self.delete_by_id(id)
    }

    /// Deletes a team following the delete policy. Missing teams are a no-op.
    ///
    /// # Errors
    /// - `ConstraintViolation` under `Reject` when members still reference it.
    pub fn delete_by_id(&self, id: TeamId) -> RepoResult<()> {
        let owned_filter = Filter::new().eq("team_id", id);
        self.teams
            .session()
            .transaction(TransactionBehavior::Immediate, || {
                let plans = self
                    .members
                    .builder()
                    .build(&owned_filter, &Sort::unsorted())?;
                let owned = self.members.fetch_count(&plans.count)?;

                if owned > 0 {
                    match self.delete_policy {
                        TeamDeletePolicy::Reject => {
                            return Err(RepoError::ConstraintViolation(format!(
                                "team {id} still owns {owned} member(s)"
                            )));
                        }
                        TeamDeletePolicy::Cascade => {
                            let removed = self.members.bulk_delete(&owned_filter)?;
                            info!(
                                "event=team_delete module=repo status=cascade team_id={id} members_removed={removed}"
                            );
                        }
                    }
                }

                self.teams.delete_by_id(id)
            })
    }
}

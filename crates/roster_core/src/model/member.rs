//! Member record.
//!
//! # Responsibility
//! - Define the member row shape and its field invariants.
//! - Map members to and from the `members` table.
//!
//! # Invariants
//! - `username` is never blank.
//! - `age`, when present, is non-negative.
//! - `team_id` only ever points at a persisted team.

use crate::error::{RepoError, RepoResult};
use crate::model::record::{Record, RecordId, ValidationError};
use crate::model::team::{Team, TeamId};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub type MemberId = RecordId;

/// A roster member, optionally attached to one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Assigned by the store on first save.
    pub id: Option<MemberId>,
    pub username: String,
    pub age: Option<i32>,
    /// Parent team reference.
    pub team_id: Option<TeamId>,
}

impl Member {
    /// Creates an unsaved member without age or team.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            age: None,
            team_id: None,
        }
    }

    /// Creates an unsaved member with an age.
    pub fn with_age(username: impl Into<String>, age: i32) -> Self {
        Self {
            age: Some(age),
            ..Self::new(username)
        }
    }

    /// Creates an unsaved member that belongs to `team`.
    ///
    /// # Errors
    /// - `ValidationError::UnsavedReference` when `team` has no id yet.
    pub fn with_team(
        username: impl Into<String>,
        age: i32,
        team: &Team,
    ) -> Result<Self, ValidationError> {
        let mut member = Self::with_age(username, age);
        member.change_team(team)?;
        Ok(member)
    }

    /// Re-points this member at `team`.
    ///
    /// Only the in-memory value changes; call `save` to persist it.
    pub fn change_team(&mut self, team: &Team) -> Result<(), ValidationError> {
        let team_id = team.id.ok_or(ValidationError::UnsavedReference("team"))?;
        self.team_id = Some(team_id);
        Ok(())
    }

    /// Detaches this member from its team.
    pub fn leave_team(&mut self) {
        self.team_id = None;
    }
}

impl Record for Member {
    const TABLE: &'static str = "members";
    const ID_COLUMN: &'static str = "member_id";
    const COLUMNS: &'static [&'static str] = &["username", "age", "team_id"];
    const REQUIRED: &'static [&'static str] = &["username"];
    const INTEGER_COLUMNS: &'static [&'static str] = &["age", "team_id"];

    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    fn without_id(mut self) -> Self {
        self.id = None;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::BlankField("username"));
        }
        if let Some(age) = self.age {
            if age < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "age",
                    message: format!("expected >= 0, got {age}"),
                });
            }
        }
        Ok(())
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.username.clone()),
            self.age.map_or(Value::Null, |age| Value::Integer(i64::from(age))),
            self.team_id.map_or(Value::Null, Value::Integer),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let age = match row.get::<_, Option<i64>>("age")? {
            Some(value) => Some(i32::try_from(value).map_err(|_| {
                RepoError::InvalidData(format!("age value `{value}` in members.age overflows i32"))
            })?),
            None => None,
        };

        let member = Self {
            id: Some(row.get("member_id")?),
            username: row.get("username")?,
            age,
            team_id: row.get("team_id")?,
        };
        member
            .validate()
            .map_err(|err| RepoError::InvalidData(format!("members row: {err}")))?;
        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::Member;
    use crate::model::record::{Record, ValidationError};
    use crate::model::team::Team;

    #[test]
    fn blank_username_is_rejected() {
        let err = Member::new("  ").validate().unwrap_err();
        assert_eq!(err, ValidationError::BlankField("username"));
    }

    #[test]
    fn negative_age_is_rejected() {
        let err = Member::with_age("member1", -1).validate().unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { field: "age", .. }));
    }

    #[test]
    fn change_team_requires_saved_team() {
        let mut member = Member::new("member1");
        let err = member.change_team(&Team::new("teamA")).unwrap_err();
        assert_eq!(err, ValidationError::UnsavedReference("team"));

        let saved = Team::new("teamA").with_id(7);
        member.change_team(&saved).unwrap();
        assert_eq!(member.team_id, Some(7));

        member.leave_team();
        assert_eq!(member.team_id, None);
    }

    #[test]
    fn values_follow_column_order() {
        let member = Member::with_age("member1", 10);
        assert_eq!(member.values().len(), Member::COLUMNS.len());
    }
}

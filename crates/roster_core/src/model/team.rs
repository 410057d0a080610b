//! Team record.
//!
//! # Invariants
//! - `name` is never blank.
//! - Owned members are not embedded; they reference the team by id.

use crate::error::{RepoError, RepoResult};
use crate::model::record::{Record, RecordId, ValidationError};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub type TeamId = RecordId;

/// Parent record owning zero or more members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Option<TeamId>,
    pub name: String,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl Record for Team {
    const TABLE: &'static str = "teams";
    const ID_COLUMN: &'static str = "team_id";
    const COLUMNS: &'static [&'static str] = &["name"];
    const REQUIRED: &'static [&'static str] = &["name"];
    const INTEGER_COLUMNS: &'static [&'static str] = &[];

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
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankField("name"));
        }
        Ok(())
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let team = Self {
            id: Some(row.get("team_id")?),
            name: row.get("name")?,
        };
        team.validate()
            .map_err(|err| RepoError::InvalidData(format!("teams row: {err}")))?;
        Ok(team)
    }
}

//! Read-only projection shapes.
//!
//! # Responsibility
//! - Declare the select list (and joins) needed to build a shape straight
//!   from a row, without loading the full record graph.
//!
//! # Invariants
//! - `SELECT` and `JOINS` are static SQL owned by this crate.
//! - Every selected expression is aliased to the name `from_row` reads.

use crate::error::RepoResult;
use crate::model::member::{Member, MemberId};
use crate::model::record::Record;
use rusqlite::Row;
use serde::Serialize;

/// Row shape selected from `R`'s table plus optional joins.
pub trait Projection<R: Record>: Sized {
    /// Comma separated, aliased select list.
    const SELECT: &'static str;
    /// Join clauses appended after the base table.
    const JOINS: &'static str = "";

    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

/// Username-only view of a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsernameOnly {
    pub username: String,
}

impl Projection<Member> for UsernameOnly {
    const SELECT: &'static str = "members.username AS username";

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            username: row.get("username")?,
        })
    }
}

/// Member with its team name. Members without a team are excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDto {
    pub id: MemberId,
    pub username: String,
    pub team_name: String,
}

impl Projection<Member> for MemberDto {
    const SELECT: &'static str =
        "members.member_id AS id, members.username AS username, teams.name AS team_name";
    const JOINS: &'static str = "JOIN teams ON teams.team_id = members.team_id";

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            team_name: row.get("team_name")?,
        })
    }
}

/// Team part of [`NestedClosedProjection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamSummary {
    pub name: String,
}

/// Username with a nested team view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestedClosedProjection {
    pub username: String,
    pub team: Option<TeamSummary>,
}

impl Projection<Member> for NestedClosedProjection {
    const SELECT: &'static str = "members.username AS username, teams.name AS team_name";
    const JOINS: &'static str = "LEFT JOIN teams ON teams.team_id = members.team_id";

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let team_name: Option<String> = row.get("team_name")?;
        Ok(Self {
            username: row.get("username")?,
            team: team_name.map(|name| TeamSummary { name }),
        })
    }
}

/// Flat member view used by the native paged query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberProjection {
    pub id: MemberId,
    pub username: String,
    pub team_name: Option<String>,
}

impl Projection<Member> for MemberProjection {
    const SELECT: &'static str =
        "members.member_id AS id, members.username AS username, teams.name AS team_name";
    const JOINS: &'static str = "LEFT JOIN teams ON teams.team_id = members.team_id";

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            team_name: row.get("team_name")?,
        })
    }
}

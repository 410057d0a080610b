//! Member repository.
//!
//! # Responsibility
//! - Expose member-specific derived queries, projections and paging on top
//!   of the generic facade.
//! - Resolve declared relations eagerly (entity graphs) with batched reads.
//!
//! # Invariants
//! - Relation loading never issues one query per member.
//! - Relations that were not requested stay unresolved (`team: None`).
//! - Named queries are validated when the repository is constructed.

use crate::error::RepoResult;
use crate::model::member::{Member, MemberId};
use crate::model::projection::{
    MemberDto, MemberProjection, NestedClosedProjection, Projection, UsernameOnly,
};
use crate::model::team::{Team, TeamId};
use crate::pager::{Page, PageRequest};
use crate::query::builder::QueryPlan;
use crate::query::filter::{Filter, Mutation, Sort};
use crate::query::named::{NamedParams, NamedQuery};
use crate::repo::repository::{single, Repository};
use crate::session::Session;
use crate::store::{RecordStore, SqliteRecordStore};
use std::collections::{BTreeSet, HashMap};

const FIND_BY_USERNAME: &str = "Member.findByUsername";
const FIND_USER: &str = "Member.findUser";
const FIND_BY_NAMES: &str = "Member.findByNames";

const MEMBER_NAMED_QUERIES: &[NamedQuery] = &[
    NamedQuery::new(FIND_BY_USERNAME, "username = :username"),
    NamedQuery::new(FIND_USER, "username = :username AND age = :age"),
    NamedQuery::new(FIND_BY_NAMES, "username IN :names"),
];

const NATIVE_FIND_BY_USERNAME: &str = "SELECT * FROM members WHERE username = ?";
const NATIVE_PROJECTION_CONTENT: &str = "SELECT m.member_id AS id, m.username AS username, t.name AS team_name
     FROM members m
     LEFT JOIN teams t ON t.team_id = m.team_id
     ORDER BY m.member_id";
const NATIVE_PROJECTION_COUNT: &str = "SELECT COUNT(*) FROM members";

/// Associations a member read can resolve eagerly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberRelation {
    Team,
}

/// Member plus its eagerly resolved relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberGraph {
    pub member: Member,
    /// `None` when the member has no team or `Team` was not requested.
    pub team: Option<Team>,
}

/// Repository for [`Member`] records.
pub struct MemberRepository<'s> {
    members: Repository<'s, Member>,
    teams: SqliteRecordStore<'s, Team>,
}

impl<'s> MemberRepository<'s> {
    pub fn try_new(session: &'s Session) -> RepoResult<Self> {
        Ok(Self {
            members: Repository::try_new(session, MEMBER_NAMED_QUERIES)?,
            teams: SqliteRecordStore::new(session),
        })
    }

    /// Generic facade for operations not wrapped here.
    pub fn records(&self) -> &Repository<'s, Member> {
        &self.members
    }

    pub fn save(&self, member: &Member) -> RepoResult<Member> {
        self.members.save(member)
    }

    pub fn find_by_id(&self, id: MemberId) -> RepoResult<Option<Member>> {
        self.members.find_by_id(id)
    }

    pub fn find_all(&self) -> RepoResult<Vec<Member>> {
        self.members.find_all()
    }

    pub fn count(&self) -> RepoResult<i64> {
        self.members.count()
    }

    pub fn delete(&self, member: &Member) -> RepoResult<()> {
        self.members.delete(member)
    }

    pub fn delete_by_id(&self, id: MemberId) -> RepoResult<()> {
        self.members.delete_by_id(id)
    }

    pub fn find_by_username_and_age_greater_than(
        &self,
        username: &str,
        age: i32,
    ) -> RepoResult<Vec<Member>> {
        let filter = Filter::new().eq("username", username).gt("age", age);
        self.members.find_all_by(&filter, &Sort::unsorted())
    }

    /// Derived query without conditions: every member.
    pub fn find_hello_by(&self) -> RepoResult<Vec<Member>> {
        self.members.find_all()
    }

    pub fn find_top3(&self) -> RepoResult<Vec<Member>> {
        self.members
            .find_first_by(&Filter::new(), &Sort::unsorted(), 3)
    }

    pub fn find_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        self.members.find_named(
            FIND_BY_USERNAME,
            &NamedParams::new().set("username", username),
            &Sort::unsorted(),
        )
    }

    pub fn find_user(&self, username: &str, age: i32) -> RepoResult<Vec<Member>> {
        self.members.find_named(
            FIND_USER,
            &NamedParams::new().set("username", username).set("age", age),
            &Sort::unsorted(),
        )
    }

    pub fn find_by_names(&self, names: &[&str]) -> RepoResult<Vec<Member>> {
        self.members.find_named(
            FIND_BY_NAMES,
            &NamedParams::new().set_list("names", names.iter().copied()),
            &Sort::unsorted(),
        )
    }

    pub fn find_username_list(&self) -> RepoResult<Vec<String>> {
        let rows: Vec<UsernameOnly> = self
            .members
            .find_projection(&Filter::new(), &Sort::unsorted())?;
        Ok(rows.into_iter().map(|row| row.username).collect())
    }

    /// Members that belong to a team, with the team name.
    pub fn find_member_dto(&self) -> RepoResult<Vec<MemberDto>> {
        self.members
            .find_projection(&Filter::new(), &Sort::unsorted())
    }

    pub fn find_list_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        self.members
            .find_all_by(&Filter::new().eq("username", username), &Sort::unsorted())
    }

    /// # Errors
    /// - `NonUniqueResult` when several members share `username`.
    pub fn find_one_by_username(&self, username: &str) -> RepoResult<Option<Member>> {
        self.members
            .find_one_by(&Filter::new().eq("username", username))
    }

    pub fn find_by_age(&self, age: i32, request: &PageRequest) -> RepoResult<Page<Member>> {
        self.members
            .find_page(&Filter::new().eq("age", age), request)
    }

    /// Window of members aged `age`, usernames descending.
    pub fn find_by_page(&self, age: i32, offset: i64, limit: i64) -> RepoResult<Vec<Member>> {
        self.members.find_window(
            &Filter::new().eq("age", age),
            &Sort::desc("username"),
            offset,
            limit,
        )
    }

    pub fn total_count(&self, age: i32) -> RepoResult<i64> {
        self.members.count_by(&Filter::new().eq("age", age))
    }

    /// Adds one year to every member aged `age` or older.
    pub fn bulk_age_plus(&self, age: i32) -> RepoResult<usize> {
        self.members
            .bulk_update(&Filter::new().ge("age", age), &Mutation::new().increment("age", 1))
    }

    pub fn find_all_with(&self, relations: &[MemberRelation]) -> RepoResult<Vec<MemberGraph>> {
        self.find_by_with(&Filter::new(), &Sort::unsorted(), relations)
    }

    /// Reads matches and resolves `relations` with one extra query each.
    pub fn find_by_with(
        &self,
        filter: &Filter,
        sort: &Sort,
        relations: &[MemberRelation],
    ) -> RepoResult<Vec<MemberGraph>> {
        let members = self.members.find_all_by(filter, sort)?;
        self.resolve(members, relations)
    }

    pub fn find_all_member_fetch_join(&self) -> RepoResult<Vec<MemberGraph>> {
        self.find_all_with(&[MemberRelation::Team])
    }

    pub fn find_entity_graph_by_username(&self, username: &str) -> RepoResult<Vec<MemberGraph>> {
        self.find_by_with(
            &Filter::new().eq("username", username),
            &Sort::unsorted(),
            &[MemberRelation::Team],
        )
    }

    /// Lookup that leaves the identity cache untouched.
    pub fn find_read_only_by_username(&self, username: &str) -> RepoResult<Option<Member>> {
        single(
            self.members
                .find_read_only(&Filter::new().eq("username", username), &Sort::unsorted())?,
        )
    }

    /// Must run inside `Session::transaction`.
    pub fn find_lock_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        self.members
            .find_with_lock(&Filter::new().eq("username", username), &Sort::unsorted())
    }

    pub fn find_projections_by_username(&self, username: &str) -> RepoResult<Vec<UsernameOnly>> {
        self.members
            .find_projection(&Filter::new().eq("username", username), &Sort::unsorted())
    }

    pub fn find_nested_closed_projections_by_username(
        &self,
        username: &str,
    ) -> RepoResult<Vec<NestedClosedProjection>> {
        self.members
            .find_projection(&Filter::new().eq("username", username), &Sort::unsorted())
    }

    pub fn find_by_native_query(&self, username: &str) -> RepoResult<Option<Member>> {
        single(
            self.members
                .find_native(&QueryPlan::native(NATIVE_FIND_BY_USERNAME, [username]))?,
        )
    }

    /// Native paged projection; the request's sort is not applied.
    pub fn find_by_native_projection(
        &self,
        request: &PageRequest,
    ) -> RepoResult<Page<MemberProjection>> {
        let no_params: [i64; 0] = [];
        self.members.find_native_page(
            &QueryPlan::native(NATIVE_PROJECTION_CONTENT, no_params),
            &QueryPlan::native(NATIVE_PROJECTION_COUNT, no_params),
            request,
            <MemberProjection as Projection<Member>>::from_row,
        )
    }

    fn resolve(
        &self,
        members: Vec<Member>,
        relations: &[MemberRelation],
    ) -> RepoResult<Vec<MemberGraph>> {
        let mut teams: HashMap<TeamId, Team> = HashMap::new();
        if relations.contains(&MemberRelation::Team) {
            let team_ids: BTreeSet<TeamId> =
                members.iter().filter_map(|member| member.team_id).collect();
            if !team_ids.is_empty() {
                let plans = self.teams.builder().build(
                    &Filter::new().is_in("team_id", team_ids),
                    &Sort::unsorted(),
                )?;
                for team in self.teams.fetch(&plans.content)? {
                    if let Some(id) = team.id {
                        teams.insert(id, team);
                    }
                }
            }
        }

        Ok(members
            .into_iter()
            .map(|member| {
                let team = member.team_id.and_then(|id| teams.get(&id).cloned());
                MemberGraph { member, team }
            })
            .collect())
    }
}

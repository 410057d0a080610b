//! Paged relational-record repository for a member/team roster.
//!
//! Layers, leaf first: record store, query builder, pager, repository facade.
//! SQLite (through `rusqlite`) is the backing engine.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod pager;
pub mod query;
pub mod repo;
pub mod session;
pub mod store;

pub use config::{StoreConfig, TeamDeletePolicy};
pub use error::{RepoError, RepoResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::member::{Member, MemberId};
pub use model::projection::{
    MemberDto, MemberProjection, NestedClosedProjection, Projection, TeamSummary, UsernameOnly,
};
pub use model::record::{Record, RecordId, ValidationError};
pub use model::team::{Team, TeamId};
pub use pager::{paginate, Page, PageRequest};
pub use query::{
    Direction, FieldValue, Filter, Mutation, NamedParams, NamedQuery, QueryBuilder, QueryPlan,
    Sort,
};
pub use repo::member_repo::{MemberGraph, MemberRelation, MemberRepository};
pub use repo::repository::Repository;
pub use repo::team_repo::{TeamRepository, TeamWithMembers};
pub use rusqlite::TransactionBehavior;
pub use session::Session;
pub use store::{RecordStore, SqliteRecordStore};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

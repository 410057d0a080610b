//! Repository facades.
//!
//! # Responsibility
//! - Expose typed CRUD, derived queries, paging, projections, bulk updates
//!   and locking over the record store.
//! - Keep SQL details behind the store/query boundary.
//!
//! # Invariants
//! - Repository writes validate records before persistence.
//! - Read-by-id misses are `Ok(None)`, never errors.

pub mod member_repo;
pub mod repository;
pub mod team_repo;

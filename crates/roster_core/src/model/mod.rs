//! Domain records for the member/team roster.
//!
//! # Responsibility
//! - Define the records persisted by the store and their field invariants.
//! - Define read-only projection shapes built directly from rows.
//!
//! # Invariants
//! - Every persisted record is identified by a store-assigned `RecordId`.
//! - Parent references are plain ids; related records are loaded explicitly.

pub mod member;
pub mod projection;
pub mod record;
pub mod team;

//! Structured query specifications and their SQL rendering.
//!
//! # Responsibility
//! - Describe filters, sorts and bulk mutations as data.
//! - Render them into parameterized content/count/update plans.
//! - Compile named query templates at repository construction time.

pub mod builder;
pub mod filter;
pub mod named;

pub use builder::{PlanPair, QueryBuilder, QueryPlan};
pub use filter::{
    Assignment, Change, Condition, Direction, FieldValue, Filter, Mutation, Order, Predicate, Sort,
};
pub use named::{NamedParams, NamedQuery, NamedQueryRegistry, ParamValue};

//! Filter/sort to SQL plan translation.
//!
//! # Responsibility
//! - Render parameterized SELECT/COUNT/UPDATE/DELETE statements for one table.
//! - Keep content and count plans derived from the same WHERE clause.
//!
//! # Invariants
//! - Only whitelisted column names reach SQL text; values are always bound.
//! - Content plans end with `<id> ASC` so windows are deterministic.
//! - Native plans are passed through untouched; binding untrusted input is
//!   the caller's job.

use crate::error::{RepoError, RepoResult};
use crate::model::projection::Projection;
use crate::model::record::{Record, ValidationError};
use crate::query::filter::{Change, Condition, FieldValue, Filter, Mutation, Sort};
use rusqlite::types::Value;

/// Executable SQL text plus positional bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    sql: String,
    params: Vec<Value>,
}

impl QueryPlan {
    /// Wraps caller-written SQL. Use `?` placeholders for every input value.
    pub fn native<V: Into<FieldValue>>(
        sql: impl Into<String>,
        params: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            sql: sql.into(),
            params: params
                .into_iter()
                .map(|value| value.into().to_sql_value())
                .collect(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Returns a copy limited to `limit` rows starting at `offset`.
    ///
    /// The source plan must not carry its own `LIMIT` clause.
    pub fn windowed(&self, offset: i64, limit: i64) -> Self {
        let mut params = self.params.clone();
        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        Self {
            sql: format!("{} LIMIT ? OFFSET ?", self.sql),
            params,
        }
    }
}

/// Content and count plans rendered from one predicate set.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanPair {
    pub content: QueryPlan,
    pub count: QueryPlan,
}

/// Renders plans for one table and select shape.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: &'static str,
    id_column: &'static str,
    columns: &'static [&'static str],
    required: &'static [&'static str],
    has_column: fn(&str) -> bool,
    is_integer_column: fn(&str) -> bool,
    select: String,
    joins: &'static str,
}

impl QueryBuilder {
    /// Builder selecting full records of `R`.
    pub fn for_record<R: Record>() -> Self {
        let select = std::iter::once(R::ID_COLUMN)
            .chain(R::COLUMNS.iter().copied())
            .map(|column| format!("{table}.{column} AS {column}", table = R::TABLE))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            table: R::TABLE,
            id_column: R::ID_COLUMN,
            columns: R::COLUMNS,
            required: R::REQUIRED,
            has_column: R::has_column,
            is_integer_column: R::is_integer_column,
            select,
            joins: "",
        }
    }

    /// Builder selecting projection `P` over `R`'s table.
    pub fn for_projection<R: Record, P: Projection<R>>() -> Self {
        Self {
            select: P::SELECT.to_string(),
            joins: P::JOINS,
            ..Self::for_record::<R>()
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Renders content and count plans for `filter`, ordering content by `sort`.
    pub fn build(&self, filter: &Filter, sort: &Sort) -> RepoResult<PlanPair> {
        let (where_sql, params) = self.where_clause(filter)?;
        let order_sql = self.order_clause(sort)?;
        let from_sql = self.from_clause();

        Ok(PlanPair {
            content: QueryPlan {
                sql: format!(
                    "SELECT {} FROM {from_sql}{where_sql}{order_sql}",
                    self.select
                ),
                params: params.clone(),
            },
            count: QueryPlan {
                sql: format!("SELECT COUNT(*) FROM {from_sql}{where_sql}"),
                params,
            },
        })
    }

    /// Renders a single-row lookup by id.
    pub fn by_id(&self, id: i64) -> QueryPlan {
        QueryPlan {
            sql: format!(
                "SELECT {} FROM {} WHERE {}.{} = ?",
                self.select,
                self.from_clause(),
                self.table,
                self.id_column
            ),
            params: vec![Value::Integer(id)],
        }
    }

    /// Renders one UPDATE applying `mutation` to every row matching `filter`.
    pub fn update_plan(&self, filter: &Filter, mutation: &Mutation) -> RepoResult<QueryPlan> {
        if mutation.is_empty() {
            return Err(RepoError::InvalidArgument(
                "bulk update requires at least one assignment".to_string(),
            ));
        }

        let mut assignments = Vec::with_capacity(mutation.assignments().len());
        let mut params = Vec::new();
        for assignment in mutation.assignments() {
            let field = assignment.field.as_str();
            if field == self.id_column {
                return Err(ValidationError::ReadOnlyField(field.to_string()).into());
            }
            self.check_column(field)?;

            match &assignment.change {
                Change::Set(value) => {
                    if value.is_null() && self.required.contains(&field) {
                        return Err(ValidationError::RequiredField(field.to_string()).into());
                    }
                    assignments.push(format!("{field} = ?"));
                    params.push(value.to_sql_value());
                }
                Change::Increment(delta) => {
                    if !(self.is_integer_column)(field) {
                        return Err(ValidationError::NonIntegerField {
                            table: self.table,
                            field: field.to_string(),
                        }
                        .into());
                    }
                    assignments.push(format!("{field} = {field} + ?"));
                    params.push(Value::Integer(*delta));
                }
            }
        }

        let (where_sql, where_params) = self.where_clause(filter)?;
        params.extend(where_params);

        Ok(QueryPlan {
            sql: format!(
                "UPDATE {} SET {}{where_sql}",
                self.table,
                assignments.join(", ")
            ),
            params,
        })
    }

    /// Renders one DELETE removing every row matching `filter`.
    pub fn delete_plan(&self, filter: &Filter) -> RepoResult<QueryPlan> {
        let (where_sql, params) = self.where_clause(filter)?;
        Ok(QueryPlan {
            sql: format!("DELETE FROM {}{where_sql}", self.table),
            params,
        })
    }

    /// Renders a no-op write over matching rows; executing it inside a
    /// transaction takes the database write lock until that transaction ends.
    pub fn lock_plan(&self, filter: &Filter) -> RepoResult<QueryPlan> {
        let column = self.columns.first().copied().unwrap_or(self.id_column);
        let (where_sql, params) = self.where_clause(filter)?;
        Ok(QueryPlan {
            sql: format!("UPDATE {} SET {column} = {column}{where_sql}", self.table),
            params,
        })
    }

    fn from_clause(&self) -> String {
        if self.joins.is_empty() {
            self.table.to_string()
        } else {
            format!("{} {}", self.table, self.joins)
        }
    }

    fn where_clause(&self, filter: &Filter) -> RepoResult<(String, Vec<Value>)> {
        if filter.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        let mut terms = Vec::with_capacity(filter.predicates().len());
        let mut params = Vec::new();
        for predicate in filter.predicates() {
            self.check_column(&predicate.field)?;
            let column = format!("{}.{}", self.table, predicate.field);

            match &predicate.condition {
                Condition::Eq(value) if value.is_null() => terms.push(format!("{column} IS NULL")),
                Condition::Eq(value) => {
                    terms.push(format!("{column} = ?"));
                    params.push(value.to_sql_value());
                }
                Condition::Gt(value) => {
                    terms.push(format!("{column} > ?"));
                    params.push(value.to_sql_value());
                }
                Condition::Ge(value) => {
                    terms.push(format!("{column} >= ?"));
                    params.push(value.to_sql_value());
                }
                Condition::In(values) if values.is_empty() => terms.push("0 = 1".to_string()),
                Condition::In(values) => {
                    let placeholders = vec!["?"; values.len()].join(", ");
                    terms.push(format!("{column} IN ({placeholders})"));
                    params.extend(values.iter().map(FieldValue::to_sql_value));
                }
            }
        }

        Ok((format!(" WHERE {}", terms.join(" AND ")), params))
    }

    fn order_clause(&self, sort: &Sort) -> RepoResult<String> {
        let mut keys = Vec::with_capacity(sort.orders().len() + 1);
        let mut has_id = false;
        for order in sort.orders() {
            self.check_column(&order.field)?;
            has_id |= order.field == self.id_column;
            keys.push(format!(
                "{}.{} {}",
                self.table,
                order.field,
                order.direction.as_sql()
            ));
        }
        if !has_id {
            keys.push(format!("{}.{} ASC", self.table, self.id_column));
        }
        Ok(format!(" ORDER BY {}", keys.join(", ")))
    }

    fn check_column(&self, field: &str) -> RepoResult<()> {
        if (self.has_column)(field) {
            return Ok(());
        }
        Err(ValidationError::UnknownField {
            table: self.table,
            field: field.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::{QueryBuilder, QueryPlan};
    use crate::error::RepoError;
    use crate::model::member::Member;
    use crate::model::projection::MemberDto;
    use crate::model::team::Team;
    use crate::model::record::ValidationError;
    use crate::query::filter::{Filter, Mutation, Sort};
    use rusqlite::types::Value;

    #[test]
    fn content_and_count_share_where_clause() {
        let builder = QueryBuilder::for_record::<Member>();
        let plans = builder
            .build(&Filter::new().eq("age", 10), &Sort::asc("username"))
            .unwrap();

        assert_eq!(
            plans.content.sql(),
            "SELECT members.member_id AS member_id, members.username AS username, \
             members.age AS age, members.team_id AS team_id FROM members \
             WHERE members.age = ? ORDER BY members.username ASC, members.member_id ASC"
        );
        assert_eq!(
            plans.count.sql(),
            "SELECT COUNT(*) FROM members WHERE members.age = ?"
        );
        assert_eq!(plans.content.params(), plans.count.params());
        assert_eq!(plans.count.params(), &[Value::Integer(10)]);
    }

    #[test]
    fn null_equality_and_empty_in_render_without_params() {
        let builder = QueryBuilder::for_record::<Member>();
        let filter = Filter::new()
            .eq("team_id", Option::<i64>::None)
            .is_in("username", Vec::<String>::new());
        let plans = builder.build(&filter, &Sort::unsorted()).unwrap();

        assert!(plans
            .count
            .sql()
            .ends_with("WHERE members.team_id IS NULL AND 0 = 1"));
        assert!(plans.count.params().is_empty());
    }

    #[test]
    fn in_predicate_binds_every_value() {
        let builder = QueryBuilder::for_record::<Member>();
        let plans = builder
            .build(
                &Filter::new().is_in("username", ["AAA", "BBB"]),
                &Sort::unsorted(),
            )
            .unwrap();
        assert!(plans.count.sql().ends_with("members.username IN (?, ?)"));
        assert_eq!(plans.count.params().len(), 2);
    }

    #[test]
    fn explicit_id_sort_skips_tie_breaker() {
        let builder = QueryBuilder::for_record::<Member>();
        let plans = builder
            .build(&Filter::new(), &Sort::desc("member_id"))
            .unwrap();
        assert!(plans
            .content
            .sql()
            .ends_with("FROM members ORDER BY members.member_id DESC"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let builder = QueryBuilder::for_record::<Member>();
        let err = builder
            .build(&Filter::new().eq("password; DROP TABLE members", 1), &Sort::unsorted())
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Validation(ValidationError::UnknownField { table: "members", .. })
        ));

        let err = builder
            .build(&Filter::new(), &Sort::asc("nickname"))
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[test]
    fn projection_builder_keeps_joins_in_both_plans() {
        let builder = QueryBuilder::for_projection::<Member, MemberDto>();
        let plans = builder
            .build(&Filter::new().eq("username", "AAA"), &Sort::unsorted())
            .unwrap();
        assert!(plans
            .content
            .sql()
            .contains("FROM members JOIN teams ON teams.team_id = members.team_id"));
        assert!(plans
            .count
            .sql()
            .contains("FROM members JOIN teams ON teams.team_id = members.team_id"));
    }

    #[test]
    fn update_plan_binds_assignments_before_predicates() {
        let builder = QueryBuilder::for_record::<Member>();
        let plan = builder
            .update_plan(&Filter::new().ge("age", 20), &Mutation::new().increment("age", 1))
            .unwrap();
        assert_eq!(
            plan.sql(),
            "UPDATE members SET age = age + ? WHERE members.age >= ?"
        );
        assert_eq!(plan.params(), &[Value::Integer(1), Value::Integer(20)]);
    }

    #[test]
    fn update_plan_rejects_id_required_null_and_empty_mutations() {
        let builder = QueryBuilder::for_record::<Member>();
        let filter = Filter::new();

        let err = builder
            .update_plan(&filter, &Mutation::new().set("member_id", 5))
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Validation(ValidationError::ReadOnlyField(_))
        ));

        let err = builder
            .update_plan(&filter, &Mutation::new().set("username", Option::<String>::None))
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Validation(ValidationError::RequiredField(_))
        ));

        let err = builder.update_plan(&filter, &Mutation::new()).unwrap_err();
        assert!(matches!(err, RepoError::InvalidArgument(_)));
    }

    #[test]
    fn increment_is_limited_to_integer_columns() {
        let builder = QueryBuilder::for_record::<Member>();
        let err = builder
            .update_plan(&Filter::new(), &Mutation::new().increment("username", 1))
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Validation(ValidationError::NonIntegerField { table: "members", .. })
        ));

        let err = QueryBuilder::for_record::<Team>()
            .update_plan(&Filter::new(), &Mutation::new().increment("name", 1))
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Validation(ValidationError::NonIntegerField { table: "teams", .. })
        ));
    }

    #[test]
    fn windowed_plan_appends_limit_and_offset() {
        let plan = QueryPlan::native("SELECT * FROM members WHERE age = ?", [10]).windowed(6, 3);
        assert_eq!(
            plan.sql(),
            "SELECT * FROM members WHERE age = ? LIMIT ? OFFSET ?"
        );
        assert_eq!(
            plan.params(),
            &[Value::Integer(10), Value::Integer(3), Value::Integer(6)]
        );
    }

    #[test]
    fn lock_plan_touches_first_data_column() {
        let builder = QueryBuilder::for_record::<Member>();
        let plan = builder
            .lock_plan(&Filter::new().eq("username", "AAA"))
            .unwrap();
        assert_eq!(
            plan.sql(),
            "UPDATE members SET username = username WHERE members.username = ?"
        );
    }
}

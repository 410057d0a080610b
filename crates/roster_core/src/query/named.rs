//! Named query templates.
//!
//! # Responsibility
//! - Compile static `name -> template` tables into filter templates once,
//!   when a repository is constructed.
//! - Bind caller parameters into a [`Filter`] at call time.
//!
//! # Invariants
//! - Templates only reference columns of the owning record.
//! - Every `:parameter` declared by a template must be bound on each call.
//! - Template grammar: `<field> <op> :<param>` clauses joined by `AND`, where
//!   `<op>` is one of `=`, `>`, `>=`, `IN`.

use crate::model::record::{Record, ValidationError};
use crate::query::filter::{Condition, FieldValue, Filter};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

static CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*(>=|=|>|(?i:in))\s*:([A-Za-z_][A-Za-z0-9_]*)\s*$")
        .expect("valid clause regex")
});
static AND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+and\s+").expect("valid and regex"));

/// Static named query declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedQuery {
    pub name: &'static str,
    pub template: &'static str,
}

impl NamedQuery {
    pub const fn new(name: &'static str, template: &'static str) -> Self {
        Self { name, template }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateOp {
    Eq,
    Gt,
    Ge,
    In,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateClause {
    field: String,
    op: TemplateOp,
    parameter: String,
}

/// Value bound to one template parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    One(FieldValue),
    Many(Vec<FieldValue>),
}

/// Parameters for one named query call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedParams {
    values: BTreeMap<String, ParamValue>,
}

impl NamedParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values
            .insert(name.into(), ParamValue::One(value.into()));
        self
    }

    pub fn set_list<V: Into<FieldValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.values.insert(name.into(), ParamValue::Many(values));
        self
    }

    fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }
}

/// Compiled named queries for one record type.
#[derive(Debug, Clone, Default)]
pub struct NamedQueryRegistry {
    queries: BTreeMap<&'static str, Vec<TemplateClause>>,
}

impl NamedQueryRegistry {
    /// Parses and validates every template against `R`'s columns.
    ///
    /// # Errors
    /// - `InvalidTemplate` for duplicate names, unparsable clauses or a
    ///   parameter declared twice.
    /// - `UnknownField` when a clause references a column `R` does not have.
    pub fn compile<R: Record>(queries: &[NamedQuery]) -> Result<Self, ValidationError> {
        let mut compiled = BTreeMap::new();
        for query in queries {
            let clauses = parse_template::<R>(query)?;
            if compiled.insert(query.name, clauses).is_some() {
                return Err(ValidationError::InvalidTemplate {
                    query: query.name.to_string(),
                    message: "duplicate query name".to_string(),
                });
            }
        }
        Ok(Self { queries: compiled })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.queries.keys().copied()
    }

    /// Builds the filter for `name` from `params`.
    pub fn bind(&self, name: &str, params: &NamedParams) -> Result<Filter, ValidationError> {
        let clauses = self
            .queries
            .get(name)
            .ok_or_else(|| ValidationError::UnknownQuery(name.to_string()))?;

        let mut filter = Filter::new();
        for clause in clauses {
            let value = params.get(&clause.parameter).ok_or_else(|| {
                ValidationError::MissingParameter {
                    query: name.to_string(),
                    parameter: clause.parameter.clone(),
                }
            })?;

            let condition = match (clause.op, value) {
                (TemplateOp::In, ParamValue::Many(values)) => Condition::In(values.clone()),
                (TemplateOp::In, ParamValue::One(value)) => Condition::In(vec![value.clone()]),
                (_, ParamValue::Many(_)) => {
                    return Err(ValidationError::InvalidTemplate {
                        query: name.to_string(),
                        message: format!("parameter `:{}` takes a single value", clause.parameter),
                    });
                }
                (TemplateOp::Eq, ParamValue::One(value)) => Condition::Eq(value.clone()),
                (TemplateOp::Gt, ParamValue::One(value)) => Condition::Gt(value.clone()),
                (TemplateOp::Ge, ParamValue::One(value)) => Condition::Ge(value.clone()),
            };
            filter = filter.and(clause.field.clone(), condition);
        }
        Ok(filter)
    }
}

fn parse_template<R: Record>(query: &NamedQuery) -> Result<Vec<TemplateClause>, ValidationError> {
    let invalid = |message: String| ValidationError::InvalidTemplate {
        query: query.name.to_string(),
        message,
    };

    if query.template.trim().is_empty() {
        return Err(invalid("template is empty".to_string()));
    }

    let mut clauses = Vec::new();
    let mut parameters = BTreeSet::new();
    for raw_clause in AND_RE.split(query.template.trim()) {
        let captures = CLAUSE_RE
            .captures(raw_clause)
            .ok_or_else(|| invalid(format!("cannot parse clause `{}`", raw_clause.trim())))?;

        let field = captures[1].to_string();
        if !R::has_column(&field) {
            return Err(ValidationError::UnknownField {
                table: R::TABLE,
                field,
            });
        }

        let op = match captures[2].to_ascii_lowercase().as_str() {
            "=" => TemplateOp::Eq,
            ">" => TemplateOp::Gt,
            ">=" => TemplateOp::Ge,
            _ => TemplateOp::In,
        };

        let parameter = captures[3].to_string();
        if !parameters.insert(parameter.clone()) {
            return Err(invalid(format!("parameter `:{parameter}` declared twice")));
        }

        clauses.push(TemplateClause {
            field,
            op,
            parameter,
        });
    }
    Ok(clauses)
}

#[cfg(test)]
mod tests {
    use super::{NamedParams, NamedQuery, NamedQueryRegistry};
    use crate::model::member::Member;
    use crate::model::record::ValidationError;
    use crate::query::filter::{Condition, FieldValue};

    const QUERIES: &[NamedQuery] = &[
        NamedQuery::new("Member.findUser", "username = :username and age > :age"),
        NamedQuery::new("Member.findByNames", "username IN :names"),
    ];

    #[test]
    fn compile_and_bind_builds_ordered_filter() {
        let registry = NamedQueryRegistry::compile::<Member>(QUERIES).unwrap();
        let filter = registry
            .bind(
                "Member.findUser",
                &NamedParams::new().set("username", "AAA").set("age", 15),
            )
            .unwrap();

        let predicates = filter.predicates();
        assert_eq!(predicates.len(), 2);
        assert_eq!(predicates[0].field, "username");
        assert_eq!(predicates[1].condition, Condition::Gt(FieldValue::Integer(15)));
    }

    #[test]
    fn in_clause_accepts_lists() {
        let registry = NamedQueryRegistry::compile::<Member>(QUERIES).unwrap();
        let filter = registry
            .bind(
                "Member.findByNames",
                &NamedParams::new().set_list("names", ["AAA", "BBB"]),
            )
            .unwrap();
        assert!(matches!(
            &filter.predicates()[0].condition,
            Condition::In(values) if values.len() == 2
        ));
    }

    #[test]
    fn unknown_columns_fail_at_compile_time() {
        let err = NamedQueryRegistry::compile::<Member>(&[NamedQuery::new(
            "Member.bad",
            "nickname = :nickname",
        )])
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownField { .. }));
    }

    #[test]
    fn malformed_and_duplicate_templates_fail_at_compile_time() {
        let err = NamedQueryRegistry::compile::<Member>(&[NamedQuery::new(
            "Member.bad",
            "username LIKE :username",
        )])
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTemplate { .. }));

        let err = NamedQueryRegistry::compile::<Member>(&[
            NamedQuery::new("Member.dup", "username = :username"),
            NamedQuery::new("Member.dup", "age = :age"),
        ])
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTemplate { .. }));
    }

    #[test]
    fn missing_parameter_and_unknown_query_fail_at_bind_time() {
        let registry = NamedQueryRegistry::compile::<Member>(QUERIES).unwrap();
        let err = registry
            .bind("Member.findUser", &NamedParams::new().set("username", "AAA"))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingParameter {
                query: "Member.findUser".to_string(),
                parameter: "age".to_string(),
            }
        );

        let err = registry
            .bind("Member.nope", &NamedParams::new())
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownQuery(_)));
    }
}

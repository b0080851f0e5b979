//! Compiles a structured [`SearchCriteria`] into a parameterized WHERE clause.
//!
//! Column names only ever come from the closed [`RecordField`] set and every caller
//! value is pushed as a bind parameter, so no caller text reaches the statement.

use shared::{Comparison, FieldKind, FieldValue, RecordField, SearchCriteria};
use sqlx::{QueryBuilder, Sqlite};

use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Compare {
        column: &'static str,
        op: &'static str,
        value: BindValue,
    },
    Between {
        column: &'static str,
        lower: BindValue,
        upper: BindValue,
    },
    Contains {
        column: &'static str,
        needle: String,
    },
}

/// Criteria that passed type checking and is ready to be appended to a query
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompiledCriteria {
    clauses: Vec<Clause>,
}

/// Type-check every condition against its column before any SQL is built
pub(crate) fn compile(criteria: &SearchCriteria) -> StorageResult<CompiledCriteria> {
    let mut clauses = Vec::with_capacity(criteria.conditions.len());

    for condition in &criteria.conditions {
        let field = condition.field;
        let column = field.column();

        let clause = match &condition.comparison {
            Comparison::Eq(v) => compare(field, "=", v)?,
            Comparison::Ne(v) => compare(field, "!=", v)?,
            Comparison::Lt(v) => compare(field, "<", v)?,
            Comparison::Le(v) => compare(field, "<=", v)?,
            Comparison::Gt(v) => compare(field, ">", v)?,
            Comparison::Ge(v) => compare(field, ">=", v)?,
            Comparison::Between(lower, upper) => {
                let lower = coerce(field, lower)?;
                let upper = coerce(field, upper)?;
                if is_inverted(&lower, &upper) {
                    return Err(StorageError::InvalidCriteria(format!(
                        "{} range has lower bound above upper bound",
                        column
                    )));
                }
                Clause::Between { column, lower, upper }
            }
            Comparison::Contains(needle) => {
                if field.kind() != FieldKind::Text {
                    return Err(StorageError::InvalidCriteria(format!(
                        "contains is only supported on text columns, not {}",
                        column
                    )));
                }
                Clause::Contains {
                    column,
                    needle: needle.clone(),
                }
            }
        };

        clauses.push(clause);
    }

    Ok(CompiledCriteria { clauses })
}

fn compare(field: RecordField, op: &'static str, value: &FieldValue) -> StorageResult<Clause> {
    Ok(Clause::Compare {
        column: field.column(),
        op,
        value: coerce(field, value)?,
    })
}

/// Integers are accepted for real columns; everything else must match the column kind.
fn coerce(field: RecordField, value: &FieldValue) -> StorageResult<BindValue> {
    match (field.kind(), value) {
        (FieldKind::Integer, FieldValue::Integer(i)) => Ok(BindValue::Integer(*i)),
        (FieldKind::Real, FieldValue::Integer(i)) => Ok(BindValue::Real(*i as f64)),
        (FieldKind::Real, FieldValue::Real(f)) => Ok(BindValue::Real(*f)),
        (FieldKind::Text, FieldValue::Text(s)) => Ok(BindValue::Text(s.clone())),
        (kind, value) => Err(StorageError::InvalidCriteria(format!(
            "{} expects a {:?} value, got {:?}",
            field.column(),
            kind,
            value
        ))),
    }
}

fn is_inverted(lower: &BindValue, upper: &BindValue) -> bool {
    match (lower, upper) {
        (BindValue::Integer(a), BindValue::Integer(b)) => a > b,
        (BindValue::Real(a), BindValue::Real(b)) => a > b,
        (BindValue::Text(a), BindValue::Text(b)) => a > b,
        _ => false,
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: BindValue) {
    match value {
        BindValue::Integer(i) => builder.push_bind(i),
        BindValue::Real(f) => builder.push_bind(f),
        BindValue::Text(s) => builder.push_bind(s),
    };
}

impl CompiledCriteria {
    pub(crate) fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Append ` WHERE ...` to the builder; nothing when there are no conditions
    pub(crate) fn push_where(self, builder: &mut QueryBuilder<'_, Sqlite>) {
        if self.clauses.is_empty() {
            return;
        }

        builder.push(" WHERE ");
        for (i, clause) in self.clauses.into_iter().enumerate() {
            if i > 0 {
                builder.push(" AND ");
            }
            match clause {
                Clause::Compare { column, op, value } => {
                    builder.push(column).push(" ").push(op).push(" ");
                    push_value(builder, value);
                }
                Clause::Between { column, lower, upper } => {
                    builder.push(column).push(" BETWEEN ");
                    push_value(builder, lower);
                    builder.push(" AND ");
                    push_value(builder, upper);
                }
                Clause::Contains { column, needle } => {
                    // instr is case-sensitive and needs no LIKE escaping
                    builder.push("instr(").push(column).push(", ");
                    builder.push_bind(needle);
                    builder.push(") > 0");
                }
            }
        }
    }
}

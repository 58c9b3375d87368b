//! Compiled row predicates.
//!
//! Text is parsed into a [`Condition`] and then resolved against a table
//! schema into a [`Predicate`]: column names become column indices and
//! literals are coerced to the column's type, so evaluation never fails.

mod parser;

pub use parser::{parse, Condition, Operator, MAX_DEPTH};

use crate::handle::PredicateCompiler;
use core::cmp::Ordering;
use grantview_core::pattern_match;
use grantview_core::schema::Table;
use grantview_core::{DataType, EngineError, Result, Row, Value};

/// A predicate resolved against a schema, ready to evaluate.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Const(bool),
    Compare {
        column: usize,
        op: Operator,
        case_insensitive: bool,
        value: Value,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Resolves a parsed condition against `schema`.
    pub fn resolve(condition: &Condition, schema: &Table) -> Result<Self> {
        match condition {
            Condition::Const(b) => Ok(Predicate::Const(*b)),
            Condition::Compare {
                column,
                op,
                case_insensitive,
                value,
                position,
            } => {
                let col = schema.require_column(column)?;
                let data_type = col.data_type();

                if (op.is_text() || *case_insensitive) && data_type != DataType::String {
                    return Err(EngineError::type_mismatch(DataType::String, data_type));
                }
                let value = if op.is_text() {
                    match value {
                        Value::String(_) => value.clone(),
                        Value::Null => {
                            return Err(EngineError::parse(
                                format!("{} needs a string pattern", op.as_str()),
                                *position,
                            ))
                        }
                        other => {
                            return Err(EngineError::type_mismatch(
                                DataType::String,
                                other.data_type().unwrap_or(data_type),
                            ))
                        }
                    }
                } else {
                    value.coerce_to(data_type).ok_or_else(|| {
                        EngineError::type_mismatch(
                            data_type,
                            value.data_type().unwrap_or(data_type),
                        )
                    })?
                };

                Ok(Predicate::Compare {
                    column: col.index(),
                    op: *op,
                    case_insensitive: *case_insensitive,
                    value,
                })
            }
            Condition::And(left, right) => Ok(Predicate::And(
                Box::new(Self::resolve(left, schema)?),
                Box::new(Self::resolve(right, schema)?),
            )),
            Condition::Or(left, right) => Ok(Predicate::Or(
                Box::new(Self::resolve(left, schema)?),
                Box::new(Self::resolve(right, schema)?),
            )),
            Condition::Not(inner) => Ok(Predicate::Not(Box::new(Self::resolve(inner, schema)?))),
        }
    }

    /// Evaluates the predicate against a row.
    pub fn eval(&self, row: &Row) -> bool {
        match self {
            Predicate::Const(b) => *b,
            Predicate::Compare {
                column,
                op,
                case_insensitive,
                value,
            } => {
                let cell = row.get(*column).unwrap_or(&Value::Null);
                compare(cell, *op, value, *case_insensitive)
            }
            Predicate::And(left, right) => left.eval(row) && right.eval(row),
            Predicate::Or(left, right) => left.eval(row) || right.eval(row),
            Predicate::Not(inner) => !inner.eval(row),
        }
    }
}

fn compare(cell: &Value, op: Operator, value: &Value, case_insensitive: bool) -> bool {
    if op.is_text() {
        let (Some(text), Some(pattern)) = (cell.as_str(), value.as_str()) else {
            return false;
        };
        return match op {
            Operator::BeginsWith => pattern_match::begins_with(text, pattern, case_insensitive),
            Operator::EndsWith => pattern_match::ends_with(text, pattern, case_insensitive),
            Operator::Contains => pattern_match::contains(text, pattern, case_insensitive),
            _ if case_insensitive => pattern_match::like_ci(text, pattern),
            _ => pattern_match::like(text, pattern),
        };
    }

    let ordering = match (cell, value) {
        (Value::String(a), Value::String(b)) => pattern_match::compare(a, b, case_insensitive),
        _ => cell.cmp(value),
    };
    match op {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::Ne => ordering != Ordering::Equal,
        // nil is unordered
        _ if cell.is_null() || value.is_null() => false,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Le => ordering != Ordering::Greater,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Ge => ordering != Ordering::Less,
        _ => false,
    }
}

/// The default [`PredicateCompiler`]: parses the predicate language and
/// resolves it against the target schema.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpressionCompiler;

impl PredicateCompiler for ExpressionCompiler {
    fn compile(&self, expression: &str, schema: &Table) -> Result<Predicate> {
        let condition = parse(expression)?;
        let predicate = Predicate::resolve(&condition, schema)?;
        tracing::trace!(table = schema.name(), expression, "compiled predicate");
        Ok(predicate)
    }
}

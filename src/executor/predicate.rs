//! Row and join conditions.
//!
//! Filters and joins take their condition as a trait object, so a plan can use
//! either the field-versus-constant [`Predicate`] / field-versus-field
//! [`JoinPredicate`] shapes or any closure over tuples.

use crate::access::{CompareOp, Tuple, Value};
use anyhow::Result;
use std::fmt;

/// Condition on a single tuple.
pub trait TuplePredicate: Send + Sync {
    fn matches(&self, tuple: &Tuple) -> Result<bool>;
}

impl<F> TuplePredicate for F
where
    F: Fn(&Tuple) -> bool + Send + Sync,
{
    fn matches(&self, tuple: &Tuple) -> Result<bool> {
        Ok(self(tuple))
    }
}

/// Condition on a pair of tuples, left child first.
pub trait JoinCondition: Send + Sync {
    fn matches(&self, left: &Tuple, right: &Tuple) -> Result<bool>;
}

impl<F> JoinCondition for F
where
    F: Fn(&Tuple, &Tuple) -> bool + Send + Sync,
{
    fn matches(&self, left: &Tuple, right: &Tuple) -> Result<bool> {
        Ok(self(left, right))
    }
}

/// `field <op> operand`. An unset field never matches.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: CompareOp,
    operand: Value,
}

impl Predicate {
    pub fn new(field: usize, op: CompareOp, operand: impl Into<Value>) -> Self {
        Self {
            field,
            op,
            operand: operand.into(),
        }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn operand(&self) -> &Value {
        &self.operand
    }
}

impl TuplePredicate for Predicate {
    fn matches(&self, tuple: &Tuple) -> Result<bool> {
        Ok(tuple
            .field(self.field)?
            .map_or(false, |value| value.compare(self.op, &self.operand)))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${} {} {}", self.field, self.op, self.operand)
    }
}

/// `left.field <op> right.field`.
#[derive(Debug, Clone, Copy)]
pub struct JoinPredicate {
    left_field: usize,
    op: CompareOp,
    right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: CompareOp, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    pub fn left_field(&self) -> usize {
        self.left_field
    }

    pub fn right_field(&self) -> usize {
        self.right_field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }
}

impl JoinCondition for JoinPredicate {
    fn matches(&self, left: &Tuple, right: &Tuple) -> Result<bool> {
        match (left.field(self.left_field)?, right.field(self.right_field)?) {
            (Some(l), Some(r)) => Ok(l.compare(self.op, r)),
            _ => Ok(false),
        }
    }
}

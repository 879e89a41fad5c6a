//! Expression evaluation seam
//!
//! The engine does not evaluate expressions itself. It asks an
//! [`ExpressionEvaluator`] and type-checks the returned [`Value`].
//! [`VariableEvaluator`] is a minimal implementation that resolves `=name`
//! variable references and typed literals.

use std::fmt;

use chrono::TimeDelta;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

use super::error::EvalError;
use super::iso;

/// Variables visible to an expression
pub type Variables = HashMap<String, Value>;

/// What a timer expression is expected to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionKind {
    Duration,
    DateTime,
    Cycle,
}

impl ExpressionKind {
    /// Value kinds an evaluation result may have for this expression kind.
    /// Strings are accepted and parsed with the textual grammar.
    pub fn accepted(&self) -> Vec<ValueKind> {
        match self {
            Self::Duration => vec![ValueKind::Duration, ValueKind::String],
            Self::DateTime => vec![ValueKind::DateTime, ValueKind::String],
            Self::Cycle => vec![ValueKind::Cycle, ValueKind::String],
        }
    }
}

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Duration(TimeDelta),
    DateTime(Timestamp),
    Cycle(CycleValue),
}

/// Evaluated `cycle(...)` result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleValue {
    pub repetitions: Option<u32>,
    pub anchor: Option<Timestamp>,
    pub interval: TimeDelta,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Duration(_) => ValueKind::Duration,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::Cycle(_) => ValueKind::Cycle,
        }
    }

    /// Interpret a literal: cycle, duration and date-time text become typed
    /// values, everything else stays a string.
    pub fn from_literal(text: &str) -> Self {
        let text = text.trim();
        if text.starts_with('R') {
            if let Ok(cycle) = iso::parse_cycle(text) {
                return Self::Cycle(CycleValue {
                    repetitions: cycle.repetitions,
                    anchor: cycle.anchor,
                    interval: cycle.interval,
                });
            }
        }
        if let Ok(duration) = iso::parse_duration(text) {
            return Self::Duration(duration);
        }
        if let Ok(at) = iso::parse_date_time(text) {
            return Self::DateTime(at);
        }
        if let Ok(number) = text.parse::<f64>() {
            return Self::Number(number);
        }
        match text {
            "null" => Self::Null,
            "true" => Self::Boolean(true),
            "false" => Self::Boolean(false),
            _ => Self::String(text.to_string()),
        }
    }
}

/// Type tag of a [`Value`], used in type mismatch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    Duration,
    DateTime,
    Cycle,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "NULL",
            Self::Boolean => "BOOLEAN",
            Self::Number => "NUMBER",
            Self::String => "STRING",
            Self::Duration => "DURATION",
            Self::DateTime => "DATE_TIME",
            Self::Cycle => "CYCLE",
        };
        f.write_str(name)
    }
}

/// Evaluates timer expressions against a variable context
pub trait ExpressionEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        variables: &Variables,
        expected: ExpressionKind,
    ) -> Result<Value, EvalError>;
}

/// Resolves `=name` to a variable and anything else to a literal
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableEvaluator;

impl ExpressionEvaluator for VariableEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        variables: &Variables,
        _expected: ExpressionKind,
    ) -> Result<Value, EvalError> {
        let expression = expression.trim();
        let Some(name) = expression.strip_prefix('=') else {
            return Ok(Value::from_literal(expression));
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(EvalError::Failed {
                expression: expression.to_string(),
                message: "empty variable reference".to_string(),
            });
        }

        variables
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable {
                name: name.to_string(),
            })
    }
}

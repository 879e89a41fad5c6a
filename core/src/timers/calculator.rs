//! Due date calculation
//!
//! Pure function from a [`TimerDefinition`] and the creation context to the
//! first due date of a timer. Nothing here reads a clock or touches the store.

use chrono::TimeDelta;

use crate::clock::Timestamp;

use super::active::Repetition;
use super::definition::TimerDefinition;
use super::error::CalculationError;
use super::evaluator::{ExpressionEvaluator, ExpressionKind, Value, Variables};
use super::iso;

/// First schedule point of a new timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueDate {
    pub due_date: Timestamp,
    pub repetitions_remaining: Option<u32>,
    pub repetition: Option<Repetition>,
}

pub fn compute(
    definition: &TimerDefinition,
    now: Timestamp,
    variables: &Variables,
    evaluator: &dyn ExpressionEvaluator,
) -> Result<DueDate, CalculationError> {
    match definition {
        TimerDefinition::FixedDuration(duration) => fixed_duration(now, *duration),
        TimerDefinition::FixedDateTime(at) => Ok(fixed_date_time(*at)),
        TimerDefinition::RepeatingCycle {
            repetitions,
            anchor,
            interval,
        } => cycle(now, *repetitions, *anchor, *interval),
        TimerDefinition::Expression { kind, text } => {
            let value = evaluator.evaluate(text, variables, *kind)?;
            from_value(now, *kind, value)
        }
    }
}

fn fixed_duration(now: Timestamp, duration: TimeDelta) -> Result<DueDate, CalculationError> {
    let due_date = now
        .checked_add_signed(duration)
        .ok_or(CalculationError::OutOfRange)?;
    Ok(DueDate {
        due_date,
        repetitions_remaining: Some(0),
        repetition: None,
    })
}

fn fixed_date_time(at: Timestamp) -> DueDate {
    DueDate {
        due_date: at,
        repetitions_remaining: Some(0),
        repetition: None,
    }
}

fn cycle(
    now: Timestamp,
    repetitions: Option<u32>,
    anchor: Option<Timestamp>,
    interval: TimeDelta,
) -> Result<DueDate, CalculationError> {
    if interval <= TimeDelta::zero() {
        return Err(CalculationError::InvalidCycle {
            interval_ms: interval.num_milliseconds(),
        });
    }

    // An explicit anchor is the first due date even when it already passed;
    // the checker fires it promptly and the lineage continues from there.
    let anchor = match anchor {
        Some(anchor) => anchor,
        None => now
            .checked_add_signed(interval)
            .ok_or(CalculationError::OutOfRange)?,
    };

    Ok(DueDate {
        due_date: anchor,
        repetitions_remaining: repetitions,
        repetition: Some(Repetition::first(anchor, interval)),
    })
}

fn from_value(
    now: Timestamp,
    kind: ExpressionKind,
    value: Value,
) -> Result<DueDate, CalculationError> {
    match (kind, value) {
        (ExpressionKind::Duration, Value::Duration(duration)) => fixed_duration(now, duration),
        (ExpressionKind::Duration, Value::String(text)) => {
            fixed_duration(now, iso::parse_duration(&text)?)
        }

        (ExpressionKind::DateTime, Value::DateTime(at)) => Ok(fixed_date_time(at)),
        (ExpressionKind::DateTime, Value::String(text)) => {
            Ok(fixed_date_time(iso::parse_date_time(&text)?))
        }

        (ExpressionKind::Cycle, Value::Cycle(c)) => cycle(now, c.repetitions, c.anchor, c.interval),
        (ExpressionKind::Cycle, Value::String(text)) => {
            let c = iso::parse_cycle(&text)?;
            cycle(now, c.repetitions, c.anchor, c.interval)
        }

        (kind, value) => Err(CalculationError::TypeMismatch {
            expected: kind.accepted(),
            actual: value.kind(),
        }),
    }
}

//! Timer definition types
//!
//! A definition describes *when* a timer fires. It is resolved into a
//! concrete due date by the calculator when the timer is created.

use std::fmt;

use chrono::TimeDelta;

use crate::clock::Timestamp;

use super::error::DefinitionError;
use super::evaluator::ExpressionKind;
use super::iso;

/// When a timer fires
#[derive(Debug, Clone, PartialEq)]
pub enum TimerDefinition {
    /// Fires `duration` after creation. Zero or negative means immediately.
    FixedDuration(TimeDelta),

    /// Fires at an absolute time, even one already in the past
    FixedDateTime(Timestamp),

    /// Fires at `anchor + k·interval`, `repetitions` times (`None` = forever).
    /// Without an anchor the schedule starts one interval after creation.
    RepeatingCycle {
        repetitions: Option<u32>,
        anchor: Option<Timestamp>,
        interval: TimeDelta,
    },

    /// Evaluated against the creating scope's variables at creation time
    Expression { kind: ExpressionKind, text: String },
}

impl TimerDefinition {
    /// `PT10S`, `-PT1H`, `P1D`
    pub fn duration(text: &str) -> Result<Self, DefinitionError> {
        iso::parse_duration(text).map(Self::FixedDuration)
    }

    /// RFC 3339 date-time
    pub fn date_time(text: &str) -> Result<Self, DefinitionError> {
        iso::parse_date_time(text).map(Self::FixedDateTime)
    }

    /// `R<n>/<anchor>/<interval>`
    pub fn cycle(text: &str) -> Result<Self, DefinitionError> {
        let cycle = iso::parse_cycle(text)?;
        Ok(Self::RepeatingCycle {
            repetitions: cycle.repetitions,
            anchor: cycle.anchor,
            interval: cycle.interval,
        })
    }

    pub fn expression(kind: ExpressionKind, text: impl Into<String>) -> Self {
        Self::Expression {
            kind,
            text: text.into(),
        }
    }

    /// Parse a literal of the given kind
    pub fn from_literal(kind: ExpressionKind, text: &str) -> Result<Self, DefinitionError> {
        match kind {
            ExpressionKind::Duration => Self::duration(text),
            ExpressionKind::DateTime => Self::date_time(text),
            ExpressionKind::Cycle => Self::cycle(text),
        }
    }

    /// Parse definition text as written in a process model: `=expr` is an
    /// expression, anything else a literal of `kind`
    pub fn parse(kind: ExpressionKind, text: &str) -> Result<Self, DefinitionError> {
        let text = text.trim();
        if text.starts_with('=') {
            return Ok(Self::expression(kind, text));
        }
        Self::from_literal(kind, text)
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(
            self,
            Self::RepeatingCycle { .. }
                | Self::Expression {
                    kind: ExpressionKind::Cycle,
                    ..
                }
        )
    }
}

impl fmt::Display for TimerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedDuration(d) => write!(f, "{}", iso::format_duration(*d)),
            Self::FixedDateTime(at) => write!(f, "{}", at.to_rfc3339()),
            Self::RepeatingCycle {
                repetitions,
                anchor,
                interval,
            } => {
                write!(f, "R")?;
                if let Some(n) = repetitions {
                    write!(f, "{n}")?;
                }
                if let Some(anchor) = anchor {
                    write!(f, "/{}", anchor.to_rfc3339())?;
                }
                write!(f, "/{}", iso::format_duration(*interval))
            }
            Self::Expression { kind, text } => write!(f, "{kind:?}({text})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_constructors_pick_the_right_variant() {
        assert_eq!(
            TimerDefinition::from_literal(ExpressionKind::Duration, "PT10S").unwrap(),
            TimerDefinition::FixedDuration(TimeDelta::seconds(10))
        );
        assert!(matches!(
            TimerDefinition::from_literal(ExpressionKind::Cycle, "R3/PT1S").unwrap(),
            TimerDefinition::RepeatingCycle {
                repetitions: Some(3),
                anchor: None,
                ..
            }
        ));
        assert!(TimerDefinition::from_literal(ExpressionKind::DateTime, "PT10S").is_err());
    }

    #[test]
    fn leading_equals_sign_marks_an_expression() {
        assert_eq!(
            TimerDefinition::parse(ExpressionKind::Duration, " =wait ").unwrap(),
            TimerDefinition::expression(ExpressionKind::Duration, "=wait")
        );
        assert_eq!(
            TimerDefinition::parse(ExpressionKind::Duration, "PT1M").unwrap(),
            TimerDefinition::FixedDuration(TimeDelta::minutes(1))
        );
    }

    #[test]
    fn cycle_display_round_trips_through_parser() {
        let definition = TimerDefinition::cycle("R2/1970-01-01T00:00:10+00:00/PT10S").unwrap();
        let rendered = definition.to_string();
        assert_eq!(TimerDefinition::cycle(&rendered).unwrap(), definition);
        assert!(definition.is_cyclic());
    }
}

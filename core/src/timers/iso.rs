//! Textual timer grammar
//!
//! - durations: ISO-8601 `[-]P[nW][nD][T[nH][nM][n[.fff]S]]`. Years and months
//!   are rejected because they have no fixed length.
//! - date-times: RFC 3339
//! - cycles: `R<n-or-empty>/<anchor-or-empty>/<interval>`, where the anchor
//!   segment may also be left out entirely (`R3/PT10S`)

use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::Timestamp;

use super::error::DefinitionError;

/// Parsed `R<n>/<anchor>/<interval>` expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSpec {
    pub repetitions: Option<u32>,
    pub anchor: Option<Timestamp>,
    pub interval: TimeDelta,
}

pub fn parse_duration(text: &str) -> Result<TimeDelta, DefinitionError> {
    let invalid = |reason| DefinitionError::InvalidDuration {
        text: text.to_string(),
        reason,
    };

    let trimmed = text.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let rest = rest
        .strip_prefix('P')
        .ok_or_else(|| invalid("missing 'P' designator"))?;

    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return Err(invalid("empty time section"));
            }
            (date, Some(time))
        }
        None => (rest, None),
    };

    let mut total = TimeDelta::zero();
    let mut components = 0;

    for (number, unit) in components_of(date_part).map_err(invalid)? {
        if is_fractional(number) {
            return Err(invalid("fractions are only allowed in the seconds component"));
        }
        let value = parse_whole(number).ok_or_else(|| invalid("number out of range"))?;
        let part = match unit {
            'W' => TimeDelta::try_weeks(value),
            'D' => TimeDelta::try_days(value),
            'Y' | 'M' => return Err(invalid("years and months are not supported")),
            _ => return Err(invalid("unknown date unit")),
        };
        total = add(total, part).ok_or_else(|| invalid("duration out of range"))?;
        components += 1;
    }

    if let Some(time_part) = time_part {
        for (number, unit) in components_of(time_part).map_err(invalid)? {
            if unit != 'S' && is_fractional(number) {
                return Err(invalid("fractions are only allowed in the seconds component"));
            }
            let part = match unit {
                'H' => parse_whole(number).and_then(TimeDelta::try_hours),
                'M' => parse_whole(number).and_then(TimeDelta::try_minutes),
                'S' => parse_seconds(number),
                _ => return Err(invalid("unknown time unit")),
            };
            total = add(total, part).ok_or_else(|| invalid("duration out of range"))?;
            components += 1;
        }
    }

    if components == 0 {
        return Err(invalid("no components"));
    }

    Ok(if negative { -total } else { total })
}

pub fn parse_date_time(text: &str) -> Result<Timestamp, DefinitionError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DefinitionError::InvalidDateTime {
            text: text.to_string(),
            source,
        })
}

pub fn parse_cycle(text: &str) -> Result<CycleSpec, DefinitionError> {
    let invalid = |reason| DefinitionError::InvalidCycle {
        text: text.to_string(),
        reason,
    };

    let segments: Vec<&str> = text.trim().split('/').collect();
    let (count, anchor, interval) = match segments.as_slice() {
        [count, interval] => (*count, "", *interval),
        [count, anchor, interval] => (*count, *anchor, *interval),
        _ => return Err(invalid("expected R<n>/<interval> or R<n>/<start>/<interval>")),
    };

    let count = count
        .strip_prefix('R')
        .ok_or_else(|| invalid("missing 'R' designator"))?;
    let repetitions = if count.is_empty() {
        None
    } else {
        Some(
            count
                .parse::<u32>()
                .map_err(|_| invalid("repetition count is not a number"))?,
        )
    };

    let anchor = if anchor.is_empty() {
        None
    } else {
        Some(parse_date_time(anchor)?)
    };

    Ok(CycleSpec {
        repetitions,
        anchor,
        interval: parse_duration(interval)?,
    })
}

/// Render a duration as `[-]PT<seconds>[.mmm]S`
pub fn format_duration(duration: TimeDelta) -> String {
    let millis = duration.num_milliseconds();
    let sign = if millis < 0 { "-" } else { "" };
    let millis = millis.unsigned_abs();
    let (secs, frac) = (millis / 1000, millis % 1000);
    if frac == 0 {
        format!("{sign}PT{secs}S")
    } else {
        format!("{sign}PT{secs}.{frac:03}S")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Split `"1D2W"` into `[("1", 'D'), ("2", 'W')]`
fn components_of(section: &str) -> Result<Vec<(&str, char)>, &'static str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (idx, ch) in section.char_indices() {
        if ch.is_ascii_digit() || ch == '.' || ch == ',' {
            continue;
        }
        if idx == start {
            return Err("unit without a number");
        }
        parts.push((&section[start..idx], ch));
        start = idx + ch.len_utf8();
    }
    if start != section.len() {
        return Err("number without a unit");
    }
    Ok(parts)
}

fn is_fractional(number: &str) -> bool {
    number.contains(['.', ','])
}

fn parse_whole(number: &str) -> Option<i64> {
    number.parse().ok()
}

fn parse_seconds(number: &str) -> Option<TimeDelta> {
    let number = number.replace(',', ".");
    let (whole, frac) = match number.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (number.as_str(), ""),
    };
    let secs = TimeDelta::try_seconds(whole.parse().ok()?)?;
    if frac.is_empty() {
        return Some(secs);
    }
    // nanosecond precision, extra digits are truncated
    let digits: String = frac.chars().take(9).collect();
    let scale = 10u32.pow(9 - digits.len() as u32);
    let nanos = digits.parse::<u32>().ok()? * scale;
    secs.checked_add(&TimeDelta::nanoseconds(i64::from(nanos)))
}

fn add(total: TimeDelta, part: Option<TimeDelta>) -> Option<TimeDelta> {
    total.checked_add(&part?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::timestamp_from_millis;

    #[test]
    fn parses_time_components() {
        assert_eq!(parse_duration("PT10S").unwrap(), TimeDelta::seconds(10));
        assert_eq!(
            parse_duration("PT1H30M").unwrap(),
            TimeDelta::minutes(90)
        );
        assert_eq!(
            parse_duration("PT1.5S").unwrap(),
            TimeDelta::milliseconds(1500)
        );
    }

    #[test]
    fn parses_date_components() {
        assert_eq!(parse_duration("P1D").unwrap(), TimeDelta::days(1));
        assert_eq!(parse_duration("P2W").unwrap(), TimeDelta::days(14));
        assert_eq!(
            parse_duration("P1DT1H").unwrap(),
            TimeDelta::hours(25)
        );
    }

    #[test]
    fn parses_negative_and_zero_durations() {
        assert_eq!(parse_duration("-PT1H").unwrap(), TimeDelta::hours(-1));
        assert_eq!(parse_duration("PT0S").unwrap(), TimeDelta::zero());
    }

    #[test]
    fn rejects_malformed_durations() {
        for text in ["", "10S", "P", "PT", "P1Y", "P1M", "PTS", "PT5", "P1X"] {
            assert!(parse_duration(text).is_err(), "{text} should be rejected");
        }
    }

    #[test]
    fn rejects_fractions_outside_seconds() {
        for text in ["P1.5D", "PT1.5M", "PT0,5H", "P1.5W"] {
            let err = parse_duration(text).unwrap_err();
            assert_eq!(
                err,
                DefinitionError::InvalidDuration {
                    text: text.to_string(),
                    reason: "fractions are only allowed in the seconds component",
                },
                "{text}"
            );
        }
        assert!(parse_duration("PT0,5S").is_ok());
    }

    #[test]
    fn parses_cycle_with_anchor() {
        let cycle = parse_cycle("R3/1970-01-01T00:00:10Z/PT1S").unwrap();
        assert_eq!(cycle.repetitions, Some(3));
        assert_eq!(cycle.anchor, Some(timestamp_from_millis(10_000)));
        assert_eq!(cycle.interval, TimeDelta::seconds(1));
    }

    #[test]
    fn parses_unbounded_cycle_without_anchor() {
        let cycle = parse_cycle("R/PT2S").unwrap();
        assert_eq!(cycle.repetitions, None);
        assert_eq!(cycle.anchor, None);
        assert_eq!(cycle.interval, TimeDelta::seconds(2));

        let empty_anchor = parse_cycle("R2//PT2S").unwrap();
        assert_eq!(empty_anchor.repetitions, Some(2));
        assert_eq!(empty_anchor.anchor, None);
    }

    #[test]
    fn rejects_malformed_cycles() {
        for text in ["PT1S", "R", "Rx/PT1S", "R1/a/b/c", "R1/not-a-date/PT1S"] {
            assert!(parse_cycle(text).is_err(), "{text} should be rejected");
        }
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(TimeDelta::seconds(10)), "PT10S");
        assert_eq!(format_duration(TimeDelta::milliseconds(-1500)), "-PT1.500S");
    }
}

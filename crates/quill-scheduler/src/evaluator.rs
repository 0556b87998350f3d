//! Cron evaluation for the schedule sweep.
//!
//! Expressions are standard 5-field crontab (`minute hour day month weekday`,
//! weekday 0-7 with 0 and 7 both Sunday). The `cron` crate expects a leading
//! seconds field and numbers weekdays from 1 = Sunday, so expressions are
//! normalised before parsing.

use std::str::FromStr;

use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::error::{Result, SchedulerError};

/// A parsed cron expression.
#[derive(Debug, Clone)]
pub struct CronExpr {
    source: String,
    schedule: ::cron::Schedule,
}

impl CronExpr {
    pub fn parse(expression: &str) -> Result<Self> {
        let normalized = normalize(expression)?;
        let schedule =
            ::cron::Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: expression.to_string(),
            schedule,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Most recent fire time at or before `now`.
    pub fn previous_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let now = now.trunc_subsecs(0);
        if let Some(at_now) = self.schedule.after(&(now - Duration::seconds(1))).next() {
            if at_now <= now {
                return Some(at_now);
            }
        }
        self.schedule.after(&now).next_back()
    }

    /// First fire time strictly after `now`.
    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&now).next()
    }

    /// True iff the latest fire time at or before `now` lies less than
    /// `window_secs` in the past.
    pub fn is_due(&self, now: DateTime<Utc>, window_secs: i64) -> bool {
        match self.previous_fire(now) {
            Some(prev) => (now - prev).num_milliseconds() < window_secs * 1000,
            None => false,
        }
    }
}

/// Parse `expression` and evaluate it against `now` in one step.
pub fn is_due(expression: &str, now: DateTime<Utc>, window_secs: i64) -> Result<bool> {
    Ok(CronExpr::parse(expression)?.is_due(now, window_secs))
}

fn normalize(expression: &str) -> Result<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(SchedulerError::InvalidCron {
            expression: expression.to_string(),
            reason: format!("expected 5 fields, found {}", fields.len()),
        });
    }
    let weekday = normalize_weekday(fields[4]).ok_or_else(|| SchedulerError::InvalidCron {
        expression: expression.to_string(),
        reason: format!("bad weekday field '{}'", fields[4]),
    })?;
    Ok(format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], weekday
    ))
}

/// Rewrite numeric weekdays as names so both crontab and the parser agree.
fn normalize_weekday(field: &str) -> Option<String> {
    let parts: Option<Vec<String>> = field.split(',').map(normalize_weekday_part).collect();
    parts.map(|p| p.join(","))
}

fn normalize_weekday_part(part: &str) -> Option<String> {
    let (base, step) = match part.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (part, None),
    };

    let base = match base.split_once('-') {
        Some((start, end)) => {
            let start = weekday_name(start)?;
            if end == "7" {
                // 7 is Sunday again; the parser has no wrap-around ranges
                match step {
                    None => format!("{start}-SAT,SUN"),
                    Some(_) => format!("{start}-SAT"),
                }
            } else {
                format!("{start}-{}", weekday_name(end)?)
            }
        }
        None if base == "*" || base == "?" => base.to_string(),
        None => weekday_name(base)?.to_string(),
    };

    Some(match step {
        Some(step) => format!("{base}/{step}"),
        None => base,
    })
}

fn weekday_name(token: &str) -> Option<&str> {
    Some(match token {
        "0" | "7" => "SUN",
        "1" => "MON",
        "2" => "TUE",
        "3" => "WED",
        "4" => "THU",
        "5" => "FRI",
        "6" => "SAT",
        t if t.len() == 3 && t.chars().all(|c| c.is_ascii_alphabetic()) => t,
        _ => return None,
    })
}

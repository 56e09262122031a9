// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Five-field cron expressions: `minute hour day-of-month month day-of-week`.
//!
//! Each field accepts `*`, single values, ranges (`1-5`), steps (`*/15`,
//! `10-40/10`) and comma lists of those. Day-of-week takes 0-7 with both 0
//! and 7 meaning Sunday. When day-of-month and day-of-week are both
//! restricted a date matches if either one does, as in Vixie cron.

use std::fmt;

use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronError {
    field: &'static str,
    message: String,
}

impl fmt::Display for CronError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} field: {}", self.field, self.message)
    }
}

impl std::error::Error for CronError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
};
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
};

/// Bit set of accepted values for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CronField {
    bits: u64,
    restricted: bool,
}

impl CronField {
    fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1u64 << value) != 0
    }

    fn parse(raw: &str, spec: FieldSpec) -> Result<Self, CronError> {
        let err = |message: String| CronError {
            field: spec.name,
            message,
        };
        if raw.is_empty() {
            return Err(err("empty field".into()));
        }
        let mut bits = 0u64;
        let mut restricted = false;
        for part in raw.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step
                        .parse()
                        .map_err(|_| err(format!("bad step '{step}'")))?;
                    if step == 0 {
                        return Err(err("step must be positive".into()));
                    }
                    (range, step)
                }
                None => (part, 1),
            };
            let (start, end) = if range == "*" {
                (spec.min, spec.max)
            } else if let Some((lo, hi)) = range.split_once('-') {
                (parse_value(lo, spec)?, parse_value(hi, spec)?)
            } else {
                let value = parse_value(range, spec)?;
                // `5/10` means "from 5 to the end, every 10".
                if step > 1 { (value, spec.max) } else { (value, value) }
            };
            if start > end {
                return Err(err(format!("range {start}-{end} is reversed")));
            }
            if range != "*" || step > 1 {
                restricted = true;
            }
            let mut value = start;
            while value <= end {
                bits |= 1u64 << value;
                value += step;
            }
        }
        Ok(Self { bits, restricted })
    }
}

fn parse_value(raw: &str, spec: FieldSpec) -> Result<u32, CronError> {
    let value: u32 = raw.parse().map_err(|_| CronError {
        field: spec.name,
        message: format!("'{raw}' is not a number"),
    })?;
    if value < spec.min || value > spec.max {
        return Err(CronError {
            field: spec.name,
            message: format!("{value} is outside {}-{}", spec.min, spec.max),
        });
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

impl CronExpression {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError {
                field: "expression",
                message: format!("expected 5 fields, found {}", fields.len()),
            });
        }
        let mut day_of_week = CronField::parse(fields[4], DAY_OF_WEEK)?;
        if day_of_week.contains(7) {
            day_of_week.bits |= 1;
        }
        Ok(Self {
            minute: CronField::parse(fields[0], MINUTE)?,
            hour: CronField::parse(fields[1], HOUR)?,
            day_of_month: CronField::parse(fields[2], DAY_OF_MONTH)?,
            month: CronField::parse(fields[3], MONTH)?,
            day_of_week,
        })
    }

    /// Whether the wall-clock minute of `at` (in its own offset) matches.
    pub fn matches(&self, at: OffsetDateTime) -> bool {
        let dom = self.day_of_month.contains(u32::from(at.day()));
        let dow = self
            .day_of_week
            .contains(u32::from(at.weekday().number_days_from_sunday()));
        let day_matches = match (self.day_of_month.restricted, self.day_of_week.restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        };
        self.minute.contains(u32::from(at.minute()))
            && self.hour.contains(u32::from(at.hour()))
            && self.month.contains(u32::from(u8::from(at.month())))
            && day_matches
    }
}

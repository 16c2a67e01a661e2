//! Front-month contract resolution for ES and NQ.
//!
//! Both products trade quarterly contracts (March, June, September,
//! December) that expire on the third Friday of the contract month.
//! Volume migrates to the next contract ahead of expiration, so the
//! resolver rolls 10 calendar days early.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Quarterly expiration months.
const QUARTERLY_MONTHS: [u32; 4] = [3, 6, 9, 12];

/// Calendar days before expiration at which the front month rolls.
const ROLLOVER_DAYS: i64 = 10;

/// Index-futures product supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    #[serde(rename = "ES")]
    Es,
    #[serde(rename = "NQ")]
    Nq,
}

impl Instrument {
    pub const ALL: [Instrument; 2] = [Instrument::Es, Instrument::Nq];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Es => "ES",
            Self::Nq => "NQ",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Instrument {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ES" => Ok(Self::Es),
            "NQ" => Ok(Self::Nq),
            _ => Err(EngineError::InvalidInstrument(s.to_string())),
        }
    }
}

/// A front-month contract symbol, e.g. `/ESH25` for ES March 2025.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    instrument: Instrument,
    month: u32,
    year: i32,
}

impl Symbol {
    pub fn root(&self) -> Instrument {
        self.instrument
    }

    /// Expiration date: the third Friday of the contract month.
    pub fn expiration(&self) -> NaiveDate {
        third_friday(self.year, self.month)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}{}{:02}",
            self.instrument.as_str(),
            month_code(self.month),
            self.year.rem_euclid(100)
        )
    }
}

impl FromStr for Symbol {
    type Err = EngineError;

    /// Parse `/<ROOT><month code><2-digit year>`, e.g. `/NQZ25`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidInstrument(text.to_string());

        let body = text.strip_prefix('/').unwrap_or(text);
        if !body.is_ascii() || body.len() < 5 {
            return Err(invalid());
        }

        let (root, tail) = body.split_at(body.len() - 3);
        let instrument = root.parse::<Instrument>()?;

        let mut chars = tail.chars();
        let code = chars.next().ok_or_else(invalid)?;
        let month = code_month(code).ok_or_else(invalid)?;
        let year: i32 = chars.as_str().parse().map_err(|_| invalid())?;

        Ok(Self {
            instrument,
            month,
            year: 2000 + year,
        })
    }
}

/// Resolve the front-month symbol for an instrument at an instant.
///
/// Starts from the current quarter's contract and advances one quarter
/// when the instant sits within the 10-day rollover window (or past the
/// expiration itself).
pub fn front_month_symbol(instrument: Instrument, at: DateTime<Utc>) -> Symbol {
    let today = at.date_naive();
    let (mut month, mut year) = next_quarterly(today.month(), today.year());

    let expiration = third_friday(year, month);
    if (expiration - today).num_days() <= ROLLOVER_DAYS {
        let (m, y) = following_quarter(month, year);
        month = m;
        year = y;
    }

    Symbol {
        instrument,
        month,
        year,
    }
}

/// Third Friday of a month, the quarterly expiration date (00:00 UTC).
pub fn third_friday(year: i32, month: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
    let until_friday = (Weekday::Fri.num_days_from_monday() + 7
        - first.weekday().num_days_from_monday())
        % 7;
    first + Duration::days(i64::from(until_friday) + 14)
}

/// Earliest quarterly month at or after the given month.
fn next_quarterly(month: u32, year: i32) -> (u32, i32) {
    for &quarterly in &QUARTERLY_MONTHS {
        if quarterly >= month {
            return (quarterly, year);
        }
    }
    (QUARTERLY_MONTHS[0], year + 1)
}

/// Quarterly month after the given one; December wraps to next March.
fn following_quarter(month: u32, year: i32) -> (u32, i32) {
    match month {
        3 => (6, year),
        6 => (9, year),
        9 => (12, year),
        _ => (3, year + 1),
    }
}

fn month_code(month: u32) -> char {
    match month {
        3 => 'H',
        6 => 'M',
        9 => 'U',
        _ => 'Z',
    }
}

fn code_month(code: char) -> Option<u32> {
    match code {
        'H' => Some(3),
        'M' => Some(6),
        'U' => Some(9),
        'Z' => Some(12),
        _ => None,
    }
}

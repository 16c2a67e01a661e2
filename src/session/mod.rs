//! Session phase mapping for ES/NQ trading hours.
//!
//! The products trade nearly 24 hours, but the phases that matter for
//! structure reads anchor to the Chicago regular session: 08:30 open,
//! 15:00 power hour, 16:00 close. All boundaries are America/Chicago
//! local time, inclusive of the lower bound and exclusive of the upper.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::America::Chicago;
use serde::{Deserialize, Serialize};

/// Regular session open, minutes after local midnight (08:30 CT).
const SESSION_OPEN_MINUTES: i64 = 8 * 60 + 30;

/// Named segment of the Chicago trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// 05:00 - 08:30 CT.
    PreOpen,
    /// 08:30 - 09:00 CT, the first 30 minutes.
    OpeningRange,
    /// 09:00 - 11:30 CT.
    MidMorning,
    /// 11:30 - 13:00 CT.
    Lunch,
    /// 13:00 - 15:00 CT.
    MidAfternoon,
    /// 15:00 - 16:00 CT, the last hour of the regular session.
    PowerHour,
    /// 16:00 - 17:00 CT.
    Close,
    /// All other times (overnight session).
    Extended,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreOpen => "pre_open",
            Self::OpeningRange => "opening_range",
            Self::MidMorning => "mid_morning",
            Self::Lunch => "lunch",
            Self::MidAfternoon => "mid_afternoon",
            Self::PowerHour => "power_hour",
            Self::Close => "close",
            Self::Extended => "extended",
        }
    }

    /// Whether the phase falls inside the 08:30 - 16:00 regular session.
    pub fn is_regular(&self) -> bool {
        matches!(
            self,
            Self::OpeningRange | Self::MidMorning | Self::Lunch | Self::MidAfternoon | Self::PowerHour
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an instant to its Chicago session phase.
pub fn session_phase(at: DateTime<Utc>) -> SessionPhase {
    let local = at.with_timezone(&Chicago);
    let minutes = i64::from(local.hour()) * 60 + i64::from(local.minute());

    match minutes {
        m if (300..510).contains(&m) => SessionPhase::PreOpen,
        m if (510..540).contains(&m) => SessionPhase::OpeningRange,
        m if (540..690).contains(&m) => SessionPhase::MidMorning,
        m if (690..780).contains(&m) => SessionPhase::Lunch,
        m if (780..900).contains(&m) => SessionPhase::MidAfternoon,
        m if (900..960).contains(&m) => SessionPhase::PowerHour,
        m if (960..1020).contains(&m) => SessionPhase::Close,
        _ => SessionPhase::Extended,
    }
}

/// Minutes since the 08:30 CT open on the instant's local date.
///
/// Negative before the open. Wall-clock arithmetic, so the anchor is
/// never ambiguous across DST transitions (which happen at 02:00 CT).
pub fn minutes_since_session_open(at: DateTime<Utc>) -> i64 {
    let local = at.with_timezone(&Chicago);
    i64::from(local.hour()) * 60 + i64::from(local.minute()) - SESSION_OPEN_MINUTES
}

/// True during the 08:30 - 16:00 CT regular session.
pub fn is_regular_session(at: DateTime<Utc>) -> bool {
    session_phase(at).is_regular()
}

/// Chicago local date of an instant. Used to group candles into sessions.
pub fn session_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Chicago).date_naive()
}

/// Session context handed to the calculator and classifier together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionContext {
    pub as_of: DateTime<Utc>,
    pub phase: SessionPhase,
    pub minutes_since_open: i64,
}

impl SessionContext {
    pub fn at(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            phase: session_phase(as_of),
            minutes_since_open: minutes_since_session_open(as_of),
        }
    }
}

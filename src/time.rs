//! Compact community time conversion
//!
//! The service exchanges wall-clock times as 10-digit `YYMMDDHHmm` strings
//! in the community's own timezone. Callers supply times in the operator's
//! timezone; [`TimeNormalizer`] moves them between the two.

use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::error::{GateKeyError, Result};

/// Length of a compact `YYMMDDHHmm` time string
pub const COMPACT_TIME_LEN: usize = 10;

const COMPACT_FORMAT: &str = "%y%m%d%H%M";

/// Converts compact times between operator and community timezones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeNormalizer {
    community: Tz,
    operator: Tz,
}

impl TimeNormalizer {
    /// Build from IANA timezone names (e.g. `"Asia/Shanghai"`).
    pub fn new(community_timezone: &str, operator_timezone: &str) -> Result<Self> {
        Ok(Self {
            community: parse_timezone(community_timezone)?,
            operator: parse_timezone(operator_timezone)?,
        })
    }

    pub fn from_zones(community: Tz, operator: Tz) -> Self {
        Self {
            community,
            operator,
        }
    }

    pub fn community(&self) -> Tz {
        self.community
    }

    pub fn operator(&self) -> Tz {
        self.operator
    }

    /// Operator wall time → community wall time.
    ///
    /// `""` passes through. When both zones are the same a well-formed input
    /// is returned unchanged without a calendar check.
    pub fn to_community_time(&self, compact: &str) -> Result<String> {
        convert(compact, self.operator, self.community)
    }

    /// Community wall time → operator wall time.
    pub fn to_operator_time(&self, compact: &str) -> Result<String> {
        convert(compact, self.community, self.operator)
    }
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| GateKeyError::Configuration(format!("Unknown timezone {:?}: {}", name, e)))
}

/// Zero the minute group of a compact time. `""` passes through.
pub fn truncate_to_hour(compact: &str) -> Result<String> {
    if compact.is_empty() {
        return Ok(String::new());
    }
    check_shape(compact)?;
    Ok(format!("{}00", &compact[..COMPACT_TIME_LEN - 2]))
}

/// Require five two-digit groups. Calendar validity is not checked.
pub fn check_shape(compact: &str) -> Result<()> {
    if compact.len() != COMPACT_TIME_LEN || !compact.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GateKeyError::Format(format!(
            "expected {} digits YYMMDDHHmm, got {:?}",
            COMPACT_TIME_LEN, compact
        )));
    }
    Ok(())
}

/// Parse `YYMMDDHHmm` as a naive wall time in the 2000s.
pub fn parse_compact(compact: &str) -> Result<NaiveDateTime> {
    check_shape(compact)?;

    // All ASCII digits, so each two-byte group parses
    let group = |i: usize| -> u32 {
        compact[i * 2..i * 2 + 2]
            .bytes()
            .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
    };

    let year = 2000 + group(0) as i32;
    NaiveDate::from_ymd_opt(year, group(1), group(2))
        .and_then(|date| date.and_hms_opt(group(3), group(4), 0))
        .ok_or_else(|| GateKeyError::Format(format!("not a calendar time: {:?}", compact)))
}

fn convert(compact: &str, from: Tz, to: Tz) -> Result<String> {
    if compact.is_empty() {
        return Ok(String::new());
    }

    check_shape(compact)?;
    if from == to {
        return Ok(compact.to_string());
    }

    let naive = parse_compact(compact)?;

    // Ambiguous wall times (DST fall-back) resolve to the earlier instant
    let local = from.from_local_datetime(&naive).earliest().ok_or_else(|| {
        GateKeyError::Format(format!("{:?} does not exist in {}", compact, from.name()))
    })?;

    Ok(local.with_timezone(&to).format(COMPACT_FORMAT).to_string())
}

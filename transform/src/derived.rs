use chrono::{DateTime, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WinningTeam {
    Allies,
    Axis,
    Tie,
}

impl WinningTeam {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allies => "Allies",
            Self::Axis => "Axis",
            Self::Tie => "Tie",
        }
    }
}

impl std::fmt::Display for WinningTeam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equal scores are a tie, there is no tolerance.
pub fn winning_team(allies_score: i32, axis_score: i32) -> WinningTeam {
    if allies_score > axis_score {
        WinningTeam::Allies
    } else if axis_score > allies_score {
        WinningTeam::Axis
    } else {
        WinningTeam::Tie
    }
}

/// Whole seconds between `start` and `end`. Negative spans are returned as is.
pub fn duration_seconds(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_seconds()
}

/// Parses an ISO-8601 timestamp such as `2025-12-20T03:27:06.123456`.
///
/// The fractional part is cut off before parsing, so `06.999` becomes `06`.
/// A trailing `Z` or `+hh:mm` offset is accepted and the result is moved to UTC.
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    let truncated = match input.find('.') {
        Some(dot) => {
            let rest = &input[dot + 1..];
            let digits = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            format!("{}{}", &input[..dot], &rest[digits..])
        }
        None => input.to_owned(),
    };

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&truncated, format) {
            return Some(naive);
        }
    }

    DateTime::parse_from_rfc3339(&truncated)
        .or_else(|_| DateTime::parse_from_str(&truncated, "%Y-%m-%d %H:%M:%S%:z"))
        .ok()
        .map(|aware| aware.naive_utc())
}

//! Timestamp parsing and clip time windows.
//!
//! Manifest spans come as `HH:MM:SS.xxx` strings (VAST27M `clip_span`) or as
//! plain seconds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parse a timestamp string to total seconds.
///
/// Supports formats:
/// - `HH:MM:SS` or `HH:MM:SS.mmm`
/// - `MM:SS` or `MM:SS.mmm`
/// - `SS` or `SS.mmm`
///
/// # Examples
/// ```
/// use vfeat_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() > 3 {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    }

    const NAMES: [&str; 3] = ["hours", "minutes", "seconds"];
    let offset = 3 - parts.len();
    let mut total = 0.0;
    for (i, part) in parts.iter().enumerate() {
        let name = NAMES[offset + i];
        let value: f64 = part
            .parse()
            .map_err(|_| TimestampError::InvalidValue(name, part.to_string()))?;
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        total = total * 60.0 + value;
    }
    Ok(total)
}

/// Parse a span endpoint to whole seconds.
///
/// The fractional part of the seconds component is dropped, so
/// `"00:01:05.900"` is 65.
pub fn span_seconds(ts: &str) -> Result<f64, TimestampError> {
    Ok(parse_timestamp(ts)?.floor())
}

/// Half-open `[start, end)` window into a clip, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    /// Create a validated window.
    pub fn new(start: f64, end: f64) -> Result<Self, TimestampError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(TimestampError::InvalidFormat(format!("{start}..{end}")));
        }
        if start < 0.0 || end < 0.0 {
            return Err(TimestampError::Negative);
        }
        if start >= end {
            return Err(TimestampError::StartNotBeforeEnd);
        }
        Ok(Self { start, end })
    }

    /// Build a window from two span strings.
    pub fn from_span(start: &str, end: &str) -> Result<Self, TimestampError> {
        Self::new(span_seconds(start)?, span_seconds(end)?)
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Clamp the end to a known media duration.
    ///
    /// Returns `None` when the window starts at or after the end of the media.
    pub fn clamp_to(&self, media_duration: f64) -> Option<Self> {
        if media_duration <= self.start {
            return None;
        }
        Some(Self {
            start: self.start,
            end: self.end.min(media_duration),
        })
    }
}

/// Timestamp parsing/validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS, HH:MM:SS.mmm, MM:SS, or SS")]
    InvalidFormat(String),

    #[error("Start time must be before end time")]
    StartNotBeforeEnd,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_hh_mm_ss() {
        assert_eq!(parse_timestamp("00:00:00").unwrap(), 0.0);
        assert_eq!(parse_timestamp("00:01:00").unwrap(), 60.0);
        assert_eq!(parse_timestamp("01:00:00").unwrap(), 3600.0);
        assert_eq!(parse_timestamp("01:30:45").unwrap(), 5445.0);
    }

    #[test]
    fn test_parse_timestamp_mm_ss() {
        assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
        assert_eq!(parse_timestamp("53:53").unwrap(), 3233.0);
    }

    #[test]
    fn test_parse_timestamp_with_milliseconds() {
        let result = parse_timestamp("00:00:30.500").unwrap();
        assert!((result - 30.5).abs() < 0.001);
    }

    #[test]
    fn test_parse_timestamp_errors() {
        assert!(matches!(parse_timestamp(""), Err(TimestampError::Empty)));
        assert!(matches!(parse_timestamp("  "), Err(TimestampError::Empty)));
        assert!(matches!(parse_timestamp("abc"), Err(TimestampError::InvalidValue("seconds", _))));
        assert!(matches!(parse_timestamp("1:2:3:4"), Err(TimestampError::InvalidFormat(_))));
        assert!(matches!(parse_timestamp("-1"), Err(TimestampError::Negative)));
    }

    #[test]
    fn test_span_seconds_drops_fraction() {
        assert_eq!(span_seconds("00:01:05.900").unwrap(), 65.0);
        assert_eq!(span_seconds("00:00:00.000").unwrap(), 0.0);
    }

    #[test]
    fn test_window_from_span() {
        let window = TimeWindow::from_span("00:00:10.040", "00:00:15.120").unwrap();
        assert_eq!(window.start, 10.0);
        assert_eq!(window.end, 15.0);
        assert_eq!(window.duration(), 5.0);
    }

    #[test]
    fn test_window_validation() {
        assert_eq!(TimeWindow::new(5.0, 5.0), Err(TimestampError::StartNotBeforeEnd));
        assert_eq!(TimeWindow::new(-1.0, 5.0), Err(TimestampError::Negative));
        assert!(TimeWindow::new(f64::NAN, 5.0).is_err());
    }

    #[test]
    fn test_window_clamp() {
        let window = TimeWindow::new(2.0, 20.0).unwrap();
        assert_eq!(window.clamp_to(10.0).unwrap().end, 10.0);
        assert_eq!(window.clamp_to(30.0).unwrap().end, 20.0);
        assert!(window.clamp_to(2.0).is_none());
    }
}

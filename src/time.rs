// Copyright (c) 2017-2021 Fabian Schuiki

//! Time units and resolution
//!
//! A trace counts time in ticks of its resolution. Units and resolutions are
//! given as strings such as `"1ns"` or `"100ps"`.

use regex::Regex;

/// The default time unit and resolution, one nanosecond.
pub const DEFAULT_TIMESCALE: f64 = 1e-9;

/// The unit suffixes and their scale, largest first.
const UNITS: [(&str, f64); 6] = [
    ("s", 1e0),
    ("ms", 1e-3),
    ("us", 1e-6),
    ("ns", 1e-9),
    ("ps", 1e-12),
    ("fs", 1e-15),
];

lazy_static! {
    static ref TIMESCALE_RE: Regex =
        Regex::new(r"^\s*(1|10|100)?\s*(s|ms|us|ns|ps|fs)\s*$").expect("valid timescale regex");
}

/// Parse a timescale string into seconds.
///
/// Accepts an optional mantissa of 1, 10, or 100 followed by one of the units
/// `s`, `ms`, `us`, `ns`, `ps`, or `fs`. A missing mantissa counts as 1.
pub fn parse_timescale(s: &str) -> Option<f64> {
    let caps = TIMESCALE_RE.captures(s)?;
    let mantissa: f64 = caps.get(1).map(|m| m.as_str()).unwrap_or("1").parse().ok()?;
    let suffix = caps.get(2)?.as_str();
    let scale = UNITS.iter().find(|&&(u, _)| u == suffix)?.1;
    Some(mantissa * scale)
}

/// Format a time in seconds as a timescale string, e.g. `"10ns"`.
///
/// Picks the largest unit that keeps the mantissa at or above one.
/// Anything below a femtosecond is expressed in femtoseconds.
pub fn format_timescale(seconds: f64) -> String {
    let &(suffix, scale) = UNITS
        .iter()
        .find(|&&(_, scale)| seconds >= scale * (1.0 - 1e-9))
        .unwrap_or(&UNITS[UNITS.len() - 1]);
    format!("{}{}", (seconds / scale).round() as u64, suffix)
}

/// The time unit and resolution of a trace.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeBase {
    unit: f64,
    resolution: f64,
}

impl TimeBase {
    /// Create a time base of one nanosecond unit and resolution.
    pub fn new() -> Self {
        TimeBase {
            unit: DEFAULT_TIMESCALE,
            resolution: DEFAULT_TIMESCALE,
        }
    }

    /// The display unit in seconds.
    pub fn unit(&self) -> f64 {
        self.unit
    }

    /// The duration of one tick in seconds.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Set the display unit. Falls back to nanoseconds on invalid input.
    pub fn set_unit(&mut self, s: &str) {
        self.unit = parse_or_default(s, "unit");
    }

    /// Set the resolution. Falls back to nanoseconds on invalid input.
    pub fn set_resolution(&mut self, s: &str) {
        self.resolution = parse_or_default(s, "resolution");
    }

    /// Convert absolute seconds into ticks of the resolution.
    ///
    /// Negative times clamp to zero.
    pub fn ticks(&self, seconds: f64) -> u64 {
        (seconds / self.resolution).round() as u64
    }

    /// The resolution as written into the `$timescale` header.
    pub fn timescale(&self) -> String {
        format_timescale(self.resolution)
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        TimeBase::new()
    }
}

fn parse_or_default(s: &str, what: &str) -> f64 {
    match parse_timescale(s) {
        Some(v) => v,
        None => {
            warn!(
                "Invalid time {} `{}`; using {}",
                what,
                s,
                format_timescale(DEFAULT_TIMESCALE)
            );
            DEFAULT_TIMESCALE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        ((a - b) / b).abs() < 1e-12
    }

    #[test]
    fn parsing() {
        assert!(close(parse_timescale("1ns").unwrap(), 1e-9));
        assert!(close(parse_timescale("10us").unwrap(), 1e-5));
        assert!(close(parse_timescale("100 ps").unwrap(), 1e-10));
        assert!(close(parse_timescale(" s ").unwrap(), 1.0));
        assert!(close(parse_timescale("fs").unwrap(), 1e-15));
        assert_eq!(parse_timescale("2ns"), None);
        assert_eq!(parse_timescale("1 parsec"), None);
        assert_eq!(parse_timescale(""), None);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_timescale(1.0), "1s");
        assert_eq!(format_timescale(1e-3), "1ms");
        assert_eq!(format_timescale(1e-5), "10us");
        assert_eq!(format_timescale(1e-9), "1ns");
        assert_eq!(format_timescale(1e-7), "100ns");
        assert_eq!(format_timescale(1e-12), "1ps");
        assert_eq!(format_timescale(1e-15), "1fs");
    }

    #[test]
    fn formatting_roundtrips_parsed_strings() {
        for s in &["1s", "10ms", "100us", "1ns", "10ps", "100fs"] {
            assert_eq!(format_timescale(parse_timescale(s).unwrap()), *s);
        }
    }

    #[test]
    fn invalid_input_falls_back() {
        let mut tb = TimeBase::new();
        tb.set_resolution("1ps");
        assert!(close(tb.resolution(), 1e-12));
        tb.set_resolution("banana");
        assert_eq!(tb.resolution(), DEFAULT_TIMESCALE);
        tb.set_unit("3ms");
        assert_eq!(tb.unit(), DEFAULT_TIMESCALE);
    }

    #[test]
    fn seconds_to_ticks() {
        let mut tb = TimeBase::new();
        tb.set_unit("1ns");
        assert_eq!(tb.ticks(0.000001), 1000);
        tb.set_resolution("10ps");
        assert_eq!(tb.ticks(1e-9), 100);
        assert_eq!(tb.ticks(-1.0), 0);
        assert_eq!(tb.timescale(), "10ps");
    }
}

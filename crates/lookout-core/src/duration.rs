//! Interval strings used by policy parameters, e.g. `"300ms"`, `"1.5h"`, `"2h45m"`.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration string")]
    Empty,

    #[error("invalid duration: {input:?}")]
    Invalid { input: String },

    #[error("missing unit in duration: {input:?}")]
    MissingUnit { input: String },

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("duration out of range: {input:?}")]
    Overflow { input: String },
}

/// A parsed duration string. Negative values are representable so callers
/// can tell "negative" apart from "malformed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedDuration {
    pub negative: bool,
    pub magnitude: Duration,
}

impl SignedDuration {
    /// The duration if it is strictly greater than zero.
    pub fn positive(self) -> Option<Duration> {
        if self.negative || self.magnitude.is_zero() {
            None
        } else {
            Some(self.magnitude)
        }
    }
}

fn unit_nanos(unit: &str) -> Option<u128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    };
    Some(nanos)
}

/// Parse a possibly signed sequence of decimal numbers, each with an optional
/// fraction and a unit suffix (`ns`, `us`, `ms`, `s`, `m`, `h`).
pub fn parse_duration(input: &str) -> Result<SignedDuration, DurationError> {
    let original = input.trim();
    if original.is_empty() {
        return Err(DurationError::Empty);
    }

    let (negative, mut rest) = match original.as_bytes()[0] {
        b'-' => (true, &original[1..]),
        b'+' => (false, &original[1..]),
        _ => (false, original),
    };

    if rest == "0" {
        return Ok(SignedDuration {
            negative,
            magnitude: Duration::ZERO,
        });
    }
    if rest.is_empty() {
        return Err(DurationError::Invalid {
            input: original.to_string(),
        });
    }

    let invalid = || DurationError::Invalid {
        input: original.to_string(),
    };
    let overflow = || DurationError::Overflow {
        input: original.to_string(),
    };

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];
        if unit.is_empty() {
            return Err(DurationError::MissingUnit {
                input: original.to_string(),
            });
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: original.to_string(),
        })?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let mut value = whole.checked_mul(scale).ok_or_else(overflow)?;

        // Digits past nanosecond precision cannot change the result.
        let frac_digits = &frac_part[..frac_part.len().min(18)];
        if !frac_digits.is_empty() {
            let numerator: u128 = frac_digits.parse().map_err(|_| invalid())?;
            let denominator = 10u128.pow(frac_digits.len() as u32);
            value = value
                .checked_add(numerator * scale / denominator)
                .ok_or_else(overflow)?;
        }

        total = total.checked_add(value).ok_or_else(overflow)?;
    }

    let nanos = u64::try_from(total).map_err(|_| overflow())?;
    Ok(SignedDuration {
        negative,
        magnitude: Duration::from_nanos(nanos),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Duration {
        parse_duration(input).unwrap().magnitude
    }

    #[test]
    fn test_single_units() {
        assert_eq!(parse("100ms"), Duration::from_millis(100));
        assert_eq!(parse("30s"), Duration::from_secs(30));
        assert_eq!(parse("5m"), Duration::from_secs(300));
        assert_eq!(parse("2h"), Duration::from_secs(7200));
        assert_eq!(parse("15us"), Duration::from_micros(15));
        assert_eq!(parse("7ns"), Duration::from_nanos(7));
    }

    #[test]
    fn test_compound_and_fractional() {
        assert_eq!(parse("2h45m"), Duration::from_secs(2 * 3600 + 45 * 60));
        assert_eq!(parse("1.5h"), Duration::from_secs(5400));
        assert_eq!(parse(".5s"), Duration::from_millis(500));
        assert_eq!(parse("1m30.25s"), Duration::from_millis(90_250));
    }

    #[test]
    fn test_sign_and_zero() {
        let negative = parse_duration("-1s").unwrap();
        assert!(negative.negative);
        assert_eq!(negative.positive(), None);

        let zero = parse_duration("0").unwrap();
        assert_eq!(zero.positive(), None);

        assert_eq!(parse_duration("0s").unwrap().positive(), None);
        assert_eq!(
            parse_duration("+10ms").unwrap().positive(),
            Some(Duration::from_millis(10))
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert!(matches!(
            parse_duration("10"),
            Err(DurationError::MissingUnit { .. })
        ));
        assert!(matches!(
            parse_duration("10d"),
            Err(DurationError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_duration("ms"),
            Err(DurationError::Invalid { .. })
        ));
        assert!(matches!(parse_duration("-"), Err(DurationError::Invalid { .. })));
        assert!(matches!(
            parse_duration("99999999999999999999h"),
            Err(DurationError::Overflow { .. })
        ));
        assert!(matches!(
            parse_duration("340282366920938463463374607431768211.999us"),
            Err(DurationError::Overflow { .. })
        ));
    }
}

use crate::errors::Error;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parses a duration written as a sequence of decimal numbers, each with an optional
/// fraction and a mandatory unit suffix: `"300ms"`, `"1.5h"`, `"2h45m"`, `"10m"`.
///
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A lone `"0"` is accepted.
/// Negative durations are rejected: an expiration in the past is never what a caller means.
pub fn parse_duration(input: &str) -> Result<Duration, Error> {
    let trimmed = input.trim();
    if trimmed.starts_with('-') {
        return Err(Error::validation(format!(
            "negative duration '{trimmed}' is not allowed"
        )));
    }

    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if body.is_empty() {
        return Err(Error::validation("duration cannot be empty"));
    }

    if body == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = body;
    let mut total_nanos: u128 = 0;

    while !rest.is_empty() {
        let (int_part, after_int) = split_digits(rest);
        let (frac_part, after_number) = match after_int.strip_prefix('.') {
            Some(tail) => split_digits(tail),
            None => ("", after_int),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(Error::validation(format!(
                "expected a number in duration '{input}'"
            )));
        }

        let unit_len = after_number
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_number.len());
        let (unit, after_unit) = after_number.split_at(unit_len);

        let scale = unit_nanos(unit).ok_or_else(|| {
            if unit.is_empty() {
                Error::validation(format!("missing unit in duration '{input}'"))
            } else {
                Error::validation(format!("unknown unit '{unit}' in duration '{input}'"))
            }
        })?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| Error::validation(format!("invalid number in duration '{input}'")))?
        };

        let mut nanos = whole
            .checked_mul(scale)
            .ok_or_else(|| overflow(input))?;

        let mut frac_scale = scale;
        for digit in frac_part.bytes() {
            frac_scale /= 10;
            if frac_scale == 0 {
                break;
            }
            nanos += u128::from(digit - b'0') * frac_scale;
        }

        total_nanos = total_nanos
            .checked_add(nanos)
            .ok_or_else(|| overflow(input))?;
        rest = after_unit;
    }

    let secs = u64::try_from(total_nanos / NANOS_PER_SEC).map_err(|_| overflow(input))?;
    let subsec = u32::try_from(total_nanos % NANOS_PER_SEC).map_err(|_| overflow(input))?;
    Ok(Duration::new(secs, subsec))
}

/// Parses an expiration as entered on an upload form. A bare integer counts minutes;
/// anything else must satisfy [`parse_duration`].
pub fn parse_expiration(input: &str) -> Result<Duration, Error> {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let minutes: u64 = trimmed
            .parse()
            .map_err(|_| Error::validation(format!("invalid expiration '{input}'")))?;
        return minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| overflow(input));
    }

    parse_duration(trimmed)
}

/// Parses a download limit. `0` means unlimited and is returned as-is
pub fn parse_download_limit(input: &str) -> Result<u64, Error> {
    input
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::validation(format!("invalid download limit '{input}'")))
}

fn split_digits(input: &str) -> (&str, &str) {
    let len = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    input.split_at(len)
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(60 * 60 * NANOS_PER_SEC),
        _ => None,
    }
}

fn overflow(input: &str) -> Error {
    Error::validation(format!("duration '{input}' is out of range"))
}

#[cfg(test)]
mod tests {
    use super::{parse_download_limit, parse_duration, parse_expiration};
    use crate::errors::Error;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case("1m", Duration::from_secs(60))]
    #[case("10m", Duration::from_secs(600))]
    #[case("1h30m", Duration::from_secs(5400))]
    #[case("1.5h", Duration::from_secs(5400))]
    #[case("250ms", Duration::from_millis(250))]
    #[case("2h45m30.5s", Duration::from_millis(9_930_500))]
    #[case("3us", Duration::from_micros(3))]
    #[case("3µs", Duration::from_micros(3))]
    #[case("0", Duration::ZERO)]
    #[case(" +5s ", Duration::from_secs(5))]
    #[case(".5s", Duration::from_millis(500))]
    fn parses_valid_durations(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("10")]
    #[case("1x")]
    #[case("m")]
    #[case("-1m")]
    #[case("1m-")]
    #[case(".s")]
    #[case("99999999999999999999999999999999999999h")]
    fn rejects_malformed_durations(#[case] input: &str) {
        assert!(matches!(parse_duration(input), Err(Error::Validation(_))));
    }

    #[test]
    fn bare_expirations_count_minutes() {
        assert_eq!(parse_expiration("30").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_expiration("45s").unwrap(), Duration::from_secs(45));
        assert!(parse_expiration("soon").is_err());
    }

    #[test]
    fn download_limits() {
        assert_eq!(parse_download_limit("3").unwrap(), 3);
        assert_eq!(parse_download_limit(" 0 ").unwrap(), 0);
        assert!(matches!(
            parse_download_limit("-1"),
            Err(Error::Validation(_))
        ));
        assert!(parse_download_limit("three").is_err());
    }
}

use anyhow::{bail, ensure, Context, Result};
use std::time::Duration;

const UNITS: [(char, u64); 4] = [('d', 86400), ('h', 3600), ('m', 60), ('s', 1)];

/// Parses durations like `1d2h3m4s`, `25m` or `90s`. A bare number is a number of seconds. Units
/// may be given in any order, each at most once.
pub(crate) fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    ensure!(!input.is_empty(), "A duration cannot be empty");
    let mut secs: u64 = 0;
    let mut seen = Vec::new();
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let multiplier = UNITS
            .iter()
            .find(|(unit, _)| *unit == c)
            .map(|(_, multiplier)| *multiplier)
            .with_context(|| format!("Unknown unit '{}' in duration '{}'", c, input))?;
        if digits.is_empty() || seen.contains(&c) {
            bail!("Unable to parse duration '{}'", input);
        }
        seen.push(c);
        secs += digits
            .parse::<u64>()
            .with_context(|| format!("Unable to parse duration '{}'", input))?
            * multiplier;
        digits.clear();
    }
    if !digits.is_empty() {
        secs += digits
            .parse::<u64>()
            .with_context(|| format!("Unable to parse duration '{}'", input))?;
    }
    Ok(Duration::from_secs(secs))
}

/// Parses a `key=value` pair. The value may be empty and may contain `=`.
pub(crate) fn parse_key_val(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .with_context(|| format!("Expected 'key=value', got '{}'", s))?;
    ensure!(!key.trim().is_empty(), "The key of '{}' is empty", s);
    Ok((key.trim().to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_units() {
        assert_eq!(
            parse_duration("1d2h3m4s").unwrap(),
            Duration::from_secs(93784)
        );
    }

    #[test]
    fn some_units() {
        assert_eq!(parse_duration("1d3m4s").unwrap(), Duration::from_secs(86584));
        assert_eq!(parse_duration("1h5m").unwrap(), Duration::from_secs(3900));
        assert_eq!(parse_duration("25m").unwrap(), Duration::from_secs(1500));
    }

    #[test]
    fn only_seconds() {
        assert_eq!(parse_duration("500s").unwrap(), Duration::from_secs(500));
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn invalid_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5w").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("1m2m").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn key_values() {
        assert_eq!(
            parse_key_val("team=storage").unwrap(),
            ("team".to_string(), "storage".to_string())
        );
        assert_eq!(
            parse_key_val("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_key_val("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_key_val("no-separator").is_err());
        assert!(parse_key_val("=value").is_err());
    }
}

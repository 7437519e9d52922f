// Regime text parsing - One regime per line, comma separated
// Format: durationMs,breathsPerMinute[,holdPos,randomize]

use thiserror::Error;

use super::types::{HoldPosition, Regime};

/// Errors reported while parsing regime text
///
/// Range checks (rate bounds, minimum durations) are left to the compiler;
/// the parser only rejects text that does not describe a regime at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: expected 2 or 4 fields, found {found}")]
    WrongFieldCount { line: usize, found: usize },

    #[error("line {line}: duration '{value}' is not a whole number of milliseconds")]
    InvalidDuration { line: usize, value: String },

    #[error("line {line}: breathing rate '{value}' is not a whole number")]
    InvalidRate { line: usize, value: String },

    #[error("line {line}: hold position '{value}' must be postInhale, postExhale, or empty")]
    InvalidHoldPosition { line: usize, value: String },

    #[error("line {line}: randomize flag '{value}' must be true or false")]
    InvalidRandomize { line: usize, value: String },
}

impl ParseError {
    /// 1-based line number of the offending line
    pub fn line(&self) -> usize {
        match self {
            ParseError::WrongFieldCount { line, .. }
            | ParseError::InvalidDuration { line, .. }
            | ParseError::InvalidRate { line, .. }
            | ParseError::InvalidHoldPosition { line, .. }
            | ParseError::InvalidRandomize { line, .. } => *line,
        }
    }
}

/// Parse a regime list
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_regimes(text: &str) -> Result<Vec<Regime>, ParseError> {
    let mut regimes = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        regimes.push(parse_regime_line(line, idx + 1)?);
    }

    log::debug!("Parsed {} regimes", regimes.len());
    Ok(regimes)
}

/// Parse a single regime line; `line_no` is used for error reporting
pub fn parse_regime_line(line: &str, line_no: usize) -> Result<Regime, ParseError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();

    if fields.len() != 2 && fields.len() != 4 {
        return Err(ParseError::WrongFieldCount {
            line: line_no,
            found: fields.len(),
        });
    }

    let duration_ms = fields[0]
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidDuration {
            line: line_no,
            value: fields[0].to_string(),
        })?;

    let breaths_per_minute = fields[1]
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidRate {
            line: line_no,
            value: fields[1].to_string(),
        })?;

    let mut regime = Regime::new(duration_ms, breaths_per_minute);

    if fields.len() == 4 {
        regime.hold_pos = parse_hold(fields[2], line_no)?;
        regime.randomize = parse_flag(fields[3], line_no)?;
    }

    Ok(regime)
}

fn parse_hold(token: &str, line_no: usize) -> Result<Option<HoldPosition>, ParseError> {
    if token.is_empty() {
        return Ok(None);
    }
    HoldPosition::from_token(token)
        .map(Some)
        .ok_or_else(|| ParseError::InvalidHoldPosition {
            line: line_no,
            value: token.to_string(),
        })
}

fn parse_flag(token: &str, line_no: usize) -> Result<bool, ParseError> {
    match token {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidRandomize {
            line: line_no,
            value: token.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_field_lines() {
        let regimes = parse_regimes("10000,10\n20000,6\n").unwrap();
        assert_eq!(regimes, vec![Regime::new(10000, 10), Regime::new(20000, 6)]);
    }

    #[test]
    fn test_parse_four_field_lines() {
        let text = "30000, 6, postInhale, true\n15000,12,,false\n20000,4,postExhale,false";
        let regimes = parse_regimes(text).unwrap();

        assert_eq!(regimes.len(), 3);
        assert_eq!(regimes[0].hold_pos, Some(HoldPosition::PostInhale));
        assert!(regimes[0].randomize);
        assert_eq!(regimes[1].hold_pos, None);
        assert!(!regimes[1].randomize);
        assert_eq!(regimes[2].hold_pos, Some(HoldPosition::PostExhale));
    }

    #[test]
    fn test_skips_blank_and_comment_lines() {
        let text = "# warmup\n\n10000,10\n   \n# main\n60000,6\n";
        let regimes = parse_regimes(text).unwrap();
        assert_eq!(regimes.len(), 2);
    }

    #[test]
    fn test_empty_text_yields_no_regimes() {
        assert!(parse_regimes("").unwrap().is_empty());
    }

    #[test]
    fn test_wrong_field_count() {
        let err = parse_regimes("10000,10\n10000,10,postInhale").unwrap_err();
        assert_eq!(err, ParseError::WrongFieldCount { line: 2, found: 3 });
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn test_invalid_numbers() {
        let err = parse_regimes("ten seconds,10").unwrap_err();
        assert!(matches!(err, ParseError::InvalidDuration { line: 1, .. }));

        let err = parse_regimes("10000,-4").unwrap_err();
        assert!(matches!(err, ParseError::InvalidRate { line: 1, .. }));
    }

    #[test]
    fn test_invalid_tokens() {
        let err = parse_regimes("10000,10,midBreath,true").unwrap_err();
        assert!(matches!(err, ParseError::InvalidHoldPosition { .. }));
        assert!(err.to_string().contains("midBreath"));

        let err = parse_regimes("10000,10,postInhale,yes").unwrap_err();
        assert!(matches!(err, ParseError::InvalidRandomize { .. }));
    }

    #[test]
    fn test_parser_leaves_range_checks_to_compiler() {
        let regimes = parse_regimes("500,99").unwrap();
        assert_eq!(regimes[0], Regime::new(500, 99));
    }
}

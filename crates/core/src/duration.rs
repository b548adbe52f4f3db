//! Rank-duration input such as `30d 15m 5s`
//!
//! Input is a space-separated list of `<amount><unit>` tokens whose durations
//! are summed. Units are `d` (days), `m` (minutes) and `s` (seconds). Tokens
//! shorter than two characters or ending in an unknown unit are skipped.

use std::time::Duration;

use thiserror::Error;

/// Rank-duration parse errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("Invalid amount '{amount}' in '{token}'")]
    InvalidAmount { token: String, amount: String },

    #[error("Duration '{0}' is too large")]
    Overflow(String),
}

/// A recognised duration unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeUnit {
    Days,
    Minutes,
    Seconds,
}

impl TimeUnit {
    fn from_identifier(identifier: char) -> Option<Self> {
        match identifier {
            'd' => Some(TimeUnit::Days),
            'm' => Some(TimeUnit::Minutes),
            's' => Some(TimeUnit::Seconds),
            _ => None,
        }
    }

    fn seconds(self) -> u64 {
        match self {
            TimeUnit::Days => 86_400,
            TimeUnit::Minutes => 60,
            TimeUnit::Seconds => 1,
        }
    }
}

/// Parse a rank duration
///
/// # Arguments
/// * `input` - Text like `"30d 15m 5s"`
///
/// # Returns
/// The summed duration; zero if no token was recognised.
pub fn parse_duration_input(input: &str) -> Result<Duration, DurationParseError> {
    let mut total: u64 = 0;

    for token in input.split(' ') {
        let mut chars = token.chars();
        let Some(identifier) = chars.next_back() else {
            continue;
        };
        let amount = chars.as_str();
        if amount.is_empty() {
            continue;
        }
        let Some(unit) = TimeUnit::from_identifier(identifier) else {
            continue;
        };

        let value: u64 = amount
            .parse()
            .map_err(|_| DurationParseError::InvalidAmount {
                token: token.to_string(),
                amount: amount.to_string(),
            })?;

        total = value
            .checked_mul(unit.seconds())
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;
    }

    Ok(Duration::from_secs(total))
}

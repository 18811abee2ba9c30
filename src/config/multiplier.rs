//! Token multiplier parsing.

use std::fmt;
use std::str::FromStr;

/// Strictly positive, finite scaling factor applied to reported token usage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenMultiplier(f64);

impl TokenMultiplier {
    pub const IDENTITY: TokenMultiplier = TokenMultiplier(1.0);

    /// Wraps a raw factor; anything non-finite or `<= 0` becomes `1.0`.
    pub fn new(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value)
        } else {
            Self::IDENTITY
        }
    }

    /// Parses the forms operators tend to write: `1.2`, `1.2x`, `x1.2`,
    /// `120%`, optionally quoted or padded. Invalid input yields `1.0`.
    pub fn parse(raw: &str) -> Self {
        let mut s = raw.trim();
        if s.is_empty() {
            return Self::IDENTITY;
        }

        if s.len() >= 2
            && ((s.starts_with('"') && s.ends_with('"'))
                || (s.starts_with('\'') && s.ends_with('\'')))
        {
            s = s[1..s.len() - 1].trim();
        }

        if let Some(percent) = s.strip_suffix('%') {
            if let Some(num) = parse_positive(percent) {
                return Self(num / 100.0);
            }
        }

        let s = if let Some(rest) = s.strip_suffix(['x', 'X']) {
            rest.trim()
        } else if let Some(rest) = s.strip_prefix(['x', 'X']) {
            rest.trim()
        } else {
            s
        };

        parse_positive(s).map(Self).unwrap_or(Self::IDENTITY)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// `ceil(raw × multiplier)`.
    pub fn apply(self, raw: u64) -> u64 {
        (raw as f64 * self.0).ceil() as u64
    }
}

fn parse_positive(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n > 0.0)
}

impl Default for TokenMultiplier {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FromStr for TokenMultiplier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for TokenMultiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

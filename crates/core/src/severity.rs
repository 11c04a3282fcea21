use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outcome rank of a rule, lowest to highest.
///
/// Ordering comes from the declaration order, so `<`/`>=` comparisons are the
/// gating comparisons. Never compare severities by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    NotApplicable,
    Info,
    Ok,
    Warning,
    Critical,
}

impl Severity {
    /// Canonical score used when a result carries no explicit score.
    pub fn limit(self) -> f64 {
        match self {
            Severity::NotApplicable => -1.0,
            Severity::Info => 0.0,
            Severity::Ok => 0.0,
            Severity::Warning => 50.0,
            Severity::Critical => 75.0,
        }
    }

    /// Severity band a score falls into.
    pub fn from_score(score: f64) -> Self {
        if score >= Severity::Critical.limit() {
            Severity::Critical
        } else if score >= Severity::Warning.limit() {
            Severity::Warning
        } else if score >= Severity::Ok.limit() {
            Severity::Ok
        } else {
            Severity::NotApplicable
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::NotApplicable => "NOT_APPLICABLE",
            Severity::Info => "INFO",
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOT_APPLICABLE" | "NA" => Ok(Severity::NotApplicable),
            "INFO" => Ok(Severity::Info),
            "OK" => Ok(Severity::Ok),
            "WARNING" => Ok(Severity::Warning),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::NotApplicable < Severity::Info);
        assert!(Severity::Info < Severity::Ok);
        assert!(Severity::Ok < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn limits_are_monotonic() {
        let all = [
            Severity::NotApplicable,
            Severity::Info,
            Severity::Ok,
            Severity::Warning,
            Severity::Critical,
        ];
        for pair in all.windows(2) {
            assert!(pair[0].limit() <= pair[1].limit());
        }
    }

    #[test]
    fn from_score_bands() {
        assert_eq!(Severity::from_score(-5.0), Severity::NotApplicable);
        assert_eq!(Severity::from_score(0.0), Severity::Ok);
        assert_eq!(Severity::from_score(49.9), Severity::Ok);
        assert_eq!(Severity::from_score(50.0), Severity::Warning);
        assert_eq!(Severity::from_score(100.0), Severity::Critical);
    }

    #[test]
    fn parse_and_serde_names() {
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("NA".parse::<Severity>().unwrap(), Severity::NotApplicable);
        assert!("loud".parse::<Severity>().is_err());
        assert_eq!(
            serde_json::to_string(&Severity::NotApplicable).unwrap(),
            "\"NOT_APPLICABLE\""
        );
    }
}

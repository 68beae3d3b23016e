use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison a threshold rule applies to a measured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdOperator {
    #[serde(rename = ">=", alias = "≥")]
    AtLeast,
    #[serde(rename = "<=", alias = "≤")]
    AtMost,
    #[serde(rename = ">")]
    Above,
    #[serde(rename = "<")]
    Below,
    #[serde(rename = "between")]
    Between,
}

impl ThresholdOperator {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::AtLeast => ">=",
            Self::AtMost => "<=",
            Self::Above => ">",
            Self::Below => "<",
            Self::Between => "between",
        }
    }

    /// A rule missing a bound its operator reads never matches.
    pub const fn needs_lower(self) -> bool {
        matches!(self, Self::AtLeast | Self::Above | Self::Between)
    }

    pub const fn needs_upper(self) -> bool {
        matches!(self, Self::AtMost | Self::Below | Self::Between)
    }
}

impl fmt::Display for ThresholdOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown threshold operator '{0}' (expected >=, <=, >, < or between)")]
pub struct OperatorParseError(pub String);

impl FromStr for ThresholdOperator {
    type Err = OperatorParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            ">=" | "≥" => Ok(Self::AtLeast),
            "<=" | "≤" => Ok(Self::AtMost),
            ">" => Ok(Self::Above),
            "<" => Ok(Self::Below),
            "between" => Ok(Self::Between),
            _ => Err(OperatorParseError(raw.to_string())),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type TypeKey = i32;

/// Reset period that partitions per-user state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cycle {
    /// Resets every day
    Daily,
    /// Resets every week
    Weekly,
    /// Resets every month
    Monthly,
    /// Never resets
    Lifetime,
    /// Window after registration, e.g. first-week statistics
    Newbie,
    /// Event-scoped data with a fixed end
    LimitTime,
    /// Caller-defined loop such as every 3 days or every 10 matches
    LoopTime,
    Custom(String),
}

impl Cycle {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Lifetime => "lifetime",
            Self::Newbie => "newbie",
            Self::LimitTime => "limitTime",
            Self::LoopTime => "loopTime",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Cycle {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "lifetime" => Self::Lifetime,
            "newbie" => Self::Newbie,
            "limitTime" => Self::LimitTime,
            "loopTime" => Self::LoopTime,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl From<&str> for Cycle {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(cycle) => cycle,
            Err(never) => match never {},
        }
    }
}
